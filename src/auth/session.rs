use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::error::AuthError;
use super::profile::UserProfile;
use super::store::{StoredSession, TokenStore};
use super::token::Credential;
use crate::api::{AuthBackend, AuthGrant, SignupRequest};
use crate::util::timeout::with_timeout;

/// Where the session is in its sign-in lifecycle.
///
/// `Anonymous -> Authenticating -> {Authenticated | AuthFailed}`;
/// a retry moves `AuthFailed` back to `Authenticating`, and logout or a failed
/// refresh returns to `Anonymous`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticating,
    Authenticated,
    AuthFailed { reason: String },
}

/// Result of a login or signup attempt that reached the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success { user: Option<UserProfile> },
    /// Credentials were refused; `reason` is safe to show to the user.
    Rejected { reason: String },
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

type RefreshFlight = Shared<BoxFuture<'static, Result<Credential, AuthError>>>;

/// The signed-in session: credential, cached profile and lifecycle state.
///
/// Construct one per application and hand clones to every component that
/// needs it; clones share the same state.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use statement_gate::api::{CredentialTransport, HttpBackend};
/// use statement_gate::auth::{AuthSession, FileTokenStore, LoginOutcome};
///
/// # async fn run() -> Result<(), statement_gate::auth::AuthError> {
/// let backend = HttpBackend::new("https://app.example.com", CredentialTransport::Bearer)?;
/// let session = AuthSession::new(Arc::new(backend), Arc::new(FileTokenStore::new_default()));
/// session.initialize().await;
/// if let LoginOutcome::Rejected { reason } = session.login("ana@example.com", "pw").await? {
///     eprintln!("{reason}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn TokenStore>,
    current: RwLock<Option<StoredSession>>,
    state: watch::Sender<AuthState>,
    ready: watch::Sender<bool>,
    refresh_flight: Mutex<Option<RefreshFlight>>,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("state", &*self.inner.state.borrow())
            .field("ready", &*self.inner.ready.borrow())
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl AuthSession {
    pub fn new(backend: Arc<dyn AuthBackend>, store: Arc<dyn TokenStore>) -> Self {
        let (state, _) = watch::channel(AuthState::Anonymous);
        let (ready, _) = watch::channel(false);
        Self {
            inner: Arc::new(SessionInner {
                backend,
                store,
                current: RwLock::new(None),
                state,
                ready,
                refresh_flight: Mutex::new(None),
            }),
        }
    }

    /// Restore the stored session and signal readiness.
    ///
    /// A stored credential without a profile gets one profile fetch; a 401
    /// there clears the session. Readiness is signalled on every path.
    pub async fn initialize(&self) {
        let loaded = match self.inner.store.load() {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(error = %err, "Could not read stored session; starting signed out");
                None
            }
        };

        if let Some(mut stored) = loaded {
            let mut keep = true;
            if stored.profile.is_none() && !stored.credential.is_expired() {
                match self.inner.backend.fetch_profile(&stored.credential).await {
                    Ok(profile) => {
                        debug!("Recovered missing profile for stored session");
                        stored.profile = Some(profile);
                        self.inner.save_to_store(&stored);
                    }
                    Err(err) if err.is_unauthorized() => {
                        warn!("Stored credential rejected while recovering profile");
                        keep = false;
                    }
                    Err(err) => {
                        warn!(error = %err, "Signed in without a profile");
                    }
                }
            }

            if keep {
                let authenticated = !stored.credential.is_expired();
                *self.inner.write_current() = Some(stored);
                if authenticated {
                    self.inner.set_state(AuthState::Authenticated);
                }
            } else {
                self.inner.discard();
            }
        }

        self.inner.ready.send_replace(true);
        debug!(authenticated = self.is_authenticated(), "Session initialized");
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready.borrow()
    }

    /// Wait until [`AuthSession::initialize`] finished; `false` on timeout.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        let mut ready = self.inner.ready.subscribe();
        with_timeout(timeout, async move {
            ready
                .wait_for(|ready| *ready)
                .await
                .map(|_| ())
                .map_err(|_| AuthError::NotLoggedIn)
        })
        .await
        .is_ok()
    }

    /// True iff a non-expired credential exists. No I/O.
    pub fn is_authenticated(&self) -> bool {
        self.inner
            .read_current()
            .as_ref()
            .is_some_and(|stored| !stored.credential.is_expired())
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.inner
            .read_current()
            .as_ref()
            .and_then(|stored| stored.profile.clone())
    }

    pub fn credential(&self) -> Option<Credential> {
        self.inner
            .read_current()
            .as_ref()
            .map(|stored| stored.credential.clone())
    }

    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Sign in with email and password.
    ///
    /// Refused credentials come back as [`LoginOutcome::Rejected`]; only
    /// transport and unexpected backend failures are errors.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        self.inner.set_state(AuthState::Authenticating);
        let result = self.inner.backend.login(email, password).await;
        self.finish_authentication(result).await
    }

    /// Create an account; on success the new user is signed in.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<LoginOutcome, AuthError> {
        self.inner.set_state(AuthState::Authenticating);
        let request = SignupRequest {
            email: email.to_string(),
            password: password.to_string(),
            full_name: full_name.map(str::to_string),
        };
        let result = self.inner.backend.register(&request).await;
        self.finish_authentication(result).await
    }

    /// Clear the local session, then tell the backend.
    ///
    /// In-memory state is gone even when the backend call fails; calling it
    /// again is a no-op. An `Err` means the persisted record could not be
    /// removed and may be restored by the next [`AuthSession::initialize`].
    pub async fn logout(&self) -> Result<(), AuthError> {
        let previous = self.inner.write_current().take();
        self.inner.set_state(AuthState::Anonymous);
        let cleared = self.inner.store.clear().or_else(|err| {
            warn!(error = %err, "Could not remove stored session; retrying once");
            self.inner.store.clear()
        });
        if let Err(err) = &cleared {
            warn!(error = %err, "Stored session survives sign-out until it can be removed");
        }

        if let Some(previous) = previous {
            if let Err(err) = self.inner.backend.logout(&previous.credential).await {
                debug!(error = %err, "Backend logout failed; local session already cleared");
            }
            info!("Signed out");
        }
        cleared
    }

    /// Drop the local session without contacting the backend.
    pub fn discard_local(&self) {
        self.inner.discard();
    }

    /// Exchange the refresh token for a new credential.
    ///
    /// Single-flight: concurrent callers share one network call and observe
    /// the same result. Any failure returns
    /// [`AuthError::ReauthenticationRequired`] and clears the session, unless a
    /// login or logout replaced it while the request was out.
    pub async fn refresh(&self) -> Result<Credential, AuthError> {
        let flight = {
            let mut slot = self
                .inner
                .refresh_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(flight) => {
                    debug!("Joining in-flight token refresh");
                    flight.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let flight = async move { inner.run_refresh().await }.boxed().shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        let result = flight.clone().await;

        let mut slot = self
            .inner
            .refresh_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&flight)) {
            *slot = None;
        }
        result
    }

    /// Authenticated, or made so by a silent refresh of an expired credential.
    pub async fn ensure_authenticated(&self) -> bool {
        if self.is_authenticated() {
            return true;
        }
        let can_refresh = self
            .inner
            .read_current()
            .as_ref()
            .is_some_and(|stored| stored.credential.refresh_token.is_some());
        can_refresh && self.refresh().await.is_ok()
    }

    /// Reload the profile from the backend, refreshing once on 401.
    pub async fn fetch_profile(&self) -> Result<UserProfile, AuthError> {
        let credential = self.credential().ok_or(AuthError::NotLoggedIn)?;
        let profile = match self.inner.backend.fetch_profile(&credential).await {
            Err(err) if err.is_unauthorized() => {
                let refreshed = self.refresh().await?;
                self.inner.backend.fetch_profile(&refreshed).await?
            }
            other => other?,
        };

        let updated = {
            let mut current = self.inner.write_current();
            current.as_mut().map(|stored| {
                stored.profile = Some(profile.clone());
                stored.clone()
            })
        };
        if let Some(updated) = updated {
            self.inner.save_to_store(&updated);
        }
        Ok(profile)
    }

    async fn finish_authentication(
        &self,
        result: Result<AuthGrant, AuthError>,
    ) -> Result<LoginOutcome, AuthError> {
        match result {
            Ok(grant) => match self.establish(grant).await {
                Ok(user) => {
                    info!(email = user.as_ref().map(|u| u.email.as_str()), "Signed in");
                    Ok(LoginOutcome::Success { user })
                }
                Err(err) => {
                    self.inner.set_state(AuthState::AuthFailed {
                        reason: err.to_string(),
                    });
                    Err(err)
                }
            },
            Err(AuthError::Rejected { status, reason }) => {
                info!(status, "Sign-in refused");
                self.inner.set_state(AuthState::AuthFailed {
                    reason: reason.clone(),
                });
                Ok(LoginOutcome::Rejected { reason })
            }
            Err(err) => {
                warn!(error = %err, "Sign-in failed");
                self.inner.set_state(AuthState::AuthFailed {
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn establish(&self, grant: AuthGrant) -> Result<Option<UserProfile>, AuthError> {
        let credential = Credential::from_grant(
            grant.access_token,
            grant.refresh_token,
            grant.expires_at,
            grant.csrf_token,
        )?;
        let profile = match grant.user {
            Some(profile) => Some(profile),
            None => match self.inner.backend.fetch_profile(&credential).await {
                Ok(profile) => Some(profile),
                Err(err) => {
                    warn!(error = %err, "Signed in without a profile");
                    None
                }
            },
        };

        let stored = StoredSession::new(credential, profile.clone());
        *self.inner.write_current() = Some(stored.clone());
        self.inner.save_to_store(&stored);
        self.inner.set_state(AuthState::Authenticated);
        Ok(profile)
    }
}

impl SessionInner {
    fn read_current(&self) -> std::sync::RwLockReadGuard<'_, Option<StoredSession>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_current(&self) -> std::sync::RwLockWriteGuard<'_, Option<StoredSession>> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: AuthState) {
        self.state.send_replace(state);
    }

    fn save_to_store(&self, stored: &StoredSession) {
        if let Err(err) = self.store.save(stored) {
            warn!(error = %err, "Could not persist session; it will not survive a restart");
        }
    }

    /// Clear the session only while it still holds `access_token`.
    ///
    /// The slot stays locked through the store clear so a concurrent login
    /// cannot persist between the two and then lose its file.
    fn discard_if_current(&self, access_token: &str) -> bool {
        let mut slot = self.write_current();
        let current = slot
            .as_ref()
            .is_some_and(|live| live.credential.access_token == access_token);
        if current {
            slot.take();
            if let Err(err) = self.store.clear() {
                warn!(error = %err, "Could not clear stored session");
            }
            self.set_state(AuthState::Anonymous);
        }
        current
    }

    fn discard(&self) {
        self.write_current().take();
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "Could not clear stored session");
        }
        self.set_state(AuthState::Anonymous);
    }

    async fn run_refresh(&self) -> Result<Credential, AuthError> {
        let Some(current) = self.read_current().clone() else {
            return Err(AuthError::ReauthenticationRequired);
        };
        let Some(refresh_token) = current.credential.refresh_token.clone() else {
            debug!("No refresh token; session must be re-established");
            self.discard_if_current(&current.credential.access_token);
            return Err(AuthError::ReauthenticationRequired);
        };

        debug!("Refreshing access token");
        let refreshed = match self.backend.refresh(&refresh_token).await {
            Ok(grant) => Credential::from_grant(
                grant.access_token,
                grant.refresh_token.or(Some(refresh_token)),
                grant.expires_at,
                grant.csrf_token.or(current.credential.csrf_token.clone()),
            )
            .map(|credential| (credential, grant.user)),
            Err(err) => Err(err),
        };

        match refreshed {
            Ok((credential, user)) => {
                let stored = StoredSession::new(credential.clone(), user.or(current.profile));
                let replaced = {
                    let mut slot = self.write_current();
                    // A logout or new login while the request was out wins.
                    let unchanged = slot.as_ref().is_some_and(|live| {
                        live.credential.access_token == current.credential.access_token
                    });
                    if unchanged {
                        self.save_to_store(&stored);
                        *slot = Some(stored);
                        self.set_state(AuthState::Authenticated);
                    }
                    unchanged
                };
                if !replaced {
                    debug!("Session changed during refresh; discarding refreshed credential");
                    return Err(AuthError::ReauthenticationRequired);
                }
                info!("Access token refreshed");
                Ok(credential)
            }
            Err(err) => {
                if self.discard_if_current(&current.credential.access_token) {
                    warn!(error = %err, "Token refresh failed; clearing session");
                } else {
                    debug!(error = %err, "Token refresh failed after the session changed; keeping it");
                }
                Err(AuthError::ReauthenticationRequired)
            }
        }
    }
}
