//! Wiring: one session shared by the redirect and checkout components.

use std::sync::Arc;

use crate::api::{AuthBackend, HttpBackend};
use crate::auth::{AuthSession, FileTokenStore, TokenStore, TokenStoreConfig};
use crate::checkout::CheckoutInitiator;
use crate::config::GateConfig;
use crate::error::Result;
use crate::intent::{FileIntentStore, IntentStore};
use crate::redirect::RedirectController;

/// Application-level bundle built once at startup.
///
/// # Example
/// ```no_run
/// use statement_gate::config::GateConfig;
/// use statement_gate::Gate;
///
/// # async fn run() -> statement_gate::error::Result<()> {
/// let gate = Gate::from_config(GateConfig::from_env()?)?;
/// gate.session.initialize().await;
/// println!("signed in: {}", gate.session.is_authenticated());
/// # Ok(())
/// # }
/// ```
pub struct Gate {
    pub config: GateConfig,
    pub session: AuthSession,
    pub redirect: Arc<RedirectController>,
    pub checkout: CheckoutInitiator,
}

impl Gate {
    /// HTTP backend plus file stores under the configured state directory.
    pub fn from_config(config: GateConfig) -> Result<Self> {
        let backend: Arc<dyn AuthBackend> = Arc::new(HttpBackend::from_config(&config)?);
        let state_dir = config.state_dir();
        let tokens: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(
            TokenStoreConfig::new(state_dir.clone()).with_namespace(config.namespace.clone()),
        ));
        let intents: Arc<dyn IntentStore> =
            Arc::new(FileIntentStore::new(state_dir, &config.namespace));
        Self::with_parts(config, backend, tokens, intents)
    }

    /// Assemble from explicit parts (custom backends, in-memory stores).
    pub fn with_parts(
        config: GateConfig,
        backend: Arc<dyn AuthBackend>,
        tokens: Arc<dyn TokenStore>,
        intents: Arc<dyn IntentStore>,
    ) -> Result<Self> {
        let config = config.validate()?;
        let session = AuthSession::new(backend.clone(), tokens);
        let redirect = Arc::new(RedirectController::new(session.clone(), intents, &config)?);
        let checkout = CheckoutInitiator::new(session.clone(), backend, redirect.clone(), &config);
        Ok(Self {
            config,
            session,
            redirect,
            checkout,
        })
    }
}
