//! Pending user actions preserved across a forced sign-in detour.
//!
//! An [`Intent`] is written right before the login redirect and taken
//! (read and deleted in one step) right after authentication succeeds, so it
//! can influence at most one login.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::auth::AuthError;
use crate::util::fs::{default_state_dir, normalize_label, read_toml, remove_if_exists, write_toml};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IntentKind {
    Checkout,
    ReturnTo,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BillingPeriod {
    #[default]
    Monthly,
    #[serde(alias = "annual")]
    #[strum(to_string = "yearly", serialize = "annual")]
    Yearly,
}

/// Enough context for the target page to reopen checkout on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeCheckout {
    pub plan: String,
    pub billing_period: BillingPeriod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub id: Uuid,
    pub kind: IntentKind,
    pub plan: Option<String>,
    pub billing_period: Option<BillingPeriod>,
    pub return_url: String,
    pub created_at: DateTime<Utc>,
}

impl Intent {
    /// "Wanted to buy `plan` from `return_url`".
    pub fn checkout(
        plan: impl Into<String>,
        billing_period: BillingPeriod,
        return_url: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: IntentKind::Checkout,
            plan: Some(plan.into()),
            billing_period: Some(billing_period),
            return_url: return_url.into(),
            created_at: Utc::now(),
        }
    }

    /// "Bring me back to `return_url`".
    pub fn return_to(return_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: IntentKind::ReturnTo,
            plan: None,
            billing_period: None,
            return_url: return_url.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_stale(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at > ttl
    }

    /// Checkout context to resume, only for checkout intents with a plan.
    pub fn resume(&self) -> Option<ResumeCheckout> {
        if self.kind != IntentKind::Checkout {
            return None;
        }
        Some(ResumeCheckout {
            plan: self.plan.clone()?,
            billing_period: self.billing_period.unwrap_or_default(),
        })
    }
}

/// Persistence for the single pending intent.
pub trait IntentStore: Send + Sync {
    fn load(&self) -> Result<Option<Intent>, AuthError>;
    fn save(&self, intent: &Intent) -> Result<(), AuthError>;
    fn clear(&self) -> Result<(), AuthError>;

    /// Read and delete the pending intent.
    fn take(&self) -> Result<Option<Intent>, AuthError>;
}

/// Intent persisted as TOML next to the session file.
#[derive(Debug, Clone)]
pub struct FileIntentStore {
    path: PathBuf,
}

impl FileIntentStore {
    pub fn new(base_dir: PathBuf, namespace: &str) -> Self {
        let name = format!("{}.pending-intent.toml", normalize_label(namespace));
        Self {
            path: base_dir.join(name),
        }
    }

    pub fn new_default() -> Self {
        Self::new(default_state_dir(), "default")
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl IntentStore for FileIntentStore {
    fn load(&self) -> Result<Option<Intent>, AuthError> {
        Ok(read_toml(&self.path)?)
    }

    fn save(&self, intent: &Intent) -> Result<(), AuthError> {
        write_toml(&self.path, intent)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        remove_if_exists(&self.path)?;
        Ok(())
    }

    fn take(&self) -> Result<Option<Intent>, AuthError> {
        let loaded = self.load();
        // Delete even when the record is unreadable so it cannot linger.
        self.clear()?;
        loaded
    }
}

#[derive(Debug, Default)]
pub struct MemoryIntentStore {
    intent: Mutex<Option<Intent>>,
}

impl MemoryIntentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<Intent>>, AuthError> {
        self.intent
            .lock()
            .map_err(|_| AuthError::Io("intent store lock poisoned".to_string()))
    }
}

impl IntentStore for MemoryIntentStore {
    fn load(&self) -> Result<Option<Intent>, AuthError> {
        Ok(self.slot()?.clone())
    }

    fn save(&self, intent: &Intent) -> Result<(), AuthError> {
        *self.slot()? = Some(intent.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        self.slot()?.take();
        Ok(())
    }

    fn take(&self) -> Result<Option<Intent>, AuthError> {
        Ok(self.slot()?.take())
    }
}
