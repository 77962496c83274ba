#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use statement_gate::api::{CredentialTransport, HttpBackend};
use statement_gate::auth::{Credential, MemoryTokenStore, StoredSession, UserProfile};
use statement_gate::checkout::SubmitControl;
use statement_gate::config::GateConfig;
use statement_gate::intent::MemoryIntentStore;
use statement_gate::Gate;
use wiremock::MockServer;

pub struct Harness {
    pub gate: Gate,
    pub tokens: Arc<MemoryTokenStore>,
    pub intents: Arc<MemoryIntentStore>,
}

pub fn config_for(server: &MockServer) -> GateConfig {
    GateConfig::builder()
        .base_url(server.uri())
        .ready_timeout_ms(500)
        .request_timeout_ms(5_000)
        .build()
}

pub fn harness(server: &MockServer) -> Harness {
    harness_with(server, config_for(server), MemoryTokenStore::new())
}

pub fn harness_with(server: &MockServer, config: GateConfig, tokens: MemoryTokenStore) -> Harness {
    let backend = HttpBackend::with_timeout(
        &server.uri(),
        config.transport,
        config.request_timeout(),
    )
    .expect("backend");
    let tokens = Arc::new(tokens);
    let intents = Arc::new(MemoryIntentStore::new());
    let gate = Gate::with_parts(config, Arc::new(backend), tokens.clone(), intents.clone())
        .expect("gate");
    Harness {
        gate,
        tokens,
        intents,
    }
}

/// Harness whose store already holds a signed-in session.
pub async fn signed_in_harness(server: &MockServer, access: &str, refresh: Option<&str>) -> Harness {
    signed_in_harness_with(server, config_for(server), access, refresh).await
}

pub async fn signed_in_harness_with(
    server: &MockServer,
    config: GateConfig,
    access: &str,
    refresh: Option<&str>,
) -> Harness {
    let mut credential = Credential::new(access).expect("credential");
    if let Some(refresh) = refresh {
        credential = credential.with_refresh_token(refresh);
    }
    let stored = StoredSession::new(credential, Some(profile("ana@example.com")));
    let harness = harness_with(server, config, MemoryTokenStore::seeded(stored));
    harness.gate.session.initialize().await;
    harness
}

pub fn profile(email: &str) -> UserProfile {
    serde_json::from_value(user_json(email)).expect("profile")
}

pub fn user_json(email: &str) -> Value {
    json!({
        "email": email,
        "fullName": "Ana Silva",
        "accountType": "pro",
        "dailyGenerationsUsed": 2,
        "dailyLimit": 10,
        "createdAt": "2024-01-01T00:00:00Z"
    })
}

pub fn grant_json(access: &str, refresh: Option<&str>, email: Option<&str>) -> Value {
    let mut grant = json!({ "accessToken": access });
    if let Some(refresh) = refresh {
        grant["refreshToken"] = json!(refresh);
    }
    if let Some(email) = email {
        grant["user"] = user_json(email);
    }
    grant
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn cookie_config(server: &MockServer) -> GateConfig {
    let mut config = config_for(server);
    config.transport = CredentialTransport::Cookie;
    config
}

/// Records every enable/disable call.
#[derive(Default)]
pub struct RecordingControl {
    pub disabled: AtomicUsize,
    pub enabled: AtomicUsize,
}

impl RecordingControl {
    pub fn disabled_count(&self) -> usize {
        self.disabled.load(Ordering::SeqCst)
    }

    pub fn enabled_count(&self) -> usize {
        self.enabled.load(Ordering::SeqCst)
    }
}

impl SubmitControl for RecordingControl {
    fn set_enabled(&self, enabled: bool) {
        if enabled {
            self.enabled.fetch_add(1, Ordering::SeqCst);
        } else {
            self.disabled.fetch_add(1, Ordering::SeqCst);
        }
    }
}
