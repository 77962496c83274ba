use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Subscription tier of an account.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AccountType {
    #[default]
    Free,
    #[serde(alias = "professional")]
    #[strum(to_string = "pro", serialize = "professional")]
    Pro,
    Business,
}

/// Cached profile of the signed-in user.
///
/// Accepts both snake_case and camelCase field names from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    #[serde(default, alias = "fullName")]
    pub full_name: Option<String>,
    #[serde(default, alias = "accountType")]
    pub account_type: AccountType,
    #[serde(default, alias = "dailyGenerationsUsed")]
    pub daily_generations_used: u32,
    #[serde(default, alias = "dailyLimit")]
    pub daily_limit: u32,
    #[serde(default = "Utc::now", alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            full_name: None,
            account_type: AccountType::Free,
            daily_generations_used: 0,
            daily_limit: 0,
            created_at: Utc::now(),
        }
    }

    /// Conversions left today; never negative.
    pub fn remaining_generations(&self) -> u32 {
        self.daily_limit.saturating_sub(self.daily_generations_used)
    }

    /// Name to show in navigation: full name when known, else the email.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn deserializes_camel_case_payload() {
        let profile: UserProfile = serde_json::from_str(
            r#"{
                "email": "ana@example.com",
                "fullName": "Ana Silva",
                "accountType": "professional",
                "dailyGenerationsUsed": 3,
                "dailyLimit": 10,
                "createdAt": "2024-01-02T03:04:05Z"
            }"#,
        )
        .unwrap();
        assert_eq!(profile.account_type, AccountType::Pro);
        assert_eq!(profile.full_name.as_deref(), Some("Ana Silva"));
        assert_eq!(profile.remaining_generations(), 7);
    }

    #[test]
    fn remaining_generations_saturates() {
        let mut profile = UserProfile::new("a@b.c");
        profile.daily_limit = 5;
        profile.daily_generations_used = 9;
        assert_eq!(profile.remaining_generations(), 0);
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let mut profile = UserProfile::new("a@b.c");
        assert_eq!(profile.display_name(), "a@b.c");
        profile.full_name = Some("A B".to_string());
        assert_eq!(profile.display_name(), "A B");
    }

    #[test]
    fn account_type_parses_aliases() {
        assert_eq!(AccountType::from_str("pro").unwrap(), AccountType::Pro);
        assert_eq!(
            AccountType::from_str("professional").unwrap(),
            AccountType::Pro
        );
        assert_eq!(AccountType::Business.to_string(), "business");
    }
}
