use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::SettlementSchedule;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub provider: ProviderSettings,
    pub fees: FeeSettings,
    pub settlement: SettlementSettings,
    pub reconciliation: ReconciliationSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    pub port: u16,
    pub log_level: String,
    pub log_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub pool_size: u32,
}

/// Payment processor selection and credentials. The secret key doubles as the
/// webhook HMAC key unless a dedicated `webhook_secret` is configured.
/// Secrets are injected via configuration or environment, never compiled in.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub base_url: String,
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub timeout_secs: u64,
}

impl ProviderSettings {
    pub fn webhook_secret(&self) -> &str {
        self.webhook_secret.as_deref().unwrap_or(&self.secret_key)
    }
}

/// Which concrete processor implementation is active for this deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Paystack,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeeSettings {
    /// Platform's cut of each order, as a fraction (0.05 = 5%).
    pub platform_fee_rate: Decimal,
    /// Wallet that receives platform fees and pays platform-side refunds.
    pub platform_account_id: Uuid,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementSettings {
    pub default_schedule: SettlementSchedule,
    pub minimum_settlement_amount: Decimal,
    pub hold_period_days: i64,
    pub max_retries: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationSettings {
    pub interval_secs: u64,
    /// A pending transfer older than this is re-verified with the provider.
    pub stale_after_secs: i64,
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_deserializes_lowercase() {
        let kind: ProviderKind = serde_json::from_str(r#""paystack""#).unwrap();
        assert_eq!(kind, ProviderKind::Paystack);
    }

    #[test]
    fn test_webhook_secret_falls_back_to_secret_key() {
        let settings = ProviderSettings {
            kind: ProviderKind::Paystack,
            base_url: "https://api.paystack.co".to_string(),
            secret_key: "sk_test_abc".to_string(),
            webhook_secret: None,
            timeout_secs: 30,
        };
        assert_eq!(settings.webhook_secret(), "sk_test_abc");

        let with_dedicated = ProviderSettings {
            webhook_secret: Some("whsec_xyz".to_string()),
            ..settings
        };
        assert_eq!(with_dedicated.webhook_secret(), "whsec_xyz");
    }
}
