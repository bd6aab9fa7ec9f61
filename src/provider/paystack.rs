use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha512;
use std::time::Duration;
use tracing::warn;

use crate::config::ProviderSettings;
use crate::error::{AppError, Result};

use super::types::{
    from_minor_units, to_minor_units, Bank, CreateRecipientRequest, CreateVirtualAccountRequest,
    InitializePaymentRequest, InitiateTransferRequest, PaymentSession, PaymentVerification,
    ProviderBalance, RefundInitiation, RemoteTransferStatus, ResolvedAccount, TransferInitiation,
    VirtualAccount, WebhookEvent,
};
use super::PaymentProvider;

type HmacSha512 = Hmac<Sha512>;

/// Paystack client. Amounts cross the wire in kobo; webhook authenticity is
/// HMAC-SHA512 over the raw body with the shared secret.
pub struct PaystackProvider {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    webhook_secret: String,
}

/// Paystack wraps every response in this envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CustomerData {
    customer_code: String,
}

#[derive(Debug, Deserialize)]
struct DedicatedAccountData {
    account_number: String,
    bank: BankRef,
}

#[derive(Debug, Deserialize)]
struct BankRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BalanceData {
    currency: String,
    balance: i64,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    reference: String,
    status: String,
    amount: i64,
    #[serde(default)]
    fees: Option<i64>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    paid_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
struct RecipientData {
    recipient_code: String,
}

#[derive(Debug, Deserialize)]
struct TransferData {
    transfer_code: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct RefundData {
    id: i64,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct BankData {
    name: String,
    code: String,
}

impl PaystackProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AppError::Provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            secret_key: settings.secret_key.clone(),
            webhook_secret: settings.webhook_secret().to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("GET {path}: {e}")))?;
        Self::unwrap_envelope(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: serde_json::Value) -> Result<T> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("POST {path}: {e}")))?;
        Self::unwrap_envelope(response).await
    }

    async fn unwrap_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("malformed provider response: {e}")))?;

        if !status.is_success() || !envelope.status {
            return Err(AppError::Provider(envelope.message));
        }
        envelope
            .data
            .ok_or_else(|| AppError::Provider("provider response missing data".to_string()))
    }
}

#[async_trait]
impl PaymentProvider for PaystackProvider {
    async fn create_virtual_account(
        &self,
        request: CreateVirtualAccountRequest,
    ) -> Result<VirtualAccount> {
        let customer: CustomerData = self
            .post(
                "/customer",
                json!({
                    "email": request.email,
                    "first_name": request.first_name,
                    "last_name": request.last_name,
                    "phone": request.phone,
                }),
            )
            .await?;

        let account: DedicatedAccountData = self
            .post(
                "/dedicated_account",
                json!({
                    "customer": customer.customer_code,
                    "preferred_bank": "wema-bank",
                }),
            )
            .await?;

        Ok(VirtualAccount {
            customer_code: customer.customer_code,
            account_number: account.account_number,
            bank_name: account.bank.name,
        })
    }

    async fn fetch_balance(&self) -> Result<Vec<ProviderBalance>> {
        let balances: Vec<BalanceData> = self.get("/balance").await?;
        Ok(balances
            .into_iter()
            .map(|b| ProviderBalance {
                currency: b.currency,
                balance: from_minor_units(b.balance),
            })
            .collect())
    }

    async fn initialize_payment(
        &self,
        request: InitializePaymentRequest,
    ) -> Result<PaymentSession> {
        let data: InitializeData = self
            .post(
                "/transaction/initialize",
                json!({
                    "email": request.email,
                    "amount": to_minor_units(request.amount),
                    "reference": request.reference,
                    "callback_url": request.callback_url,
                }),
            )
            .await?;

        Ok(PaymentSession {
            authorization_url: data.authorization_url,
            access_code: data.access_code,
            reference: data.reference,
        })
    }

    async fn verify_payment(&self, reference: &str) -> Result<PaymentVerification> {
        let data: VerifyData = self
            .get(&format!("/transaction/verify/{reference}"))
            .await?;

        Ok(PaymentVerification {
            reference: data.reference,
            paid: data.status == "success",
            amount: from_minor_units(data.amount),
            fees: from_minor_units(data.fees.unwrap_or(0)),
            channel: data.channel,
            paid_at: data.paid_at,
        })
    }

    async fn create_transfer_recipient(&self, request: CreateRecipientRequest) -> Result<String> {
        let data: RecipientData = self
            .post(
                "/transferrecipient",
                json!({
                    "type": "nuban",
                    "name": request.name,
                    "account_number": request.account_number,
                    "bank_code": request.bank_code,
                    "currency": request.currency,
                }),
            )
            .await?;
        Ok(data.recipient_code)
    }

    async fn initiate_transfer(
        &self,
        request: InitiateTransferRequest,
    ) -> Result<TransferInitiation> {
        let data: TransferData = self
            .post(
                "/transfer",
                json!({
                    "source": "balance",
                    "amount": to_minor_units(request.amount),
                    "recipient": request.recipient_code,
                    "reference": request.reference,
                    "reason": request.reason,
                }),
            )
            .await?;

        Ok(match data.status.as_str() {
            "otp" => TransferInitiation::OtpRequired {
                transfer_code: data.transfer_code,
            },
            _ => TransferInitiation::Accepted {
                transfer_code: data.transfer_code,
            },
        })
    }

    async fn finalize_transfer(
        &self,
        transfer_code: &str,
        otp: &str,
    ) -> Result<TransferInitiation> {
        let data: TransferData = self
            .post(
                "/transfer/finalize_transfer",
                json!({
                    "transfer_code": transfer_code,
                    "otp": otp,
                }),
            )
            .await?;

        Ok(match data.status.as_str() {
            "otp" => TransferInitiation::OtpRequired {
                transfer_code: data.transfer_code,
            },
            _ => TransferInitiation::Accepted {
                transfer_code: data.transfer_code,
            },
        })
    }

    async fn verify_transfer(&self, reference: &str) -> Result<RemoteTransferStatus> {
        let data: TransferData = self.get(&format!("/transfer/verify/{reference}")).await?;
        Ok(match data.status.as_str() {
            "success" => RemoteTransferStatus::Success,
            "failed" => RemoteTransferStatus::Failed,
            "reversed" => RemoteTransferStatus::Reversed,
            other => {
                if other != "pending" && other != "otp" {
                    warn!(status = other, "unrecognized transfer status, treating as pending");
                }
                RemoteTransferStatus::Pending
            }
        })
    }

    async fn create_refund(
        &self,
        payment_reference: &str,
        amount: Option<Decimal>,
    ) -> Result<RefundInitiation> {
        let mut body = json!({ "transaction": payment_reference });
        if let Some(amount) = amount {
            body["amount"] = json!(to_minor_units(amount));
        }

        let data: RefundData = self.post("/refund", body).await?;
        Ok(RefundInitiation {
            provider_reference: data.id.to_string(),
            amount: from_minor_units(data.amount),
        })
    }

    async fn resolve_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<ResolvedAccount> {
        self.get(&format!(
            "/bank/resolve?account_number={account_number}&bank_code={bank_code}"
        ))
        .await
    }

    async fn list_banks(&self) -> Result<Vec<Bank>> {
        let banks: Vec<BankData> = self.get("/bank?country=nigeria").await?;
        Ok(banks
            .into_iter()
            .map(|b| Bank {
                name: b.name,
                code: b.code,
            })
            .collect())
    }

    fn signature_header(&self) -> &'static str {
        "x-paystack-signature"
    }

    fn validate_signature(&self, raw_body: &[u8], signature: &str) -> Result<()> {
        let decoded = hex::decode(signature).map_err(|_| AppError::Signature)?;

        let mut mac = HmacSha512::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| AppError::Signature)?;
        mac.update(raw_body);
        // verify_slice is constant-time.
        mac.verify_slice(&decoded).map_err(|_| AppError::Signature)
    }

    fn parse_webhook(&self, raw_body: &[u8]) -> Result<WebhookEvent> {
        #[derive(Deserialize)]
        struct RawEvent {
            event: String,
            #[serde(default)]
            data: serde_json::Value,
        }

        let raw: RawEvent = serde_json::from_slice(raw_body)
            .map_err(|e| AppError::Validation(format!("malformed webhook payload: {e}")))?;
        let data = &raw.data;

        let str_field = |value: &serde_json::Value, field: &str| -> Result<String> {
            value
                .get(field)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    AppError::Validation(format!("webhook missing field '{field}'"))
                })
        };

        let event = match raw.event.as_str() {
            "charge.success" => {
                let reference = str_field(data, "reference")?;
                let amount = from_minor_units(data["amount"].as_i64().unwrap_or(0));
                let fees = from_minor_units(data["fees"].as_i64().unwrap_or(0));
                let channel = data["channel"].as_str().unwrap_or_default();

                if channel == "dedicated_nuban" {
                    WebhookEvent::WalletFunded {
                        provider_reference: reference,
                        customer_code: str_field(&data["customer"], "customer_code")?,
                        amount,
                    }
                } else {
                    WebhookEvent::PaymentSucceeded {
                        reference,
                        amount,
                        fees,
                    }
                }
            }
            "dedicatedaccount.assigned" => WebhookEvent::VirtualAccountAssigned {
                customer_code: str_field(&data["customer"], "customer_code")?,
                account_number: str_field(&data["dedicated_account"], "account_number")?,
                bank_name: str_field(&data["dedicated_account"]["bank"], "name")?,
            },
            "transfer.success" => WebhookEvent::TransferSucceeded {
                reference: str_field(data, "reference")?,
            },
            "transfer.failed" | "transfer.reversed" => WebhookEvent::TransferFailed {
                reference: str_field(data, "reference")?,
                reason: data["reason"].as_str().map(str::to_string),
            },
            "refund.processed" => WebhookEvent::RefundProcessed {
                provider_reference: data["id"]
                    .as_i64()
                    .map(|id| id.to_string())
                    .or_else(|| data["id"].as_str().map(str::to_string))
                    .ok_or_else(|| AppError::Validation("refund webhook missing id".into()))?,
            },
            "refund.failed" => WebhookEvent::RefundFailed {
                provider_reference: data["id"]
                    .as_i64()
                    .map(|id| id.to_string())
                    .or_else(|| data["id"].as_str().map(str::to_string))
                    .ok_or_else(|| AppError::Validation("refund webhook missing id".into()))?,
            },
            other => WebhookEvent::Unknown {
                event: other.to_string(),
            },
        };

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use rust_decimal_macros::dec;

    fn provider() -> PaystackProvider {
        PaystackProvider::new(&ProviderSettings {
            kind: ProviderKind::Paystack,
            base_url: "https://api.paystack.co".to_string(),
            secret_key: "sk_test_secret".to_string(),
            webhook_secret: None,
            timeout_secs: 30,
        })
        .unwrap()
    }

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_accepted() {
        let provider = provider();
        let body = br#"{"event":"charge.success"}"#;
        let signature = sign("sk_test_secret", body);
        assert!(provider.validate_signature(body, &signature).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let provider = provider();
        let signature = sign("sk_test_secret", br#"{"event":"charge.success"}"#);
        let result = provider.validate_signature(br#"{"event":"charge.failed"}"#, &signature);
        assert!(matches!(result, Err(AppError::Signature)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let provider = provider();
        let body = br#"{"event":"charge.success"}"#;
        let signature = sign("sk_other_secret", body);
        assert!(matches!(
            provider.validate_signature(body, &signature),
            Err(AppError::Signature)
        ));
    }

    #[test]
    fn test_non_hex_signature_rejected() {
        let provider = provider();
        assert!(matches!(
            provider.validate_signature(b"{}", "not-hex!"),
            Err(AppError::Signature)
        ));
    }

    #[test]
    fn test_parse_charge_success() {
        let body = br#"{
            "event": "charge.success",
            "data": {"reference": "ORD-123", "amount": 1000000, "fees": 15000, "channel": "card"}
        }"#;
        let event = provider().parse_webhook(body).unwrap();
        assert_eq!(
            event,
            WebhookEvent::PaymentSucceeded {
                reference: "ORD-123".to_string(),
                amount: dec!(10000),
                fees: dec!(150),
            }
        );
    }

    #[test]
    fn test_parse_dedicated_account_funding() {
        let body = br#"{
            "event": "charge.success",
            "data": {
                "reference": "FUND-9",
                "amount": 500000,
                "channel": "dedicated_nuban",
                "customer": {"customer_code": "CUS_abc"}
            }
        }"#;
        let event = provider().parse_webhook(body).unwrap();
        assert_eq!(
            event,
            WebhookEvent::WalletFunded {
                provider_reference: "FUND-9".to_string(),
                customer_code: "CUS_abc".to_string(),
                amount: dec!(5000),
            }
        );
    }

    #[test]
    fn test_parse_virtual_account_assigned() {
        let body = br#"{
            "event": "dedicatedaccount.assigned",
            "data": {
                "customer": {"customer_code": "CUS_abc"},
                "dedicated_account": {
                    "account_number": "0123456789",
                    "bank": {"name": "Wema Bank"}
                }
            }
        }"#;
        let event = provider().parse_webhook(body).unwrap();
        assert_eq!(
            event,
            WebhookEvent::VirtualAccountAssigned {
                customer_code: "CUS_abc".to_string(),
                account_number: "0123456789".to_string(),
                bank_name: "Wema Bank".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_transfer_events() {
        let success = br#"{"event":"transfer.success","data":{"reference":"TRF-1"}}"#;
        assert_eq!(
            provider().parse_webhook(success).unwrap(),
            WebhookEvent::TransferSucceeded {
                reference: "TRF-1".to_string()
            }
        );

        let failed =
            br#"{"event":"transfer.failed","data":{"reference":"TRF-2","reason":"insufficient balance"}}"#;
        assert_eq!(
            provider().parse_webhook(failed).unwrap(),
            WebhookEvent::TransferFailed {
                reference: "TRF-2".to_string(),
                reason: Some("insufficient balance".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_refund_events() {
        let processed = br#"{"event":"refund.processed","data":{"id":9912}}"#;
        assert_eq!(
            provider().parse_webhook(processed).unwrap(),
            WebhookEvent::RefundProcessed {
                provider_reference: "9912".to_string()
            }
        );
    }

    #[test]
    fn test_parse_unknown_event() {
        let body = br#"{"event":"subscription.create","data":{}}"#;
        assert_eq!(
            provider().parse_webhook(body).unwrap(),
            WebhookEvent::Unknown {
                event: "subscription.create".to_string()
            }
        );
    }

    #[test]
    fn test_parse_malformed_payload() {
        assert!(matches!(
            provider().parse_webhook(b"not json"),
            Err(AppError::Validation(_))
        ));
    }
}
