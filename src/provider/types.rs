use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Processors express amounts in integer minor units (kobo, cents).
pub fn to_minor_units(amount: Decimal) -> i64 {
    (amount * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::from(minor) / Decimal::from(100)
}

/// Request to issue a dedicated virtual account for a wallet owner.
#[derive(Debug, Clone, Serialize)]
pub struct CreateVirtualAccountRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// A dedicated virtual account issued by the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualAccount {
    pub customer_code: String,
    pub account_number: String,
    pub bank_name: String,
}

/// Processor-side balance per currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderBalance {
    pub currency: String,
    pub balance: Decimal,
}

/// Request to start a checkout payment.
#[derive(Debug, Clone, Serialize)]
pub struct InitializePaymentRequest {
    pub email: String,
    pub amount: Decimal,
    pub reference: String,
    pub callback_url: Option<String>,
}

/// A payment session the customer is redirected into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

/// Result of verifying a payment by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentVerification {
    pub reference: String,
    pub paid: bool,
    pub amount: Decimal,
    pub fees: Decimal,
    pub channel: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Request to register a bank account as a transfer recipient.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRecipientRequest {
    pub name: String,
    pub account_number: String,
    pub bank_code: String,
    pub currency: String,
}

/// Request to push money to a registered recipient.
#[derive(Debug, Clone, Serialize)]
pub struct InitiateTransferRequest {
    pub recipient_code: String,
    pub amount: Decimal,
    pub reference: String,
    pub reason: Option<String>,
}

/// Outcome of initiating (or finalizing) a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferInitiation {
    /// The processor accepted and queued the transfer.
    Accepted { transfer_code: String },
    /// The processor requires an OTP before the transfer proceeds.
    OtpRequired { transfer_code: String },
}

/// Remote status of a transfer, used by reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteTransferStatus {
    Pending,
    Success,
    Failed,
    Reversed,
}

/// Outcome of asking the processor to refund a charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundInitiation {
    pub provider_reference: String,
    pub amount: Decimal,
}

/// A resolved bank account (name lookup).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedAccount {
    pub account_number: String,
    pub account_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bank {
    pub name: String,
    pub code: String,
}

/// Normalized webhook event, produced by the active provider from a raw,
/// signature-verified payload. Handlers must be idempotent: the processor
/// may deliver any of these more than once and in any order.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    /// A checkout payment settled at the processor.
    PaymentSucceeded {
        reference: String,
        amount: Decimal,
        fees: Decimal,
    },
    /// Money arrived in a wallet's dedicated virtual account.
    WalletFunded {
        provider_reference: String,
        customer_code: String,
        amount: Decimal,
    },
    /// A dedicated virtual account was issued for a customer.
    VirtualAccountAssigned {
        customer_code: String,
        account_number: String,
        bank_name: String,
    },
    TransferSucceeded {
        reference: String,
    },
    TransferFailed {
        reference: String,
        reason: Option<String>,
    },
    RefundProcessed {
        provider_reference: String,
    },
    RefundFailed {
        provider_reference: String,
    },
    /// Anything this core does not act on; logged and ignored.
    Unknown {
        event: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_minor_unit_round_trip() {
        assert_eq!(to_minor_units(dec!(100.50)), 10050);
        assert_eq!(from_minor_units(10050), dec!(100.50));
        assert_eq!(to_minor_units(dec!(0.01)), 1);
    }

    #[test]
    fn test_minor_units_rounds_sub_kobo() {
        assert_eq!(to_minor_units(dec!(10.005)), 1001);
        assert_eq!(to_minor_units(dec!(10.004)), 1000);
    }
}
