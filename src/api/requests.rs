use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::RefundType;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Request to issue a virtual account for a wallet owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVirtualAccountRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

impl CreateVirtualAccountRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.email.trim().is_empty() || !self.email.contains('@') {
            errors.push(ValidationError::new("email", "a valid email is required"));
        }
        if self.first_name.trim().is_empty() {
            errors.push(ValidationError::new("first_name", "first_name cannot be empty"));
        }
        if self.last_name.trim().is_empty() {
            errors.push(ValidationError::new("last_name", "last_name cannot be empty"));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Request to withdraw from a wallet to a bank account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWithdrawalRequest {
    pub owner_id: uuid::Uuid,
    pub amount: Decimal,
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
    pub reason: Option<String>,
}

impl CreateWithdrawalRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.amount <= Decimal::ZERO {
            errors.push(ValidationError::new("amount", "amount must be positive"));
        }
        if self.bank_code.trim().is_empty() {
            errors.push(ValidationError::new("bank_code", "bank_code cannot be empty"));
        }
        if self.account_number.trim().is_empty() {
            errors.push(ValidationError::new("account_number", "account_number cannot be empty"));
        }
        if self.account_name.trim().is_empty() {
            errors.push(ValidationError::new("account_name", "account_name cannot be empty"));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// OTP finalization for a pending transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeTransferRequest {
    pub otp: String,
}

impl FinalizeTransferRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        if self.otp.trim().is_empty() {
            return Err(vec![ValidationError::new("otp", "otp cannot be empty")]);
        }
        Ok(())
    }
}

/// Request to refund an order, fully or partially.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRefundRequest {
    pub refund_type: RefundType,
    pub amount: Option<Decimal>,
    pub reason: String,
}

impl CreateRefundRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.reason.trim().is_empty() {
            errors.push(ValidationError::new("reason", "reason cannot be empty"));
        }
        if self.refund_type == RefundType::Partial {
            match self.amount {
                None => errors.push(ValidationError::new("amount", "partial refunds require an amount")),
                Some(a) if a <= Decimal::ZERO => {
                    errors.push(ValidationError::new("amount", "amount must be positive"))
                }
                _ => {}
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Bank account resolution lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveAccountRequest {
    pub account_number: String,
    pub bank_code: String,
}

impl ResolveAccountRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.account_number.trim().len() != 10 {
            errors.push(ValidationError::new("account_number", "account_number must be 10 digits"));
        }
        if self.bank_code.trim().is_empty() {
            errors.push(ValidationError::new("bank_code", "bank_code cannot be empty"));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Query parameters for ledger history.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LedgerHistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
