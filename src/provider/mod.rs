mod paystack;
mod types;

pub use paystack::PaystackProvider;
pub use types::{
    Bank, CreateRecipientRequest, CreateVirtualAccountRequest, InitializePaymentRequest,
    InitiateTransferRequest, PaymentSession, PaymentVerification, ProviderBalance,
    RefundInitiation, RemoteTransferStatus, ResolvedAccount, TransferInitiation, VirtualAccount,
    WebhookEvent, from_minor_units, to_minor_units,
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::config::{ProviderKind, ProviderSettings};
use crate::error::{AppError, Result};

/// Uniform interface to the configured external payment processor. Exactly
/// one implementation is active per deployment; callers hold a
/// `dyn PaymentProvider` and never branch on provider identity.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Issues a dedicated virtual account for a wallet owner.
    async fn create_virtual_account(
        &self,
        request: CreateVirtualAccountRequest,
    ) -> Result<VirtualAccount>;

    /// Fetches the processor-side balance.
    async fn fetch_balance(&self) -> Result<Vec<ProviderBalance>>;

    /// Starts a checkout payment session.
    async fn initialize_payment(
        &self,
        request: InitializePaymentRequest,
    ) -> Result<PaymentSession>;

    /// Verifies a payment by its reference.
    async fn verify_payment(&self, reference: &str) -> Result<PaymentVerification>;

    /// Registers a bank account as a transfer recipient, returning the
    /// recipient handle.
    async fn create_transfer_recipient(&self, request: CreateRecipientRequest) -> Result<String>;

    /// Pushes money to a registered recipient.
    async fn initiate_transfer(
        &self,
        request: InitiateTransferRequest,
    ) -> Result<TransferInitiation>;

    /// Completes an OTP-gated transfer.
    async fn finalize_transfer(
        &self,
        transfer_code: &str,
        otp: &str,
    ) -> Result<TransferInitiation>;

    /// Queries the remote status of a transfer. Used by reconciliation to
    /// detect drift after local timeouts.
    async fn verify_transfer(&self, reference: &str) -> Result<RemoteTransferStatus>;

    /// Asks the processor to refund a charge, in part or in full.
    async fn create_refund(
        &self,
        payment_reference: &str,
        amount: Option<Decimal>,
    ) -> Result<RefundInitiation>;

    /// Resolves a bank account number to its holder's name.
    async fn resolve_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<ResolvedAccount>;

    async fn list_banks(&self) -> Result<Vec<Bank>>;

    /// Moves money between two processor-side wallets. Optional capability:
    /// providers without it must signal unsupported, never silently no-op.
    async fn wallet_transfer(
        &self,
        _from_customer_code: &str,
        _to_customer_code: &str,
        _amount: Decimal,
    ) -> Result<String> {
        Err(AppError::Unsupported("wallet-to-wallet transfer"))
    }

    /// Name of the HTTP header carrying the webhook signature.
    fn signature_header(&self) -> &'static str;

    /// Verifies the webhook signature over the raw, unparsed body. Must be
    /// called before the payload is trusted.
    fn validate_signature(&self, raw_body: &[u8], signature: &str) -> Result<()>;

    /// Parses a signature-verified payload into a normalized event.
    fn parse_webhook(&self, raw_body: &[u8]) -> Result<WebhookEvent>;
}

/// Builds the active provider from configuration.
pub fn create_provider(settings: &ProviderSettings) -> Result<Arc<dyn PaymentProvider>> {
    match settings.kind {
        ProviderKind::Paystack => Ok(Arc::new(PaystackProvider::new(settings)?)),
    }
}
