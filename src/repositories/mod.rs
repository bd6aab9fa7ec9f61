mod ledger_repository;
mod order_repository;
mod refund_repository;
mod settlement_repository;
mod transfer_repository;
mod wallet_repository;

pub use ledger_repository::LedgerRepository;
pub use order_repository::{InventoryRepository, OrderRepository};
pub use refund_repository::RefundRepository;
pub use settlement_repository::SettlementRepository;
pub use transfer_repository::TransferRepository;
pub use wallet_repository::WalletRepository;
