mod ledger_entry;
mod order;
mod refund;
mod settlement;
mod transfer;
mod wallet;

pub use ledger_entry::{EntryFlow, EntryKind, EntryOwner, EntryStatus, LedgerEntry, NewLedgerEntry};
pub use order::{Order, OrderItem, OrderStatus, OrderWithItems, PaymentStatus};
pub use refund::{OrderRefund, RefundStatus, RefundType};
pub use settlement::{Settlement, SettlementSchedule, SettlementStatus};
pub use transfer::{Transfer, TransferStatus};
pub use wallet::{Wallet, WalletStatus};
