mod logging;
mod metrics;

pub use logging::{init_logging, mask_account_number, mask_sensitive, LogConfig, LogFormat};
pub use metrics::{init_metrics, Metrics, METRICS};
