pub mod transaction_reaper;

pub use transaction_reaper::{TransactionReaperConfig, TransactionReaperWorker};
