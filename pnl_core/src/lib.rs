pub mod fifo;

pub use fifo::{classify_holding_behavior, pnl, Behavior, BehaviorCounts, WalletPnl};
