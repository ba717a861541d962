pub mod fee_config;
pub mod group;
pub mod strategy;
pub mod trade_log;

pub use fee_config::FeeConfig;
pub use group::{Asset, Group};
pub use strategy::{
    BaselineSnapshot, Deviation, ExecutionStatus, Frequency, FrequencyUnit, LastResult, Side,
    SnapshotAsset, Strategy, TradeAction, TradingMode,
};
pub use trade_log::TradeLogEntry;
