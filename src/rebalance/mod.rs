pub mod comparator;
pub mod engine;
pub mod scheduler;
pub mod service;
pub mod strategy_state;

pub use comparator::{ComparisonReport, PerformanceComparator};
pub use engine::{RebalanceEngine, RunOutcome, SkipReason};
pub use scheduler::RebalanceScheduler;
pub use service::StrategyService;
pub use strategy_state::{StrategyState, StrategyUpdate};
