//! Saga execution: per-order state machine, polling dispatcher, failure monitor

pub mod dispatcher;
pub mod executor;
pub mod monitor;

pub use dispatcher::Dispatcher;
pub use executor::{SagaExecutor, Transition};
pub use monitor::FailureMonitor;
