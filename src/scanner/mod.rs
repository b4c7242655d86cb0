// src/scanner/mod.rs
pub mod evaluator;
pub mod monitor;
pub mod orchestrator;
pub mod session;

pub use evaluator::{FirstCandleSignal, SignalEvaluator};
pub use monitor::{Monitor, MonitorState};
pub use orchestrator::{Scanner, ScannerOptions};
pub use session::SessionState;
