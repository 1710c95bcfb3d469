//! Per-connection session state and shared context

pub mod context;
pub mod state;

pub use context::RelayContext;
pub use state::{SessionPhase, SessionState};
