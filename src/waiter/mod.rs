//! Convergence waiting
//!
//! Generic bounded poller used by the lifecycle operations to wait for a
//! remote object to reach a stable state or disappear.

mod state_change;

pub use state_change::{PollSchedule, Refresh, StateChangeConf, Transition, WaitOutcome};
