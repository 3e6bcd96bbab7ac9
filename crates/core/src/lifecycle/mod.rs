//! Push job lifecycle: dispatch table, audit gate and error translation

mod audit;
pub mod errors;
pub mod state_machine;

pub use errors::{classify_engine_error, error_note};
pub use state_machine::{transition_for, OperationOutcome, PushLifecycleStateMachine, Transition};
