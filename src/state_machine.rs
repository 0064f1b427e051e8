//! Core conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.
//! The runtime executes the returned effects and feeds results back as
//! events.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{ConvContext, ConvState, ErrorKind, ToolCall};
pub use transition::{transition, TransitionError, TransitionResult};
