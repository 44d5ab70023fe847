//! Application layer of the quill chat engine.
//!
//! Wires the domain types to the stores and the model connection:
//! [`ContextAssembler`] builds the prompt for a turn, [`GroupResolver`]
//! picks the conversation thread a session should write into, and
//! [`ChatCoordinator`] sequences gating, persistence, generation and error
//! recovery for each submission.

mod context;
mod coordinator;
mod group;

pub use context::ContextAssembler;
pub use coordinator::{
    ChatCoordinator, ConversationPhase, ConversationSnapshot, SubmitOutcome,
};
pub use group::GroupResolver;
