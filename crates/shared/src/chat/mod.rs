mod context;
mod conversation;
mod pipeline;
mod sessions;


pub use context::SessionContext;
pub use conversation::{Conversation, SendState, TranscriptEntry};
pub use pipeline::{MessagePipeline, SendError, SendOutcome};
pub use sessions::{MAX_SESSION_TITLE_CHARS, SessionError, SessionManager, session_title};

/// Shown in place of an answer when the send could not complete.
pub const SEND_FAILURE_REPLY: &str = "Sorry, something went wrong. Please try again in a moment.";
