/// Protocol types for call correlation and message framing
///
/// This module defines the two message shapes exchanged with the peer and
/// the integer correlation id that links an invocation to its resolution.
mod correlation;
mod message;

pub use correlation::CallId;
pub use message::Message;
