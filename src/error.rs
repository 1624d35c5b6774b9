//! Error types for the kaiwa chat core.

use crate::model::ConversationId;

/// Top-level error type for the chat core.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Language service transport or protocol error.
    ///
    /// Only surfaced by low-level service plumbing; the
    /// [`LanguageService`](crate::service::LanguageService) trait itself
    /// degrades every failure to an in-band fallback value.
    #[error("service error: {0}")]
    Service(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// The named conversation does not exist in the store.
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// A turn is already in flight for this conversation.
    #[error("conversation busy: {0}")]
    ConversationBusy(ConversationId),

    /// Empty or whitespace-only message text.
    #[error("message text is empty")]
    EmptyMessage,

    /// The conversation has no participants to reply as.
    #[error("conversation has no counterpart")]
    NoCounterpart,

    /// No current user has been set on the store.
    #[error("no active user")]
    NoCurrentUser,

    /// A recording session is already active.
    #[error("a recording is already in progress")]
    CaptureBusy,

    /// The finished recording produced no usable transcript.
    #[error("transcription produced no text")]
    TranscriptionFailed,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ChatError>;
