//! Core data model: users, conversations, messages, settings.
//!
//! All records live in process memory and are owned by the
//! [`ChatStore`](crate::store::ChatStore); nothing here persists across
//! restarts.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Allocate a fresh random id.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Wrap an existing id string (seed data, tests).
            #[must_use]
            pub fn from_raw(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// The id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(
    /// Unique identifier for a user.
    UserId
);
id_newtype!(
    /// Unique identifier for a conversation.
    ConversationId
);
id_newtype!(
    /// Unique identifier for a message within its conversation.
    MessageId
);

/// Presence status for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Online,
    Offline,
}

/// A chat participant.
///
/// Created at onboarding (or seeded) and immutable afterwards except for
/// `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Avatar image reference (URL); rendering is out of core scope.
    pub avatar_url: String,
    /// Display name of the user's native language, e.g. `"Japanese"`.
    pub native_language: String,
    pub status: Presence,
}

impl User {
    /// Create a new user with a fresh id, online by default.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        avatar_url: impl Into<String>,
        native_language: impl Into<String>,
    ) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            avatar_url: avatar_url.into(),
            native_language: native_language.into(),
            status: Presence::Online,
        }
    }
}

/// In-memory reference to an audio resource.
///
/// Either a finished voice capture (WAV) or synthesized speech from the
/// language service. Cheap to clone; the payload is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioHandle {
    /// MIME type of the payload, e.g. `"audio/wav"` or `"audio/mp3"`.
    pub mime_type: String,
    /// Encoded audio bytes.
    pub data: Bytes,
}

impl AudioHandle {
    /// Wrap encoded audio bytes with their MIME type.
    #[must_use]
    pub fn new(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// A single message in a conversation.
///
/// Messages are append-only; a message is visible the moment it is appended.
/// The counterpart side is only appended once fully formed, so the optional
/// fields are never mutated in place after an append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub sent_at: DateTime<Utc>,
    /// The text as composed, in the sender's language.
    pub original_text: String,
    /// Display name of the sender's language.
    pub original_language: String,
    /// Translation into the reader's language, once available.
    pub translated_text: Option<String>,
    /// Short explanation of idioms/slang in the original, when requested.
    pub cultural_context: Option<String>,
    /// Synthesized speech for the translated text.
    pub audio: Option<AudioHandle>,
    /// The voice capture this message was transcribed from.
    pub recording: Option<AudioHandle>,
    /// Whether this turn originated as speech rather than typed text.
    pub is_voice: bool,
}

impl Message {
    /// Create a bare text message with a fresh id, timestamped now.
    #[must_use]
    pub fn new(
        sender_id: UserId,
        original_text: impl Into<String>,
        original_language: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            sender_id,
            sent_at: Utc::now(),
            original_text: original_text.into(),
            original_language: original_language.into(),
            translated_text: None,
            cultural_context: None,
            audio: None,
            recording: None,
            is_voice: false,
        }
    }

    /// The text shown in conversation previews: the translation when
    /// present, otherwise the original.
    #[must_use]
    pub fn preview_text(&self) -> &str {
        self.translated_text.as_deref().unwrap_or(&self.original_text)
    }
}

/// An ordered, append-only thread of messages between fixed participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    /// Counterpart participants (the local user is implicit).
    pub participants: Vec<User>,
    /// Messages in insertion order; insertion order is chronological order.
    pub messages: Vec<Message>,
    /// Denormalized preview of the latest message.
    pub last_message_preview: String,
    /// Timestamp of the latest append (or creation).
    pub updated_at: DateTime<Utc>,
    pub is_group: bool,
    /// Display name for group conversations.
    pub name: Option<String>,
}

impl Conversation {
    /// The counterpart in a one-on-one conversation: the first participant
    /// whose id differs from `local`, falling back to the first participant.
    #[must_use]
    pub fn counterpart(&self, local: &UserId) -> Option<&User> {
        self.participants
            .iter()
            .find(|p| &p.id != local)
            .or_else(|| self.participants.first())
    }
}

/// Display theme. Exactly one theme is active at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Process-wide presentation and pipeline settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Dual display: show the original text alongside the translation.
    pub show_original: bool,
    /// Automatically synthesize and play received replies.
    pub auto_play_voice: bool,
    /// Request cultural-context annotations with translations.
    pub show_cultural_context: bool,
    pub theme: Theme,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            show_original: true,
            auto_play_voice: false,
            show_cultural_context: true,
            theme: Theme::Light,
        }
    }
}

/// Partial settings update; `None` fields keep their prior value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    pub show_original: Option<bool>,
    pub auto_play_voice: Option<bool>,
    pub show_cultural_context: Option<bool>,
    pub theme: Option<Theme>,
}

impl ChatSettings {
    /// Merge a partial update into these settings.
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.show_original {
            self.show_original = v;
        }
        if let Some(v) = patch.auto_play_voice {
            self.auto_play_voice = v;
        }
        if let Some(v) = patch.show_cultural_context {
            self.show_cultural_context = v;
        }
        if let Some(v) = patch.theme {
            self.theme = v;
        }
    }
}
