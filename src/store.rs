//! In-memory conversation store: the single source of truth for the active
//! user, all conversations, and settings.
//!
//! The store is an explicit state container: constructed once at startup,
//! shared behind an `Arc`, and mutated only through its methods. All methods
//! are synchronous and take `&self`, so they are safe to call from the
//! asynchronous completion of a pipeline run regardless of what the UI is
//! currently displaying.

use crate::error::{ChatError, Result};
use crate::model::{
    ChatSettings, Conversation, ConversationId, Message, MessageId, SettingsPatch, User, UserId,
};
use chrono::{Duration, Utc};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Process-wide chat state.
#[derive(Debug, Default)]
pub struct ChatStore {
    inner: RwLock<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    current_user: Option<User>,
    /// Kept sorted most-recently-updated first.
    conversations: Vec<Conversation>,
    settings: ChatSettings,
}

impl ChatStore {
    /// Create an empty store with default settings and no user.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the active identity. Idempotent.
    pub fn set_current_user(&self, user: User) {
        self.write().current_user = Some(user);
    }

    /// The active identity, if onboarding has completed.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.read().current_user.clone()
    }

    /// Current settings snapshot.
    #[must_use]
    pub fn settings(&self) -> ChatSettings {
        self.read().settings
    }

    /// Merge a partial settings update; unspecified fields keep their value.
    pub fn update_settings(&self, patch: SettingsPatch) {
        self.write().settings.apply(patch);
    }

    /// Append a message to the named conversation.
    ///
    /// Atomically refreshes the conversation's preview and `updated_at` from
    /// the appended message, and re-sorts the conversation list so the most
    /// recently active conversation comes first.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ConversationNotFound`] for an unknown id.
    pub fn add_message(&self, conversation_id: &ConversationId, message: Message) -> Result<()> {
        let mut inner = self.write();
        let conv = inner
            .conversations
            .iter_mut()
            .find(|c| &c.id == conversation_id)
            .ok_or_else(|| ChatError::ConversationNotFound(conversation_id.clone()))?;

        conv.last_message_preview = message.preview_text().to_owned();
        conv.updated_at = message.sent_at;
        conv.messages.push(message);

        inner
            .conversations
            .sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(())
    }

    /// Create a new conversation with the given counterparts, inserted at
    /// the front of the list. Returns the new id.
    pub fn create_conversation(&self, participants: Vec<User>) -> ConversationId {
        let id = ConversationId::new();
        let is_group = participants.len() > 1;
        let name = is_group.then(|| {
            participants
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        });

        debug!("creating conversation {id} with {} participant(s)", participants.len());
        let conversation = Conversation {
            id: id.clone(),
            participants,
            messages: Vec::new(),
            last_message_preview: "New conversation".to_owned(),
            updated_at: Utc::now(),
            is_group,
            name,
        };
        self.write().conversations.insert(0, conversation);
        id
    }

    /// Fetch a conversation snapshot by id. Pure read.
    #[must_use]
    pub fn conversation(&self, id: &ConversationId) -> Option<Conversation> {
        self.read().conversations.iter().find(|c| &c.id == id).cloned()
    }

    /// All conversations, most recently updated first.
    #[must_use]
    pub fn conversations(&self) -> Vec<Conversation> {
        self.read().conversations.clone()
    }

    /// A store pre-populated with demo counterparts and one seeded
    /// conversation, matching the stock onboarding experience. No current
    /// user is set.
    #[must_use]
    pub fn seeded_demo() -> Self {
        let aiko = User {
            id: UserId::from_raw("u2"),
            name: "Aiko".to_owned(),
            avatar_url: "https://picsum.photos/id/65/200/200".to_owned(),
            native_language: "Japanese".to_owned(),
            status: crate::model::Presence::Online,
        };
        let elena = User {
            id: UserId::from_raw("u3"),
            name: "Elena".to_owned(),
            avatar_url: "https://picsum.photos/id/91/200/200".to_owned(),
            native_language: "Spanish".to_owned(),
            status: crate::model::Presence::Online,
        };

        let now = Utc::now();
        let greeting = Message {
            id: MessageId::from_raw("m1"),
            sender_id: aiko.id.clone(),
            sent_at: now - Duration::seconds(100),
            original_text: "こんにちは！元気ですか？".to_owned(),
            original_language: "Japanese".to_owned(),
            translated_text: Some("Hello! How are you?".to_owned()),
            cultural_context: Some("Standard friendly greeting.".to_owned()),
            audio: None,
            recording: None,
            is_voice: false,
        };

        let conversations = vec![
            Conversation {
                id: ConversationId::from_raw("c1"),
                participants: vec![aiko],
                last_message_preview: greeting.preview_text().to_owned(),
                updated_at: greeting.sent_at,
                messages: vec![greeting],
                is_group: false,
                name: None,
            },
            Conversation {
                id: ConversationId::from_raw("c2"),
                participants: vec![elena],
                messages: Vec::new(),
                last_message_preview: "Start a new conversation".to_owned(),
                updated_at: now - Duration::seconds(200),
                is_group: false,
                name: None,
            },
        ];

        Self {
            inner: RwLock::new(StoreInner {
                current_user: None,
                conversations,
                settings: ChatSettings::default(),
            }),
        }
    }
}
