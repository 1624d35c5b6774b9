//! Message pipeline: drives one conversational turn from raw user input to
//! a fully formed counterpart reply.
//!
//! One turn = optimistic echo of the user's message, a generated reply in
//! the counterpart's language, its translation (optionally annotated with
//! cultural context), optional speech synthesis, and a final append. Turns
//! are strictly sequential per conversation: an in-flight marker owned by
//! the pipeline rejects overlapping sends for the same conversation id.

use crate::audio::VoiceOutput;
use crate::config::ChatConfig;
use crate::error::{ChatError, Result};
use crate::model::{AudioHandle, ConversationId, Message, MessageId};
use crate::service::{LanguageService, Speaker, TranscriptTurn};
use crate::store::ChatStore;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Broadcast capacity for turn events; late subscribers may miss events.
const EVENT_CHANNEL_SIZE: usize = 32;

/// Observable turn lifecycle, for pending indicators and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// The user's message was appended; the reply is being produced.
    Started { conversation_id: ConversationId },
    /// The counterpart message was appended.
    Completed {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    /// The turn ended without a counterpart message.
    Failed { conversation_id: ConversationId },
}

/// Orchestrates conversational turns over the store and language service.
pub struct MessagePipeline {
    store: Arc<ChatStore>,
    service: Arc<dyn LanguageService>,
    voice: Arc<dyn VoiceOutput>,
    reply_delay: Duration,
    voice_name: String,
    in_flight: Arc<Mutex<HashSet<ConversationId>>>,
    events: broadcast::Sender<TurnEvent>,
}

impl MessagePipeline {
    /// Wire a pipeline over shared state and collaborators.
    #[must_use]
    pub fn new(
        store: Arc<ChatStore>,
        service: Arc<dyn LanguageService>,
        voice: Arc<dyn VoiceOutput>,
        config: &ChatConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            store,
            service,
            voice,
            reply_delay: Duration::from_millis(config.pipeline.reply_delay_ms),
            voice_name: config.service.voice.clone(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            events,
        }
    }

    /// Subscribe to turn lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TurnEvent> {
        self.events.subscribe()
    }

    /// Whether a turn is currently in flight for this conversation.
    #[must_use]
    pub fn is_processing(&self, conversation_id: &ConversationId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(conversation_id)
    }

    /// Run one full turn and return the counterpart message's id.
    ///
    /// The user's message is appended immediately (optimistic echo, with
    /// `translated_text` mirroring the original: the sender needs no
    /// translation of their own view). The counterpart message is appended
    /// only once fully formed. Speech is synthesized when auto-play is
    /// enabled or the turn was voice-originated, and played afterwards.
    ///
    /// # Errors
    ///
    /// - [`ChatError::EmptyMessage`] for whitespace-only input (no store
    ///   mutation occurs).
    /// - [`ChatError::ConversationBusy`] when a turn is already in flight
    ///   for this conversation.
    /// - [`ChatError::ConversationNotFound`] / [`ChatError::NoCurrentUser`]
    ///   when the addressed state is missing (checked before any mutation).
    ///
    /// The in-flight marker is cleared on every path.
    pub async fn send_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        recording: Option<AudioHandle>,
        is_voice: bool,
    ) -> Result<MessageId> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let mut guard = TurnGuard::acquire(
            Arc::clone(&self.in_flight),
            self.events.clone(),
            conversation_id.clone(),
        )?;

        let conversation = self
            .store
            .conversation(conversation_id)
            .ok_or_else(|| ChatError::ConversationNotFound(conversation_id.clone()))?;
        let user = self.store.current_user().ok_or(ChatError::NoCurrentUser)?;
        let counterpart = conversation
            .counterpart(&user.id)
            .ok_or(ChatError::NoCounterpart)?
            .clone();

        // Optimistic echo: visible to readers before the reply resolves.
        let mut echo = Message::new(user.id.clone(), text, user.native_language.clone());
        echo.translated_text = Some(text.to_owned());
        echo.recording = recording;
        echo.is_voice = is_voice;
        self.store.add_message(conversation_id, echo)?;

        let _ = self.events.send(TurnEvent::Started {
            conversation_id: conversation_id.clone(),
        });
        info!(
            "turn started in {conversation_id}: {} -> {}",
            user.name, counterpart.name
        );

        // Models the counterpart's think time; a real transport would
        // replace this with its own latency.
        if !self.reply_delay.is_zero() {
            tokio::time::sleep(self.reply_delay).await;
        }

        // Re-read so the transcript includes the echo just appended.
        let transcript = self
            .store
            .conversation(conversation_id)
            .map(|c| role_tagged_transcript(&c.messages, &user.id))
            .unwrap_or_default();

        let reply = self
            .service
            .generate_reply(
                &transcript,
                &counterpart.name,
                &counterpart.native_language,
                &user.native_language,
            )
            .await;

        let settings = self.store.settings();
        let translation = self
            .service
            .translate(
                &reply,
                &user.native_language,
                &counterpart.native_language,
                settings.show_cultural_context,
            )
            .await;

        // Speak the translated text: the user should hear the reply in
        // their own language.
        let should_speak = settings.auto_play_voice || is_voice;
        let audio = if should_speak {
            self.service
                .synthesize_speech(&translation.translated_text, &self.voice_name)
                .await
        } else {
            None
        };

        let mut message = Message::new(
            counterpart.id.clone(),
            reply,
            counterpart.native_language.clone(),
        );
        message.translated_text = Some(translation.translated_text);
        message.cultural_context = translation.cultural_context;
        message.audio = audio.clone();
        message.is_voice = is_voice;
        let message_id = message.id.clone();

        self.store.add_message(conversation_id, message)?;
        guard.complete(message_id.clone());

        if let Some(ref handle) = audio {
            debug!("starting playback of synthesized reply");
            self.voice.play(handle);
        }

        Ok(message_id)
    }
}

/// Build the role-tagged transcript handed to reply generation.
fn role_tagged_transcript(messages: &[Message], local: &crate::model::UserId) -> Vec<TranscriptTurn> {
    messages
        .iter()
        .map(|m| {
            let speaker = if &m.sender_id == local {
                Speaker::User
            } else {
                Speaker::Counterpart
            };
            TranscriptTurn::new(speaker, m.original_text.clone())
        })
        .collect()
}

/// RAII in-flight marker for one conversation's turn.
///
/// Dropping the guard always clears the marker; if the turn never
/// completed, a `Failed` event is emitted so observers can clear pending
/// indicators.
struct TurnGuard {
    in_flight: Arc<Mutex<HashSet<ConversationId>>>,
    events: broadcast::Sender<TurnEvent>,
    conversation_id: ConversationId,
    completed: bool,
}

impl TurnGuard {
    fn acquire(
        in_flight: Arc<Mutex<HashSet<ConversationId>>>,
        events: broadcast::Sender<TurnEvent>,
        conversation_id: ConversationId,
    ) -> Result<Self> {
        {
            let mut set = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if !set.insert(conversation_id.clone()) {
                return Err(ChatError::ConversationBusy(conversation_id));
            }
        }
        Ok(Self {
            in_flight,
            events,
            conversation_id,
            completed: false,
        })
    }

    fn complete(&mut self, message_id: MessageId) {
        self.completed = true;
        let _ = self.events.send(TurnEvent::Completed {
            conversation_id: self.conversation_id.clone(),
            message_id,
        });
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.conversation_id);
        if !self.completed {
            let _ = self.events.send(TurnEvent::Failed {
                conversation_id: self.conversation_id.clone(),
            });
        }
    }
}
