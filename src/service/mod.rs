//! Language service boundary: translation, transcription, reply
//! generation, and speech synthesis.
//!
//! Every call crosses a process boundary and can fail independently. The
//! [`LanguageService`] trait is deliberately infallible: implementations
//! catch every transport, credential, and parse failure and return a
//! degraded in-band value instead, so the pipeline never handles service
//! errors itself.

mod gemini;

pub use gemini::GeminiService;

use crate::model::AudioHandle;
use async_trait::async_trait;

/// Result of a translation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// The translated text. Never empty for non-empty input; on failure
    /// this echoes the source text.
    pub translated_text: String,
    /// Short explanation of idioms, slang, or cultural references, when
    /// requested and detected.
    pub cultural_context: Option<String>,
}

/// Who spoke a transcript turn, relative to the local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// The local user.
    User,
    /// The conversation counterpart.
    Counterpart,
}

/// One role-tagged turn of conversation history passed to reply generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptTurn {
    pub speaker: Speaker,
    /// The turn's text in its original language.
    pub text: String,
}

impl TranscriptTurn {
    #[must_use]
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }
}

/// Stateless façade over the external AI capability.
///
/// Each operation is an independent request/response with no shared state
/// between calls. Implementations must degrade gracefully: no method ever
/// returns an error, only fallback values (see each method's contract).
#[async_trait]
pub trait LanguageService: Send + Sync {
    /// Translate `text` from `source_language` into `target_language`,
    /// preserving tone and register where possible.
    ///
    /// When `include_cultural_context` is set, the request also asks for a
    /// brief explanation of idioms or cultural references; otherwise the
    /// annotation is neither requested nor returned.
    ///
    /// On failure the translation echoes the source text with a
    /// "Translation failed." annotation, never an empty string.
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        source_language: &str,
        include_cultural_context: bool,
    ) -> Translation;

    /// Transcribe spoken audio exactly as spoken, without translating.
    ///
    /// Returns `None` when transcription fails or yields nothing.
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Option<String>;

    /// Generate a short, in-character reply continuing `transcript`, written
    /// in `counterpart_language`.
    ///
    /// Falls back to a neutral `"..."` placeholder on failure.
    async fn generate_reply(
        &self,
        transcript: &[TranscriptTurn],
        counterpart_name: &str,
        counterpart_language: &str,
        user_language: &str,
    ) -> String;

    /// Synthesize `text` into playable audio with the given prebuilt voice.
    ///
    /// Returns `None` on failure or for empty input.
    async fn synthesize_speech(&self, text: &str, voice: &str) -> Option<AudioHandle>;
}
