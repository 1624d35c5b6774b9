//! Gemini-backed implementation of the language service.
//!
//! All four capabilities (translate, transcribe, reply, synthesize) go
//! through the `generateContent` REST endpoint. Failures never escape this
//! module: each trait method wraps a fallible helper and converts any
//! transport, credential, or parse error into the documented fallback.

use crate::config::ServiceConfig;
use crate::error::{ChatError, Result};
use crate::model::AudioHandle;
use crate::service::{LanguageService, Speaker, Translation, TranscriptTurn};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Language service client for the Gemini generative API.
pub struct GeminiService {
    client: reqwest::Client,
    base_url: String,
    /// `None` means no credentials: every call degrades immediately.
    api_key: Option<String>,
    text_model: String,
    speech_model: String,
}

/// Structured translation payload requested via the JSON response schema.
#[derive(Debug, Deserialize)]
struct TranslationPayload {
    #[serde(rename = "translatedText")]
    translated_text: String,
    #[serde(rename = "culturalContext")]
    cultural_context: Option<String>,
}

impl GeminiService {
    /// Create a client from service configuration.
    ///
    /// A missing API key is not an error; the client is constructed in
    /// degraded mode and every call returns its fallback value.
    #[must_use]
    pub fn new(config: &ServiceConfig) -> Self {
        let api_key = config.resolved_api_key();
        if api_key.is_none() {
            warn!("no API key configured; language service will run degraded");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key,
            text_model: config.text_model.clone(),
            speech_model: config.speech_model.clone(),
        }
    }

    /// POST a `generateContent` request and return the parsed response body.
    async fn generate_content(
        &self,
        model: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let Some(ref api_key) = self.api_key else {
            return Err(ChatError::Service("API key missing".into()));
        };

        let url = format!("{}/v1beta/models/{model}:generateContent", self.base_url);
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Service(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Service(format!(
                "{model} returned HTTP {status}"
            )));
        }

        let parsed = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ChatError::Service(format!("invalid response body: {e}")))?;

        debug!(
            "{model} responded in {:.2}s",
            started.elapsed().as_secs_f64()
        );
        Ok(parsed)
    }

    /// Extract the first text part from a `generateContent` response.
    fn first_text(response: &serde_json::Value) -> Option<String> {
        let parts = response["candidates"][0]["content"]["parts"].as_array()?;
        parts
            .iter()
            .find_map(|p| p["text"].as_str())
            .map(str::to_owned)
    }

    async fn try_translate(
        &self,
        text: &str,
        target_language: &str,
        source_language: &str,
        include_cultural_context: bool,
    ) -> Result<Translation> {
        let context_clause = if include_cultural_context {
            "If there are idioms, slang, or cultural references, explain them \
             briefly in the culturalContext field."
        } else {
            ""
        };
        let prompt = format!(
            "Translate the following text from {source_language} to {target_language}.\n\
             Maintain the tone, emotion, and nuance.\n\
             {context_clause}\n\n\
             Text to translate: \"{text}\""
        );

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "translatedText": { "type": "STRING" },
                        "culturalContext": { "type": "STRING", "nullable": true },
                    },
                    "required": ["translatedText"],
                },
            },
        });

        let response = self.generate_content(&self.text_model, body).await?;
        let raw = Self::first_text(&response)
            .ok_or_else(|| ChatError::Service("translation response had no text".into()))?;
        let payload: TranslationPayload = serde_json::from_str(&raw)
            .map_err(|e| ChatError::Service(format!("translation payload was not JSON: {e}")))?;

        if payload.translated_text.trim().is_empty() {
            return Err(ChatError::Service("translation came back empty".into()));
        }

        Ok(Translation {
            translated_text: payload.translated_text,
            // Only surface the annotation when it was asked for.
            cultural_context: include_cultural_context
                .then_some(payload.cultural_context)
                .flatten()
                .filter(|c| !c.trim().is_empty()),
        })
    }

    async fn try_transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String> {
        let body = serde_json::json!({
            "contents": [{
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": mime_type,
                            "data": BASE64.encode(audio),
                        }
                    },
                    {
                        "text": "Transcribe this audio exactly as spoken. \
                                 Do not translate it. Return only the transcription text."
                    },
                ]
            }],
        });

        let response = self.generate_content(&self.text_model, body).await?;
        let text = Self::first_text(&response)
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ChatError::Service("transcription response had no text".into()))?;
        Ok(text)
    }

    async fn try_generate_reply(
        &self,
        transcript: &[TranscriptTurn],
        counterpart_name: &str,
        counterpart_language: &str,
        user_language: &str,
    ) -> Result<String> {
        let history = transcript
            .iter()
            .map(|turn| {
                let role = match turn.speaker {
                    Speaker::User => "self",
                    Speaker::Counterpart => "counterpart",
                };
                format!("{role}: {}", turn.text)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "You are {counterpart_name}, a friendly person speaking {counterpart_language}.\n\
             You are chatting with a friend who speaks {user_language}.\n\
             Reply to the last message naturally in {counterpart_language}.\n\
             Keep it short (under 20 words).\n\n\
             History:\n{history}"
        );

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        let response = self.generate_content(&self.text_model, body).await?;
        let text = Self::first_text(&response)
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ChatError::Service("reply response had no text".into()))?;
        Ok(text)
    }

    async fn try_synthesize(&self, text: &str, voice: &str) -> Result<AudioHandle> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": voice },
                    },
                },
            },
        });

        let response = self.generate_content(&self.speech_model, body).await?;
        let inline = &response["candidates"][0]["content"]["parts"][0]["inlineData"];
        let data = inline["data"]
            .as_str()
            .ok_or_else(|| ChatError::Service("synthesis response had no audio".into()))?;
        let bytes = BASE64
            .decode(data)
            .map_err(|e| ChatError::Service(format!("synthesis audio was not base64: {e}")))?;
        let mime_type = inline["mimeType"].as_str().unwrap_or("audio/mp3");

        info!("synthesized {} bytes of speech", bytes.len());
        Ok(AudioHandle::new(mime_type, bytes))
    }
}

#[async_trait]
impl LanguageService for GeminiService {
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        source_language: &str,
        include_cultural_context: bool,
    ) -> Translation {
        match self
            .try_translate(text, target_language, source_language, include_cultural_context)
            .await
        {
            Ok(translation) => translation,
            Err(e) => {
                warn!("translation degraded to source text: {e}");
                Translation {
                    translated_text: text.to_owned(),
                    cultural_context: Some("Translation failed.".to_owned()),
                }
            }
        }
    }

    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Option<String> {
        match self.try_transcribe(audio, mime_type).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("transcription failed: {e}");
                None
            }
        }
    }

    async fn generate_reply(
        &self,
        transcript: &[TranscriptTurn],
        counterpart_name: &str,
        counterpart_language: &str,
        user_language: &str,
    ) -> String {
        match self
            .try_generate_reply(
                transcript,
                counterpart_name,
                counterpart_language,
                user_language,
            )
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!("reply generation degraded to placeholder: {e}");
                "...".to_owned()
            }
        }
    }

    async fn synthesize_speech(&self, text: &str, voice: &str) -> Option<AudioHandle> {
        if text.trim().is_empty() {
            return None;
        }
        match self.try_synthesize(text, voice).await {
            Ok(audio) => Some(audio),
            Err(e) => {
                warn!("speech synthesis failed: {e}");
                None
            }
        }
    }
}
