//! Press-and-hold voice capture feeding the message pipeline.
//!
//! State machine: `Idle → Recording → (finalize) → Idle`. At most one
//! capture session exists at a time; stopping without starting is a no-op.
//! A finished take is encoded to WAV, transcribed, and forwarded into
//! [`MessagePipeline::send_message`] as a voice-originated turn.

use crate::audio::capture::{CapturedAudio, InputDevice, InputSession};
use crate::error::{ChatError, Result};
use crate::model::{AudioHandle, ConversationId, MessageId};
use crate::pipeline::MessagePipeline;
use crate::service::LanguageService;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

enum RecorderState {
    Idle,
    Recording(Box<dyn InputSession>),
}

/// Owns the voice-capture state machine.
pub struct RecordingController {
    device: Arc<dyn InputDevice>,
    service: Arc<dyn LanguageService>,
    pipeline: Arc<MessagePipeline>,
    state: Mutex<RecorderState>,
}

impl RecordingController {
    /// Create a controller over a capture device and the shared pipeline.
    #[must_use]
    pub fn new(
        device: Arc<dyn InputDevice>,
        service: Arc<dyn LanguageService>,
        pipeline: Arc<MessagePipeline>,
    ) -> Self {
        Self {
            device,
            service,
            pipeline,
            state: Mutex::new(RecorderState::Idle),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a capture session is currently active.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        matches!(*self.state(), RecorderState::Recording(_))
    }

    /// Acquire the input device and start capturing.
    ///
    /// # Errors
    ///
    /// [`ChatError::CaptureBusy`] while already recording; a second
    /// concurrent device session is never opened. Device denial or
    /// unavailability is returned as-is and leaves the controller `Idle`.
    pub fn start_recording(&self) -> Result<()> {
        let mut state = self.state();
        if matches!(*state, RecorderState::Recording(_)) {
            return Err(ChatError::CaptureBusy);
        }

        // On failure the state is untouched: still Idle, no device held.
        let session = self.device.open()?;
        *state = RecorderState::Recording(session);
        info!("recording started");
        Ok(())
    }

    /// Stop capturing, transcribe the take, and send it as a voice turn.
    ///
    /// Returns the counterpart message id, or `None` when no recording was
    /// in progress. The device session is released before any service call,
    /// on every path.
    ///
    /// # Errors
    ///
    /// [`ChatError::TranscriptionFailed`] when the take produced no usable
    /// transcript (no message is sent), plus any pipeline error from the
    /// forwarded send.
    pub async fn stop_recording(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<MessageId>> {
        let session = {
            let mut state = self.state();
            match std::mem::replace(&mut *state, RecorderState::Idle) {
                RecorderState::Idle => return Ok(None),
                RecorderState::Recording(session) => session,
            }
        };

        // Finalize releases the capture device.
        let captured = session.finish()?;
        if captured.samples.is_empty() {
            warn!("capture produced no audio");
            return Err(ChatError::TranscriptionFailed);
        }

        let wav = encode_wav(&captured)?;
        let recording = AudioHandle::new("audio/wav", wav);

        let Some(transcript) = self
            .service
            .transcribe(&recording.data, &recording.mime_type)
            .await
        else {
            warn!("transcription yielded nothing; dropping the take");
            return Err(ChatError::TranscriptionFailed);
        };

        info!("voice turn transcribed: {transcript}");
        let message_id = self
            .pipeline
            .send_message(conversation_id, &transcript, Some(recording), true)
            .await?;
        Ok(Some(message_id))
    }
}

/// Encode a finalized capture as 16-bit mono PCM WAV.
fn encode_wav(captured: &CapturedAudio) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: captured.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut out = std::io::Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut out, spec)
        .map_err(|e| ChatError::Audio(format!("WAV encode failed: {e}")))?;
    for &sample in &captured.samples {
        let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer
            .write_sample(value)
            .map_err(|e| ChatError::Audio(format!("WAV encode failed: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| ChatError::Audio(format!("WAV encode failed: {e}")))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::audio::SilentVoiceOutput;
    use crate::config::ChatConfig;
    use crate::model::User;
    use crate::service::{Translation, TranscriptTurn};
    use crate::store::ChatStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Device whose sessions capture a fixed tone; counts open sessions.
    struct FakeDevice {
        deny: bool,
        open_sessions: Arc<AtomicUsize>,
    }

    struct FakeSession {
        open_sessions: Arc<AtomicUsize>,
    }

    impl InputDevice for FakeDevice {
        fn open(&self) -> Result<Box<dyn InputSession>> {
            if self.deny {
                return Err(ChatError::Audio("microphone access denied".into()));
            }
            self.open_sessions.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                open_sessions: Arc::clone(&self.open_sessions),
            }))
        }
    }

    impl InputSession for FakeSession {
        fn finish(self: Box<Self>) -> Result<CapturedAudio> {
            self.open_sessions.fetch_sub(1, Ordering::SeqCst);
            Ok(CapturedAudio {
                samples: vec![0.25; 1600],
                sample_rate: 16_000,
            })
        }
    }

    struct StubService {
        transcript: Option<String>,
    }

    #[async_trait]
    impl LanguageService for StubService {
        async fn translate(
            &self,
            text: &str,
            _target_language: &str,
            _source_language: &str,
            _include_cultural_context: bool,
        ) -> Translation {
            Translation {
                translated_text: format!("[t] {text}"),
                cultural_context: None,
            }
        }

        async fn transcribe(&self, _audio: &[u8], _mime_type: &str) -> Option<String> {
            self.transcript.clone()
        }

        async fn generate_reply(
            &self,
            _transcript: &[TranscriptTurn],
            _counterpart_name: &str,
            _counterpart_language: &str,
            _user_language: &str,
        ) -> String {
            "はい".to_owned()
        }

        async fn synthesize_speech(&self, _text: &str, _voice: &str) -> Option<AudioHandle> {
            Some(AudioHandle::new("audio/wav", vec![1, 2, 3]))
        }
    }

    fn make_controller(
        deny: bool,
        transcript: Option<String>,
    ) -> (RecordingController, Arc<ChatStore>, ConversationId, Arc<AtomicUsize>) {
        let store = Arc::new(ChatStore::new());
        let alex = User::new("Alex", "a.png", "English");
        store.set_current_user(alex);
        let aiko = User::new("Aiko", "b.png", "Japanese");
        let conversation_id = store.create_conversation(vec![aiko]);

        let service: Arc<dyn LanguageService> = Arc::new(StubService { transcript });
        let mut config = ChatConfig::default();
        config.pipeline.reply_delay_ms = 0;
        let pipeline = Arc::new(MessagePipeline::new(
            Arc::clone(&store),
            Arc::clone(&service),
            Arc::new(SilentVoiceOutput),
            &config,
        ));

        let open_sessions = Arc::new(AtomicUsize::new(0));
        let device = Arc::new(FakeDevice {
            deny,
            open_sessions: Arc::clone(&open_sessions),
        });
        (
            RecordingController::new(device, service, pipeline),
            store,
            conversation_id,
            open_sessions,
        )
    }

    #[test]
    fn double_start_is_rejected_with_one_session() {
        let (controller, _store, _id, open_sessions) = make_controller(false, None);

        controller.start_recording().unwrap();
        assert!(controller.is_recording());

        let second = controller.start_recording();
        assert!(matches!(second, Err(ChatError::CaptureBusy)));
        assert_eq!(open_sessions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn device_denial_leaves_idle() {
        let (controller, store, id, _) = make_controller(true, None);

        let result = controller.start_recording();
        assert!(matches!(result, Err(ChatError::Audio(_))));
        assert!(!controller.is_recording());
        // Nothing was appended anywhere.
        assert!(store.conversation(&id).unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn stop_without_start_is_a_noop() {
        let (controller, store, id, _) = make_controller(false, None);

        let result = controller.stop_recording(&id).await.unwrap();
        assert!(result.is_none());
        assert!(store.conversation(&id).unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn voice_turn_flows_through_pipeline() {
        let (controller, store, id, open_sessions) =
            make_controller(false, Some("How are you?".to_owned()));

        controller.start_recording().unwrap();
        let message_id = controller.stop_recording(&id).await.unwrap().unwrap();

        assert!(!controller.is_recording());
        assert_eq!(open_sessions.load(Ordering::SeqCst), 0);

        let conv = store.conversation(&id).unwrap();
        assert_eq!(conv.messages.len(), 2);

        let echo = &conv.messages[0];
        assert_eq!(echo.original_text, "How are you?");
        assert!(echo.is_voice);
        assert!(echo.recording.is_some());
        assert_eq!(echo.recording.as_ref().unwrap().mime_type, "audio/wav");

        let reply = &conv.messages[1];
        assert_eq!(reply.id, message_id);
        assert!(reply.is_voice);
        // Voice-originated turns force synthesis even with auto-play off.
        assert!(reply.audio.is_some());
    }

    #[tokio::test]
    async fn transcription_failure_sends_nothing() {
        let (controller, store, id, open_sessions) = make_controller(false, None);

        controller.start_recording().unwrap();
        let result = controller.stop_recording(&id).await;

        assert!(matches!(result, Err(ChatError::TranscriptionFailed)));
        assert!(!controller.is_recording());
        // Device released even on the failure path.
        assert_eq!(open_sessions.load(Ordering::SeqCst), 0);
        assert!(store.conversation(&id).unwrap().messages.is_empty());
    }

    #[test]
    fn encode_wav_produces_parseable_riff() {
        let wav = encode_wav(&CapturedAudio {
            samples: vec![0.0, 0.5, -0.5, 1.0],
            sample_rate: 16_000,
        })
        .unwrap();

        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(reader.len(), 4);
    }
}
