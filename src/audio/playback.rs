//! Speech playback to the system speakers via cpal.
//!
//! Playback is singular per output: starting a new sample stops whatever is
//! currently playing, so overlapping replies never talk over each other.

use crate::error::{ChatError, Result};
use crate::model::AudioHandle;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex, PoisonError};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// A consumer-owned speech sink.
///
/// Implementations must replace any currently playing sample when `play` is
/// called. Playback is best-effort: failures are logged, never raised.
pub trait VoiceOutput: Send + Sync {
    /// Start playing `audio`, stopping any sample currently playing.
    fn play(&self, audio: &AudioHandle);

    /// Stop the current playback, if any.
    fn stop(&self);
}

/// Playback through the default cpal output device.
#[derive(Default)]
pub struct CpalVoiceOutput {
    current: Mutex<Option<CancellationToken>>,
}

impl CpalVoiceOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl VoiceOutput for CpalVoiceOutput {
    fn play(&self, audio: &AudioHandle) {
        let token = CancellationToken::new();
        {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = current.replace(token.clone()) {
                previous.cancel();
            }
        }

        let audio = audio.clone();
        std::thread::spawn(move || {
            if let Err(e) = run_playback(&audio, &token) {
                warn!("playback failed: {e}");
            }
        });
    }

    fn stop(&self) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = current.take() {
            token.cancel();
        }
    }
}

/// No-op sink for headless environments and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentVoiceOutput;

impl VoiceOutput for SilentVoiceOutput {
    fn play(&self, audio: &AudioHandle) {
        debug!("silent output: discarding {} bytes", audio.data.len());
    }

    fn stop(&self) {}
}

fn run_playback(audio: &AudioHandle, cancel: &CancellationToken) -> Result<()> {
    let (samples, sample_rate) = decode_to_mono(audio)?;
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| ChatError::Audio("no default output device".into()))?;
    let stream_config = StreamConfig {
        channels: 1,
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let buffer = Arc::new(Mutex::new(PlaybackBuffer {
        samples,
        position: 0,
        finished: false,
    }));
    let buffer_clone = Arc::clone(&buffer);

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut buf = buffer_clone.lock().unwrap_or_else(PoisonError::into_inner);
                for sample in data.iter_mut() {
                    if buf.position < buf.samples.len() {
                        *sample = buf.samples[buf.position];
                        buf.position += 1;
                    } else {
                        *sample = 0.0;
                        buf.finished = true;
                    }
                }
            },
            move |err| {
                error!("audio output stream error: {err}");
            },
            None,
        )
        .map_err(|e| ChatError::Audio(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| ChatError::Audio(format!("failed to start output stream: {e}")))?;

    loop {
        if cancel.is_cancelled() {
            debug!("playback replaced/stopped");
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
        let finished = buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finished;
        if finished {
            break;
        }
    }

    drop(stream);
    Ok(())
}

/// Decode an audio resource to mono f32 samples plus its sample rate.
fn decode_to_mono(audio: &AudioHandle) -> Result<(Vec<f32>, u32)> {
    let cursor = std::io::Cursor::new(audio.data.to_vec());
    let stream = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    if audio.mime_type.contains("wav") {
        hint.with_extension("wav");
    } else if audio.mime_type.contains("mp3") || audio.mime_type.contains("mpeg") {
        hint.with_extension("mp3");
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| ChatError::Audio(format!("unrecognized audio format: {e}")))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| ChatError::Audio("no audio track".into()))?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(24_000);
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(1)
        .max(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| ChatError::Audio(format!("unsupported codec: {e}")))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(ChatError::Audio(format!("demux error: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // Skip corrupt packets rather than abandoning playback.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(ChatError::Audio(format!("decode error: {e}"))),
        };

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buf.copy_interleaved_ref(decoded);
        for frame in buf.samples().chunks(channels) {
            samples.push(frame.iter().sum::<f32>() / channels as f32);
        }
    }

    Ok((samples, sample_rate))
}

/// Cursor over the decoded sample buffer shared with the stream callback.
struct PlaybackBuffer {
    samples: Vec<f32>,
    position: usize,
    finished: bool,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn sine_wav(sample_rate: u32, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut out = std::io::Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut out, spec).unwrap();
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let value = (t * 440.0 * std::f32::consts::TAU).sin();
            writer.write_sample((value * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
        out.into_inner()
    }

    #[test]
    fn decode_wav_round_trip() {
        let handle = AudioHandle::new("audio/wav", sine_wav(16_000, 1600));
        let (samples, rate) = decode_to_mono(&handle).unwrap();
        assert_eq!(rate, 16_000);
        assert_eq!(samples.len(), 1600);
        // A sine wave should reach near full scale in both directions.
        assert!(samples.iter().any(|&s| s > 0.9));
        assert!(samples.iter().any(|&s| s < -0.9));
    }

    #[test]
    fn decode_garbage_is_an_error() {
        let handle = AudioHandle::new("audio/wav", vec![0u8; 32]);
        assert!(decode_to_mono(&handle).is_err());
    }
}
