//! Microphone capture via cpal.
//!
//! Captures at the device's native sample rate and downsamples the finished
//! take to the configured capture rate. The capture device is an exclusive
//! resource: one session at a time, released whenever the session ends,
//! including drop without [`InputSession::finish`].

use crate::config::AudioConfig;
use crate::error::{ChatError, Result};
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info};

/// A finished, finalized voice capture.
#[derive(Debug, Clone)]
pub struct CapturedAudio {
    /// Mono f32 samples at `sample_rate`.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

/// An audio input device that can open exclusive capture sessions.
pub trait InputDevice: Send + Sync {
    /// Acquire the device and start accumulating audio.
    ///
    /// # Errors
    ///
    /// Returns an error when the device is denied or unavailable; no
    /// session is opened in that case.
    fn open(&self) -> Result<Box<dyn InputSession>>;
}

/// An in-progress capture. Dropping the session without finishing it
/// discards the audio and releases the device.
pub trait InputSession: Send {
    /// Stop capturing and return the finalized sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the capture worker failed.
    fn finish(self: Box<Self>) -> Result<CapturedAudio>;
}

/// Production input device backed by cpal.
pub struct CpalInputDevice {
    input_device: Option<String>,
    target_sample_rate: u32,
}

impl CpalInputDevice {
    /// Create a device handle from audio configuration.
    #[must_use]
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            input_device: config.input_device.clone(),
            target_sample_rate: config.capture_sample_rate,
        }
    }

    fn resolve_device(&self) -> Result<cpal::Device> {
        let host = cpal::default_host();
        if let Some(ref name) = self.input_device {
            host.input_devices()
                .map_err(|e| ChatError::Audio(format!("cannot enumerate devices: {e}")))?
                .find(|d| {
                    d.description()
                        .ok()
                        .map(|desc| desc.name() == name)
                        .unwrap_or(false)
                })
                .ok_or_else(|| ChatError::Audio(format!("input device '{name}' not found")))
        } else {
            host.default_input_device()
                .ok_or_else(|| ChatError::Audio("no default input device".into()))
        }
    }
}

impl InputDevice for CpalInputDevice {
    fn open(&self) -> Result<Box<dyn InputSession>> {
        let device = self.resolve_device()?;
        let device_name = device
            .description()
            .map(|d| d.name().to_owned())
            .unwrap_or_else(|_| "<unknown>".into());

        let default_config = device
            .default_input_config()
            .map_err(|e| ChatError::Audio(format!("no default input config: {e}")))?;
        let native_rate = default_config.sample_rate();
        let native_channels = default_config.channels();
        let stream_config = StreamConfig {
            channels: native_channels,
            sample_rate: native_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let samples: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&samples);

        // cpal streams are not Send, so the stream lives on its own thread;
        // dropping `stop_tx` is the stop signal.
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<std::result::Result<(), String>>(1);

        let worker = std::thread::spawn(move || {
            let stream = device.build_input_stream(
                &stream_config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    let mut buf = sink.lock().unwrap_or_else(PoisonError::into_inner);
                    if native_channels > 1 {
                        buf.extend(fold_to_mono(data, native_channels));
                    } else {
                        buf.extend_from_slice(data);
                    }
                },
                move |err| {
                    error!("audio input stream error: {err}");
                },
                None,
            );

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("failed to build input stream: {e}")));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(format!("failed to start input stream: {e}")));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            // Hold the stream alive until the session stops or is dropped.
            let _ = stop_rx.recv();
            drop(stream);
        });

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(ChatError::Audio(e));
            }
            Err(_) => return Err(ChatError::Audio("capture worker did not start".into())),
        }

        info!("capture started on '{device_name}' at {native_rate}Hz");
        Ok(Box::new(CpalInputSession {
            samples,
            native_rate,
            target_rate: self.target_sample_rate,
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        }))
    }
}

struct CpalInputSession {
    samples: Arc<Mutex<Vec<f32>>>,
    native_rate: u32,
    target_rate: u32,
    stop_tx: Option<crossbeam_channel::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl InputSession for CpalInputSession {
    fn finish(mut self: Box<Self>) -> Result<CapturedAudio> {
        // Dropping the sender wakes the worker, which drops the stream.
        self.stop_tx.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            return Err(ChatError::Audio("capture worker panicked".into()));
        }

        let raw = std::mem::take(
            &mut *self.samples.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let samples = resample(&raw, self.native_rate, self.target_rate);
        info!(
            "capture finished: {} samples at {}Hz",
            samples.len(),
            self.target_rate
        );
        Ok(CapturedAudio {
            samples,
            sample_rate: self.target_rate,
        })
    }
}

/// Average interleaved frames down to a single channel.
fn fold_to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Linear-interpolation resampler. Adequate for speech: voice energy sits
/// well below the Nyquist limit at the rates involved.
fn resample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = src_rate as f64 / dst_rate as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            samples[idx] as f64 * (1.0 - frac) + samples[idx + 1] as f64 * frac
        } else {
            samples[idx.min(samples.len() - 1)] as f64
        };
        output.push(sample as f32);
    }

    output
}
