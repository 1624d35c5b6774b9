//! Audio device access: microphone capture and speech playback.

pub mod capture;
pub mod playback;

pub use capture::{CapturedAudio, CpalInputDevice, InputDevice, InputSession};
pub use playback::{CpalVoiceOutput, SilentVoiceOutput, VoiceOutput};
