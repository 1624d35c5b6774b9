//! kaiwa: cross-language AI chat core.
//!
//! Each participant reads and writes in their own language; the
//! counterpart's replies are generated, translated, optionally annotated
//! with cultural context, and optionally spoken back. One turn flows:
//!
//! Input (typed or transcribed speech) → reply generation → translation →
//! optional speech synthesis → conversation append
//!
//! # Architecture
//!
//! - **Conversation store** ([`store::ChatStore`]): single source of truth
//!   for the active user, conversations, and settings; the only writer.
//! - **Message pipeline** ([`pipeline::MessagePipeline`]): drives one turn
//!   per conversation at a time, with an in-flight guard and optimistic
//!   echo of the user's own message.
//! - **Recording controller** ([`recorder::RecordingController`]):
//!   press-and-hold capture state machine feeding transcripts into the same
//!   pipeline entry point as typed text.
//! - **Language service** ([`service::LanguageService`]): stateless façade
//!   over the remote AI capability; every failure degrades to an in-band
//!   fallback at this boundary.
//!
//! All state is process memory; nothing persists across restarts.

pub mod audio;
pub mod config;
pub mod error;
pub mod language;
pub mod model;
pub mod pipeline;
pub mod recorder;
pub mod route;
pub mod service;
pub mod store;

pub use config::ChatConfig;
pub use error::{ChatError, Result};
pub use pipeline::{MessagePipeline, TurnEvent};
pub use recorder::RecordingController;
pub use service::{GeminiService, LanguageService};
pub use store::ChatStore;
