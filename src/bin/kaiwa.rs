//! Terminal demo for the kaiwa chat core.
//!
//! Runs the seeded demo store through the real pipeline: pick a
//! counterpart, type in your own language, read dual-display replies.
//! `GEMINI_API_KEY` enables live translation; without it every turn
//! degrades to the documented fallbacks (still useful for poking at the
//! state machinery).

use anyhow::Context;
use kaiwa::audio::{CpalInputDevice, CpalVoiceOutput, SilentVoiceOutput, VoiceOutput};
use kaiwa::model::{ConversationId, MessageId, SettingsPatch, User};
use kaiwa::{
    ChatConfig, ChatStore, GeminiService, LanguageService, MessagePipeline, RecordingController,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kaiwa=info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(ChatConfig::default_path);
    let config = match config_path {
        Some(ref path) => {
            ChatConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => ChatConfig::default(),
    };

    let store = Arc::new(ChatStore::seeded_demo());
    let service = Arc::new(GeminiService::new(&config.service));
    let voice: Arc<dyn VoiceOutput> = if cpal_output_available() {
        Arc::new(CpalVoiceOutput::new())
    } else {
        info!("no audio output device; replies will be text-only");
        Arc::new(SilentVoiceOutput)
    };
    let pipeline = Arc::new(MessagePipeline::new(
        Arc::clone(&store),
        Arc::clone(&service) as Arc<dyn LanguageService>,
        voice,
        &config,
    ));
    let recorder = RecordingController::new(
        Arc::new(CpalInputDevice::new(&config.audio)),
        service,
        Arc::clone(&pipeline),
    );

    // Onboarding, reduced to two prompts.
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    let name = prompt(&mut lines, "Your name: ")?.unwrap_or_else(|| "You".to_owned());
    let language =
        prompt(&mut lines, "Your language (e.g. English): ")?.unwrap_or_else(|| "English".to_owned());
    store.set_current_user(User::new(name, "", language));

    let conversations = store.conversations();
    println!("\nConversations:");
    for (i, conv) in conversations.iter().enumerate() {
        let who = conv
            .participants
            .first()
            .map(|p| format!("{} ({})", p.name, p.native_language))
            .unwrap_or_else(|| "<empty>".to_owned());
        println!("  [{i}] {who} - {}", conv.last_message_preview);
    }
    let pick = prompt(&mut lines, "Pick a conversation: ")?
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let conversation = conversations
        .get(pick)
        .or_else(|| conversations.first())
        .context("no conversations")?
        .clone();

    println!("\nChatting. Commands: /record, /voice, /context, /original, /quit\n");
    loop {
        let Some(line) = prompt(&mut lines, "> ")? else {
            break;
        };
        let line = line.trim().to_owned();
        match line.as_str() {
            "" => continue,
            "/quit" => break,
            "/voice" => {
                let on = !store.settings().auto_play_voice;
                store.update_settings(SettingsPatch {
                    auto_play_voice: Some(on),
                    ..SettingsPatch::default()
                });
                println!("auto-play voice: {on}");
                continue;
            }
            "/context" => {
                let on = !store.settings().show_cultural_context;
                store.update_settings(SettingsPatch {
                    show_cultural_context: Some(on),
                    ..SettingsPatch::default()
                });
                println!("cultural context: {on}");
                continue;
            }
            "/record" => {
                if recorder.is_recording() {
                    match recorder.stop_recording(&conversation.id).await {
                        Ok(Some(message_id)) => {
                            show_reply(&store, &conversation.id, &message_id)?;
                        }
                        Ok(None) => {}
                        Err(e) => eprintln!("recording failed: {e}"),
                    }
                } else {
                    match recorder.start_recording() {
                        Ok(()) => println!("recording; /record again to send"),
                        Err(e) => eprintln!("cannot record: {e}"),
                    }
                }
                continue;
            }
            "/original" => {
                let on = !store.settings().show_original;
                store.update_settings(SettingsPatch {
                    show_original: Some(on),
                    ..SettingsPatch::default()
                });
                println!("dual display: {on}");
                continue;
            }
            _ => {}
        }

        match pipeline.send_message(&conversation.id, &line, None, false).await {
            Ok(message_id) => show_reply(&store, &conversation.id, &message_id)?,
            Err(e) => eprintln!("send failed: {e}"),
        }
    }

    Ok(())
}

fn show_reply(
    store: &ChatStore,
    conversation_id: &ConversationId,
    message_id: &MessageId,
) -> anyhow::Result<()> {
    let settings = store.settings();
    let conv = store
        .conversation(conversation_id)
        .context("conversation vanished")?;
    if let Some(reply) = conv.messages.iter().find(|m| &m.id == message_id) {
        let sender = conv
            .participants
            .iter()
            .find(|p| p.id == reply.sender_id)
            .map(|p| p.name.as_str())
            .unwrap_or("counterpart");
        println!(
            "{sender}: {}",
            reply.translated_text.as_deref().unwrap_or(&reply.original_text)
        );
        if settings.show_original {
            println!("   ({})", reply.original_text);
        }
        if let Some(ref context) = reply.cultural_context {
            println!("   [context] {context}");
        }
    }
    Ok(())
}

fn prompt(
    lines: &mut impl Iterator<Item = std::io::Result<String>>,
    label: &str,
) -> anyhow::Result<Option<String>> {
    print!("{label}");
    std::io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(Some(line?)),
        None => Ok(None),
    }
}

fn cpal_output_available() -> bool {
    use cpal::traits::HostTrait;
    cpal::default_host().default_output_device().is_some()
}
