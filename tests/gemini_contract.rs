//! Wire contract for the Gemini-backed language service.
//!
//! Each capability is exercised against a mock server: happy path, and the
//! degraded fallback the trait guarantees when the backend misbehaves.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use kaiwa::config::ServiceConfig;
use kaiwa::service::{GeminiService, LanguageService, Speaker, TranscriptTurn};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service_for(mock: &MockServer) -> GeminiService {
    let config = ServiceConfig {
        api_url: mock.uri(),
        api_key: "test-key".to_owned(),
        request_timeout_secs: 5,
        ..ServiceConfig::default()
    };
    GeminiService::new(&config)
}

/// A `generateContent` response whose first part is `text`.
fn text_response(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }] }
        }]
    })
}

const TEXT_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";
const SPEECH_PATH: &str = "/v1beta/models/gemini-2.5-flash-preview-tts:generateContent";

#[tokio::test]
async fn translate_parses_structured_payload() {
    let server = MockServer::start().await;
    let payload = r#"{"translatedText":"Hello! How are you?","culturalContext":"Standard friendly greeting."}"#;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response(payload)))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let translation = service
        .translate("こんにちは！元気ですか？", "English", "Japanese", true)
        .await;

    assert_eq!(translation.translated_text, "Hello! How are you?");
    assert_eq!(
        translation.cultural_context.as_deref(),
        Some("Standard friendly greeting.")
    );
}

#[tokio::test]
async fn translate_request_includes_context_clause_only_when_asked() {
    let server = MockServer::start().await;
    let payload = r#"{"translatedText":"Hi"}"#;

    // The prompt mentions idioms only when cultural context was requested.
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .and(body_string_contains("idioms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response(payload)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response(payload)))
        .mount(&server)
        .await;

    let service = service_for(&server);
    service.translate("hola", "English", "Spanish", true).await;
    service.translate("hola", "English", "Spanish", false).await;
}

#[tokio::test]
async fn translate_without_context_ignores_a_returned_annotation() {
    let server = MockServer::start().await;
    let payload = r#"{"translatedText":"Hi","culturalContext":"Unrequested trivia."}"#;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response(payload)))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let translation = service.translate("hola", "English", "Spanish", false).await;
    assert_eq!(translation.translated_text, "Hi");
    assert!(translation.cultural_context.is_none());
}

#[tokio::test]
async fn translate_falls_back_to_source_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let translation = service
        .translate("¿Cómo estás?", "English", "Spanish", true)
        .await;

    // Never empty for non-empty input: the source text is echoed.
    assert_eq!(translation.translated_text, "¿Cómo estás?");
    assert_eq!(
        translation.cultural_context.as_deref(),
        Some("Translation failed.")
    );
}

#[tokio::test]
async fn translate_falls_back_when_payload_is_not_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(text_response("sorry, plain prose")),
        )
        .mount(&server)
        .await;

    let service = service_for(&server);
    let translation = service.translate("hola", "English", "Spanish", true).await;
    assert_eq!(translation.translated_text, "hola");
}

#[tokio::test]
async fn translate_without_credentials_echoes_without_calling_out() {
    let server = MockServer::start().await;
    // Any request reaching the server is a failure.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("x")))
        .expect(0)
        .mount(&server)
        .await;

    struct EnvGuard(Option<std::ffi::OsString>);
    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(ref v) = self.0 {
                unsafe { std::env::set_var(kaiwa::config::API_KEY_ENV, v) };
            }
        }
    }
    let guard = EnvGuard(std::env::var_os(kaiwa::config::API_KEY_ENV));
    unsafe { std::env::remove_var(kaiwa::config::API_KEY_ENV) };

    let config = ServiceConfig {
        api_url: server.uri(),
        api_key: String::new(),
        ..ServiceConfig::default()
    };
    let service = GeminiService::new(&config);
    let translation = service.translate("hola", "English", "Spanish", false).await;
    assert_eq!(translation.translated_text, "hola");
    drop(guard);
}

#[tokio::test]
async fn generate_reply_returns_trimmed_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .and(body_string_contains("You are Aiko"))
        .and(body_string_contains("self: How are you?"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(text_response("  元気です！あなたは？\n")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let transcript = vec![
        TranscriptTurn::new(Speaker::Counterpart, "こんにちは！"),
        TranscriptTurn::new(Speaker::User, "How are you?"),
    ];
    let reply = service
        .generate_reply(&transcript, "Aiko", "Japanese", "English")
        .await;
    assert_eq!(reply, "元気です！あなたは？");
}

#[tokio::test]
async fn generate_reply_degrades_to_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let reply = service
        .generate_reply(&[], "Aiko", "Japanese", "English")
        .await;
    assert_eq!(reply, "...");
}

#[tokio::test]
async fn transcribe_sends_inline_audio_and_returns_text() {
    let server = MockServer::start().await;
    let audio = b"RIFF-fake-wav-bytes".to_vec();
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .and(body_string_contains("inlineData"))
        .and(body_string_contains(BASE64.encode(&audio)))
        .and(body_string_contains("audio/wav"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("How are you?")))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let transcript = service.transcribe(&audio, "audio/wav").await;
    assert_eq!(transcript.as_deref(), Some("How are you?"));
}

#[tokio::test]
async fn transcribe_yields_none_on_failure_or_empty_text() {
    let failing = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&failing)
        .await;
    assert!(service_for(&failing).transcribe(b"xx", "audio/wav").await.is_none());

    let empty = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("   ")))
        .mount(&empty)
        .await;
    assert!(service_for(&empty).transcribe(b"xx", "audio/wav").await.is_none());
}

#[tokio::test]
async fn synthesize_decodes_inline_audio() {
    let server = MockServer::start().await;
    let audio_bytes = vec![9u8, 8, 7, 6];
    let response = json!({
        "candidates": [{
            "content": {
                "parts": [{
                    "inlineData": {
                        "mimeType": "audio/mp3",
                        "data": BASE64.encode(&audio_bytes),
                    }
                }]
            }
        }]
    });
    Mock::given(method("POST"))
        .and(path(SPEECH_PATH))
        .and(body_string_contains("prebuiltVoiceConfig"))
        .and(body_string_contains("Puck"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let handle = service.synthesize_speech("I'm well", "Puck").await.unwrap();
    assert_eq!(handle.mime_type, "audio/mp3");
    assert_eq!(handle.data.as_ref(), audio_bytes.as_slice());
}

#[tokio::test]
async fn synthesize_skips_empty_input_and_absorbs_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let service = service_for(&server);
    // Empty input short-circuits without a request; failure yields None.
    assert!(service.synthesize_speech("   ", "Puck").await.is_none());
    assert!(service.synthesize_speech("hello", "Puck").await.is_none());
}
