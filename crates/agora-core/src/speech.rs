//! Speech synthesis boundary.
//!
//! [`SpeechSynthesizer`] turns text into base64-encoded MP3 audio.
//! [`GoogleTts`] implements it over the Cloud Text-to-Speech REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Public Text-to-Speech endpoint.
pub const DEFAULT_TTS_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

/// Voice used when a request does not name one.
pub const DEFAULT_VOICE: &str = "en-US-Neural2-D";

/// Failure of a synthesis call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpeechError {
    #[error("no speech API key configured")]
    MissingApiKey,

    #[error("speech request failed: {0}")]
    Request(String),

    #[error("speech API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("failed to decode speech response: {0}")]
    Decode(String),
}

/// Text-to-speech backend.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with `voice_id`; returns base64 MP3 audio.
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<String, SpeechError>;
}

/// Language code of a voice id: its first two dash-separated parts.
///
/// `"en-US-Neural2-D"` becomes `"en-US"`. Ids with fewer parts are returned
/// whole.
pub fn language_code(voice_id: &str) -> &str {
    match voice_id.match_indices('-').nth(1) {
        Some((idx, _)) => &voice_id[..idx],
        None => voice_id,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

fn request_body<'a>(text: &'a str, voice_id: &'a str) -> SynthesizeRequest<'a> {
    SynthesizeRequest {
        input: SynthesisInput { text },
        voice: VoiceSelection {
            language_code: language_code(voice_id),
            name: voice_id,
        },
        audio_config: AudioConfig {
            audio_encoding: "MP3",
        },
    }
}

/// Google Cloud Text-to-Speech adapter.
#[derive(Clone)]
pub struct GoogleTts {
    api_key: String,
    url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GoogleTts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTts").field("url", &self.url).finish()
    }
}

impl GoogleTts {
    pub fn new(api_key: impl Into<String>) -> Result<Self, SpeechError> {
        Self::with_url(api_key, DEFAULT_TTS_URL)
    }

    pub fn with_url(api_key: impl Into<String>, url: impl Into<String>) -> Result<Self, SpeechError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(SpeechError::MissingApiKey);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SpeechError::Request(e.to_string()))?;
        Ok(Self {
            api_key,
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<String, SpeechError> {
        let body = request_body(text, voice_id);
        debug!(voice = voice_id, chars = text.len(), "synthesizing speech");

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SpeechError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::Decode(e.to_string()))?;
        Ok(parsed.audio_content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn language_code_takes_first_two_parts() {
        assert_eq!(language_code("en-US-Neural2-D"), "en-US");
        assert_eq!(language_code("de-DE-Wavenet-A"), "de-DE");
        assert_eq!(language_code("en-GB"), "en-GB");
        assert_eq!(language_code("en"), "en");
    }

    #[test]
    fn request_body_wire_shape() {
        let value = serde_json::to_value(request_body("Hello", DEFAULT_VOICE)).unwrap();
        assert_eq!(
            value,
            json!({
                "input": {"text": "Hello"},
                "voice": {"languageCode": "en-US", "name": "en-US-Neural2-D"},
                "audioConfig": {"audioEncoding": "MP3"}
            })
        );
    }

    #[test]
    fn response_decodes_audio_content() {
        let parsed: SynthesizeResponse =
            serde_json::from_str(r#"{"audioContent":"SUQz"}"#).unwrap();
        assert_eq!(parsed.audio_content, "SUQz");
    }

    #[test]
    fn blank_key_is_rejected() {
        assert_eq!(GoogleTts::new(" ").unwrap_err(), SpeechError::MissingApiKey);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_request_error() {
        let tts = GoogleTts::with_url("k", "http://127.0.0.1:9/v1/text:synthesize").unwrap();
        let err = tts.synthesize("hi", DEFAULT_VOICE).await.unwrap_err();
        assert!(matches!(err, SpeechError::Request(_)));
    }
}
