//! Audio endpoints: transcription, speech synthesis, voice listing

use crate::client::{error_from_body, join_url, AsyncClient, Client};
use crate::error::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

/// Default speech-to-text model
pub const DEFAULT_STT_MODEL: &str = "fabric-voice-stt";
/// Default text-to-speech model
pub const DEFAULT_TTS_MODEL: &str = "fabric-voice-tts";
/// Default synthesis output format
pub const DEFAULT_SPEECH_FORMAT: &str = "opus_48000_128";

/// Options for audio transcription
#[derive(Debug, Clone, Default)]
pub struct TranscriptionParams {
    /// Model override; defaults to [`DEFAULT_STT_MODEL`]
    pub model: Option<String>,
    /// Source language hint (ISO-639-1)
    pub language: Option<String>,
    /// Optional prompt to guide transcription
    pub prompt: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f64>,
}

/// A transcription result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    /// Transcribed text
    #[serde(default)]
    pub text: String,
    /// Detected language, when reported
    #[serde(default)]
    pub language: Option<String>,
    /// Audio duration in seconds, when reported
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Options for speech synthesis
#[derive(Debug, Clone)]
pub struct SpeechParams {
    /// Model override; defaults to [`DEFAULT_TTS_MODEL`]
    pub model: Option<String>,
    /// Voice identifier
    pub voice: String,
    /// Output format; defaults to [`DEFAULT_SPEECH_FORMAT`]
    pub output_format: Option<String>,
    /// Speaking speed multiplier
    pub speed: Option<f64>,
}

impl SpeechParams {
    /// Synthesis options with a voice and defaults elsewhere
    pub fn voice(voice: impl Into<String>) -> Self {
        Self {
            model: None,
            voice: voice.into(),
            output_format: None,
            speed: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    output_format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f64>,
}

impl<'a> SpeechRequest<'a> {
    fn new(input: &'a str, params: &'a SpeechParams) -> Self {
        Self {
            model: params.model.as_deref().unwrap_or(DEFAULT_TTS_MODEL),
            input,
            voice: &params.voice,
            output_format: params
                .output_format
                .as_deref()
                .unwrap_or(DEFAULT_SPEECH_FORMAT),
            speed: params.speed,
        }
    }
}

/// Synthesized audio
#[derive(Debug, Clone)]
pub struct SpeechAudio {
    /// Encoded audio bytes
    pub bytes: Bytes,
    /// Content type reported by the server
    pub content_type: Option<String>,
}

/// An available synthesis voice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    /// Voice identifier
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Language the voice speaks, when reported
    #[serde(default)]
    pub language: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response from the voice listing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceList {
    /// Available voices
    #[serde(default)]
    pub data: Vec<Voice>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn transcription_fields(params: &TranscriptionParams) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        (
            "model",
            params
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_STT_MODEL.to_string()),
        ),
        ("response_format", "verbose_json".to_string()),
    ];
    if let Some(language) = &params.language {
        fields.push(("language", language.clone()));
    }
    if let Some(prompt) = &params.prompt {
        fields.push(("prompt", prompt.clone()));
    }
    if let Some(temperature) = params.temperature {
        fields.push(("temperature", temperature.to_string()));
    }
    fields
}

/// Blocking audio resource, obtained from [`Client::audio`]
pub struct Audio<'a> {
    pub(crate) client: &'a Client,
}

impl Audio<'_> {
    /// Transcribe an audio file
    pub fn transcribe(&self, file: &Path, params: &TranscriptionParams) -> Result<Transcription> {
        let url = join_url(&self.client.config.base_url, "audio/transcriptions")?;
        debug!(%url, file = %file.display(), "POST transcription");

        let mut form = reqwest::blocking::multipart::Form::new().file("file", file)?;
        for (name, value) in transcription_fields(params) {
            form = form.text(name, value);
        }

        let response = self.client.http.post(url).multipart(form).send()?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(error_from_body(status.as_u16(), &text));
        }
        Ok(response.json()?)
    }

    /// Synthesize speech for the given text
    pub fn speech(&self, input: &str, params: &SpeechParams) -> Result<SpeechAudio> {
        let url = join_url(&self.client.config.base_url, "audio/speech")?;
        debug!(%url, "POST speech");

        let response = self
            .client
            .http
            .post(url)
            .json(&SpeechRequest::new(input, params))
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(error_from_body(status.as_u16(), &text));
        }
        let content_type = header_string(response.headers());
        Ok(SpeechAudio {
            bytes: response.bytes()?,
            content_type,
        })
    }

    /// List available synthesis voices
    pub fn voices(&self) -> Result<VoiceList> {
        self.client.get_json("audio/voices")
    }
}

/// Async audio resource, obtained from [`AsyncClient::audio`]
pub struct AsyncAudio<'a> {
    pub(crate) client: &'a AsyncClient,
}

impl AsyncAudio<'_> {
    /// Transcribe an audio file
    pub async fn transcribe(
        &self,
        file: &Path,
        params: &TranscriptionParams,
    ) -> Result<Transcription> {
        let url = join_url(&self.client.config.base_url, "audio/transcriptions")?;
        debug!(%url, file = %file.display(), "POST transcription");

        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let contents = tokio::fs::read(file).await?;
        let part = reqwest::multipart::Part::bytes(contents).file_name(file_name);
        let mut form = reqwest::multipart::Form::new().part("file", part);
        for (name, value) in transcription_fields(params) {
            form = form.text(name, value);
        }

        let response = self.client.http.post(url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_from_body(status.as_u16(), &text));
        }
        Ok(response.json().await?)
    }

    /// Synthesize speech for the given text
    pub async fn speech(&self, input: &str, params: &SpeechParams) -> Result<SpeechAudio> {
        let url = join_url(&self.client.config.base_url, "audio/speech")?;
        debug!(%url, "POST speech");

        let response = self
            .client
            .http
            .post(url)
            .json(&SpeechRequest::new(input, params))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_from_body(status.as_u16(), &text));
        }
        let content_type = header_string(response.headers());
        Ok(SpeechAudio {
            bytes: response.bytes().await?,
            content_type,
        })
    }

    /// List available synthesis voices
    pub async fn voices(&self) -> Result<VoiceList> {
        self.client.get_json("audio/voices").await
    }
}

fn header_string(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transcription_fields_defaults() {
        let fields = transcription_fields(&TranscriptionParams::default());
        assert_eq!(fields[0], ("model", DEFAULT_STT_MODEL.to_string()));
        assert_eq!(fields[1], ("response_format", "verbose_json".to_string()));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_transcription_fields_full() {
        let params = TranscriptionParams {
            model: Some("other-stt".to_string()),
            language: Some("de".to_string()),
            prompt: Some("technical terms".to_string()),
            temperature: Some(0.0),
        };
        let fields = transcription_fields(&params);
        assert_eq!(fields[0], ("model", "other-stt".to_string()));
        assert!(fields.contains(&("language", "de".to_string())));
        assert!(fields.contains(&("prompt", "technical terms".to_string())));
        assert!(fields.contains(&("temperature", "0".to_string())));
    }

    #[test]
    fn test_speech_request_defaults() {
        let params = SpeechParams::voice("ada");
        let request = SpeechRequest::new("hello", &params);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], json!(DEFAULT_TTS_MODEL));
        assert_eq!(value["voice"], json!("ada"));
        assert_eq!(value["output_format"], json!(DEFAULT_SPEECH_FORMAT));
        assert_eq!(value["input"], json!("hello"));
        assert!(value.get("speed").is_none());
    }

    #[test]
    fn test_voice_list_parses_extras() {
        let voices: VoiceList = serde_json::from_value(json!({
            "data": [
                {"id": "ada", "name": "Ada", "language": "en"},
                {"id": "grace", "preview_url": "https://example.test/grace.ogg"}
            ]
        }))
        .unwrap();
        assert_eq!(voices.data.len(), 2);
        assert_eq!(voices.data[1].extra["preview_url"], json!("https://example.test/grace.ogg"));
    }
}
