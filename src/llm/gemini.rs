use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::llm::media::ImageData;
use crate::llm::types::{ContentRequest, ModelBackend, ModelReply, ResponseFormat};
use crate::utils::http::build_http_client;
use crate::utils::text::truncate_for_log;
use crate::utils::timing::log_llm_timing;

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    pub temperature: f32,
    pub http_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

pub struct GeminiClient {
    settings: GeminiSettings,
    client: Client,
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings) -> Self {
        let client = build_http_client(settings.http_timeout);
        GeminiClient { settings, client }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.api_base.trim_end_matches('/'),
            model.trim()
        )
    }

    fn redact(&self, text: &str) -> String {
        let key = self.settings.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    fn build_payload(&self, request: &ContentRequest) -> Value {
        let mut payload = json!({
            "contents": [{ "role": "user", "parts": build_gemini_parts(&request.prompt, &request.images) }],
            "generationConfig": build_generation_config(request.response, self.settings.temperature),
            "safetySettings": build_safety_settings(),
        });
        if let Some(system) = request.system_instruction.as_deref() {
            payload["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        payload
    }

    async fn call_gemini_api(&self, model: &str, payload: Value) -> Result<GeminiResponse> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            let payload_summary = summarize_gemini_payload(&payload);
            debug!(target: "llm.gemini", model = model, payload = %payload_summary);
        }

        let response = match self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", self.settings.api_key.trim())
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let err_text = self.redact(&err.to_string());
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={}, status={:?})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect(),
                    err.status()
                );
                return Err(anyhow!("Gemini request failed: {}", err_text));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            let detail = self.redact(&message.unwrap_or(body_summary));
            return Err(anyhow!(
                "Gemini request failed with status {}: {}",
                status,
                detail
            ));
        }

        let value = response.json::<GeminiResponse>().await?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let response_summary = summarize_gemini_response(&value);
            debug!(target: "llm.gemini", model = model, response = %response_summary);
        }
        Ok(value)
    }
}

#[async_trait]
impl ModelBackend for GeminiClient {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn model_for(&self, response: ResponseFormat) -> &str {
        match response {
            ResponseFormat::Image => &self.settings.image_model,
            ResponseFormat::Text | ResponseFormat::Json => &self.settings.text_model,
        }
    }

    async fn generate_content(&self, request: ContentRequest) -> Result<ModelReply> {
        let model = self.model_for(request.response).to_string();
        let payload = self.build_payload(&request);
        let metadata = json!({
            "response": request.response.as_str(),
            "images": request.images.len(),
        });

        let call_model = model.clone();
        log_llm_timing(self.provider(), &model, request.operation, Some(metadata), || async move {
            let response = self.call_gemini_api(&call_model, payload).await?;
            Ok::<_, anyhow::Error>(extract_reply(response))
        })
        .await
    }
}

fn build_safety_settings() -> Vec<Value> {
    let threshold = "BLOCK_ONLY_HIGH";
    vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
    ]
}

fn build_generation_config(response: ResponseFormat, temperature: f32) -> Value {
    let mut config = Map::new();
    config.insert("temperature".to_string(), json!(temperature));
    match response {
        ResponseFormat::Text => {}
        ResponseFormat::Json => {
            config.insert("responseMimeType".to_string(), json!("application/json"));
        }
        ResponseFormat::Image => {
            config.insert("responseModalities".to_string(), json!(["TEXT", "IMAGE"]));
        }
    }
    Value::Object(config)
}

fn build_gemini_parts(prompt: &str, images: &[ImageData]) -> Vec<Value> {
    let mut parts = vec![json!({ "text": prompt })];
    for image in images {
        parts.push(json!({
            "inlineData": {
                "mimeType": image.mime_type,
                "data": image.to_base64()
            }
        }));
    }
    parts
}

fn summarize_gemini_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_gemini_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if let Some(system) = payload
        .pointer("/systemInstruction/parts/0/text")
        .and_then(|value| value.as_str())
    {
        summary.insert(
            "systemInstruction".to_string(),
            json!(truncate_for_log(system, 120)),
        );
    }

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let summarized_contents: Vec<Value> = contents
            .iter()
            .map(|content| {
                let parts = content
                    .get("parts")
                    .and_then(|value| value.as_array())
                    .map(|parts| summarize_gemini_parts(parts))
                    .unwrap_or_default();
                json!({ "parts": parts })
            })
            .collect();
        summary.insert("contents".to_string(), Value::Array(summarized_contents));
    }

    if let Some(config) = payload.get("generationConfig") {
        summary.insert("generationConfig".to_string(), config.clone());
    }

    Value::Object(summary)
}

fn summarize_gemini_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut image_parts = 0usize;
    let mut text_preview = None;

    let candidates = response.candidates.as_deref().unwrap_or(&[]);
    for candidate in candidates {
        let parts = candidate
            .content
            .as_ref()
            .and_then(|content| content.parts.as_deref())
            .unwrap_or(&[]);
        for part in parts {
            match part {
                GeminiPart::Text { text } => {
                    text_parts += 1;
                    if text_preview.is_none() && !text.trim().is_empty() {
                        text_preview = Some(truncate_for_log(text, 200));
                    }
                }
                GeminiPart::InlineData { inline_data } => {
                    if inline_data.mime_type.starts_with("image/") {
                        image_parts += 1;
                    }
                }
            }
        }
    }

    json!({
        "candidates": candidates.len(),
        "finishReason": candidates.first().and_then(|c| c.finish_reason.clone()),
        "textParts": text_parts,
        "imageParts": image_parts,
        "textPreview": text_preview
    })
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn extract_reply(response: GeminiResponse) -> ModelReply {
    let mut reply = ModelReply::default();
    for candidate in response.candidates.unwrap_or_default() {
        let parts = candidate
            .content
            .and_then(|content| content.parts)
            .unwrap_or_default();
        for part in parts {
            match part {
                GeminiPart::Text { text } => {
                    if !text.trim().is_empty() {
                        reply.texts.push(text);
                    }
                }
                GeminiPart::InlineData { inline_data } => {
                    if !inline_data.mime_type.starts_with("image/") {
                        continue;
                    }
                    match ImageData::from_base64(&inline_data.mime_type, &inline_data.data) {
                        Ok(image) => reply.images.push(image),
                        Err(err) => warn!("Dropping undecodable Gemini image part: {err}"),
                    }
                }
            }
        }
    }
    reply
}
