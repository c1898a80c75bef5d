use anyhow::Result;
use async_trait::async_trait;

use crate::llm::media::ImageData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
    Image,
}

impl ResponseFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            ResponseFormat::Text => "text",
            ResponseFormat::Json => "json",
            ResponseFormat::Image => "image",
        }
    }
}

/// One single-turn request to the generative model. Reference images are
/// sent after the prompt text, in order.
#[derive(Debug, Clone)]
pub struct ContentRequest {
    pub operation: &'static str,
    pub system_instruction: Option<String>,
    pub prompt: String,
    pub images: Vec<ImageData>,
    pub response: ResponseFormat,
}

impl ContentRequest {
    pub fn new(operation: &'static str, prompt: impl Into<String>, response: ResponseFormat) -> Self {
        ContentRequest {
            operation,
            system_instruction: None,
            prompt: prompt.into(),
            images: Vec::new(),
            response,
        }
    }

    pub fn with_system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_image(mut self, image: ImageData) -> Self {
        self.images.push(image);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub texts: Vec<String>,
    pub images: Vec<ImageData>,
}

impl ModelReply {
    pub fn text(&self) -> String {
        self.texts
            .iter()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn into_first_image(self) -> Option<ImageData> {
        self.images.into_iter().next()
    }
}

#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn provider(&self) -> &str;

    fn model_for(&self, response: ResponseFormat) -> &str;

    async fn generate_content(&self, request: ContentRequest) -> Result<ModelReply>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_text_skips_blank_parts() {
        let reply = ModelReply {
            texts: vec!["  first ".into(), "   ".into(), "second".into()],
            images: Vec::new(),
        };
        assert_eq!(reply.text(), "first\nsecond");
    }

    #[test]
    fn builder_keeps_image_order() {
        let request = ContentRequest::new("op", "prompt", ResponseFormat::Image)
            .with_system("sys")
            .with_image(ImageData::new(vec![1], "image/png"))
            .with_image(ImageData::new(vec![2], "image/jpeg"));
        assert_eq!(request.system_instruction.as_deref(), Some("sys"));
        assert_eq!(request.images[0].bytes, vec![1]);
        assert_eq!(request.images[1].mime_type, "image/jpeg");
    }
}
