//! The only layer that talks to the generative model. Each operation keeps
//! its own failure contract: analysis and image generation return typed
//! errors, story parsing returns `None`, and story drafting never fails.

pub mod remote;

use std::time::Duration;

use async_trait::async_trait;

use crate::llm::media::ImageHandle;
use crate::storyboard::model::Blueprint;
use crate::studio::model::StyleAttributes;

pub use remote::ModelGateway;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Reference image analysis failed: {0}")]
pub struct AnalysisError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("Image generation failed: {0}")]
    Remote(String),
    #[error("Image generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("No image returned by the model: {0}")]
    NoImage(String),
}

/// What the image model is asked to do, by the inputs it is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRequest {
    TextToImage {
        prompt: String,
    },
    ImageToImage {
        prompt: String,
        base: ImageHandle,
    },
    ImageAndStyleToImage {
        prompt: String,
        base: ImageHandle,
        style: ImageHandle,
    },
}

impl ImageRequest {
    /// A style image without a base image becomes the only reference.
    pub fn new(
        prompt: impl Into<String>,
        base: Option<ImageHandle>,
        style: Option<ImageHandle>,
    ) -> Self {
        let prompt = prompt.into();
        match (base, style) {
            (None, None) => ImageRequest::TextToImage { prompt },
            (Some(base), None) | (None, Some(base)) => ImageRequest::ImageToImage { prompt, base },
            (Some(base), Some(style)) => ImageRequest::ImageAndStyleToImage {
                prompt,
                base,
                style,
            },
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            ImageRequest::TextToImage { prompt }
            | ImageRequest::ImageToImage { prompt, .. }
            | ImageRequest::ImageAndStyleToImage { prompt, .. } => prompt,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            ImageRequest::TextToImage { .. } => "text_to_image",
            ImageRequest::ImageToImage { .. } => "image_to_image",
            ImageRequest::ImageAndStyleToImage { .. } => "image_and_style_to_image",
        }
    }

    /// Reference images in the order they are sent: base first, then style.
    pub fn references(&self) -> Vec<&ImageHandle> {
        match self {
            ImageRequest::TextToImage { .. } => Vec::new(),
            ImageRequest::ImageToImage { base, .. } => vec![base],
            ImageRequest::ImageAndStyleToImage { base, style, .. } => vec![base, style],
        }
    }
}

#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn analyze_reference_image(
        &self,
        image: &ImageHandle,
    ) -> Result<StyleAttributes, AnalysisError>;

    async fn generate_image(&self, request: ImageRequest) -> Result<ImageHandle, GenerationError>;

    async fn parse_story_to_blueprint(&self, story: &str) -> Option<Blueprint>;

    async fn generate_story(&self, seed: Option<&str>) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(name: &str) -> ImageHandle {
        ImageHandle::from_url(format!("https://img.test/{name}"))
    }

    #[test]
    fn optional_inputs_map_to_tagged_variants() {
        assert_eq!(ImageRequest::new("p", None, None).kind(), "text_to_image");
        assert_eq!(
            ImageRequest::new("p", Some(handle("base")), None).kind(),
            "image_to_image"
        );
        let styled = ImageRequest::new("p", Some(handle("base")), Some(handle("style")));
        assert_eq!(styled.kind(), "image_and_style_to_image");
        assert_eq!(styled.references(), vec![&handle("base"), &handle("style")]);
    }

    #[test]
    fn lone_style_image_becomes_the_reference() {
        let request = ImageRequest::new("p", None, Some(handle("style")));
        assert_eq!(
            request,
            ImageRequest::ImageToImage {
                prompt: "p".into(),
                base: handle("style")
            }
        );
        assert_eq!(request.prompt(), "p");
    }
}
