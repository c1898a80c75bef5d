use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::db::SettingsStore;
use crate::gateway::{AnalysisError, GenerationError, GenerationGateway, ImageRequest};
use crate::llm::media::{ImageData, ImageHandle};
use crate::llm::types::{ContentRequest, ModelBackend, ResponseFormat};
use crate::prompts::system::{
    BLUEPRINT_SYSTEM_PROMPT, FALLBACK_STORY, IMAGE_EDIT_INSTRUCTION,
    IMAGE_GENERATION_INSTRUCTION, IMAGE_STYLE_EDIT_INSTRUCTION, STORY_DEFAULT_SEED,
    STORY_SYSTEM_PROMPT, STYLE_ANALYSIS_SYSTEM_PROMPT, STYLE_ANALYSIS_USER_PROMPT,
};
use crate::storyboard::model::Blueprint;
use crate::studio::model::StyleAttributes;
use crate::utils::text::{strip_code_fences, truncate_for_log};

pub const COUNTER_IMAGE_GENERATIONS: &str = "image_generations";
pub const COUNTER_IMAGE_FAILURES: &str = "image_generation_failures";
pub const COUNTER_IMAGE_ANALYSES: &str = "image_analyses";
pub const COUNTER_STORY_PARSES: &str = "story_parses";
pub const COUNTER_STORY_GENERATIONS: &str = "story_generations";

/// Gateway over any [`ModelBackend`]. Usage counters are written to the
/// optional settings store in the background, so a slow or failing store
/// never delays or changes a result.
pub struct ModelGateway {
    backend: Arc<dyn ModelBackend>,
    image_timeout: Duration,
    telemetry: Option<Arc<dyn SettingsStore>>,
}

impl ModelGateway {
    pub fn new(backend: Arc<dyn ModelBackend>, image_timeout: Duration) -> Self {
        ModelGateway {
            backend,
            image_timeout,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.telemetry = Some(store);
        self
    }

    fn record(&self, counter: &'static str, detail: impl Into<String>) {
        let Some(store) = self.telemetry.clone() else {
            return;
        };
        let detail = detail.into();
        tokio::spawn(async move {
            if let Err(err) = store.increment_counter(counter, 1).await {
                warn!("Failed to increment usage counter {}: {err:#}", counter);
            }
            if let Err(err) = store.log_activity(counter, &detail).await {
                warn!("Failed to log activity {}: {err:#}", counter);
            }
        });
    }

    async fn request_json(&self, request: ContentRequest) -> Result<String, String> {
        let reply = self
            .backend
            .generate_content(request)
            .await
            .map_err(|err| format!("{err:#}"))?;
        let text = reply.text();
        if text.trim().is_empty() {
            return Err("model returned no text".to_string());
        }
        Ok(strip_code_fences(&text).to_string())
    }
}

fn decode_reference(handle: &ImageHandle) -> Result<ImageData, String> {
    handle
        .to_image_data()
        .map_err(|err| format!("unusable reference image: {err}"))
}

#[async_trait]
impl GenerationGateway for ModelGateway {
    async fn analyze_reference_image(
        &self,
        image: &ImageHandle,
    ) -> Result<StyleAttributes, AnalysisError> {
        let image = decode_reference(image).map_err(AnalysisError)?;
        let request = ContentRequest::new(
            "analyze_reference_image",
            STYLE_ANALYSIS_USER_PROMPT,
            ResponseFormat::Json,
        )
        .with_system(STYLE_ANALYSIS_SYSTEM_PROMPT)
        .with_image(image);

        let text = self.request_json(request).await.map_err(AnalysisError)?;
        let attributes = serde_json::from_str::<StyleAttributes>(&text).map_err(|err| {
            AnalysisError(format!(
                "invalid analysis JSON ({err}): {}",
                truncate_for_log(&text, 300)
            ))
        })?;

        self.record(COUNTER_IMAGE_ANALYSES, "reference image analysed");
        Ok(attributes)
    }

    async fn generate_image(&self, request: ImageRequest) -> Result<ImageHandle, GenerationError> {
        let instruction = match &request {
            ImageRequest::TextToImage { .. } => IMAGE_GENERATION_INSTRUCTION,
            ImageRequest::ImageToImage { .. } => IMAGE_EDIT_INSTRUCTION,
            ImageRequest::ImageAndStyleToImage { .. } => IMAGE_STYLE_EDIT_INSTRUCTION,
        };
        let mut content = ContentRequest::new("generate_image", request.prompt(), ResponseFormat::Image)
            .with_system(instruction);
        for reference in request.references() {
            content = content.with_image(decode_reference(reference).map_err(GenerationError::Remote)?);
        }

        let outcome = tokio::time::timeout(self.image_timeout, self.backend.generate_content(content))
            .await;
        let result = match outcome {
            Err(_) => Err(GenerationError::Timeout(self.image_timeout)),
            Ok(Err(err)) => Err(GenerationError::Remote(format!("{err:#}"))),
            Ok(Ok(reply)) => {
                let text = reply.text();
                match reply.into_first_image() {
                    Some(image) => Ok(ImageHandle::from_image(&image)),
                    None if text.is_empty() => {
                        Err(GenerationError::NoImage("empty response".to_string()))
                    }
                    None => Err(GenerationError::NoImage(format!(
                        "model answered with text: {}",
                        truncate_for_log(&text, 200)
                    ))),
                }
            }
        };

        match &result {
            Ok(_) => self.record(COUNTER_IMAGE_GENERATIONS, request.kind()),
            Err(err) => {
                warn!("Image generation ({}) failed: {}", request.kind(), err);
                self.record(COUNTER_IMAGE_FAILURES, err.to_string());
            }
        }
        result
    }

    async fn parse_story_to_blueprint(&self, story: &str) -> Option<Blueprint> {
        let request = ContentRequest::new("parse_story_to_blueprint", story, ResponseFormat::Json)
            .with_system(BLUEPRINT_SYSTEM_PROMPT);

        let text = match self.request_json(request).await {
            Ok(text) => text,
            Err(err) => {
                warn!("Story parsing request failed: {}", err);
                return None;
            }
        };

        match serde_json::from_str::<Blueprint>(&text) {
            Ok(blueprint) => {
                info!(
                    "Parsed blueprint '{}' with {} scene(s) and {} character(s)",
                    blueprint.title,
                    blueprint.scenes.len(),
                    blueprint.cast_refs.len()
                );
                self.record(COUNTER_STORY_PARSES, blueprint.title.as_str());
                Some(blueprint)
            }
            Err(err) => {
                warn!(
                    "Story parsing returned an invalid blueprint ({}): {}",
                    err,
                    truncate_for_log(&text, 300)
                );
                None
            }
        }
    }

    async fn generate_story(&self, seed: Option<&str>) -> String {
        let prompt = seed
            .map(str::trim)
            .filter(|seed| !seed.is_empty())
            .unwrap_or(STORY_DEFAULT_SEED);
        let request = ContentRequest::new("generate_story", prompt, ResponseFormat::Text)
            .with_system(STORY_SYSTEM_PROMPT);

        match self.backend.generate_content(request).await {
            Ok(reply) => {
                let story = reply.text();
                if story.is_empty() {
                    warn!("Story generation returned no text; using fallback story");
                    return FALLBACK_STORY.to_string();
                }
                self.record(COUNTER_STORY_GENERATIONS, "story drafted");
                story
            }
            Err(err) => {
                warn!("Story generation failed: {err:#}; using fallback story");
                FALLBACK_STORY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ModelReply;
    use anyhow::{anyhow, Result};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    enum Scripted {
        Text(&'static str),
        Image,
        Fail,
        Hang,
    }

    struct ScriptedBackend {
        reply: Scripted,
        requests: Mutex<Vec<ContentRequest>>,
    }

    impl ScriptedBackend {
        fn new(reply: Scripted) -> Arc<Self> {
            Arc::new(ScriptedBackend {
                reply,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        fn provider(&self) -> &str {
            "scripted"
        }

        fn model_for(&self, _response: ResponseFormat) -> &str {
            "scripted-model"
        }

        async fn generate_content(&self, request: ContentRequest) -> Result<ModelReply> {
            self.requests.lock().push(request);
            match self.reply {
                Scripted::Text(text) => Ok(ModelReply {
                    texts: vec![text.to_string()],
                    images: Vec::new(),
                }),
                Scripted::Image => Ok(ModelReply {
                    texts: Vec::new(),
                    images: vec![ImageData::new(vec![1, 2, 3], "image/png")],
                }),
                Scripted::Fail => Err(anyhow!("503 Service Unavailable")),
                Scripted::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Err(anyhow!("unreachable"))
                }
            }
        }
    }

    #[derive(Default)]
    struct CountingStore {
        counters: Mutex<HashMap<String, i64>>,
        delay: Option<Duration>,
    }

    impl CountingStore {
        async fn wait_for(&self, name: &str) -> i64 {
            tokio::time::timeout(Duration::from_secs(1), async {
                loop {
                    if let Some(count) = self.counters.lock().get(name) {
                        return *count;
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .unwrap_or(0)
        }
    }

    #[async_trait]
    impl SettingsStore for CountingStore {
        async fn get_setting(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn increment_counter(&self, name: &str, delta: i64) -> Result<()> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            *self.counters.lock().entry(name.to_string()).or_default() += delta;
            Ok(())
        }
    }

    fn gateway(backend: Arc<ScriptedBackend>) -> ModelGateway {
        ModelGateway::new(backend, Duration::from_millis(200))
    }

    fn reference() -> ImageHandle {
        ImageHandle::from_image(&ImageData::new(vec![7; 8], "image/jpeg"))
    }

    const ANALYSIS_JSON: &str = "```json\n{\"outfitDescription\":\"Denim jacket\",\"fabricTexture\":\"Washed denim\",\"colorPalette\":\"Indigo\",\"lightingStyle\":\"Hard sun\",\"cameraShot\":\"Medium\",\"composition\":\"Centered\",\"pose\":\"Leaning\",\"background\":\"Brick wall\"}\n```";

    #[tokio::test]
    async fn analysis_requests_json_with_the_image() {
        let backend = ScriptedBackend::new(Scripted::Text(ANALYSIS_JSON));
        let attributes = gateway(backend.clone())
            .analyze_reference_image(&reference())
            .await
            .unwrap();
        assert_eq!(attributes.outfit_description, "Denim jacket");

        let requests = backend.requests.lock();
        assert_eq!(requests[0].response, ResponseFormat::Json);
        assert_eq!(requests[0].images.len(), 1);
        assert_eq!(requests[0].images[0].mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn analysis_fails_on_error_empty_or_invalid_json() {
        for reply in [Scripted::Fail, Scripted::Text("  "), Scripted::Text("{\"pose\":1}")] {
            let backend = ScriptedBackend::new(reply);
            let result = gateway(backend).analyze_reference_image(&reference()).await;
            assert!(result.is_err());
        }
    }

    #[tokio::test]
    async fn analysis_rejects_non_inline_reference_without_calling_model() {
        let backend = ScriptedBackend::new(Scripted::Text(ANALYSIS_JSON));
        let result = gateway(backend.clone())
            .analyze_reference_image(&ImageHandle::from_url("https://img.test/a.png"))
            .await;
        assert!(result.is_err());
        assert!(backend.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn image_generation_returns_data_uri_and_counts_usage() {
        let backend = ScriptedBackend::new(Scripted::Image);
        let store = Arc::new(CountingStore::default());
        let gateway = gateway(backend.clone()).with_telemetry(store.clone());

        let request = ImageRequest::new("a cat", Some(reference()), Some(reference()));
        let handle = gateway.generate_image(request).await.unwrap();

        assert!(handle.as_str().starts_with("data:image/png;base64,"));
        assert_eq!(backend.requests.lock()[0].images.len(), 2);
        assert_eq!(
            backend.requests.lock()[0].system_instruction.as_deref(),
            Some(IMAGE_STYLE_EDIT_INSTRUCTION)
        );
        assert_eq!(store.wait_for(COUNTER_IMAGE_GENERATIONS).await, 1);
    }

    #[tokio::test]
    async fn slow_usage_store_does_not_delay_image_results() {
        let store = Arc::new(CountingStore {
            delay: Some(Duration::from_secs(30)),
            ..CountingStore::default()
        });
        let working = gateway(ScriptedBackend::new(Scripted::Image)).with_telemetry(store.clone());

        let generated = tokio::time::timeout(
            Duration::from_secs(1),
            working.generate_image(ImageRequest::new("a cat", None, None)),
        )
        .await
        .expect("image result waited on telemetry");
        assert!(generated.is_ok());

        let failing = gateway(ScriptedBackend::new(Scripted::Fail)).with_telemetry(store.clone());
        let failed = tokio::time::timeout(
            Duration::from_secs(1),
            failing.generate_image(ImageRequest::new("a cat", None, None)),
        )
        .await
        .expect("failure result waited on telemetry");
        assert!(matches!(failed, Err(GenerationError::Remote(_))));
        assert!(store.counters.lock().is_empty());
    }

    #[tokio::test]
    async fn text_only_reply_is_a_generation_failure() {
        let backend = ScriptedBackend::new(Scripted::Text("I cannot draw that, but here is a poem"));
        let err = gateway(backend)
            .generate_image(ImageRequest::new("a cat", None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::NoImage(ref text) if text.contains("poem")));
    }

    #[tokio::test]
    async fn remote_error_and_timeout_map_to_generation_errors() {
        let err = gateway(ScriptedBackend::new(Scripted::Fail))
            .generate_image(ImageRequest::new("a cat", None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Remote(_)));

        let err = gateway(ScriptedBackend::new(Scripted::Hang))
            .generate_image(ImageRequest::new("a cat", None, None))
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::Timeout(Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn blueprint_parsing_strips_fences_and_returns_none_on_failure() {
        let fenced = "```json\n{\"title\":\"T\",\"cast_refs\":{},\"scenes\":[]}\n```";
        let parsed = gateway(ScriptedBackend::new(Scripted::Text(fenced)))
            .parse_story_to_blueprint("story")
            .await;
        assert_eq!(parsed.map(|blueprint| blueprint.title), Some("T".to_string()));

        let missing_cast = "{\"title\":\"T\",\"scenes\":[]}";
        assert!(gateway(ScriptedBackend::new(Scripted::Text(missing_cast)))
            .parse_story_to_blueprint("story")
            .await
            .is_none());
        assert!(gateway(ScriptedBackend::new(Scripted::Fail))
            .parse_story_to_blueprint("story")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn story_generation_never_fails() {
        let backend = ScriptedBackend::new(Scripted::Fail);
        let story = gateway(backend.clone()).generate_story(Some("  ")).await;
        assert_eq!(story, FALLBACK_STORY);
        assert_eq!(backend.requests.lock()[0].prompt, STORY_DEFAULT_SEED);

        let story = gateway(ScriptedBackend::new(Scripted::Text("Once upon a time")))
            .generate_story(Some("a heist"))
            .await;
        assert_eq!(story, "Once upon a time");
    }
}
