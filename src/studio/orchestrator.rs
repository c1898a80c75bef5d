use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{Notice, StudioError};
use crate::gateway::{GenerationGateway, ImageRequest};
use crate::llm::media::ImageHandle;
use crate::prompts::{build_character_restyle_prompts, build_product_restyle_prompts};
use crate::studio::model::{StudioMode, VariantOutcome, VariantResult};

pub const CHARACTER_PLACEHOLDERS: [(&str, &str); 4] = [
    ("New outfit", "https://placehold.co/768x1024/png?text=Character+look+1"),
    ("New outfit (alternate take)", "https://placehold.co/768x1024/png?text=Character+look+2"),
    ("Original outfit", "https://placehold.co/768x1024/png?text=Character+look+3"),
    ("Editorial pose", "https://placehold.co/768x1024/png?text=Character+look+4"),
];

pub const PRODUCT_PLACEHOLDERS: [(&str, &str); 4] = [
    ("Front", "https://placehold.co/1024x1024/png?text=Product+front"),
    ("Angled", "https://placehold.co/1024x1024/png?text=Product+angled"),
    ("Macro detail", "https://placehold.co/1024x1024/png?text=Product+macro"),
    ("Lifestyle", "https://placehold.co/1024x1024/png?text=Product+lifestyle"),
];

const PRODUCT_PHOTO_REF: &str = "Image 1 (the product photo)";
const STYLE_PHOTO_REF: &str = "Image 2 (the style reference)";

#[derive(Debug, Clone, Default)]
pub struct StudioState {
    pub is_generating: bool,
    pub outcome: Option<VariantOutcome>,
    pub notice: Option<Notice>,
}

/// Clears `is_generating` when a run ends, including when its future is
/// dropped before completion.
struct GeneratingGuard<'a> {
    state: &'a Mutex<StudioState>,
}

impl Drop for GeneratingGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().is_generating = false;
    }
}

/// Image Studio: four restyled variants of a subject or product photo.
pub struct StudioOrchestrator {
    gateway: Arc<dyn GenerationGateway>,
    state: Mutex<StudioState>,
}

fn placeholders(mode: StudioMode) -> Vec<VariantResult> {
    let set = match mode {
        StudioMode::Character => &CHARACTER_PLACEHOLDERS,
        StudioMode::Product => &PRODUCT_PLACEHOLDERS,
    };
    set.iter()
        .map(|(label, url)| VariantResult {
            label: (*label).to_string(),
            image: ImageHandle::from_url(*url),
            placeholder: true,
        })
        .collect()
}

impl StudioOrchestrator {
    pub fn new(gateway: Arc<dyn GenerationGateway>) -> Self {
        StudioOrchestrator {
            gateway,
            state: Mutex::new(StudioState::default()),
        }
    }

    pub fn snapshot(&self) -> StudioState {
        self.state.lock().clone()
    }

    fn reject(&self, message: &str) -> StudioError {
        self.state.lock().notice = Some(Notice::error(message));
        StudioError::Validation(message.to_string())
    }

    fn begin(&self) -> Result<GeneratingGuard<'_>, StudioError> {
        let mut state = self.state.lock();
        if state.is_generating {
            return Err(StudioError::Validation(
                "A generation is already running".to_string(),
            ));
        }
        state.is_generating = true;
        state.notice = None;
        Ok(GeneratingGuard { state: &self.state })
    }

    pub async fn generate_character_variants(
        &self,
        reference: Option<&ImageHandle>,
        subject: Option<&ImageHandle>,
    ) -> Result<VariantOutcome, StudioError> {
        let (Some(reference), Some(subject)) = (reference, subject) else {
            return Err(self.reject(
                "Upload both a style reference and a photo of the subject to continue.",
            ));
        };
        let _generating = self.begin()?;

        let attributes = match self.gateway.analyze_reference_image(reference).await {
            Ok(attributes) => attributes,
            Err(err) => {
                warn!("Character variants aborted: {}", err);
                self.state.lock().notice = Some(Notice::error(
                    "The reference image could not be analysed. Try a different reference photo.",
                ));
                return Err(err.into());
            }
        };

        let prompts = build_character_restyle_prompts(&attributes);
        let requests = prompts
            .labeled()
            .into_iter()
            .map(|(label, prompt)| {
                (
                    label,
                    ImageRequest::new(prompt, Some(subject.clone()), None),
                )
            })
            .collect();
        Ok(self.fan_out(StudioMode::Character, requests).await)
    }

    pub async fn generate_product_variants(
        &self,
        style_reference: Option<&ImageHandle>,
        product: Option<&ImageHandle>,
    ) -> Result<VariantOutcome, StudioError> {
        let (Some(style_reference), Some(product)) = (style_reference, product) else {
            return Err(self.reject(
                "Upload both a style reference and a product photo to continue.",
            ));
        };
        let _generating = self.begin()?;

        let prompts = build_product_restyle_prompts(PRODUCT_PHOTO_REF, STYLE_PHOTO_REF);
        let requests = prompts
            .labeled()
            .into_iter()
            .map(|(label, prompt)| {
                (
                    label,
                    ImageRequest::new(
                        prompt,
                        Some(product.clone()),
                        Some(style_reference.clone()),
                    ),
                )
            })
            .collect();
        Ok(self.fan_out(StudioMode::Product, requests).await)
    }

    async fn fan_out(
        &self,
        mode: StudioMode,
        requests: Vec<(&'static str, ImageRequest)>,
    ) -> VariantOutcome {
        let requested = requests.len();
        let results = join_all(requests.into_iter().map(|(label, request)| async move {
            match self.gateway.generate_image(request).await {
                Ok(image) => Some(VariantResult {
                    label: label.to_string(),
                    image,
                    placeholder: false,
                }),
                Err(err) => {
                    warn!("{} variant '{}' failed: {}", mode.as_str(), label, err);
                    None
                }
            }
        }))
        .await;

        let successes: Vec<VariantResult> = results.into_iter().flatten().collect();
        let failed = requested - successes.len();
        let outcome = if successes.is_empty() {
            VariantOutcome {
                mode,
                results: placeholders(mode),
                demo_mode: true,
                failed,
            }
        } else {
            VariantOutcome {
                mode,
                results: successes,
                demo_mode: false,
                failed,
            }
        };
        info!(
            "{} variants finished: {} generated, {} failed, demo_mode={}",
            mode.as_str(),
            requested - failed,
            failed,
            outcome.demo_mode
        );

        let mut state = self.state.lock();
        state.notice = outcome.demo_mode.then(|| {
            Notice::demo_mode(
                "Image generation is unavailable right now, showing sample images instead.",
            )
        });
        state.outcome = Some(outcome.clone());
        outcome
    }
}
