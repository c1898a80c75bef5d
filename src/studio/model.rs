use serde::{Deserialize, Serialize};

use crate::llm::media::ImageHandle;

/// What the reference image looks like, as returned by image analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleAttributes {
    pub outfit_description: String,
    pub fabric_texture: String,
    pub color_palette: String,
    pub lighting_style: String,
    pub camera_shot: String,
    pub composition: String,
    pub pose: String,
    pub background: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StudioMode {
    Character,
    Product,
}

impl StudioMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            StudioMode::Character => "character",
            StudioMode::Product => "product",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantResult {
    pub label: String,
    pub image: ImageHandle,
    pub placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantOutcome {
    pub mode: StudioMode,
    pub results: Vec<VariantResult>,
    pub demo_mode: bool,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_attributes_use_camel_case_keys() {
        let json = r#"{
            "outfitDescription": "Oversized camel trench coat",
            "fabricTexture": "Brushed wool",
            "colorPalette": "Warm neutrals",
            "lightingStyle": "Golden hour backlight",
            "cameraShot": "Full body, eye level",
            "composition": "Subject on left third",
            "pose": "Walking toward camera",
            "background": "Paris street"
        }"#;
        let attributes: StyleAttributes = serde_json::from_str(json).unwrap();
        assert_eq!(attributes.fabric_texture, "Brushed wool");
        assert_eq!(attributes.background, "Paris street");
    }

    #[test]
    fn incomplete_attributes_are_rejected() {
        let json = r#"{ "outfitDescription": "Coat" }"#;
        assert!(serde_json::from_str::<StyleAttributes>(json).is_err());
    }
}
