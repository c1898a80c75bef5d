use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Structured cinematographic breakdown of a story. `cast_refs` is required:
/// a reply without it does not deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub logline: String,
    #[serde(alias = "castRefs")]
    pub cast_refs: BTreeMap<String, CastRef>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CastRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mood: String,
    #[serde(default, alias = "lightingSetup")]
    pub lighting_setup: String,
    #[serde(default, alias = "colorPalette")]
    pub color_palette: String,
    #[serde(default)]
    pub beats: Vec<Beat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Beat {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "shotRecommendations")]
    pub shot_recommendations: Vec<Shot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Shot {
    #[serde(default, alias = "shotType")]
    pub shot_type: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default, alias = "lensChoice")]
    pub lens_choice: String,
    #[serde(default)]
    pub aperture: String,
    #[serde(default, alias = "cameraMovement")]
    pub camera_movement: String,
}

/// User edits to a shot. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShotUpdate {
    pub shot_type: Option<String>,
    pub caption: Option<String>,
    pub lens_choice: Option<String>,
    pub aperture: Option<String>,
    pub camera_movement: Option<String>,
}

impl ShotUpdate {
    pub fn is_empty(&self) -> bool {
        self.shot_type.is_none()
            && self.caption.is_none()
            && self.lens_choice.is_none()
            && self.aperture.is_none()
            && self.camera_movement.is_none()
    }

    pub fn apply_to(&self, shot: &mut Shot) {
        if let Some(value) = &self.shot_type {
            shot.shot_type = value.clone();
        }
        if let Some(value) = &self.caption {
            shot.caption = value.clone();
        }
        if let Some(value) = &self.lens_choice {
            shot.lens_choice = value.clone();
        }
        if let Some(value) = &self.aperture {
            shot.aperture = value.clone();
        }
        if let Some(value) = &self.camera_movement {
            shot.camera_movement = value.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub name: String,
    pub description: String,
    pub detailed_description: String,
}

impl CharacterProfile {
    fn from_cast(key: &str, cast: &CastRef) -> Self {
        let name = if cast.name.trim().is_empty() {
            key.to_string()
        } else {
            cast.name.clone()
        };
        CharacterProfile {
            name,
            description: cast.description.clone(),
            detailed_description: cast.description.clone(),
        }
    }
}

/// One profile per `cast_refs` key, keyed identically.
pub fn derive_character_profiles(blueprint: &Blueprint) -> BTreeMap<String, CharacterProfile> {
    blueprint
        .cast_refs
        .iter()
        .map(|(key, cast)| (key.clone(), CharacterProfile::from_cast(key, cast)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStage {
    #[default]
    Script,
    Blueprint,
    Board,
}

impl WorkflowStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            WorkflowStage::Script => "script",
            WorkflowStage::Blueprint => "blueprint",
            WorkflowStage::Board => "board",
        }
    }
}
