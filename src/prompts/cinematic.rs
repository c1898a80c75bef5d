use std::collections::BTreeMap;

use regex::RegexBuilder;

use crate::storyboard::model::{CharacterProfile, Scene, Shot};

pub const GENERIC_SUBJECT: &str = "A person";

fn mentions_name(caption: &str, name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() {
        return false;
    }
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(name)))
        .case_insensitive(true)
        .build()
        .map(|pattern| pattern.is_match(caption))
        .unwrap_or(false)
}

/// The first profile (in key order) whose name appears as a whole word in the
/// caption.
pub fn find_acting_character<'a>(
    caption: &str,
    profiles: &'a BTreeMap<String, CharacterProfile>,
) -> Option<&'a CharacterProfile> {
    profiles
        .iter()
        .find(|(key, _)| mentions_name(caption, key))
        .map(|(_, profile)| profile)
}

fn push_clause(parts: &mut Vec<String>, label: &str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        parts.push(format!("{label}: {value}"));
    }
}

fn sentence(parts: Vec<String>) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(format!("{}.", parts.join(". ")))
    }
}

/// Builds the image prompt for one storyboard shot. Section order is fixed:
/// global style, subject and action, scene context, cinematography, then
/// lighting and color. Blank fields are left out rather than rendered empty.
pub fn build_cinematic_prompt(
    scene: &Scene,
    shot: &Shot,
    visual_style: &str,
    character_profiles: &BTreeMap<String, CharacterProfile>,
) -> String {
    let mut sections = Vec::new();

    let style = visual_style.trim().trim_end_matches('.');
    if !style.is_empty() {
        sections.push(format!("Global style: {style}."));
    }

    let subject = match find_acting_character(&shot.caption, character_profiles) {
        Some(profile) => {
            let details = if profile.detailed_description.trim().is_empty() {
                profile.description.trim()
            } else {
                profile.detailed_description.trim()
            };
            if details.is_empty() {
                profile.name.clone()
            } else {
                format!("{} ({})", profile.name, details)
            }
        }
        None => GENERIC_SUBJECT.to_string(),
    };
    let action = shot.caption.trim().trim_end_matches('.');
    if action.is_empty() {
        sections.push(format!("Subject: {subject}."));
    } else {
        sections.push(format!("Subject: {subject}. Action: {action}."));
    }

    let mut context = Vec::new();
    push_clause(&mut context, "Location", &scene.location);
    push_clause(&mut context, "Mood", &scene.mood);
    push_clause(&mut context, "Scene", scene.description.trim().trim_end_matches('.'));
    if let Some(text) = sentence(context) {
        sections.push(text);
    }

    let mut camera = Vec::new();
    push_clause(&mut camera, "Shot type", &shot.shot_type);
    push_clause(&mut camera, "Lens", &shot.lens_choice);
    push_clause(&mut camera, "Aperture", &shot.aperture);
    push_clause(&mut camera, "Camera movement", &shot.camera_movement);
    if let Some(text) = sentence(camera) {
        sections.push(text);
    }

    let mut lighting = Vec::new();
    push_clause(&mut lighting, "Lighting", &scene.lighting_setup);
    push_clause(&mut lighting, "Color palette", &scene.color_palette);
    if let Some(text) = sentence(lighting) {
        sections.push(text);
    }

    sections.join("\n")
}
