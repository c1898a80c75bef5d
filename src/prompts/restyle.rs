use crate::studio::model::StyleAttributes;

pub const IDENTITY_LOCK: &str = "CRITICAL: Preserve the person's identity exactly. Keep the same face, \
     facial features, skin tone, hairstyle, age and body proportions as in the provided photo. \
     Do not beautify, replace or blend the face with anyone else.";

pub const DYNAMIC_EDITORIAL_POSE: &str = "a dynamic editorial fashion pose with confident body \
     language, weight shifted onto one leg, one hand in motion and the gaze just off camera";

const PRODUCT_LOCK: &str = "Keep the product exactly as it is: same shape, proportions, materials, \
     colors, label, logo and typography. Do not redesign or restyle the product itself.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterPrompts {
    pub variant1: String,
    pub variant2: String,
    pub variant3: String,
    pub variant4: String,
}

impl CharacterPrompts {
    pub fn labeled(&self) -> [(&'static str, &str); 4] {
        [
            ("New outfit", self.variant1.as_str()),
            ("New outfit (alternate take)", self.variant2.as_str()),
            ("Original outfit", self.variant3.as_str()),
            ("Editorial pose", self.variant4.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPrompts {
    pub front: String,
    pub angled: String,
    pub macro_detail: String,
    pub lifestyle: String,
}

impl ProductPrompts {
    pub fn labeled(&self) -> [(&'static str, &str); 4] {
        [
            ("Front", self.front.as_str()),
            ("Angled", self.angled.as_str()),
            ("Macro detail", self.macro_detail.as_str()),
            ("Lifestyle", self.lifestyle.as_str()),
        ]
    }
}

enum Outfit {
    FromReference,
    Original,
}

fn character_prompt(attributes: &StyleAttributes, outfit: Outfit, pose: &str) -> String {
    let wardrobe = match outfit {
        Outfit::FromReference => format!(
            "Dress the person from the provided photo in this outfit: {}. Fabric and texture: {}.",
            attributes.outfit_description.trim(),
            attributes.fabric_texture.trim()
        ),
        Outfit::Original => {
            "Keep the person's original outfit from the provided photo unchanged.".to_string()
        }
    };

    format!(
        "Create a new photorealistic fashion photograph of the person in the provided photo.\n\
         {wardrobe}\n\
         Pose: {pose}.\n\
         Camera: {camera}. Composition: {composition}.\n\
         Lighting: {lighting}. Color palette: {palette}.\n\
         Background: {background}.\n\
         {IDENTITY_LOCK}",
        pose = pose.trim(),
        camera = attributes.camera_shot.trim(),
        composition = attributes.composition.trim(),
        lighting = attributes.lighting_style.trim(),
        palette = attributes.color_palette.trim(),
        background = attributes.background.trim(),
    )
}

/// Four restyle instructions from one analysis. The first two are identical
/// on purpose: the model is non-deterministic, so the same instruction is
/// requested twice for two different takes.
pub fn build_character_restyle_prompts(attributes: &StyleAttributes) -> CharacterPrompts {
    let new_outfit = character_prompt(
        attributes,
        Outfit::FromReference,
        &attributes.pose,
    );
    CharacterPrompts {
        variant2: new_outfit.clone(),
        variant1: new_outfit,
        variant3: character_prompt(attributes, Outfit::Original, &attributes.pose),
        variant4: character_prompt(
            attributes,
            Outfit::FromReference,
            DYNAMIC_EDITORIAL_POSE,
        ),
    }
}

fn product_prompt(product_ref: &str, style_ref: &str, angle: &str) -> String {
    format!(
        "Re-shoot the product shown in {product_ref} as a professional commercial photograph \
         placed inside the scene of {style_ref}. Match the environment, props, lighting direction, \
         color grade and mood of {style_ref}.\n\
         Camera angle: {angle}.\n\
         {PRODUCT_LOCK}\n\
         Photorealistic, sharp focus on the product, natural shadows and reflections."
    )
}

pub fn build_product_restyle_prompts(product_ref: &str, style_ref: &str) -> ProductPrompts {
    ProductPrompts {
        front: product_prompt(
            product_ref,
            style_ref,
            "straight-on front view at eye level, product centered",
        ),
        angled: product_prompt(
            product_ref,
            style_ref,
            "three-quarter view from slightly above, showing the front and one side",
        ),
        macro_detail: product_prompt(
            product_ref,
            style_ref,
            "extreme close-up macro shot of the product's surface, texture and finish, shallow depth of field",
        ),
        lifestyle: format!(
            "Create a lifestyle photograph in which the product shown in {product_ref} is used or \
             displayed naturally by people in an everyday setting inspired by {style_ref}. \
             Borrow the color grade and lighting of {style_ref}; the product stays clearly visible \
             and in focus.\n\
             {PRODUCT_LOCK}\n\
             Candid, editorial, photorealistic."
        ),
    }
}
