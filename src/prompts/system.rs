pub const STYLE_ANALYSIS_SYSTEM_PROMPT: &str = r#"You are a fashion stylist and photography director analysing a single reference photo.

Describe the look so that it can be recreated on a different person. Return ONLY a JSON object with exactly these string keys:
{
  "outfitDescription": "every visible garment and accessory, with cut and fit",
  "fabricTexture": "materials and surface texture of the outfit",
  "colorPalette": "dominant and accent colors of the whole image",
  "lightingStyle": "light sources, direction, quality and color temperature",
  "cameraShot": "shot size, camera height and angle",
  "composition": "framing and subject placement",
  "pose": "body position, hands, head tilt and expression",
  "background": "setting and background elements"
}
No markdown, no commentary, no extra keys."#;

pub const STYLE_ANALYSIS_USER_PROMPT: &str =
    "Analyse the outfit, styling and photography of this reference image.";

pub const BLUEPRINT_SYSTEM_PROMPT: &str = r#"You are a film director and cinematographer breaking a story down into a shooting blueprint.

Return ONLY a JSON object with this exact structure:
{
  "title": "string",
  "logline": "one sentence summary",
  "cast_refs": {
    "<Character Name>": { "name": "<Character Name>", "description": "stable visual description: age, build, face, hair, wardrobe" }
  },
  "scenes": [
    {
      "title": "string",
      "location": "string",
      "description": "what happens and what the place looks like",
      "mood": "string",
      "lighting_setup": "string",
      "color_palette": "string",
      "beats": [
        {
          "title": "string",
          "description": "string",
          "shot_recommendations": [
            {
              "shot_type": "e.g. Wide, Medium, Close-up, Over-the-shoulder",
              "caption": "the on-screen action, naming the character exactly as in cast_refs",
              "lens_choice": "e.g. 24mm, 50mm, 85mm",
              "aperture": "e.g. f/2.8",
              "camera_movement": "e.g. Static, Dolly in, Handheld"
            }
          ]
        }
      ]
    }
  ]
}

Rules:
- Every character who appears in a caption must have an entry in cast_refs, keyed by the same name.
- Every shot must have all five fields filled.
- Use 2 to 5 scenes, 1 to 3 beats per scene and 1 to 4 shots per beat.
- No markdown, no commentary."#;

pub const STORY_SYSTEM_PROMPT: &str = "You are a screenwriter. Write a short, vivid, visual story of \
     three to five paragraphs with two or three named characters and at least two distinct locations. \
     Favour concrete actions and images over dialogue. Return plain prose only.";

pub const STORY_DEFAULT_SEED: &str =
    "Write an original short story that would make a striking storyboard.";

pub const IMAGE_GENERATION_INSTRUCTION: &str =
    "Generate an image based on the prompt. CRITICAL: respond with an image, NOT TEXT.";

pub const IMAGE_EDIT_INSTRUCTION: &str =
    "Edit the provided image based on the prompt. CRITICAL: respond with an image, NOT TEXT.";

pub const IMAGE_STYLE_EDIT_INSTRUCTION: &str = "The first image is the subject to edit and the \
     second image is the style reference. Edit the first image based on the prompt. \
     CRITICAL: respond with an image, NOT TEXT.";

pub const FALLBACK_STORY: &str = "The lighthouse keeper, Elena, had not seen a ship in forty days. \
     On the forty-first night a small boat scraped against the rocks below, and a soaked boy named \
     Tomas climbed out clutching a brass compass that pointed only at her.\n\n\
     Elena led him up the spiral stairs to the lamp room, where the great lens threw slow circles of \
     gold across the storm. Tomas set the compass on the iron rail. Its needle trembled, then swung \
     out to sea, toward a second light no chart had ever shown.\n\n\
     At dawn they rowed out together through grey swells. The second light was a drowned village, its \
     bell tower still rising from the water, lanterns burning in every window. Tomas smiled for the \
     first time. \"Home,\" he said, and the compass finally went still.";
