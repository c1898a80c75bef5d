pub mod cinematic;
pub mod restyle;
pub mod system;

pub use cinematic::{build_cinematic_prompt, find_acting_character};
pub use restyle::{
    build_character_restyle_prompts, build_product_restyle_prompts, CharacterPrompts,
    ProductPrompts,
};
