pub mod gemini;
pub mod media;
pub mod types;

pub use gemini::{GeminiClient, GeminiSettings};
pub use media::{ImageData, ImageHandle};
pub use types::{ContentRequest, ModelBackend, ModelReply, ResponseFormat};
