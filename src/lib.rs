pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod llm;
pub mod prompts;
pub mod storyboard;
pub mod studio;
pub mod utils;
