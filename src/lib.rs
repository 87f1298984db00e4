pub mod audio;
pub mod config;

pub use audio::{EngineError, RenderEngine};
pub use config::EngineConfig;
