// Configuration management module
// TOML settings for the embedding and generation services, chunking and retrieval

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{Config, ConfigError, EmbeddingConfig, GenerationConfig, Provider};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
