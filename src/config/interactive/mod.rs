#[cfg(test)]
mod tests;

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, EmbeddingConfig, GenerationConfig, Provider};
use crate::embeddings::{EmbeddingError, check_service};

const PROVIDERS: [Provider; 2] = [Provider::Ollama, Provider::OpenAi];

#[inline]
pub fn run_interactive_config(base_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Report QA Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(base_dir);

    eprintln!("{}", style("Embedding Service").bold().yellow());
    eprintln!("Passages and questions are embedded with this model. Rebuild indexes after changing it.");
    eprintln!();

    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Answer Generation").bold().yellow());
    eprintln!("Chat-completion service used to answer questions from retrieved passages.");
    eprintln!();

    configure_generation(&mut config.generation)?;

    eprintln!();
    eprintln!("{}", style("Testing embedding service...").yellow());

    match test_embedding_connection(&config.embedding) {
        Ok(()) => eprintln!("{}", style("✓ Embedding service reachable!").green()),
        Err(e) => {
            eprintln!(
                "{}",
                style(format!("⚠ Warning: Embedding service check failed: {e}")).yellow()
            );
            eprintln!("You can continue, but fix this before building an index.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config: &Config) {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding:").bold().yellow());
    eprintln!("  Provider: {}", style(config.embedding.provider).cyan());
    match config.embedding.base_url() {
        Ok(url) => eprintln!("  URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());

    eprintln!();
    eprintln!("{}", style("Generation:").bold().yellow());
    eprintln!("  Provider: {}", style(config.generation.provider).cyan());
    eprintln!("  URL: {}", style(&config.generation.base_url).cyan());
    eprintln!("  Model: {}", style(&config.generation.model).cyan());
    eprintln!(
        "  Temperature: {}",
        style(config.generation.temperature).cyan()
    );
    eprintln!("  Domain: {}", style(&config.generation.domain).cyan());

    eprintln!();
    eprintln!("{}", style("Corpus:").bold().yellow());
    eprintln!(
        "  Skipped pages: first {}, last {}",
        style(config.corpus.skip_leading_pages).cyan(),
        style(config.corpus.skip_trailing_pages).cyan()
    );
    eprintln!(
        "  Character chunks: {} (overlap {})",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );
    eprintln!(
        "  Token chunks: {} (overlap ratio {})",
        style(config.chunking.tokens_per_chunk).cyan(),
        style(config.chunking.token_overlap_ratio).cyan()
    );
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
}

fn load_existing_config(base_dir: &Path) -> Config {
    if !base_dir.join("config.toml").exists() {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
    }

    Config::load(base_dir).map_or_else(
        |e| {
            eprintln!(
                "{}",
                style(format!("Existing configuration is invalid ({e:#}). Using defaults.")).yellow()
            );
            Config {
                base_dir: base_dir.to_path_buf(),
                ..Config::default()
            }
        },
        |config| config,
    )
}

fn select_provider(prompt: &str, current: Provider) -> Result<Provider> {
    let labels = PROVIDERS.map(|p| p.to_string());
    let default_index = PROVIDERS.iter().position(|&p| p == current).unwrap_or(0);

    let index = Select::new()
        .with_prompt(prompt)
        .default(default_index)
        .items(&labels)
        .interact()?;

    Ok(PROVIDERS[index])
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let provider = select_provider("Embedding provider", embedding.provider)?;

    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == embedding.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Embedding service protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Embedding service host")
        .default(embedding.host.clone())
        .validate_with(|input: &String| -> Result<(), String> {
            let temp_config = EmbeddingConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..EmbeddingConfig::default()
            };
            temp_config.base_url().map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Embedding service port")
        .default(embedding.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(embedding.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(embedding.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.provider = provider;
    embedding.set_protocol(protocol)?;
    embedding.set_host(host)?;
    embedding.set_port(port)?;
    embedding.set_model(model)?;
    embedding.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_generation(generation: &mut GenerationConfig) -> Result<()> {
    let provider = select_provider("Generation provider", generation.provider)?;

    let base_url: String = Input::new()
        .with_prompt("Generation API base URL")
        .default(generation.base_url.to_string())
        .validate_with(|input: &String| -> Result<(), String> {
            let mut temp_config = GenerationConfig::default();
            temp_config.set_base_url(input).map_err(|e| e.to_string())
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Chat model")
        .default(generation.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let temperature: f32 = Input::new()
        .with_prompt("Sampling temperature")
        .default(generation.temperature)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if (0.0..=2.0).contains(input) {
                Ok(())
            } else {
                Err("Temperature must be between 0.0 and 2.0")
            }
        })
        .interact_text()?;

    let domain: String = Input::new()
        .with_prompt("Subject of the indexed document")
        .default(generation.domain.clone())
        .interact_text()?;

    generation.provider = provider;
    generation.set_base_url(&base_url)?;
    generation.set_model(model)?;
    generation.set_temperature(temperature)?;
    generation.domain = domain;

    Ok(())
}

fn test_embedding_connection(embedding: &EmbeddingConfig) -> Result<(), EmbeddingError> {
    let quick = EmbeddingConfig {
        timeout_seconds: 5,
        retry_attempts: 1,
        ..embedding.clone()
    };
    check_service(&quick)
}
