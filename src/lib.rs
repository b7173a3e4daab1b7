use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReportQaError>;

#[derive(Error, Debug)]
pub enum ReportQaError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod conversation;
pub mod corpus;
pub mod embeddings;
pub mod engine;
pub mod generation;
pub mod http;
pub mod index;
