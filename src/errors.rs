// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SuiterunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Environment already active: {0}")]
    EnvironmentAlreadyActive(String),

    #[error("Worker fault in environment '{environment}': {cause}")]
    WorkerFault { environment: String, cause: String },

    #[error("Worker protocol violation: {0}")]
    ProtocolViolation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SuiterunError>;
