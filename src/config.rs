//! Server configuration, loaded from the environment

use anyhow::Context;

use crate::transfer::{DEFAULT_CHUNK_SEPARATOR, DEFAULT_COPY_BUFFER_SIZE};

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Separator between file name and chunk index on disk
    pub chunk_separator: String,

    /// Intermediate buffer size for range downloads, in bytes
    pub copy_buffer_size: usize,
}

impl Config {
    /// Load configuration from the environment. Missing variables fall back
    /// to defaults; present-but-invalid values are errors.
    pub fn from_env() -> anyhow::Result<Self> {
        let port = match std::env::var("FERRY_PORT") {
            Ok(value) => value.parse().context("invalid FERRY_PORT")?,
            Err(_) => DEFAULT_PORT,
        };

        let chunk_separator = std::env::var("FERRY_CHUNK_SEPARATOR")
            .unwrap_or_else(|_| DEFAULT_CHUNK_SEPARATOR.to_string());
        if chunk_separator.is_empty() {
            anyhow::bail!("FERRY_CHUNK_SEPARATOR must not be empty");
        }

        let copy_buffer_size = match std::env::var("FERRY_COPY_BUFFER_SIZE") {
            Ok(value) => {
                let size: usize = value.parse().context("invalid FERRY_COPY_BUFFER_SIZE")?;
                if size == 0 {
                    anyhow::bail!("FERRY_COPY_BUFFER_SIZE must be positive");
                }
                size
            }
            Err(_) => DEFAULT_COPY_BUFFER_SIZE,
        };

        Ok(Self {
            server: ServerConfig { port },
            transfer: TransferConfig {
                chunk_separator,
                copy_buffer_size,
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig { port: DEFAULT_PORT },
            transfer: TransferConfig {
                chunk_separator: DEFAULT_CHUNK_SEPARATOR.to_string(),
                copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
            },
        }
    }
}
