//! Startup configuration loaded from the environment.
//!
//! Credentials are required and checked once at boot; everything else
//! falls back to a sensible default. Heuristic tuning values live on
//! the per-component config structs, not here.

use std::env;
use std::path::PathBuf;

use crate::core::errors::ApiError;

/// Environment-driven settings for the backend.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Pinecone API key (`PINECONE_API_KEY`, required).
    pub pinecone_api_key: String,
    /// Pinecone index host, e.g. `crystallure-xxxx.svc.pinecone.io`
    /// (`PINECONE_INDEX_HOST`, required).
    pub pinecone_index_host: String,
    /// Logical partition within the index (`PINECONE_NAMESPACE`).
    pub pinecone_namespace: String,
    /// Groq API key (`GROQ_API_KEY`, required).
    pub groq_api_key: String,
    /// Completion model id (`GROQ_MODEL`).
    pub groq_model: String,
    /// HTTP listen port (`PORT`, 0 = ephemeral).
    pub port: u16,
    /// Directory for rolling log files (`LOG_DIR`).
    pub log_dir: PathBuf,
}

impl Settings {
    /// Reads settings from the environment.
    ///
    /// Missing credentials are a fatal startup error; there is no
    /// degraded mode without index and model access.
    pub fn from_env() -> Result<Self, ApiError> {
        let pinecone_api_key = require("PINECONE_API_KEY")?;
        let pinecone_index_host = require("PINECONE_INDEX_HOST")?;
        let groq_api_key = require("GROQ_API_KEY")?;

        let pinecone_namespace =
            env::var("PINECONE_NAMESPACE").unwrap_or_else(|_| "ns1".to_string());
        let groq_model =
            env::var("GROQ_MODEL").unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|val| val.parse::<u16>().ok())
            .unwrap_or(0);
        let log_dir = env::var("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("logs"));

        Ok(Self {
            pinecone_api_key,
            pinecone_index_host,
            pinecone_namespace,
            groq_api_key,
            groq_model,
            port,
            log_dir,
        })
    }
}

fn require(name: &str) -> Result<String, ApiError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::Configuration(format!(
            "missing required environment variable {}",
            name
        ))),
    }
}
