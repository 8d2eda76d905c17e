use thiserror::Error;

use crate::prompts::{COMMUNICATION_FAILURE, CONNECTION_INTERRUPTED};

/// Fatal problems found while building the widget. Nothing is operational
/// until these are fixed.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("API Key não configurada. Defina `api_key` no arquivo de configuração ou a variável API_KEY.")]
    MissingApiKey,

    #[error("invalid configuration value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file {path}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    ParseFile {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

/// A completion call that did not produce a reply.
///
/// The message is always safe to show to the end user; provider details are
/// logged where the failure happens and never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CommunicationError {
    message: String,
}

impl CommunicationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The single failure every backend error collapses into.
    pub fn generic() -> Self {
        Self::new(COMMUNICATION_FAILURE)
    }

    /// A failure with nothing to report, e.g. the completion task vanished.
    pub fn interrupted() -> Self {
        Self::new(String::new())
    }

    /// Text for the inline error slot. Blank messages fall back to
    /// "Conexão interrompida.".
    pub fn user_message(&self) -> String {
        if self.message.trim().is_empty() {
            CONNECTION_INTERRUPTED.to_string()
        } else {
            self.message.clone()
        }
    }
}

pub type CompletionResult = Result<String, CommunicationError>;
