//! Provisioning service access.
//!
//! The console never implements cluster lifecycle itself; every read and
//! write goes through a [`ProvisionBackend`].

#[cfg(test)]
pub(crate) mod fake;
mod http;

pub use http::HttpBackend;

use crate::model::{NewProvision, ProvisionEdit, ProvisionEntity};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("server responded with status {status}{}", message_suffix(.message))]
    Server {
        status: u16,
        message: Option<String>,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

impl BackendError {
    /// Message supplied by the server in its error body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            BackendError::Server { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

#[async_trait]
pub trait ProvisionBackend: Send + Sync {
    /// Fetch all provisions, or only the one with `filter_id`.
    async fn load_entities(
        &self,
        filter_id: Option<&str>,
    ) -> Result<Vec<ProvisionEntity>, BackendError>;

    async fn remove_entity(&self, id: &str) -> Result<(), BackendError>;

    async fn edit_entity(&self, data: &ProvisionEdit) -> Result<(), BackendError>;

    async fn create_entity(&self, data: &NewProvision) -> Result<(), BackendError>;
}
