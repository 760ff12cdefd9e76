use crate::domain::error::{AppError, Result};
use keyring::Entry;
use tracing::debug;

/// Secrets kept in the OS credential store under one service name.
pub struct SecretStore {
    service: String,
}

impl SecretStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    pub fn get_secret(&self, key: &str) -> Result<String> {
        let entry = Entry::new(&self.service, key)
            .map_err(|e| AppError::ConfigError(format!("Failed to create entry: {}", e)))?;

        entry
            .get_password()
            .map_err(|e| AppError::ConfigError(format!("Failed to get password: {}", e)))
    }

    /// Like `get_secret`, but a missing or blank entry is simply `None`.
    pub fn lookup(&self, key: &str) -> Option<String> {
        match self.get_secret(key) {
            Ok(secret) if !secret.trim().is_empty() => Some(secret),
            Ok(_) => None,
            Err(e) => {
                debug!(service = %self.service, key, error = %e, "No keyring secret");
                None
            }
        }
    }
}
