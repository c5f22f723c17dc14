//! The Service Directory port.
//!
//! The directory owns service registration: identifier, shared secret,
//! provider kind, disabled flag, and the delivered-message counter. All of
//! that lifecycle lives outside this process — the relay only reads a
//! snapshot per request and bumps the counter on success.
//!
//! [`StaticDirectory`] is the shipped implementation: an in-memory registry
//! loaded once at startup from a TOML file. Tests use it directly.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::types::{ServiceCredential, ServiceId};

/// Errors from directory lookups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    /// No service is registered under the identifier.
    #[error("service not found: {0}")]
    NotFound(ServiceId),
}

/// Read access to registered services, plus the delivered counter.
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// Resolves a service identifier to its credential snapshot.
    ///
    /// Disabled services are still returned; refusing them is the
    /// orchestrator's job, so the refusal is visible in the pipeline rather
    /// than buried in a lookup.
    async fn lookup(&self, id: &ServiceId) -> Result<ServiceCredential, DirectoryError>;

    /// Bumps the service's delivered-message counter.
    ///
    /// Called exactly once per successfully published message, never for
    /// failed or retried attempts. Best-effort analytics: implementations
    /// must not fail the request over it.
    async fn record_delivered(&self, id: &ServiceId);
}

/// Errors while loading a service registry file.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry file: {0}")]
    Io(#[from] std::io::Error),

    /// Covers unknown provider kinds too: the registry refuses to load a
    /// service whose kind is outside the closed set.
    #[error("failed to parse registry file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    services: HashMap<String, ServiceCredential>,
}

/// In-memory service directory loaded once at startup.
pub struct StaticDirectory {
    services: HashMap<ServiceId, ServiceCredential>,
    delivered: Mutex<HashMap<ServiceId, u64>>,
}

impl StaticDirectory {
    pub fn new(services: HashMap<ServiceId, ServiceCredential>) -> Self {
        StaticDirectory {
            services,
            delivered: Mutex::new(HashMap::new()),
        }
    }

    /// Parses a TOML registry document.
    ///
    /// ```toml
    /// [services.my-repo-hooks]
    /// kind = "github"
    /// secret = "hunter2"
    ///
    /// [services.mirror]
    /// kind = "forgejo"
    /// disabled = true
    /// ```
    pub fn from_toml(document: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = toml::from_str(document)?;
        let services = file
            .services
            .into_iter()
            .map(|(id, credential)| (ServiceId::new(id), credential))
            .collect();
        Ok(Self::new(services))
    }

    /// Loads a TOML registry from disk.
    pub fn from_toml_file(path: &Path) -> Result<Self, RegistryError> {
        let document = std::fs::read_to_string(path)?;
        Self::from_toml(&document)
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Current delivered count for a service (0 if never delivered).
    pub fn delivered_count(&self, id: &ServiceId) -> u64 {
        self.delivered
            .lock()
            .expect("counter lock poisoned")
            .get(id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ServiceDirectory for StaticDirectory {
    async fn lookup(&self, id: &ServiceId) -> Result<ServiceCredential, DirectoryError> {
        self.services
            .get(id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(id.clone()))
    }

    async fn record_delivered(&self, id: &ServiceId) {
        let mut delivered = self.delivered.lock().expect("counter lock poisoned");
        *delivered.entry(id.clone()).or_insert(0) += 1;
    }
}
