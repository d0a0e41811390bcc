//! # API Request/Response Types
//!
//! JSON structures for the HTTP API. Invocation bodies and their responses
//! live in [`crate::dispatch`].

use crate::dispatch::Kernel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Store status response: live record count per relation and per concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub relations: BTreeMap<String, usize>,
    pub concepts: BTreeMap<String, usize>,
    pub total_records: usize,
}

impl From<&Kernel> for StatusResponse {
    fn from(kernel: &Kernel) -> Self {
        let stats = kernel.stats();
        Self {
            relations: stats.relations,
            concepts: kernel.concept_records(),
            total_records: stats.total_records,
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body returned when a kernel call aborts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
