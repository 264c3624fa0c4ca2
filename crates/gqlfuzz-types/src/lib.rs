//! Shared types for the gqlfuzz workspace.
//!
//! This crate provides the pure-data foundation used by every other crate:
//! - [`schema`]: type-kind tagged GraphQL types, type references and operations
//! - [`introspection`]: loader for standard introspection JSON documents
//! - [`env_utils`]: typed `GQLFUZZ_*` environment overrides
//!
//! It has no networking and no async code.

pub mod env_utils;
pub mod introspection;
pub mod schema;

pub use introspection::IntrospectionError;
pub use schema::{
    Argument, FieldDef, GraphQLType, InputValueDef, Operation, OperationKind, SchemaModel,
    TypeKind, TypeRef, BUILT_IN_SCALARS,
};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for retry behavior on transport failures and timeouts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Number of failed attempts tolerated before a step is marked failed.
    pub max_retries: usize,
    /// Backoff before the first retry; doubled after every further failure.
    pub initial_backoff: Duration,
    /// Upper bound for the backoff.
    pub max_backoff: Duration,
}

impl RetryConfig {
    /// Create a new RetryConfig with the specified parameters.
    pub fn new(max_retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    /// Attempts allowed for a single step (never less than one).
    pub fn max_attempts(&self) -> usize {
        self.max_retries.max(1)
    }

    /// Delay to wait after the `failures`-th consecutive failure (1-based).
    pub fn backoff_for(&self, failures: usize) -> Duration {
        let exponent = failures.saturating_sub(1).min(31) as u32;
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_backoff)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_millis(5000),
        }
    }
}
