#![allow(unused_imports)]
//! Shared test utilities for integration tests.
//!
//! # Modules
//!
//! - `fixtures`: introspection document builders
//! - `mocks`: scripted transports
//! - `assertions`: assertion helpers with descriptive failure messages

pub mod assertions;
pub mod fixtures;
pub mod mocks;

pub use assertions::{assert_err, assert_error_contains, assert_ok, assert_step_states};
pub use fixtures::{
    field, introspection_doc, list, named, non_null, object_type, shop_doc, user_lifecycle_doc,
};
pub use mocks::{respond_with, ScriptedTransport};
