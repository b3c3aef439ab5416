// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Minimal Conjur client
//!
//! Covers what the buildpack CI harness needs from the secrets platform:
//! password login, API key rotation for a role, token authentication and
//! policy loading. [`Session`] bundles a login and its API key with the
//! client that issued them.

mod client;
mod error;
mod http;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
mod role;
mod session;

pub use client::{
    AccessToken, CreatedRole, Credentials, PolicyLoadResult, PolicyMethod, SecretsClient,
};
pub use error::{ConjurError, Result};
pub use http::ConjurClient;
pub use role::{RoleId, RoleIdError, DEFAULT_ROLE_KIND};
pub use session::Session;
