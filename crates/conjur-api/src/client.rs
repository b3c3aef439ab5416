// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The operations the harness needs from a secrets platform
//!
//! [`SecretsClient`] is the seam between the identity cache and the Conjur
//! server. The production implementation is [`ConjurClient`](crate::ConjurClient);
//! tests use the in-memory backend from the `test-util` feature.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::Result;
use crate::role::RoleId;

/// A login paired with its API key
#[derive(Clone)]
pub struct Credentials {
    pub login: String,
    pub api_key: SecretString,
}

impl Credentials {
    pub fn new(login: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            login: login.into(),
            api_key,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Short-lived access token, already base64 encoded
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(encoded: SecretString) -> Self {
        Self(encoded)
    }

    /// Value for the `Authorization` header
    pub fn authorization_header(&self) -> String {
        format!("Token token=\"{}\"", self.0.expose_secret())
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// How a policy document is applied to an existing policy branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyMethod {
    /// Replace the branch; records not in the document are deleted
    #[default]
    Put,
    /// Append new records only
    Post,
    /// Update and delete records in place
    Patch,
}

impl PolicyMethod {
    pub fn as_http(self) -> reqwest::Method {
        match self {
            PolicyMethod::Put => reqwest::Method::PUT,
            PolicyMethod::Post => reqwest::Method::POST,
            PolicyMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

/// A role created by a policy load, with its initial API key
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedRole {
    pub id: String,
    pub api_key: String,
}

/// Server response to a policy load
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyLoadResult {
    #[serde(default)]
    pub created_roles: HashMap<String, CreatedRole>,
    #[serde(default)]
    pub version: u64,
}

/// Operations consumed from the secrets platform
#[async_trait]
pub trait SecretsClient: Send + Sync {
    /// Account all role identifiers are qualified with
    fn account(&self) -> &str;

    /// Exchange a username and password for the user's API key.
    async fn login(&self, username: &str, password: &SecretString) -> Result<SecretString>;

    /// Exchange credentials for an access token; fails once the key has been rotated.
    async fn authenticate(&self, credentials: &Credentials) -> Result<AccessToken>;

    /// Issue a fresh API key for `role`, invalidating its previous one.
    async fn rotate_api_key(&self, credentials: &Credentials, role: &RoleId)
        -> Result<SecretString>;

    /// Load a policy document into the branch `policy_id`.
    async fn load_policy(
        &self,
        credentials: &Credentials,
        policy_id: &str,
        policy: &str,
        method: PolicyMethod,
    ) -> Result<PolicyLoadResult>;
}
