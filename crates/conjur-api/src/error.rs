// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use thiserror::Error;

use crate::role::RoleIdError;

/// Errors returned by a [`SecretsClient`](crate::SecretsClient)
#[derive(Debug, Error)]
pub enum ConjurError {
    /// The appliance URL could not be parsed or extended
    #[error("invalid Conjur URL: {0}")]
    InvalidUrl(String),

    /// The login could not be turned into a role identifier
    #[error(transparent)]
    InvalidRole(#[from] RoleIdError),

    /// Credentials were rejected (wrong password, or an API key that has been rotated)
    #[error("authentication failed for '{login}'")]
    Unauthorized { login: String },

    /// The authenticated role may not perform the operation
    #[error("'{login}' is not permitted to {action}")]
    Forbidden { login: String, action: String },

    /// The target role or policy does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Any other non-success HTTP status
    #[error("Conjur returned {status} for {url}: {body}")]
    Status { status: u16, url: String, body: String },

    /// The request never produced a response
    #[error("request to Conjur failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A response body was not the JSON we expected
    #[error("failed to decode Conjur response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConjurError>;
