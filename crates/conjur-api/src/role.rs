// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Role identifiers
//!
//! A Conjur role is addressed as `kind:id` within an account. Logins are
//! written differently: a plain user is just its id (`alice`), every other
//! kind is written `kind/id` (`host/app/web`). [`RoleId::from_login`] parses
//! that form once at the boundary so the rest of the crate never inspects
//! delimiters again.

use std::fmt;

use thiserror::Error;

/// Kind assumed for a login that carries no `kind/` prefix.
pub const DEFAULT_ROLE_KIND: &str = "user";

/// Errors produced while parsing a role login
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleIdError {
    /// The login was empty or only whitespace
    #[error("role login must not be empty")]
    Empty,
    /// The `kind/` prefix was present but empty
    #[error("role login '{0}' has an empty kind")]
    EmptyKind(String),
    /// Nothing followed the `kind/` prefix
    #[error("role login '{0}' has an empty id")]
    EmptyId(String),
}

/// A role identifier, `{kind, id}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleId {
    kind: String,
    id: String,
}

impl RoleId {
    /// Build a role identifier from its parts.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Parse a login such as `alice` or `host/app/web`.
    ///
    /// Only the first `/` separates the kind, so ids may contain slashes.
    pub fn from_login(login: &str) -> Result<Self, RoleIdError> {
        let login = login.trim();
        if login.is_empty() {
            return Err(RoleIdError::Empty);
        }

        match login.split_once('/') {
            Some(("", _)) => Err(RoleIdError::EmptyKind(login.to_string())),
            Some((_, "")) => Err(RoleIdError::EmptyId(login.to_string())),
            Some((kind, id)) => Ok(Self::new(kind, id)),
            None => Ok(Self::new(DEFAULT_ROLE_KIND, login)),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The login this role authenticates with; inverse of [`RoleId::from_login`].
    pub fn login(&self) -> String {
        if self.kind == DEFAULT_ROLE_KIND {
            self.id.clone()
        } else {
            format!("{}/{}", self.kind, self.id)
        }
    }

    /// Fully qualified `account:kind:id`
    pub fn full_id(&self, account: &str) -> String {
        format!("{}:{}:{}", account, self.kind, self.id)
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
