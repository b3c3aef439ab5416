// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Collision-resistant names for provisioned resources
//!
//! Names are a fixed prefix followed by 16 random bytes, hex encoded. The
//! bytes come from `rand`'s thread-local generator, a CSPRNG seeded from the
//! operating system, so concurrent runs against a shared platform do not
//! collide.

use anyhow::{bail, Result};
use rand::RngCore;

pub const ORG_PREFIX: &str = "ci-org-";
pub const SPACE_PREFIX: &str = "ci-space-";
pub const USER_PREFIX: &str = "ci-user-";
pub const BUILDPACK_PREFIX: &str = "conjur_buildpack_ci_";

const SUFFIX_BYTES: usize = 16;

/// 32 lowercase hex characters
pub fn random_hex() -> String {
    let mut bytes = [0u8; SUFFIX_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn unique_name(prefix: &str) -> String {
    format!("{prefix}{}", random_hex())
}

/// Check that a caller-supplied resource name is a plain identifier.
///
/// Platform names interpolated into commands are limited to ASCII
/// alphanumerics, `-`, `_` and `.`.
pub fn validate_name(name: &str) -> Result<&str> {
    if name.is_empty() {
        bail!("Resource name must not be empty");
    }
    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        bail!("Resource name '{}' contains invalid character {:?}", name, ch);
    }
    Ok(name)
}
