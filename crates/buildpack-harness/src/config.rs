// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Harness configuration
//!
//! Values come from an optional TOML file, overridden by environment
//! variables of the same name in upper case (`CF_API_ENDPOINT`,
//! `CF_ADMIN_PASSWORD`, ...), which is how CI provides them.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use secrecy::SecretString;
use serde::Deserialize;

/// Environment variables read into [`HarnessConfig`]
pub const ENV_KEYS: &[&str] = &[
    "CF_API_ENDPOINT",
    "CF_ADMIN_PASSWORD",
    "BRANCH_NAME",
    "CONJUR_APPLIANCE_URL",
    "CONJUR_ACCOUNT",
    "CONJUR_ADMIN_PASSWORD",
    "CONJUR_INSECURE",
    "CI_DIR",
    "BUILDPACK_DIR",
];

#[derive(Debug, Clone, Deserialize)]
pub struct HarnessConfig {
    /// Platform API endpoint
    pub cf_api_endpoint: String,
    /// Password of the platform `admin` user
    pub cf_admin_password: SecretString,
    /// Branch under test, selects the online buildpack revision
    #[serde(default)]
    pub branch_name: Option<String>,
    pub conjur_appliance_url: String,
    pub conjur_account: String,
    /// Password of the Conjur `admin` user
    #[serde(default = "default_conjur_admin_password")]
    pub conjur_admin_password: SecretString,
    /// Skip certificate verification against the Conjur appliance
    #[serde(default)]
    pub conjur_insecure: bool,
    /// Directory holding `apps/`; commands run from here
    #[serde(default = "default_ci_dir")]
    pub ci_dir: PathBuf,
    /// Directory holding the buildpack's `upload.sh`
    #[serde(default = "default_buildpack_dir")]
    pub buildpack_dir: PathBuf,
}

fn default_conjur_admin_password() -> SecretString {
    SecretString::new("admin".into())
}

fn default_ci_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_buildpack_dir() -> PathBuf {
    PathBuf::from("..")
}

impl HarnessConfig {
    /// Layered configuration sources, lowest precedence first.
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::new();
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::raw().only(ENV_KEYS))
    }

    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_file {
            if !path.exists() {
                bail!("Configuration file not found: {}", path.display());
            }
        }

        Self::figment(config_file)
            .extract()
            .context("Failed to load harness configuration")
    }

    /// Directory of the sample app `name` under `apps/`
    pub fn app_dir(&self, name: &str) -> PathBuf {
        self.ci_dir.join("apps").join(name)
    }
}
