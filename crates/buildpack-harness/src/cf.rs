// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Platform session: the `cf` CLI operations the harness relies on
//!
//! Each operation is one shell command sent through the [`CommandExecutor`].
//! The CLI keeps its own login state on disk, so this type holds nothing
//! beyond the executor. Values interpolated into command text are quoted,
//! and passwords are passed in the environment.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use secrecy::SecretString;
use tracing::debug;

use crate::shell::{CommandExecutor, CommandRequest, CommandResult};

/// Environment variable `cf auth` reads the password from
pub const CF_PASSWORD_ENV: &str = "CF_PASSWORD";

/// Username and password of a platform user
#[derive(Clone)]
pub struct CredentialPair {
    pub username: String,
    pub password: SecretString,
}

impl CredentialPair {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Quote a value for interpolation into a `sh -c` command line.
pub fn quote(value: &str) -> String {
    shell_escape::unix::escape(Cow::Borrowed(value)).into_owned()
}

/// Extract the first route from `cf app` output.
pub fn parse_route(app_output: &str) -> Option<&str> {
    app_output
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            (key.trim() == "routes").then_some(value)
        })
        .and_then(|routes| routes.split(',').next())
        .map(str::trim)
        .filter(|route| !route.is_empty())
}

/// Wrapper around the `cf` CLI
#[derive(Clone)]
pub struct CfCli {
    executor: Arc<dyn CommandExecutor>,
}

impl CfCli {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &dyn CommandExecutor {
        self.executor.as_ref()
    }

    pub async fn execute(&self, request: impl Into<CommandRequest>) -> Result<CommandResult> {
        self.executor.execute(request.into()).await
    }

    /// Point the CLI at an API endpoint, skipping TLS validation.
    pub async fn api_login(&self, endpoint: &str) -> Result<CommandResult> {
        self.execute(format!("cf api {} --skip-ssl-validation", quote(endpoint)))
            .await
    }

    pub async fn authenticate(&self, credentials: &CredentialPair) -> Result<CommandResult> {
        debug!("Authenticating to the platform as {}", credentials.username);
        let request = CommandRequest::new(format!("cf auth {}", quote(&credentials.username)))
            .secret_env(CF_PASSWORD_ENV, &credentials.password);
        self.execute(request).await
    }

    pub async fn target(&self, org: &str, space: Option<&str>) -> Result<CommandResult> {
        let command = match space {
            Some(space) => format!("cf target -o {} -s {}", quote(org), quote(space)),
            None => format!("cf target -o {}", quote(org)),
        };
        self.execute(command).await
    }

    /// Externally reachable URL of `app`, resolved on every call.
    pub async fn app_route(&self, app: &str) -> Result<String> {
        let result = self.execute(format!("cf app {}", quote(app))).await?;
        let route = parse_route(result.output()).ok_or_else(|| {
            anyhow!(
                "No route found for app '{}' in `cf app` output: {}",
                app,
                result.combined().trim()
            )
        })?;
        Ok(format!("https://{route}/"))
    }

    pub async fn org_guid(&self, org: &str) -> Result<String> {
        self.guid(format!("cf org {} --guid", quote(org)), org).await
    }

    pub async fn service_instance_guid(&self, service: &str) -> Result<String> {
        self.guid(format!("cf service {} --guid", quote(service)), service)
            .await
    }

    async fn guid(&self, command: String, name: &str) -> Result<String> {
        let result = self.execute(command).await?;
        let guid = result.output().trim();
        if !result.success() || guid.is_empty() {
            return Err(anyhow!(
                "Failed to look up GUID of '{}': {}",
                name,
                result.combined().trim()
            ));
        }
        Ok(guid.to_string())
    }
}

impl fmt::Debug for CfCli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CfCli").finish_non_exhaustive()
    }
}
