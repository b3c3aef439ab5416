// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Buildpack scenarios: push a sample app and check it sees its secrets
//!
//! A [`Scenario`] drives a shared [`World`]; every resource it touches is
//! created by the world on first use and reused by later steps.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use buildpack_harness::manifest::write_manifest;
use buildpack_harness::{BuildpackSource, CommandRequest, ContentFetcher, TeardownReport, World};
use tracing::{info, instrument};

use crate::error::ScenarioError;

const PUSH_COMMAND: &str = "cf push --random-route";
const JAVA_DEPLOY_COMMAND: &str = "./bin/deploy";

/// Sample apps under `apps/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AppKind {
    Python,
    Ruby,
    Php,
    Java,
}

impl AppKind {
    /// Directory of the app under `apps/`
    pub fn dir_name(self) -> &'static str {
        match self {
            AppKind::Python => "python",
            AppKind::Ruby => "ruby",
            AppKind::Php => "php",
            AppKind::Java => "java",
        }
    }

    /// Name the app is deployed under, as set in its manifest
    pub fn app_name(self) -> &'static str {
        match self {
            AppKind::Python => "python-app",
            AppKind::Ruby => "ruby-app",
            AppKind::Php => "php-app",
            AppKind::Java => "java-app",
        }
    }

    /// Command run from the app directory to deploy it. The Java app is
    /// built before it is pushed.
    pub fn deploy_command(self) -> &'static str {
        match self {
            AppKind::Java => JAVA_DEPLOY_COMMAND,
            _ => PUSH_COMMAND,
        }
    }
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A `Label: value` line the app page must contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretExpectation {
    pub label: String,
    pub value: String,
}

impl SecretExpectation {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    pub fn line(&self) -> String {
        format!("{}: {}", self.label, self.value)
    }
}

/// Values the sample apps' `secrets.yml` resolves to
pub fn default_expectations() -> Vec<SecretExpectation> {
    vec![
        SecretExpectation::new("Database Username", "space_username"),
        SecretExpectation::new("Database Password", "space_password"),
    ]
}

/// One scenario run against a [`World`]
pub struct Scenario<'w> {
    world: &'w World,
    fetcher: Arc<dyn ContentFetcher>,
    expectations: Vec<SecretExpectation>,
    app_name: Option<String>,
}

impl<'w> Scenario<'w> {
    pub fn new(world: &'w World, fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self {
            world,
            fetcher,
            expectations: default_expectations(),
            app_name: None,
        }
    }

    pub fn with_expectations(mut self, expectations: Vec<SecretExpectation>) -> Self {
        self.expectations = expectations;
        self
    }

    pub fn world(&self) -> &'w World {
        self.world
    }

    /// App recorded by the last [`Scenario::push_app`]
    pub fn app_name(&self) -> Option<&str> {
        self.app_name.as_deref()
    }

    /// Log in as the CI user and make sure the org and space exist.
    pub async fn create_org_and_space(&self) -> Result<()> {
        self.world.login_to_platform().await?;
        let org = self.world.ci_org().await?;
        let space = self.world.ci_space().await?;
        info!("Using organization {} and space {}", org, space);
        Ok(())
    }

    pub async fn install_buildpack(&self) -> Result<()> {
        self.world
            .install_buildpack()
            .await
            .context("Failed to install buildpack")
    }

    /// Render the app's manifest against `source` and deploy it into the
    /// CI space.
    #[instrument(skip(self))]
    pub async fn push_app(&mut self, kind: AppKind, source: BuildpackSource) -> Result<()> {
        self.world.login_to_platform().await?;
        self.world
            .target_ci_space()
            .await?
            .warn_on_failure("cf target");

        let app_dir = self.world.app_dir(kind.dir_name());
        let buildpack = self.world.buildpack_reference(source).await?;
        write_manifest(&app_dir, &buildpack)
            .await
            .with_context(|| format!("Failed to prepare manifest for {kind} app"))?;

        info!("Deploying {} with buildpack {}", kind.app_name(), buildpack);
        self.world
            .cf()
            .execute(CommandRequest::new(kind.deploy_command()).current_dir(&app_dir))
            .await?
            .warn_on_failure(kind.deploy_command());

        self.app_name = Some(kind.app_name().to_string());
        Ok(())
    }

    /// Fetch the pushed app's page and check every expected line is on it.
    pub async fn assert_secrets_available(&self) -> Result<()> {
        let app = self.app_name().ok_or(ScenarioError::NoAppPushed)?;
        let url = self.world.cf().app_route(app).await?;
        let page = self
            .fetcher
            .fetch(&url)
            .await
            .with_context(|| format!("Failed to fetch {app} at {url}"))?;

        for expectation in &self.expectations {
            let expected = expectation.line();
            if !page.contains(&expected) {
                return Err(ScenarioError::AssertionFailed {
                    expected,
                    actual: page,
                }
                .into());
            }
        }

        info!("{} serves all {} expected values", app, self.expectations.len());
        Ok(())
    }

    pub async fn teardown(&self) -> Result<TeardownReport> {
        self.world.teardown().await
    }

    /// Every step in order, without teardown.
    pub async fn run(
        &mut self,
        kind: AppKind,
        source: BuildpackSource,
        install_buildpack: bool,
    ) -> Result<()> {
        self.create_org_and_space().await?;
        if install_buildpack {
            self.install_buildpack().await?;
        }
        self.push_app(kind, source).await?;
        self.assert_secrets_available().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_kinds() {
        assert_eq!(AppKind::Php.app_name(), "php-app");
        assert_eq!(AppKind::Php.dir_name(), "php");
        assert_eq!(AppKind::Ruby.deploy_command(), "cf push --random-route");
        assert_eq!(AppKind::Java.deploy_command(), "./bin/deploy");
        assert_eq!(AppKind::Java.to_string(), "java");
    }

    #[test]
    fn test_default_expectations() {
        let lines: Vec<_> = default_expectations().iter().map(|e| e.line()).collect();
        assert_eq!(
            lines,
            [
                "Database Username: space_username",
                "Database Password: space_password"
            ]
        );
    }
}
