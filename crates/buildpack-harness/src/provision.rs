// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Creating and deleting platform resources
//!
//! Every call here creates a new resource; reuse across scenario steps is
//! the job of [`World`](crate::World), which memoizes the results.

use std::path::Path;

use anyhow::Result;
use secrecy::SecretString;
use tracing::info;

use crate::cf::{quote, CfCli, CredentialPair};
use crate::names::{self, ORG_PREFIX, SPACE_PREFIX, USER_PREFIX};
use crate::shell::{CommandRequest, CommandResult, Execution};

/// Role granted to the CI user in its space
pub const CI_USER_SPACE_ROLE: &str = "SpaceDeveloper";

const CI_USER_PASSWORD_ENV: &str = "CI_USER_PASSWORD";
const BUILDPACK_NAME_ENV: &str = "BUILDPACK_NAME";

/// Creates organizations, spaces, users and buildpacks as the platform admin
#[derive(Debug, Clone)]
pub struct Provisioner {
    cf: CfCli,
    admin: CredentialPair,
}

impl Provisioner {
    pub fn new(cf: CfCli, admin: CredentialPair) -> Self {
        Self { cf, admin }
    }

    pub fn cf(&self) -> &CfCli {
        &self.cf
    }

    pub fn admin(&self) -> &CredentialPair {
        &self.admin
    }

    pub async fn authenticate_admin(&self) -> Result<CommandResult> {
        self.cf.authenticate(&self.admin).await
    }

    /// Create `ci-org-<hex>` and return its name.
    pub async fn create_organization(&self) -> Result<String> {
        self.authenticate_admin()
            .await?
            .warn_on_failure("cf auth (admin)");

        let name = names::unique_name(ORG_PREFIX);
        self.cf
            .execute(format!("cf create-org {}", quote(&name)))
            .await?
            .warn_on_failure("cf create-org");

        info!("Created organization {}", name);
        Ok(name)
    }

    /// Create `ci-space-<hex>`, inside `org` when given.
    pub async fn create_space(&self, org: Option<&str>) -> Result<String> {
        let name = names::unique_name(SPACE_PREFIX);
        let command = match org {
            Some(org) => format!("cf create-space {} -o {}", quote(&name), quote(org)),
            None => format!("cf create-space {}", quote(&name)),
        };
        self.cf
            .execute(command)
            .await?
            .warn_on_failure("cf create-space");

        info!("Created space {}", name);
        Ok(name)
    }

    /// Create a user with random credentials and make it a space developer in
    /// `org`/`space`.
    pub async fn create_ci_user(&self, org: &str, space: &str) -> Result<CredentialPair> {
        self.cf
            .target(org, Some(space))
            .await?
            .warn_on_failure("cf target");
        self.authenticate_admin()
            .await?
            .warn_on_failure("cf auth (admin)");

        let username = names::unique_name(USER_PREFIX);
        let password = SecretString::new(names::random_hex().into());

        let create_user = CommandRequest::new(format!(
            "cf create-user {} \"${}\"",
            quote(&username),
            CI_USER_PASSWORD_ENV
        ))
        .secret_env(CI_USER_PASSWORD_ENV, &password);
        let set_role = format!(
            "cf set-space-role {} {} {} {}",
            quote(&username),
            quote(org),
            quote(space),
            CI_USER_SPACE_ROLE
        );

        let execution = Execution::start(self.cf.executor(), create_user)
            .await?
            .then(set_role)
            .await?;
        for result in execution.results() {
            result.warn_on_failure("CI user setup");
        }

        info!("Created CI user {} in {}/{}", username, org, space);
        Ok(CredentialPair::new(username, password))
    }

    pub async fn delete_organization(&self, name: &str) -> Result<CommandResult> {
        self.authenticate_admin()
            .await?
            .warn_on_failure("cf auth (admin)");
        info!("Deleting organization {}", name);
        self.cf
            .execute(format!("cf delete-org -f {}", quote(name)))
            .await
    }

    pub async fn delete_buildpack(&self, name: &str) -> Result<CommandResult> {
        self.authenticate_admin()
            .await?
            .warn_on_failure("cf auth (admin)");
        info!("Deleting buildpack {}", name);
        self.cf
            .execute(format!("cf delete-buildpack -f {}", quote(name)))
            .await
    }

    /// Package and upload the buildpack in `buildpack_dir` under `name`.
    pub async fn install_buildpack(&self, buildpack_dir: &Path, name: &str) -> Result<CommandResult> {
        self.authenticate_admin()
            .await?
            .warn_on_failure("cf auth (admin)");
        info!("Installing buildpack {} from {}", name, buildpack_dir.display());
        self.cf
            .execute(
                CommandRequest::new("./upload.sh")
                    .env(BUILDPACK_NAME_ENV, name)
                    .current_dir(buildpack_dir),
            )
            .await
    }
}
