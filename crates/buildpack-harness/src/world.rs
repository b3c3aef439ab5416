// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Per-run context: memoized platform resources and secrets-platform sessions
//!
//! A [`World`] is created once per test run and passed by reference to every
//! scenario step. Each scarce resource (organization, space, CI user,
//! buildpack name, admin API key) sits in its own compute-once cell: the
//! first caller creates it, concurrent first callers wait for that single
//! initialisation, and every later caller gets the cached value. A failed
//! initialisation leaves the cell empty so the next caller retries.
//!
//! The "current" secrets-platform session is the one most recently
//! established through [`World::session_for_role`]; it is replaced, never
//! merged.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use anyhow::{bail, Context, Result};
use conjur_api::{
    PolicyLoadResult, PolicyMethod, RoleId, SecretsClient, Session, DEFAULT_ROLE_KIND,
};
use secrecy::SecretString;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::cf::{CfCli, CredentialPair};
use crate::config::HarnessConfig;
use crate::names::{self, validate_name, BUILDPACK_PREFIX};
use crate::provision::Provisioner;
use crate::shell::{CommandExecutor, CommandResult};

/// Login of the administrative identity on both platforms
pub const ADMIN_LOGIN: &str = "admin";

/// Repository the online buildpack is pushed from
pub const ONLINE_BUILDPACK_REPOSITORY: &str =
    "https://github.com/cyberark/cloudfoundry-conjur-buildpack";

const MAIN_BRANCH: &str = "master";

/// Where an app push takes its buildpack from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildpackSource {
    /// The buildpack uploaded by this run, referenced by name
    Offline,
    /// The buildpack repository at the branch under test
    Online,
}

/// Repository URL for `branch`, pinned with a fragment unless it is the
/// main branch or unknown.
pub fn online_buildpack_url(branch: Option<&str>) -> String {
    match branch.map(str::trim) {
        Some(branch) if !branch.is_empty() && branch != MAIN_BRANCH => {
            format!("{ONLINE_BUILDPACK_REPOSITORY}#{branch}")
        }
        _ => ONLINE_BUILDPACK_REPOSITORY.to_string(),
    }
}

/// Resources created during a run, as seen by [`World::teardown`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub organization: Option<String>,
    pub buildpack: Option<String>,
}

pub struct World {
    config: HarnessConfig,
    provisioner: Provisioner,
    secrets: Arc<dyn SecretsClient>,

    ci_org: OnceCell<String>,
    ci_space: OnceCell<String>,
    ci_user: OnceCell<CredentialPair>,
    buildpack_name: OnceLock<String>,
    /// The buildpack was uploaded outside this run; never installed or deleted here
    buildpack_external: AtomicBool,
    buildpack_installed: OnceCell<()>,
    branch_name: OnceCell<Option<String>>,

    admin_api_key: OnceCell<SecretString>,
    admin_session: OnceCell<Session>,
    current_session: RwLock<Option<Session>>,

    torn_down: AtomicBool,
    org_deleted: AtomicBool,
    buildpack_deleted: AtomicBool,
}

impl World {
    pub fn new(
        config: HarnessConfig,
        executor: Arc<dyn CommandExecutor>,
        secrets: Arc<dyn SecretsClient>,
    ) -> Self {
        let admin = CredentialPair::new(ADMIN_LOGIN, config.cf_admin_password.clone());
        let provisioner = Provisioner::new(CfCli::new(executor), admin);
        Self {
            config,
            provisioner,
            secrets,
            ci_org: OnceCell::new(),
            ci_space: OnceCell::new(),
            ci_user: OnceCell::new(),
            buildpack_name: OnceLock::new(),
            buildpack_external: AtomicBool::new(false),
            buildpack_installed: OnceCell::new(),
            branch_name: OnceCell::new(),
            admin_api_key: OnceCell::new(),
            admin_session: OnceCell::new(),
            current_session: RwLock::new(None),
            torn_down: AtomicBool::new(false),
            org_deleted: AtomicBool::new(false),
            buildpack_deleted: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn cf(&self) -> &CfCli {
        self.provisioner.cf()
    }

    pub fn provisioner(&self) -> &Provisioner {
        &self.provisioner
    }

    pub fn admin_credentials(&self) -> &CredentialPair {
        self.provisioner.admin()
    }

    // ---- platform resources ----

    /// The run's organization, created on first use.
    pub async fn ci_org(&self) -> Result<&str> {
        let org = self
            .ci_org
            .get_or_try_init(|| self.provisioner.create_organization())
            .await
            .context("Failed to create CI organization")?;
        Ok(org.as_str())
    }

    /// The run's space inside [`World::ci_org`], created on first use.
    pub async fn ci_space(&self) -> Result<&str> {
        let space = self
            .ci_space
            .get_or_try_init(|| async {
                let org = self.ci_org().await?;
                self.provisioner.create_space(Some(org)).await
            })
            .await
            .context("Failed to create CI space")?;
        Ok(space.as_str())
    }

    /// The run's platform user, a space developer in the CI org and space.
    pub async fn ci_user(&self) -> Result<&CredentialPair> {
        self.ci_user
            .get_or_try_init(|| async {
                let org = self.ci_org().await?;
                let space = self.ci_space().await?;
                self.provisioner.create_ci_user(org, space).await
            })
            .await
            .context("Failed to create CI user")
    }

    /// Name the run's buildpack is uploaded under. Pure name generation.
    pub fn buildpack_name(&self) -> &str {
        self.buildpack_name
            .get_or_init(|| names::unique_name(BUILDPACK_PREFIX))
    }

    /// Use an already uploaded buildpack instead of a generated name.
    ///
    /// Must be called before anything reads [`World::buildpack_name`]. The
    /// buildpack is left in place by [`World::teardown`].
    pub fn use_existing_buildpack(&self, name: &str) -> Result<()> {
        let name = validate_name(name)?;
        if self.buildpack_name.set(name.to_string()).is_err() {
            bail!(
                "Buildpack name already set to '{}'",
                self.buildpack_name()
            );
        }
        self.buildpack_external.store(true, Ordering::SeqCst);
        info!("Using existing buildpack {}", name);
        Ok(())
    }

    /// Upload the buildpack from the configured directory, once per run.
    pub async fn install_buildpack(&self) -> Result<()> {
        if self.buildpack_external.load(Ordering::SeqCst) {
            debug!("Buildpack {} is managed outside this run", self.buildpack_name());
            return Ok(());
        }
        self.buildpack_installed
            .get_or_try_init(|| async {
                let result = self
                    .provisioner
                    .install_buildpack(&self.config.buildpack_dir, self.buildpack_name())
                    .await?;
                result.warn_on_failure("upload.sh");
                Ok::<_, anyhow::Error>(())
            })
            .await?;
        Ok(())
    }

    /// Branch under test: configured value, otherwise asked of git.
    pub async fn branch_name(&self) -> Result<Option<&str>> {
        let branch = self
            .branch_name
            .get_or_try_init(|| async {
                if let Some(branch) = &self.config.branch_name {
                    return Ok::<_, anyhow::Error>(Some(branch.clone()));
                }
                let result = self
                    .cf()
                    .execute("git rev-parse --abbrev-ref HEAD")
                    .await?;
                let branch = result.output().trim();
                Ok((result.success() && !branch.is_empty() && branch != "HEAD")
                    .then(|| branch.to_string()))
            })
            .await?;
        Ok(branch.as_deref())
    }

    /// Buildpack reference to put in an app manifest.
    pub async fn buildpack_reference(&self, source: BuildpackSource) -> Result<String> {
        match source {
            BuildpackSource::Offline => Ok(self.buildpack_name().to_string()),
            BuildpackSource::Online => Ok(online_buildpack_url(self.branch_name().await?)),
        }
    }

    /// Select the API endpoint and authenticate as the CI user.
    pub async fn login_to_platform(&self) -> Result<()> {
        self.cf()
            .api_login(&self.config.cf_api_endpoint)
            .await?
            .warn_on_failure("cf api");
        let user = self.ci_user().await?;
        self.cf()
            .authenticate(user)
            .await?
            .warn_on_failure("cf auth");
        Ok(())
    }

    /// Target the run's organization and space.
    pub async fn target_ci_space(&self) -> Result<CommandResult> {
        let org = self.ci_org().await?;
        let space = self.ci_space().await?;
        self.cf().target(org, Some(space)).await
    }

    /// Delete whatever this run created.
    ///
    /// Both deletions are attempted even if one fails. After a successful
    /// teardown later calls do nothing; after a failed one the next call
    /// retries whatever is still undeleted.
    pub async fn teardown(&self) -> Result<TeardownReport> {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            debug!("Teardown already ran");
            return Ok(TeardownReport::default());
        }

        let mut report = TeardownReport::default();
        let mut errors = Vec::new();

        let org = self
            .ci_org
            .get()
            .filter(|_| !self.org_deleted.load(Ordering::SeqCst));
        if let Some(org) = org {
            match self.provisioner.delete_organization(org).await {
                Ok(result) => {
                    result.warn_on_failure("cf delete-org");
                    self.org_deleted.store(true, Ordering::SeqCst);
                    report.organization = Some(org.clone());
                }
                Err(e) => errors.push(format!("organization {org}: {e:#}")),
            }
        }
        let buildpack = self
            .buildpack_name
            .get()
            .filter(|_| !self.buildpack_external.load(Ordering::SeqCst))
            .filter(|_| !self.buildpack_deleted.load(Ordering::SeqCst));
        if let Some(buildpack) = buildpack {
            match self.provisioner.delete_buildpack(buildpack).await {
                Ok(result) => {
                    result.warn_on_failure("cf delete-buildpack");
                    self.buildpack_deleted.store(true, Ordering::SeqCst);
                    report.buildpack = Some(buildpack.clone());
                }
                Err(e) => errors.push(format!("buildpack {buildpack}: {e:#}")),
            }
        }

        if !errors.is_empty() {
            self.torn_down.store(false, Ordering::SeqCst);
            bail!(
                "Teardown failed for {} resource(s):\n  - {}",
                errors.len(),
                errors.join("\n  - ")
            );
        }
        Ok(report)
    }

    // ---- secrets platform ----

    pub fn secrets_client(&self) -> &Arc<dyn SecretsClient> {
        &self.secrets
    }

    /// API key of the secrets-platform admin, from a password login.
    pub async fn admin_api_key(&self) -> Result<&SecretString> {
        self.admin_api_key
            .get_or_try_init(|| async {
                info!("Logging in to Conjur as {}", ADMIN_LOGIN);
                self.secrets
                    .login(ADMIN_LOGIN, &self.config.conjur_admin_password)
                    .await
            })
            .await
            .context("Failed to log in to Conjur as admin")
    }

    /// The admin session; the same handle on every call.
    pub async fn admin_session(&self) -> Result<&Session> {
        self.admin_session
            .get_or_try_init(|| async {
                let api_key = self.admin_api_key().await?.clone();
                Ok::<_, anyhow::Error>(Session::from_key(
                    ADMIN_LOGIN,
                    api_key,
                    self.secrets.clone(),
                ))
            })
            .await
    }

    /// Establish a session for `login` and make it the current one.
    ///
    /// `admin` (or `user/admin`) resolves to [`World::admin_session`]; other
    /// logins are normalized to their role's login. With a known key the
    /// session is built without contacting the server. Otherwise the role's
    /// key is rotated through the admin session, which invalidates any key
    /// previously issued to that role.
    #[instrument(skip(self, api_key))]
    pub async fn session_for_role(
        &self,
        login: &str,
        api_key: Option<SecretString>,
    ) -> Result<Session> {
        let role = RoleId::from_login(login)?;
        let session = if role == RoleId::new(DEFAULT_ROLE_KIND, ADMIN_LOGIN) {
            self.admin_session().await?.clone()
        } else if let Some(api_key) = api_key {
            Session::from_key(role.login(), api_key, self.secrets.clone())
        } else {
            let admin = self.admin_session().await?;
            let api_key = admin
                .rotate_api_key(&role)
                .await
                .with_context(|| format!("Failed to rotate API key for {role}"))?;
            info!("Rotated API key for {}", role.full_id(self.secrets.account()));
            Session::from_key(role.login(), api_key, self.secrets.clone())
        };

        *self.current_session.write().await = Some(session.clone());
        Ok(session)
    }

    /// The current session, establishing the admin session if there is none.
    pub async fn conjur_session(&self) -> Result<Session> {
        if let Some(session) = self.current_session.read().await.as_ref() {
            return Ok(session.clone());
        }
        self.session_for_role(ADMIN_LOGIN, None).await
    }

    /// Replace the policy branch `policy_id` using the current session.
    pub async fn load_policy(&self, policy_id: &str, policy: &str) -> Result<PolicyLoadResult> {
        let session = self.conjur_session().await?;
        let result = session
            .load_policy(policy_id, policy, PolicyMethod::Put)
            .await
            .with_context(|| format!("Failed to load policy into '{policy_id}'"))?;
        if !result.created_roles.is_empty() {
            warn!(
                "Policy load created {} role(s); their API keys are not retained",
                result.created_roles.len()
            );
        }
        Ok(result)
    }

    pub async fn load_root_policy(&self, policy: &str) -> Result<PolicyLoadResult> {
        self.load_policy("root", policy).await
    }

    /// `account:token:token...`
    pub fn make_full_id(&self, tokens: &[&str]) -> String {
        std::iter::once(self.secrets.account())
            .chain(tokens.iter().copied())
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Path of sample app `name`, for callers that do not hold the config.
    pub fn app_dir(&self, name: &str) -> std::path::PathBuf {
        self.config.app_dir(name)
    }

    pub fn buildpack_dir(&self) -> &Path {
        &self.config.buildpack_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_online_buildpack_url() {
        assert_eq!(
            online_buildpack_url(Some("feature-x")),
            "https://github.com/cyberark/cloudfoundry-conjur-buildpack#feature-x"
        );
        assert_eq!(online_buildpack_url(Some("master")), ONLINE_BUILDPACK_REPOSITORY);
        assert_eq!(online_buildpack_url(None), ONLINE_BUILDPACK_REPOSITORY);
        assert_eq!(online_buildpack_url(Some("  ")), ONLINE_BUILDPACK_REPOSITORY);
    }
}
