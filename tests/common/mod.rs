// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use buildpack_harness::testing::{ScriptedExecutor, StaticFetcher};
use buildpack_harness::{CommandResult, HarnessConfig, World};
use conjur_api::memory::MemoryConjur;
use secrecy::SecretString;
use tempfile::TempDir;

pub const ROUTE_SUFFIX: &str = "apps.example.com";

const MANIFEST_TEMPLATE: &str = "\
---
applications:
- name: APP_NAME
  buildpacks:
  - {conjur_buildpack}
  - ruby_buildpack
";

/// A CI directory with `apps/<kind>/manifest.yml.template` for every sample app
pub struct CiDir {
    pub temp_dir: TempDir,
}

impl CiDir {
    pub async fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        for app in ["python", "ruby", "php", "java"] {
            let app_dir = temp_dir.path().join("apps").join(app);
            tokio::fs::create_dir_all(&app_dir).await?;
            tokio::fs::write(
                app_dir.join("manifest.yml.template"),
                MANIFEST_TEMPLATE.replace("APP_NAME", &format!("{app}-app")),
            )
            .await?;
        }
        Ok(Self { temp_dir })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> HarnessConfig {
        HarnessConfig {
            cf_api_endpoint: "https://api.sys.example.com".to_string(),
            cf_admin_password: SecretString::new("cf-admin-password".into()),
            branch_name: Some("feature-x".to_string()),
            conjur_appliance_url: "https://conjur.example.com".to_string(),
            conjur_account: "cucumber".to_string(),
            conjur_admin_password: SecretString::new("admin".into()),
            conjur_insecure: false,
            ci_dir: self.path().to_path_buf(),
            buildpack_dir: self.path().join("buildpack"),
        }
    }
}

/// Executor that reports a route for `app`
pub fn executor_with_route(app: &str) -> ScriptedExecutor {
    ScriptedExecutor::new().respond(
        &format!("cf app {app}"),
        CommandResult::success_with(format!(
            "name:   {app}\nrequested state:   started\nroutes:   {app}-1234.{ROUTE_SUFFIX}\n"
        )),
    )
}

pub fn route_url(app: &str) -> String {
    format!("https://{app}-1234.{ROUTE_SUFFIX}/")
}

pub fn app_page(username: &str, password: &str) -> String {
    format!(
        "<html><body>\n<h1>Conjur buildpack</h1>\n<p>Database Username: {username}</p>\n<p>Database Password: {password}</p>\n</body></html>\n"
    )
}

pub struct Fakes {
    pub world: World,
    pub executor: Arc<ScriptedExecutor>,
    pub fetcher: Arc<StaticFetcher>,
}

pub fn fakes(config: HarnessConfig, executor: ScriptedExecutor, fetcher: StaticFetcher) -> Fakes {
    let executor = Arc::new(executor);
    let conjur = Arc::new(MemoryConjur::new("cucumber").with_user("admin", "admin"));
    Fakes {
        world: World::new(config, executor.clone(), conjur),
        executor,
        fetcher: Arc::new(fetcher),
    }
}
