// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use std::path::Path;
use std::sync::Arc;

use buildpack_harness::testing::ScriptedExecutor;
use buildpack_harness::{HarnessConfig, World};
use conjur_api::memory::MemoryConjur;
use secrecy::SecretString;

pub const CF_ADMIN_PASSWORD: &str = "cf-admin-password";

pub fn test_config(ci_dir: &Path) -> HarnessConfig {
    HarnessConfig {
        cf_api_endpoint: "https://api.sys.example.com".to_string(),
        cf_admin_password: SecretString::new(CF_ADMIN_PASSWORD.into()),
        branch_name: None,
        conjur_appliance_url: "https://conjur.example.com".to_string(),
        conjur_account: "cucumber".to_string(),
        conjur_admin_password: SecretString::new("admin".into()),
        conjur_insecure: false,
        ci_dir: ci_dir.to_path_buf(),
        buildpack_dir: ci_dir.join("buildpack"),
    }
}

/// A world wired to fakes, with handles on the fakes for assertions
pub struct TestWorld {
    pub world: World,
    pub executor: Arc<ScriptedExecutor>,
    pub conjur: Arc<MemoryConjur>,
}

#[allow(dead_code)]
impl TestWorld {
    pub fn new() -> Self {
        Self::with(ScriptedExecutor::new(), default_conjur())
    }

    pub fn with(executor: ScriptedExecutor, conjur: MemoryConjur) -> Self {
        Self::with_config(test_config(Path::new("/tmp/buildpack-ci")), executor, conjur)
    }

    pub fn with_config(config: HarnessConfig, executor: ScriptedExecutor, conjur: MemoryConjur) -> Self {
        let executor = Arc::new(executor);
        let conjur = Arc::new(conjur);
        let world = World::new(config, executor.clone(), conjur.clone());
        Self {
            world,
            executor,
            conjur,
        }
    }
}

pub fn default_conjur() -> MemoryConjur {
    MemoryConjur::new("cucumber")
        .with_user("admin", "admin")
        .with_role("alice")
        .with_role("host/app/web")
}
