// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Resource lifecycle and identity sessions for the buildpack CI harness
//!
//! The [`World`] is the per-run context: it provisions platform resources
//! through the `cf` CLI on first use, memoizes them for the rest of the run,
//! and holds the secrets-platform sessions. All external effects go through
//! a [`CommandExecutor`] or a [`ContentFetcher`] so scenarios can run
//! against fakes.

pub mod cf;
pub mod config;
pub mod fetch;
pub mod manifest;
pub mod names;
pub mod provision;
pub mod shell;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
mod world;

pub use cf::{CfCli, CredentialPair};
pub use config::HarnessConfig;
pub use fetch::{ContentFetcher, FetchError, HttpFetcher};
pub use provision::Provisioner;
pub use shell::{CommandExecutor, CommandRequest, CommandResult, Execution, ShellSession};
pub use world::{
    online_buildpack_url, BuildpackSource, TeardownReport, World, ADMIN_LOGIN,
    ONLINE_BUILDPACK_REPOSITORY,
};
