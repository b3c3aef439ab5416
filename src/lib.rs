// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

pub use {buildpack_harness, conjur_api};

pub mod error;
pub mod scenario;

pub use error::ScenarioError;
pub use scenario::{default_expectations, AppKind, Scenario, SecretExpectation};
