// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use thiserror::Error;

/// Conditions that fail a scenario
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The deployed app did not serve an expected secret
    #[error("App page does not contain `{expected}`. Page content:\n{actual}")]
    AssertionFailed { expected: String, actual: String },

    #[error("No app has been pushed in this scenario")]
    NoAppPushed,
}
