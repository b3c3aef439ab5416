// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Fakes for running scenarios without a platform
//!
//! [`ScriptedExecutor`] records every request and answers from a list of
//! canned responses keyed by command prefix; [`StaticFetcher`] serves fixed
//! page bodies per URL.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::fetch::{ContentFetcher, FetchError};
use crate::shell::{CommandExecutor, CommandRequest, CommandResult};

/// Executor that never spawns a process
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    responses: Mutex<Vec<(String, CommandResult)>>,
    /// Prefix → error message for commands that fail to run at all
    failures: Mutex<Vec<(String, String)>>,
    requests: Mutex<Vec<CommandRequest>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with `result`. The most recently
    /// added matching prefix wins; unmatched commands succeed with no output.
    pub fn respond(self, prefix: &str, result: CommandResult) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push((prefix.to_string(), result));
        self
    }

    /// Make commands starting with `prefix` fail to run, as if the process
    /// could not be spawned. Takes effect for later commands.
    pub fn fail(&self, prefix: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .push((prefix.to_string(), message.to_string()));
    }

    /// Drop every failure added with [`ScriptedExecutor::fail`].
    pub fn heal(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn requests(&self) -> Vec<CommandRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.command().to_string())
            .collect()
    }

    /// Number of recorded commands starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.command().starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, request: CommandRequest) -> Result<CommandResult> {
        let failure = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| request.command().starts_with(prefix.as_str()))
            .map(|(_, message)| message.clone());
        if let Some(message) = failure {
            let command = request.command().to_string();
            self.requests.lock().unwrap().push(request);
            return Err(anyhow!(message).context(format!("Failed to run `{command}`")));
        }

        let result = self
            .responses
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(prefix, _)| request.command().starts_with(prefix.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| CommandResult::success_with(""));
        self.requests.lock().unwrap().push(request);
        Ok(result)
    }
}

/// Fetcher serving fixed bodies; unknown URLs answer 404
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    fetched: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.fetched.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(body) => Ok(body.trim().to_string()),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
                body: "404 Not Found: Requested route does not exist.".to_string(),
            }),
        }
    }
}
