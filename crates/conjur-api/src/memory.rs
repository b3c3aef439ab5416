// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! In-memory secrets backend
//!
//! Behaves like a Conjur server for the operations in [`SecretsClient`]:
//! passwords exchange for API keys, rotation replaces a role's key so the
//! previous one stops authenticating, and only `admin` may rotate other
//! roles. Every call is counted so tests can assert how often the backend
//! was reached.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};

use crate::client::{AccessToken, Credentials, PolicyLoadResult, PolicyMethod, SecretsClient};
use crate::error::{ConjurError, Result};
use crate::role::RoleId;

const ADMIN_LOGIN: &str = "admin";

/// A policy document received by [`MemoryConjur::load_policy`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPolicy {
    pub policy_id: String,
    pub body: String,
    pub method: PolicyMethod,
    pub loaded_by: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Login → password
    passwords: HashMap<String, String>,
    /// Login → current API key
    api_keys: HashMap<String, String>,
    policies: Vec<LoadedPolicy>,
    login_calls: usize,
    rotations: HashMap<String, usize>,
}

/// In-memory stand-in for a Conjur appliance
#[derive(Debug)]
pub struct MemoryConjur {
    account: String,
    state: Mutex<MemoryState>,
}

impl MemoryConjur {
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Register a user that can log in with `password`.
    pub fn with_user(self, login: &str, password: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.passwords.insert(login.to_string(), password.to_string());
            state.api_keys.insert(login.to_string(), generate_key());
        }
        self
    }

    /// Register a role that has an API key but no password (e.g. a host).
    pub fn with_role(self, login: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .api_keys
            .insert(login.to_string(), generate_key());
        self
    }

    /// Current API key of `login`, if the role exists
    pub fn api_key_of(&self, login: &str) -> Option<String> {
        self.state.lock().unwrap().api_keys.get(login).cloned()
    }

    /// Number of password logins served
    pub fn login_calls(&self) -> usize {
        self.state.lock().unwrap().login_calls
    }

    /// Number of times the role's key was rotated
    pub fn rotations(&self, role: &RoleId) -> usize {
        self.state
            .lock()
            .unwrap()
            .rotations
            .get(&role.login())
            .copied()
            .unwrap_or(0)
    }

    pub fn loaded_policies(&self) -> Vec<LoadedPolicy> {
        self.state.lock().unwrap().policies.clone()
    }

    fn check_key(state: &MemoryState, credentials: &Credentials) -> Result<()> {
        match state.api_keys.get(&credentials.login) {
            Some(key) if key == credentials.api_key.expose_secret() => Ok(()),
            _ => Err(ConjurError::Unauthorized {
                login: credentials.login.clone(),
            }),
        }
    }
}

fn generate_key() -> String {
    let mut bytes = [0u8; 24];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[async_trait]
impl SecretsClient for MemoryConjur {
    fn account(&self) -> &str {
        &self.account
    }

    async fn login(&self, username: &str, password: &SecretString) -> Result<SecretString> {
        let mut state = self.state.lock().unwrap();
        state.login_calls += 1;

        if state.passwords.get(username).map(String::as_str) != Some(password.expose_secret()) {
            return Err(ConjurError::Unauthorized {
                login: username.to_string(),
            });
        }

        let key = state
            .api_keys
            .get(username)
            .cloned()
            .ok_or_else(|| ConjurError::NotFound(username.to_string()))?;
        Ok(SecretString::new(key.into()))
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<AccessToken> {
        let state = self.state.lock().unwrap();
        Self::check_key(&state, credentials)?;
        let token = hex::encode(format!("{}:{}", self.account, credentials.login));
        Ok(AccessToken::new(SecretString::new(token.into())))
    }

    async fn rotate_api_key(
        &self,
        credentials: &Credentials,
        role: &RoleId,
    ) -> Result<SecretString> {
        let mut state = self.state.lock().unwrap();
        Self::check_key(&state, credentials)?;

        let target = role.login();
        if credentials.login != ADMIN_LOGIN && credentials.login != target {
            return Err(ConjurError::Forbidden {
                login: credentials.login.clone(),
                action: format!("rotate the API key of {role}"),
            });
        }
        if !state.api_keys.contains_key(&target) {
            return Err(ConjurError::NotFound(role.full_id(&self.account)));
        }

        let key = generate_key();
        state.api_keys.insert(target.clone(), key.clone());
        *state.rotations.entry(target).or_default() += 1;
        Ok(SecretString::new(key.into()))
    }

    async fn load_policy(
        &self,
        credentials: &Credentials,
        policy_id: &str,
        policy: &str,
        method: PolicyMethod,
    ) -> Result<PolicyLoadResult> {
        let mut state = self.state.lock().unwrap();
        Self::check_key(&state, credentials)?;

        state.policies.push(LoadedPolicy {
            policy_id: policy_id.to_string(),
            body: policy.to_string(),
            method,
            loaded_by: credentials.login.clone(),
        });
        let version = state
            .policies
            .iter()
            .filter(|p| p.policy_id == policy_id)
            .count() as u64;

        Ok(PolicyLoadResult {
            created_roles: HashMap::new(),
            version,
        })
    }
}
