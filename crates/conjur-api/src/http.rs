// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! reqwest-backed [`SecretsClient`] talking to a Conjur appliance

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::client::{AccessToken, Credentials, PolicyLoadResult, PolicyMethod, SecretsClient};
use crate::error::{ConjurError, Result};
use crate::role::RoleId;

/// Client for the Conjur REST API
#[derive(Debug, Clone)]
pub struct ConjurClient {
    http: reqwest::Client,
    appliance_url: Url,
    account: String,
}

impl ConjurClient {
    /// Create a client for `appliance_url` and `account`.
    ///
    /// `accept_invalid_certs` disables certificate verification, for appliances
    /// running with a self-signed certificate.
    pub fn new(appliance_url: &str, account: &str, accept_invalid_certs: bool) -> Result<Self> {
        let appliance_url = Url::parse(appliance_url)
            .map_err(|e| ConjurError::InvalidUrl(format!("{appliance_url}: {e}")))?;
        if appliance_url.cannot_be_a_base() {
            return Err(ConjurError::InvalidUrl(appliance_url.to_string()));
        }

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;

        Ok(Self {
            http,
            appliance_url,
            account: account.to_string(),
        })
    }

    /// Append percent-encoded path segments to the appliance URL.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.appliance_url.clone();
        url.path_segments_mut()
            .map_err(|_| ConjurError::InvalidUrl(self.appliance_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read_body(response: Response, login: &str) -> Result<String> {
        let status = response.status();
        let url = response.url().to_string();
        match status {
            s if s.is_success() => Ok(response.text().await?),
            StatusCode::UNAUTHORIZED => Err(ConjurError::Unauthorized {
                login: login.to_string(),
            }),
            StatusCode::FORBIDDEN => Err(ConjurError::Forbidden {
                login: login.to_string(),
                action: format!("access {url}"),
            }),
            StatusCode::NOT_FOUND => Err(ConjurError::NotFound(url)),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(ConjurError::Status {
                    status: status.as_u16(),
                    url,
                    body,
                })
            }
        }
    }
}

#[async_trait]
impl SecretsClient for ConjurClient {
    fn account(&self) -> &str {
        &self.account
    }

    async fn login(&self, username: &str, password: &SecretString) -> Result<SecretString> {
        let url = self.endpoint(&["authn", &self.account, "login"])?;
        debug!("Logging in to Conjur as {}", username);

        let response = self
            .http
            .get(url)
            .basic_auth(username, Some(password.expose_secret()))
            .send()
            .await?;
        let api_key = Self::read_body(response, username).await?;
        Ok(SecretString::new(api_key.trim().into()))
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<AccessToken> {
        let url = self.endpoint(&["authn", &self.account, &credentials.login, "authenticate"])?;

        let response = self
            .http
            .post(url)
            .header(reqwest::header::ACCEPT_ENCODING, "base64")
            .body(credentials.api_key.expose_secret().to_string())
            .send()
            .await?;
        let token = Self::read_body(response, &credentials.login).await?;
        Ok(AccessToken::new(SecretString::new(token.trim().into())))
    }

    async fn rotate_api_key(
        &self,
        credentials: &Credentials,
        role: &RoleId,
    ) -> Result<SecretString> {
        let token = self.authenticate(credentials).await?;
        let mut url = self.endpoint(&["authn", &self.account, "api_key"])?;
        url.query_pairs_mut().append_pair("role", &role.to_string());
        debug!("Rotating API key for {} as {}", role, credentials.login);

        let response = self
            .http
            .put(url)
            .header(reqwest::header::AUTHORIZATION, token.authorization_header())
            .send()
            .await?;
        let api_key = Self::read_body(response, &credentials.login).await?;
        Ok(SecretString::new(api_key.trim().into()))
    }

    async fn load_policy(
        &self,
        credentials: &Credentials,
        policy_id: &str,
        policy: &str,
        method: PolicyMethod,
    ) -> Result<PolicyLoadResult> {
        let token = self.authenticate(credentials).await?;
        let url = self.endpoint(&["policies", &self.account, "policy", policy_id])?;
        debug!("Loading policy into {} ({:?})", policy_id, method);

        let response = self
            .http
            .request(method.as_http(), url)
            .header(reqwest::header::AUTHORIZATION, token.authorization_header())
            .body(policy.to_string())
            .send()
            .await?;
        let body = Self::read_body(response, &credentials.login).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = ConjurClient::new("https://conjur.example.com", "cucumber", false).unwrap();
        let url = client
            .endpoint(&["authn", "cucumber", "host/app", "authenticate"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://conjur.example.com/authn/cucumber/host%2Fapp/authenticate"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = ConjurClient::new("https://example.com/api/", "acct", true).unwrap();
        let url = client.endpoint(&["authn", "acct", "login"]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/api/authn/acct/login");
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(matches!(
            ConjurClient::new("not a url", "acct", false),
            Err(ConjurError::InvalidUrl(_))
        ));
        assert!(matches!(
            ConjurClient::new("mailto:admin@example.com", "acct", false),
            Err(ConjurError::InvalidUrl(_))
        ));
    }
}
