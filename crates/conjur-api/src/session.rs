// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use std::fmt;
use std::sync::Arc;

use secrecy::SecretString;

use crate::client::{AccessToken, Credentials, PolicyLoadResult, PolicyMethod, SecretsClient};
use crate::error::Result;
use crate::role::RoleId;

/// An authenticated identity against the secrets platform
///
/// Cloning is cheap and clones share identity, see [`Session::ptr_eq`].
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    credentials: Credentials,
    client: Arc<dyn SecretsClient>,
}

impl Session {
    /// Build a session from a known API key without contacting the server.
    pub fn from_key(
        login: impl Into<String>,
        api_key: SecretString,
        client: Arc<dyn SecretsClient>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                credentials: Credentials::new(login, api_key),
                client,
            }),
        }
    }

    /// Log in with a password and build a session from the returned API key.
    pub async fn login_with_password(
        client: Arc<dyn SecretsClient>,
        username: &str,
        password: &SecretString,
    ) -> Result<Self> {
        let api_key = client.login(username, password).await?;
        Ok(Self::from_key(username, api_key, client))
    }

    pub fn login(&self) -> &str {
        &self.inner.credentials.login
    }

    pub fn api_key(&self) -> &SecretString {
        &self.inner.credentials.api_key
    }

    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    pub fn client(&self) -> &Arc<dyn SecretsClient> {
        &self.inner.client
    }

    pub fn account(&self) -> &str {
        self.inner.client.account()
    }

    /// Whether both handles refer to the same session.
    pub fn ptr_eq(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub async fn authenticate(&self) -> Result<AccessToken> {
        self.inner.client.authenticate(&self.inner.credentials).await
    }

    /// Rotate `role`'s API key through this session and return the new key.
    pub async fn rotate_api_key(&self, role: &RoleId) -> Result<SecretString> {
        self.inner
            .client
            .rotate_api_key(&self.inner.credentials, role)
            .await
    }

    pub async fn load_policy(
        &self,
        policy_id: &str,
        policy: &str,
        method: PolicyMethod,
    ) -> Result<PolicyLoadResult> {
        self.inner
            .client
            .load_policy(&self.inner.credentials, policy_id, policy, method)
            .await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("login", &self.login())
            .field("account", &self.account())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;
    use crate::memory::MemoryConjur;
    use crate::ConjurError;

    fn backend() -> Arc<MemoryConjur> {
        Arc::new(MemoryConjur::new("cucumber").with_user("admin", "admin"))
    }

    #[tokio::test]
    async fn test_login_with_password() {
        let conjur = backend();
        let password = SecretString::new("admin".into());
        let session = Session::login_with_password(conjur.clone(), "admin", &password)
            .await
            .unwrap();

        assert_eq!(session.login(), "admin");
        assert_eq!(session.account(), "cucumber");
        session.authenticate().await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let password = SecretString::new("nope".into());
        let err = Session::login_with_password(backend(), "admin", &password)
            .await
            .unwrap_err();
        assert!(matches!(err, ConjurError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_clones_share_identity() {
        let conjur = backend();
        let key = conjur.api_key_of("admin").unwrap();
        let session = Session::from_key("admin", SecretString::new(key.clone().into()), conjur.clone());
        let other = Session::from_key("admin", SecretString::new(key.into()), conjur);

        assert!(session.ptr_eq(&session.clone()));
        assert!(!session.ptr_eq(&other));
        assert_eq!(
            session.api_key().expose_secret(),
            other.api_key().expose_secret()
        );
    }
}
