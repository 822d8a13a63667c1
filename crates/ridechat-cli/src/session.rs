//! Signed-in credentials kept in the OS keychain, one entry per profile.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use ridechat_core::auth::{AuthClient, AuthResult, SessionPersistence};
use ridechat_core::config::ClientConfig;
pub use ridechat_core::auth::{AuthError, Credentials};

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "ridechat-cli";

#[derive(Clone)]
pub struct SessionStore {
    username: String,
}

impl SessionStore {
    pub fn new(profile_name: &str) -> Self {
        Self {
            username: format!("credentials:{profile_name}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl SessionPersistence for SessionStore {
    #[cfg(not(test))]
    fn load_credentials(&self) -> AuthResult<Option<Credentials>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_credentials(&self) -> AuthResult<Option<Credentials>> {
        let store = Self::test_store();
        let guard = store
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        if let Some(raw) = guard.get(&self.username) {
            Ok(Some(serde_json::from_str(raw)?))
        } else {
            Ok(None)
        }
    }

    #[cfg(not(test))]
    fn save_credentials(&self, credentials: &Credentials) -> AuthResult<()> {
        let raw = serde_json::to_string(credentials)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        Ok(())
    }

    #[cfg(test)]
    fn save_credentials(&self, credentials: &Credentials) -> AuthResult<()> {
        let raw = serde_json::to_string(credentials)?;
        let store = Self::test_store();
        let mut guard = store
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_credentials(&self) -> AuthResult<()> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_credentials(&self) -> AuthResult<()> {
        let store = Self::test_store();
        let mut guard = store
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

pub fn auth_client(profile_name: &str, config: &ClientConfig) -> AuthResult<AuthClient<SessionStore>> {
    let url = config
        .api_auth_url
        .as_deref()
        .ok_or(AuthError::NotConfigured)?;
    AuthClient::new(url, config.request_timeout, SessionStore::new(profile_name))
}

pub fn load_stored_credentials(profile_name: &str) -> AuthResult<Option<Credentials>> {
    SessionStore::new(profile_name).load_credentials()
}

pub fn clear_stored_credentials(profile_name: &str) -> AuthResult<()> {
    SessionStore::new(profile_name).clear_credentials()
}
