use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use crate::{PrincipalId, Role};

/// Cost factor for bcrypt hashing. Matches the work factor the stored admin
/// hashes were generated with.
pub const BCRYPT_COST: u32 = 10;

/// A stored login credential for an admin user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub principal_id: PrincipalId,
    pub username: String,
    /// bcrypt hash of the password. Plaintext passwords are never stored.
    pub password_hash: String,
    pub roles: Vec<Role>,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    /// Unknown username or wrong password. Collapsed into one variant so the
    /// login response cannot be used to probe for valid usernames.
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("credential hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("credential store is unavailable")]
    Unavailable,
}

/// Lookup of stored credentials by username.
pub trait CredentialStore: Send + Sync {
    fn find_by_username(&self, username: &str) -> Result<Option<Credential>, CredentialError>;
}

/// Credential store backed by process memory, populated from configuration
/// at startup.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    by_username: RwLock<HashMap<String, Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, credential: Credential) -> Result<(), CredentialError> {
        let mut map = self
            .by_username
            .write()
            .map_err(|_| CredentialError::Unavailable)?;
        map.insert(credential.username.clone(), credential);
        Ok(())
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn find_by_username(&self, username: &str) -> Result<Option<Credential>, CredentialError> {
        let map = self
            .by_username
            .read()
            .map_err(|_| CredentialError::Unavailable)?;
        Ok(map.get(username).cloned())
    }
}

/// Hash a plaintext password for storage.
pub fn hash_password(plaintext: &str) -> Result<String, CredentialError> {
    Ok(bcrypt::hash(plaintext, BCRYPT_COST)?)
}

/// Check a login attempt against the store.
///
/// Returns the matched credential only when both the username exists and the
/// password verifies against its hash.
pub fn verify_login(
    store: &dyn CredentialStore,
    username: &str,
    password: &str,
) -> Result<Credential, CredentialError> {
    let Some(credential) = store.find_by_username(username)? else {
        return Err(CredentialError::InvalidCredentials);
    };

    if bcrypt::verify(password, &credential.password_hash)? {
        Ok(credential)
    } else {
        Err(CredentialError::InvalidCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(username: &str, password: &str) -> InMemoryCredentialStore {
        let store = InMemoryCredentialStore::new();
        store
            .insert(Credential {
                principal_id: PrincipalId::new(),
                username: username.to_string(),
                password_hash: hash_password(password).unwrap(),
                roles: vec![Role::ADMIN],
            })
            .unwrap();
        store
    }

    #[test]
    fn correct_password_verifies() {
        let store = store_with("admin", "hunter2!");
        let credential = verify_login(&store, "admin", "hunter2!").unwrap();
        assert_eq!(credential.username, "admin");
    }

    #[test]
    fn verify_login_is_reachable_from_the_crate_root() {
        let store = store_with("admin", "hunter2!");
        let credential = crate::verify_login(&store, "admin", "hunter2!").unwrap();
        assert_eq!(credential.roles, vec![Role::ADMIN]);
    }

    #[test]
    fn wrong_password_and_unknown_user_fail_identically() {
        let store = store_with("admin", "hunter2!");

        let wrong_password = verify_login(&store, "admin", "nope").unwrap_err();
        let unknown_user = verify_login(&store, "ghost", "hunter2!").unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }
}
