//! Credential store
//!
//! Username -> SHA-256 hex digest, persisted as a flat JSON object.
//!
//! SECURITY: digests are unsalted and there is no rate limiting or lockout.
//! This gate keeps casual users out of a shared desktop session; it is not a
//! password vault. Never log passwords or digests.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Lowercase hex SHA-256 of the password
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    users: BTreeMap<String, String>,
}

impl CredentialStore {
    /// Load users; a missing file means no users yet
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let users = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
            serde_json::from_str(&content).map_err(|e| Error::json(&path, e))?
        } else {
            BTreeMap::new()
        };

        info!("Loaded {} user(s) from {:?}", users.len(), path);
        Ok(Self { path, users })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }

        let content = serde_json::to_string(&self.users).map_err(|e| Error::json(&self.path, e))?;
        fs::write(&self.path, content).map_err(|e| Error::io(&self.path, e))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True only when the stored digest matches; unknown users are
    /// indistinguishable from wrong passwords
    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        self.users
            .get(username)
            .is_some_and(|stored| *stored == hash_password(password))
    }

    /// Store (or overwrite) a user and persist immediately
    pub fn add_user(&mut self, username: &str, password: &str) -> Result<()> {
        let replaced = self
            .users
            .insert(username.to_string(), hash_password(password))
            .is_some();
        info!("{} user '{}'", if replaced { "Updated" } else { "Added" }, username);
        self.save()
    }

    pub fn remove_user(&mut self, username: &str) -> Result<bool> {
        if self.users.remove(username).is_none() {
            return Ok(false);
        }
        info!("Removed user '{}'", username);
        self.save()?;
        Ok(true)
    }

    pub fn has_users(&self) -> bool {
        !self.users.is_empty()
    }

    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let digest = hash_password("secret");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
        );
    }

    #[test]
    fn test_authenticate() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CredentialStore::load(dir.path().join("users.json")).unwrap();
        assert!(!store.has_users());

        store.add_user("alice", "secret").unwrap();
        assert!(store.authenticate("alice", "secret"));
        assert!(!store.authenticate("alice", "Secret"));
        assert!(!store.authenticate("bob", "secret"));
    }

    #[test]
    fn test_add_user_overwrites_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");

        let mut store = CredentialStore::load(&path).unwrap();
        store.add_user("alice", "old").unwrap();
        store.add_user("alice", "new").unwrap();

        let reloaded = CredentialStore::load(&path).unwrap();
        assert!(reloaded.authenticate("alice", "new"));
        assert!(!reloaded.authenticate("alice", "old"));
        assert_eq!(reloaded.usernames().collect::<Vec<_>>(), vec!["alice"]);
    }

    #[test]
    fn test_document_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let mut store = CredentialStore::load(&path).unwrap();
        store.add_user("alice", "secret").unwrap();

        let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["alice"], hash_password("secret"));
    }

    #[test]
    fn test_remove_user() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CredentialStore::load(dir.path().join("users.json")).unwrap();
        store.add_user("alice", "secret").unwrap();

        assert!(store.remove_user("alice").unwrap());
        assert!(!store.remove_user("alice").unwrap());
        assert!(!store.authenticate("alice", "secret"));
    }
}
