use crate::error::{RankError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password_hash: String,
    pub salt: String,
}

/// Proof that the caller passed the admin check. Admin commands take one of
/// these; searches never do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    pub username: String,
}

pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

fn new_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        let salt = new_salt();
        Self {
            username: username.to_string(),
            password_hash: hash_password(password, &salt),
            salt,
        }
    }

    /// Reads the credentials file, writing the default admin account first if
    /// there is none yet.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            return Ok(serde_json::from_str(&content)?);
        }

        warn!(
            path = %path.display(),
            "no admin credentials found, creating default account; change the password"
        );
        let credentials = Self::new(DEFAULT_ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD);
        credentials.save(path)?;
        Ok(credentials)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn verify_password(&self, password: &str) -> bool {
        hash_password(password, &self.salt) == self.password_hash
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Result<AdminSession> {
        if username.is_empty() || password.is_empty() {
            return Err(RankError::InvalidInput(
                "Please enter both username and password".to_string(),
            ));
        }
        if username != self.username || !self.verify_password(password) {
            warn!(username, "admin login failed");
            return Err(RankError::Unauthorized);
        }
        info!(username, "admin login successful");
        Ok(AdminSession {
            username: username.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_salted_sha256_hex() {
        let hash = hash_password("admin123", "abc");
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, hash_password("admin123", "abd"));
        assert_eq!(hash, hash_password("admin123", "abc"));
    }

    #[test]
    fn test_default_credentials_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin_credentials.json");

        let created = Credentials::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.username, DEFAULT_ADMIN_USERNAME);
        assert_eq!(created.salt.len(), 32);

        let loaded = Credentials::load_or_create(&path).unwrap();
        assert_eq!(created, loaded);
    }

    #[test]
    fn test_authenticate() {
        let credentials = Credentials::new("admin", "s3cret");

        let session = credentials.authenticate("admin", "s3cret").unwrap();
        assert_eq!(session.username, "admin");

        assert!(matches!(
            credentials.authenticate("admin", "wrong"),
            Err(RankError::Unauthorized)
        ));
        assert!(matches!(
            credentials.authenticate("root", "s3cret"),
            Err(RankError::Unauthorized)
        ));
        assert!(matches!(
            credentials.authenticate("", ""),
            Err(RankError::InvalidInput(_))
        ));
    }
}
