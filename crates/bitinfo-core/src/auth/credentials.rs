use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "bitinfo";

/// Student id and password. The password only lives in memory and in the
/// OS keychain; it is never part of a session snapshot or a log line.
#[derive(Clone)]
pub struct Credentials {
    pub id: String,
    secret: String,
}

impl Credentials {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

pub struct CredentialStore;

impl CredentialStore {
    /// Store the password for a student id in the OS keychain
    pub fn store(credentials: &Credentials) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, &credentials.id)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(credentials.secret())
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Load credentials for a student id from the OS keychain
    pub fn load(id: &str) -> Result<Credentials> {
        let entry = Entry::new(SERVICE_NAME, id).context("Failed to create keyring entry")?;
        let secret = entry
            .get_password()
            .context("Failed to retrieve password from keychain")?;
        Ok(Credentials::new(id, secret))
    }

    /// Delete stored credentials for a student id
    pub fn delete(id: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, id).context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete credential from keychain")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("1120210001", "hunter2");
        let shown = format!("{:?}", creds);
        assert!(shown.contains("1120210001"));
        assert!(!shown.contains("hunter2"));
    }
}
