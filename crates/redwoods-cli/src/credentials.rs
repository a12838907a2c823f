use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "redwoods-mailer";

/// Remembered sign-in passwords, kept in the OS keychain.
pub struct CredentialStore;

impl CredentialStore {
    /// Store email and password in the OS keychain
    pub fn store(email: &str, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        entry
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve the remembered password for an email, if any
    pub fn get_password(email: &str) -> Option<String> {
        Entry::new(SERVICE_NAME, email)
            .and_then(|entry| entry.get_password())
            .ok()
    }

    /// Forget the stored password for an email
    pub fn delete(email: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete credential from keychain")?;
        Ok(())
    }
}
