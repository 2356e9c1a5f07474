//! Credential handling for connected accounts
//!
//! The `access_token` column on an account row is an opaque stored value; the
//! plaintext token only ever exists in memory as a [`secrecy::SecretString`]
//! obtained through a [`CredentialStore`]. A decrypt failure for one account
//! is an account-scoped condition: fan-out records it on that account's
//! result and continues with the rest.

use secrecy::SecretString;

use crate::error::{PlatformError, Result};
use crate::types::Account;

/// Resolves an account's stored token into a usable plaintext secret.
///
/// Implementations must never log token material; errors carry the account
/// id and platform, not the value.
pub trait CredentialStore: Send + Sync {
    /// Decrypt the access token for an account.
    fn decrypt(&self, account: &Account) -> Result<SecretString>;

    /// Name of the backing store, for diagnostics.
    fn backend_name(&self) -> &str;
}

/// OS keyring backed store. The account row's `access_token` column holds a
/// keyring entry handle; the secret itself lives in the platform keychain.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new("crosscast")
    }
}

impl CredentialStore for KeyringStore {
    fn decrypt(&self, account: &Account) -> Result<SecretString> {
        let entry = keyring::Entry::new(&self.service, &account.access_token).map_err(|e| {
            PlatformError::Credential {
                platform: account.platform,
                account_id: account.id.clone(),
                message: format!("keyring entry unavailable: {}", e),
            }
        })?;

        let secret = entry.get_password().map_err(|e| PlatformError::Credential {
            platform: account.platform,
            account_id: account.id.clone(),
            message: format!("failed to read keyring entry: {}", e),
        })?;

        Ok(SecretString::from(secret))
    }

    fn backend_name(&self) -> &str {
        "keyring"
    }
}

/// Pass-through store: treats the stored column value as the token itself.
/// For tests and deployments where encryption at rest happens below the
/// database layer.
pub struct StaticStore {
    /// Account ids this store refuses to decrypt, simulating missing or
    /// corrupted entries.
    deny: Vec<String>,
}

impl StaticStore {
    pub fn new() -> Self {
        Self { deny: Vec::new() }
    }

    pub fn denying(account_ids: Vec<String>) -> Self {
        Self { deny: account_ids }
    }
}

impl Default for StaticStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for StaticStore {
    fn decrypt(&self, account: &Account) -> Result<SecretString> {
        if self.deny.contains(&account.id) {
            return Err(PlatformError::Credential {
                platform: account.platform,
                account_id: account.id.clone(),
                message: "credential entry not found".to_string(),
            }
            .into());
        }
        Ok(SecretString::from(account.access_token.clone()))
    }

    fn backend_name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrosscastError;
    use crate::types::Platform;
    use secrecy::ExposeSecret;

    #[test]
    fn static_store_passes_token_through() {
        let account = Account::new("u", Platform::Facebook, "fb-1", "FB", "tok-123");
        let store = StaticStore::new();

        let secret = store.decrypt(&account).unwrap();
        assert_eq!(secret.expose_secret(), "tok-123");
        assert_eq!(store.backend_name(), "static");
    }

    #[test]
    fn denying_store_fails_with_credential_error() {
        let account = Account::new("u", Platform::Telegram, "tg-1", "TG", "tok");
        let store = StaticStore::denying(vec![account.id.clone()]);

        let err = store.decrypt(&account).unwrap_err();
        match err {
            CrosscastError::Platform(PlatformError::Credential { account_id, .. }) => {
                assert_eq!(account_id, account.id);
            }
            other => panic!("expected credential error, got {:?}", other),
        }
    }

    #[test]
    fn credential_error_display_omits_token_material() {
        let account = Account::new("u", Platform::Telegram, "tg-1", "TG", "super-secret-token");
        let store = StaticStore::denying(vec![account.id.clone()]);

        let message = format!("{}", store.decrypt(&account).unwrap_err());
        assert!(!message.contains("super-secret-token"));
    }
}
