//! Credential registry
//!
//! Store-lifetime mapping from credential id to public-key material, signature
//! counter and owning user. Records are JSON-serialized into the ephemeral
//! store under the legacy key namespaces; user records live shorter than
//! credential records (1 h vs 24 h by default), which means a credential can
//! outlive its owning user pointer. Both TTLs are configurable because the
//! intended account-expiry behavior was never specified upstream.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use webauthn_rs::prelude::Passkey;
use webauthn_rs_proto::AuthenticatorTransport;

use crate::error::CeremonyError;
use crate::store::{keys, EphemeralStore};

/// A registered user and the credentials they own
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Subject identifier
    pub id: String,
    /// Opaque user handle passed to the authenticator
    pub handle: uuid::Uuid,
    pub display_name: String,
    /// Ids of credentials registered to this user; behaves as a set
    pub credential_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(subject: &str, display_name: &str) -> Self {
        Self {
            id: subject.to_string(),
            handle: uuid::Uuid::new_v4(),
            display_name: display_name.to_string(),
            credential_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Add a credential id, keeping the list free of duplicates
    pub fn add_credential(&mut self, credential_id: &str) {
        if !self.credential_ids.iter().any(|id| id == credential_id) {
            self.credential_ids.push(credential_id.to_string());
        }
    }
}

/// A registered credential: public-key material plus replay bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// base64url credential id
    pub id: String,
    /// Owning subject
    pub owner: String,
    /// Verified public-key material from registration
    pub passkey: Passkey,
    /// Monotonically non-decreasing signature counter
    pub sign_count: u32,
    pub transports: Vec<AuthenticatorTransport>,
    pub created_at: DateTime<Utc>,
}

/// Registry over the ephemeral store
pub struct CredentialRegistry {
    store: Arc<dyn EphemeralStore>,
    user_ttl: Duration,
    credential_ttl: Duration,
}

impl CredentialRegistry {
    pub fn new(store: Arc<dyn EphemeralStore>, user_ttl: Duration, credential_ttl: Duration) -> Self {
        Self {
            store,
            user_ttl,
            credential_ttl,
        }
    }

    pub async fn load_user(&self, subject: &str) -> Result<Option<UserRecord>, CeremonyError> {
        match self.store.get(&keys::user(subject)).await? {
            Some(raw) => Ok(Some(decode(&raw, "user record")?)),
            None => Ok(None),
        }
    }

    /// Persist a user record, refreshing its TTL
    pub async fn save_user(&self, user: &UserRecord) -> Result<(), CeremonyError> {
        let raw = encode(user, "user record")?;
        self.store
            .set(&keys::user(&user.id), &raw, Some(self.user_ttl))
            .await?;
        debug!(subject = %user.id, credentials = user.credential_ids.len(), "Saved user record");
        Ok(())
    }

    pub async fn delete_user(&self, subject: &str) -> Result<bool, CeremonyError> {
        Ok(self.store.del(&keys::user(subject)).await?)
    }

    pub async fn load_credential(
        &self,
        credential_id: &str,
    ) -> Result<Option<CredentialRecord>, CeremonyError> {
        match self.store.get(&keys::credential(credential_id)).await? {
            Some(raw) => Ok(Some(decode(&raw, "credential record")?)),
            None => Ok(None),
        }
    }

    /// Persist a credential record, refreshing its TTL
    pub async fn save_credential(&self, credential: &CredentialRecord) -> Result<(), CeremonyError> {
        let raw = encode(credential, "credential record")?;
        self.store
            .set(
                &keys::credential(&credential.id),
                &raw,
                Some(self.credential_ttl),
            )
            .await?;
        debug!(
            credential_id = %credential.id,
            sign_count = credential.sign_count,
            "Saved credential record"
        );
        Ok(())
    }

    pub async fn delete_credential(&self, credential_id: &str) -> Result<bool, CeremonyError> {
        Ok(self.store.del(&keys::credential(credential_id)).await?)
    }

    /// Load every still-live credential a user points at.
    ///
    /// Credential rows can expire independently of the user record; expired
    /// ids are skipped rather than treated as errors.
    pub async fn user_credentials(
        &self,
        user: &UserRecord,
    ) -> Result<Vec<CredentialRecord>, CeremonyError> {
        let mut records = Vec::with_capacity(user.credential_ids.len());
        for id in &user.credential_ids {
            if let Some(record) = self.load_credential(id).await? {
                records.push(record);
            } else {
                debug!(subject = %user.id, credential_id = %id, "Skipping expired credential");
            }
        }
        Ok(records)
    }
}

fn encode<T: Serialize>(value: &T, what: &str) -> Result<String, CeremonyError> {
    serde_json::to_string(value)
        .map_err(|e| CeremonyError::Internal(format!("failed to serialize {what}: {e}")))
}

fn decode<T: for<'de> Deserialize<'de>>(raw: &str, what: &str) -> Result<T, CeremonyError> {
    serde_json::from_str(raw)
        .map_err(|e| CeremonyError::Internal(format!("failed to deserialize {what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry() -> CredentialRegistry {
        CredentialRegistry::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(3600),
            Duration::from_secs(86400),
        )
    }

    #[tokio::test]
    async fn test_user_roundtrip() {
        let registry = registry();
        assert!(registry.load_user("alice").await.unwrap().is_none());

        let user = UserRecord::new("alice", "Alice Example");
        registry.save_user(&user).await.unwrap();

        let loaded = registry.load_user("alice").await.unwrap().unwrap();
        assert_eq!(loaded.id, "alice");
        assert_eq!(loaded.handle, user.handle);
        assert!(loaded.credential_ids.is_empty());
    }

    #[tokio::test]
    async fn test_credential_ids_behave_as_set() {
        let mut user = UserRecord::new("alice", "Alice Example");
        user.add_credential("cred-1");
        user.add_credential("cred-1");
        user.add_credential("cred-2");
        assert_eq!(user.credential_ids, vec!["cred-1", "cred-2"]);
    }

    #[tokio::test]
    async fn test_user_ttl_applies() {
        let store = Arc::new(MemoryStore::new());
        let registry = CredentialRegistry::new(
            store.clone(),
            Duration::from_millis(10),
            Duration::from_secs(1),
        );
        registry
            .save_user(&UserRecord::new("alice", "Alice Example"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(registry.load_user("alice").await.unwrap().is_none());
    }
}
