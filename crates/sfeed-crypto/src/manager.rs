//! # Key Lifecycle Manager
//!
//! [`KeyManager`] is the only writer of key pair state. It creates, rotates,
//! deprecates and deletes keys on top of a [`KeyStore`], and by default hands
//! out [`KeyPairInfo`] views that carry no private material.
//!
//! ## Rotation families
//!
//! A family is rooted at an id `u`; rotations add `u_v2`, `u_v3`, ... with
//! increasing `version`. Rotating writes the successor first and deprecates
//! the predecessor second, so an interrupted rotation leaves two active
//! members rather than none. [`KeyManager::get_active_key`] always picks the
//! highest active version.

use std::time::Duration;

use serde::Serialize;

use sfeed_core::{ExportEnvelope, KeyId, PublicKeyMaterial, Timestamp};

use crate::cache::KeyCache;
use crate::ed25519::{SigningKey, VerifyingKey};
use crate::error::{KeyManagerError, KeyStoreError};
use crate::keypair::{KeyMetadata, KeyPair, KeyPairInfo, KeyStatus};
use crate::keystore::{BlobRepository, KeyStore, RekeyReport};

/// Outcome of [`KeyManager::validate_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl KeyValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Key lifecycle over an encrypted store.
#[derive(Debug)]
pub struct KeyManager<R: BlobRepository> {
    store: KeyStore<R>,
    cache: Option<KeyCache>,
}

impl<R: BlobRepository> KeyManager<R> {
    pub fn new(store: KeyStore<R>) -> Self {
        Self { store, cache: None }
    }

    /// Enable the decrypted key cache with a fixed TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = Some(KeyCache::new(ttl));
        self
    }

    pub fn store(&self) -> &KeyStore<R> {
        &self.store
    }

    /// Create a new active key pair at version 1.
    pub fn create_key_pair(
        &self,
        key_id: &KeyId,
        metadata: KeyMetadata,
    ) -> Result<KeyPairInfo, KeyManagerError> {
        let root = key_id.family_root();
        let taken = self
            .store
            .repository()
            .ids()?
            .into_iter()
            .any(|id| id.is_in_family_of(key_id) || id.is_in_family_of(&root));
        if taken {
            return Err(KeyManagerError::DuplicateKey(key_id.clone()));
        }

        let key_pair = KeyPair::generate(key_id.clone(), 1, metadata);
        self.store.store(&key_pair)?;
        self.invalidate_family(&root);
        tracing::info!(key_id = %key_id, "created key pair");
        Ok(key_pair.info())
    }

    /// Public view of a key pair.
    pub fn get_key_pair(&self, key_id: &KeyId) -> Result<Option<KeyPairInfo>, KeyManagerError> {
        Ok(self.get_key_pair_with_private(key_id)?.map(|kp| kp.info()))
    }

    /// The full key pair including its private key.
    pub fn get_key_pair_with_private(
        &self,
        key_id: &KeyId,
    ) -> Result<Option<KeyPair>, KeyManagerError> {
        if let Some(kp) = self.cache.as_ref().and_then(|c| c.get(key_id)) {
            return Ok(Some(kp));
        }
        let loaded = self.store.load(key_id).map_err(|e| map_format(key_id, e))?;
        if let (Some(cache), Some(kp)) = (&self.cache, &loaded) {
            cache.insert(kp);
        }
        Ok(loaded)
    }

    pub fn get_private_key(&self, key_id: &KeyId) -> Result<Option<SigningKey>, KeyManagerError> {
        Ok(self.get_key_pair_with_private(key_id)?.map(|kp| kp.private_key))
    }

    pub fn get_public_key(
        &self,
        key_id: &KeyId,
    ) -> Result<Option<PublicKeyMaterial>, KeyManagerError> {
        Ok(self.get_key_pair_with_private(key_id)?.map(|kp| kp.public_key))
    }

    /// Rotate the family containing `key_id` to a new version.
    ///
    /// Caller metadata supplies `rotation_reason` and custom fields; the
    /// lineage fields are set here.
    pub fn rotate_key(
        &self,
        key_id: &KeyId,
        metadata: KeyMetadata,
    ) -> Result<KeyPairInfo, KeyManagerError> {
        if self.get_key_pair_with_private(key_id)?.is_none() {
            return Err(KeyManagerError::KeyNotFound(key_id.clone()));
        }
        let root = key_id.family_root();
        let family = self.family(&root)?;
        let latest = family.iter().map(|kp| kp.version).max().unwrap_or(1);
        let mut predecessor = family
            .into_iter()
            .filter(KeyPair::is_active)
            .max_by_key(|kp| kp.version)
            .ok_or_else(|| KeyManagerError::NoActiveKey(root.clone()))?;

        let now = Timestamp::now();
        let next_version = latest + 1;
        let next_id = KeyId::versioned(&root, next_version)?;
        let lineage = KeyMetadata {
            previous_key_id: Some(predecessor.key_id.clone()),
            previous_public_key: Some(predecessor.public_key.clone()),
            rotation_count: predecessor.metadata.rotation_count + 1,
            rotated_at: Some(now),
            ..metadata
        };
        let successor = KeyPair::generate(next_id, next_version, lineage);
        self.store.store(&successor)?;

        predecessor.status = KeyStatus::Deprecated;
        predecessor.deprecated_at = Some(now);
        self.store.store(&predecessor)?;
        self.invalidate_family(&root);

        tracing::info!(
            from = %predecessor.key_id,
            to = %successor.key_id,
            version = next_version,
            "rotated key"
        );
        Ok(successor.info())
    }

    /// The highest active version in the family rooted at `key_id`'s root.
    pub fn get_active_key(&self, key_id: &KeyId) -> Result<Option<KeyPairInfo>, KeyManagerError> {
        Ok(self.get_active_key_pair(key_id)?.map(|kp| kp.info()))
    }

    /// Privileged form of [`get_active_key`](Self::get_active_key).
    pub fn get_active_key_pair(&self, key_id: &KeyId) -> Result<Option<KeyPair>, KeyManagerError> {
        Ok(self
            .family(&key_id.family_root())?
            .into_iter()
            .filter(KeyPair::is_active)
            .max_by_key(|kp| kp.version))
    }

    /// Every member of a family, ordered by version.
    pub fn key_history(&self, key_id: &KeyId) -> Result<Vec<KeyPairInfo>, KeyManagerError> {
        Ok(self
            .family(&key_id.family_root())?
            .iter()
            .map(KeyPair::info)
            .collect())
    }

    /// Public views of every readable key, sorted by id.
    pub fn list_keys(&self) -> Result<Vec<KeyPairInfo>, KeyManagerError> {
        Ok(self.store.load_all()?.iter().map(KeyPair::info).collect())
    }

    /// Check a stored key's format and internal consistency. No signature
    /// is produced.
    pub fn validate_key(&self, key_id: &KeyId) -> KeyValidation {
        let key_pair = match self.store.load(key_id) {
            Ok(Some(kp)) => kp,
            Ok(None) => return KeyValidation::invalid("key not found"),
            Err(KeyStoreError::InvalidKeyFormat { reason, .. }) => {
                return KeyValidation::invalid(reason)
            }
            Err(e) => return KeyValidation::invalid(e.to_string()),
        };
        if let Err(e) = VerifyingKey::from_public_key(&key_pair.public_key) {
            return KeyValidation::invalid(e.to_string());
        }
        if key_pair.private_key.public_key() != key_pair.public_key {
            return KeyValidation::invalid("public key does not match private key");
        }
        KeyValidation::ok()
    }

    /// Archive and remove a key pair. Returns whether it existed.
    pub fn delete_key_pair(&self, key_id: &KeyId) -> Result<bool, KeyManagerError> {
        let outcome = self.store.delete(key_id)?;
        if let Some(cache) = &self.cache {
            cache.invalidate(key_id);
        }
        if outcome.removed && !outcome.archived {
            tracing::warn!(key_id = %key_id, "key deleted without an archived copy");
        }
        Ok(outcome.removed)
    }

    /// Public views of every readable key in the shared export envelope.
    pub fn export_public_keys(&self) -> Result<ExportEnvelope<KeyPairInfo>, KeyManagerError> {
        Ok(ExportEnvelope::new(self.list_keys()?))
    }

    /// Re-encrypt the store under a new installation secret.
    pub fn rekey(&mut self, new_secret: &[u8]) -> Result<RekeyReport, KeyManagerError> {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        Ok(self.store.rekey(new_secret)?)
    }

    fn family(&self, root: &KeyId) -> Result<Vec<KeyPair>, KeyManagerError> {
        let mut members = Vec::new();
        for id in self.store.repository().ids()? {
            if !id.is_in_family_of(root) {
                continue;
            }
            // Unreadable members are errors, not gaps.
            if let Some(kp) = self.store.load(&id).map_err(|e| map_format(&id, e))? {
                members.push(kp);
            }
        }
        members.sort_by_key(|kp| kp.version);
        Ok(members)
    }

    fn invalidate_family(&self, root: &KeyId) {
        if let Some(cache) = &self.cache {
            cache.invalidate_family(root);
        }
    }
}

fn map_format(key_id: &KeyId, err: KeyStoreError) -> KeyManagerError {
    match err {
        KeyStoreError::InvalidKeyFormat { reason, .. } => KeyManagerError::InvalidKeyFormat {
            key_id: key_id.clone(),
            reason,
        },
        other => KeyManagerError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::light_params;
    use crate::keystore::MemoryRepository;

    fn manager() -> KeyManager<MemoryRepository> {
        let store = KeyStore::open(MemoryRepository::new(), b"secret", light_params()).unwrap();
        KeyManager::new(store)
    }

    fn id(s: &str) -> KeyId {
        KeyId::new(s).unwrap()
    }

    #[test]
    fn create_then_get() {
        let km = manager();
        let info = km.create_key_pair(&id("alice"), KeyMetadata::default()).unwrap();
        assert_eq!(info.version, 1);
        assert_eq!(info.status, KeyStatus::Active);
        let got = km.get_key_pair(&id("alice")).unwrap().unwrap();
        assert_eq!(got.public_key, info.public_key);
        let sk = km.get_private_key(&id("alice")).unwrap().unwrap();
        assert_eq!(sk.public_key(), info.public_key);
    }

    #[test]
    fn missing_key_reads_are_none() {
        let km = manager();
        assert!(km.get_key_pair(&id("ghost")).unwrap().is_none());
        assert!(km.get_private_key(&id("ghost")).unwrap().is_none());
        assert!(km.get_public_key(&id("ghost")).unwrap().is_none());
        assert!(km.get_active_key(&id("ghost")).unwrap().is_none());
    }

    #[test]
    fn duplicate_create_rejected() {
        let km = manager();
        km.create_key_pair(&id("alice"), KeyMetadata::default()).unwrap();
        assert!(matches!(
            km.create_key_pair(&id("alice"), KeyMetadata::default()),
            Err(KeyManagerError::DuplicateKey(_))
        ));
    }

    #[test]
    fn create_into_existing_family_rejected() {
        let km = manager();
        km.create_key_pair(&id("u"), KeyMetadata::default()).unwrap();
        km.rotate_key(&id("u"), KeyMetadata::default()).unwrap();
        assert!(matches!(
            km.create_key_pair(&id("u_v3"), KeyMetadata::default()),
            Err(KeyManagerError::DuplicateKey(_))
        ));
    }

    #[test]
    fn rotate_missing_is_not_found() {
        assert!(matches!(
            manager().rotate_key(&id("ghost"), KeyMetadata::default()),
            Err(KeyManagerError::KeyNotFound(_))
        ));
    }

    #[test]
    fn rotation_links_lineage() {
        let km = manager();
        let first = km.create_key_pair(&id("u"), KeyMetadata::default()).unwrap();
        let meta = KeyMetadata {
            rotation_reason: Some("scheduled".into()),
            ..KeyMetadata::default()
        };
        let second = km.rotate_key(&id("u"), meta).unwrap();
        assert_eq!(second.key_id, id("u_v2"));
        assert_eq!(second.version, 2);
        assert_eq!(second.metadata.previous_key_id, Some(id("u")));
        assert_eq!(second.metadata.previous_public_key, Some(first.public_key));
        assert_eq!(second.metadata.rotation_count, 1);
        assert_eq!(second.metadata.rotation_reason.as_deref(), Some("scheduled"));
        assert!(second.metadata.rotated_at.is_some());

        let old = km.get_key_pair(&id("u")).unwrap().unwrap();
        assert_eq!(old.status, KeyStatus::Deprecated);
        assert!(old.deprecated_at.is_some());
        let active = km.get_active_key(&id("u")).unwrap().unwrap();
        assert_eq!(active.key_id, id("u_v2"));
    }

    fn tamper(km: &KeyManager<MemoryRepository>, key_id: &KeyId) {
        let mut blob = km.store().repository().get(key_id).unwrap().unwrap();
        blob.auth_tag = "00".repeat(16);
        km.store().repository().put(key_id, &blob).unwrap();
    }

    #[test]
    fn tampered_active_member_is_integrity_error() {
        let km = manager();
        km.create_key_pair(&id("u"), KeyMetadata::default()).unwrap();
        km.rotate_key(&id("u"), KeyMetadata::default()).unwrap();
        tamper(&km, &id("u_v2"));

        assert!(matches!(
            km.rotate_key(&id("u"), KeyMetadata::default()),
            Err(KeyManagerError::Store(KeyStoreError::Integrity { .. }))
        ));
        assert!(matches!(
            km.get_active_key(&id("u")),
            Err(KeyManagerError::Store(KeyStoreError::Integrity { .. }))
        ));
        assert!(matches!(
            km.key_history(&id("u")),
            Err(KeyManagerError::Store(KeyStoreError::Integrity { .. }))
        ));
        assert!(km.store().repository().get(&id("u_v3")).unwrap().is_none());
    }

    #[test]
    fn tampered_top_member_is_never_overwritten() {
        let km = manager();
        km.create_key_pair(&id("u"), KeyMetadata::default()).unwrap();
        km.rotate_key(&id("u"), KeyMetadata::default()).unwrap();
        // An interrupted rotation leaves the predecessor active too.
        let mut first = km.store().load(&id("u")).unwrap().unwrap();
        first.status = KeyStatus::Active;
        first.deprecated_at = None;
        km.store().store(&first).unwrap();
        tamper(&km, &id("u_v2"));
        let tampered = km.store().repository().get(&id("u_v2")).unwrap().unwrap();

        assert!(matches!(
            km.rotate_key(&id("u"), KeyMetadata::default()),
            Err(KeyManagerError::Store(KeyStoreError::Integrity { .. }))
        ));
        assert_eq!(
            km.store().repository().get(&id("u_v2")).unwrap(),
            Some(tampered)
        );
    }

    #[test]
    fn custom_metadata_named_like_lineage_stays_readable() {
        let km = manager();
        let mut custom = std::collections::BTreeMap::new();
        custom.insert("rotationCount".to_string(), serde_json::json!(7));
        custom.insert("previousKeyId".to_string(), serde_json::json!("mallory"));
        km.create_key_pair(&id("alice"), KeyMetadata::with_custom(custom.clone()))
            .unwrap();

        let info = km.get_key_pair(&id("alice")).unwrap().unwrap();
        assert_eq!(info.metadata.rotation_count, 0);
        assert_eq!(info.metadata.previous_key_id, None);
        assert_eq!(info.metadata.custom, custom);
        assert!(km.validate_key(&id("alice")).valid);

        let rotated = km
            .rotate_key(&id("alice"), KeyMetadata::with_custom(custom.clone()))
            .unwrap();
        assert_eq!(rotated.metadata.rotation_count, 1);
        assert_eq!(rotated.metadata.previous_key_id, Some(id("alice")));
        assert_eq!(rotated.metadata.custom, custom);
    }

    #[test]
    fn validate_key_detects_mismatch() {
        let km = manager();
        km.create_key_pair(&id("good"), KeyMetadata::default()).unwrap();
        assert!(km.validate_key(&id("good")).valid);

        let mut bad = KeyPair::generate(id("bad"), 1, KeyMetadata::default());
        bad.public_key = SigningKey::generate().public_key();
        km.store().store(&bad).unwrap();
        let v = km.validate_key(&id("bad"));
        assert!(!v.valid);
        assert!(v.reason.unwrap().contains("does not match"));

        assert!(!km.validate_key(&id("ghost")).valid);
    }

    #[test]
    fn delete_returns_existence() {
        let km = manager();
        km.create_key_pair(&id("alice"), KeyMetadata::default()).unwrap();
        assert!(km.delete_key_pair(&id("alice")).unwrap());
        assert!(!km.delete_key_pair(&id("alice")).unwrap());
        assert!(km.get_key_pair(&id("alice")).unwrap().is_none());
    }

    #[test]
    fn cache_is_invalidated_by_rotation() {
        let km = manager().with_cache_ttl(Duration::from_secs(300));
        km.create_key_pair(&id("u"), KeyMetadata::default()).unwrap();
        assert_eq!(
            km.get_key_pair(&id("u")).unwrap().unwrap().status,
            KeyStatus::Active
        );
        km.rotate_key(&id("u"), KeyMetadata::default()).unwrap();
        assert_eq!(
            km.get_key_pair(&id("u")).unwrap().unwrap().status,
            KeyStatus::Deprecated
        );
    }

    #[test]
    fn export_public_keys_envelope() {
        let km = manager();
        km.create_key_pair(&id("a"), KeyMetadata::default()).unwrap();
        km.create_key_pair(&id("b"), KeyMetadata::default()).unwrap();
        let env = km.export_public_keys().unwrap();
        assert_eq!(env.version, "1.0");
        assert_eq!(env.len(), 2);
        let text = serde_json::to_string(&env).unwrap();
        assert!(!text.contains("privateKey"));
    }
}
