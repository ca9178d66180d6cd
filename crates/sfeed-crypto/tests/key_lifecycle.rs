//! Key lifecycle over a directory-backed store.

use std::fs;

use sfeed_core::KeyId;
use sfeed_crypto::{
    BlobRepository, FileRepository, KdfParams, KeyManager, KeyManagerError, KeyMetadata, KeyStatus,
    KeyStore, KeyStoreError,
};

fn light() -> KdfParams {
    KdfParams {
        m_cost: 1024,
        t_cost: 1,
        p_cost: 1,
    }
}

fn id(s: &str) -> KeyId {
    KeyId::new(s).unwrap()
}

fn manager_at(dir: &std::path::Path, secret: &[u8]) -> KeyManager<FileRepository> {
    let repo = FileRepository::open(dir).unwrap();
    KeyManager::new(KeyStore::open(repo, secret, light()).unwrap())
}

#[test]
fn rotation_chain_reaches_v4() {
    let dir = tempfile::tempdir().unwrap();
    let km = manager_at(dir.path(), b"secret");

    km.create_key_pair(&id("u"), KeyMetadata::default()).unwrap();
    let v2 = km.rotate_key(&id("u"), KeyMetadata::default()).unwrap();
    assert_eq!(v2.key_id, id("u_v2"));
    assert_eq!(v2.version, 2);
    assert_eq!(
        km.get_key_pair(&id("u")).unwrap().unwrap().status,
        KeyStatus::Deprecated
    );

    km.rotate_key(&id("u"), KeyMetadata::default()).unwrap();
    let v4 = km.rotate_key(&id("u"), KeyMetadata::default()).unwrap();
    assert_eq!(v4.key_id, id("u_v4"));
    assert_eq!(v4.version, 4);
    assert_eq!(v4.metadata.rotation_count, 3);
    assert_eq!(v4.metadata.previous_key_id, Some(id("u_v3")));

    let history = km.key_history(&id("u")).unwrap();
    let versions: Vec<u32> = history.iter().map(|k| k.version).collect();
    assert_eq!(versions, [1, 2, 3, 4]);
    let active: Vec<_> = history
        .iter()
        .filter(|k| k.status == KeyStatus::Active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(
        km.get_active_key(&id("u_v2")).unwrap().unwrap().key_id,
        id("u_v4")
    );
}

#[test]
fn keys_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let public_key = {
        let km = manager_at(dir.path(), b"secret");
        km.create_key_pair(&id("alice"), KeyMetadata::default())
            .unwrap()
            .public_key
    };
    let km = manager_at(dir.path(), b"secret");
    assert_eq!(km.get_public_key(&id("alice")).unwrap(), Some(public_key));
}

#[test]
fn tampered_file_is_integrity_error_not_missing() {
    let dir = tempfile::tempdir().unwrap();
    let km = manager_at(dir.path(), b"secret");
    km.create_key_pair(&id("alice"), KeyMetadata::default()).unwrap();

    let path = km.store().repository().key_path(&id("alice"));
    let mut blob: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    let ct = blob["encrypted"].as_str().unwrap().to_string();
    let flipped = if ct.starts_with('0') { "1" } else { "0" };
    blob["encrypted"] = serde_json::Value::String(format!("{flipped}{}", &ct[1..]));
    fs::write(&path, serde_json::to_vec(&blob).unwrap()).unwrap();

    assert!(matches!(
        km.store().load(&id("alice")),
        Err(KeyStoreError::Integrity { .. })
    ));
    assert!(km.store().list().unwrap().is_empty());
    assert!(!km.validate_key(&id("alice")).valid);
}

#[test]
fn delete_leaves_archive_copy() {
    let dir = tempfile::tempdir().unwrap();
    let km = manager_at(dir.path(), b"secret");
    km.create_key_pair(&id("alice"), KeyMetadata::default()).unwrap();
    assert!(km.delete_key_pair(&id("alice")).unwrap());
    assert!(!km.store().repository().key_path(&id("alice")).exists());
    let archived = km.store().repository().archived(&id("alice")).unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].key_id, id("alice"));
}

#[test]
fn backup_restores_into_other_installation() {
    let source_dir = tempfile::tempdir().unwrap();
    let target_dir = tempfile::tempdir().unwrap();
    let source = manager_at(source_dir.path(), b"secret-a");
    source.create_key_pair(&id("a"), KeyMetadata::default()).unwrap();
    source.create_key_pair(&id("b"), KeyMetadata::default()).unwrap();
    let backup = source.store().backup(b"pass").unwrap();

    let text = serde_json::to_string(&backup).unwrap();
    let parsed = serde_json::from_str(&text).unwrap();

    let target = manager_at(target_dir.path(), b"secret-b");
    let report = target.store().restore(&parsed, b"pass").unwrap();
    assert_eq!(report.restored, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(
        target.get_public_key(&id("a")).unwrap(),
        source.get_public_key(&id("a")).unwrap()
    );

    let again = target.store().restore(&parsed, b"pass").unwrap();
    assert_eq!(again.restored, 0);
    assert_eq!(again.skipped, 2);
}

#[test]
fn rekey_then_reopen_with_new_secret() {
    let dir = tempfile::tempdir().unwrap();
    let mut km = manager_at(dir.path(), b"old");
    km.create_key_pair(&id("alice"), KeyMetadata::default()).unwrap();
    let report = km.rekey(b"new").unwrap();
    assert_eq!(report.rekeyed, 1);

    let reopened = manager_at(dir.path(), b"new");
    assert!(reopened.validate_key(&id("alice")).valid);
    let repo = FileRepository::open(dir.path()).unwrap();
    assert!(matches!(
        KeyStore::open(repo, b"old", light()),
        Err(KeyStoreError::WrongSecret)
    ));
}

#[test]
fn wrong_secret_cannot_write_into_installation() {
    let dir = tempfile::tempdir().unwrap();
    manager_at(dir.path(), b"secret")
        .create_key_pair(&id("alice"), KeyMetadata::default())
        .unwrap();
    assert!(dir.path().join("installation.check").is_file());

    let repo = FileRepository::open(dir.path()).unwrap();
    assert!(matches!(
        KeyStore::open(repo, b"typo", light()),
        Err(KeyStoreError::WrongSecret)
    ));
    let km = manager_at(dir.path(), b"secret");
    let ids: Vec<String> = km.store().list().unwrap().iter().map(|k| k.to_string()).collect();
    assert_eq!(ids, ["alice"]);
}

#[test]
fn tampered_rotation_member_blocks_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let km = manager_at(dir.path(), b"secret");
    km.create_key_pair(&id("u"), KeyMetadata::default()).unwrap();
    km.rotate_key(&id("u"), KeyMetadata::default()).unwrap();

    let path = km.store().repository().key_path(&id("u_v2"));
    let mut blob: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    blob["authTag"] = serde_json::Value::String("00".repeat(16));
    fs::write(&path, serde_json::to_vec(&blob).unwrap()).unwrap();

    assert!(matches!(
        km.rotate_key(&id("u"), KeyMetadata::default()),
        Err(KeyManagerError::Store(KeyStoreError::Integrity { .. }))
    ));
    assert!(km.get_active_key(&id("u")).is_err());
    assert!(!km.store().repository().key_path(&id("u_v3")).exists());
}
