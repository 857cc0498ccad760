// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for ephemeral key files

use super::keyfile::*;
use crate::keyring::parse_keyring_str;
use crate::tsig::{TsigAlgorithm, TsigKey};
use std::collections::HashSet;
use std::fs;
use tempfile::TempDir;

const SECRET: &str = "dGVzdC1zZWNyZXQtbWF0ZXJpYWw=";

fn test_key() -> TsigKey {
    TsigKey::new("update-key", TsigAlgorithm::HmacSha256, SECRET).unwrap()
}

fn manager() -> (TempDir, KeyFileManager) {
    let tmp = TempDir::new().unwrap();
    let manager = KeyFileManager::new(tmp.path().join("keys"));
    (tmp, manager)
}

#[test]
fn test_new_does_not_touch_filesystem() {
    let (_tmp, manager) = manager();
    assert!(!manager.dir().exists());
}

#[test]
fn test_acquire_writes_key_stanza() {
    let (_tmp, manager) = manager();
    let key_file = manager.acquire(&test_key()).unwrap();

    assert!(key_file.path().starts_with(manager.dir()));
    let contents = fs::read_to_string(key_file.path()).unwrap();
    assert!(contents.contains("key \"update-key\""));
    assert!(contents.contains("algorithm hmac-sha256;"));
    assert!(contents.contains(SECRET));

    key_file.release().unwrap();
}

#[test]
fn test_written_stanza_parses_back() {
    let (_tmp, manager) = manager();
    let key_file = manager.acquire(&test_key()).unwrap();

    let contents = fs::read_to_string(key_file.path()).unwrap();
    let ring = parse_keyring_str(&contents).unwrap();
    assert_eq!(ring.key("update-key"), Some(test_key()));

    key_file.release().unwrap();
}

#[cfg(unix)]
#[test]
fn test_permissions_are_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let (_tmp, manager) = manager();
    let key_file = manager.acquire(&test_key()).unwrap();

    let file_mode = fs::metadata(key_file.path()).unwrap().permissions().mode();
    assert_eq!(file_mode & 0o777, 0o600);

    let dir_mode = fs::metadata(manager.dir()).unwrap().permissions().mode();
    assert_eq!(dir_mode & 0o777, 0o700);

    key_file.release().unwrap();
}

#[cfg(unix)]
#[test]
fn test_existing_directory_permissions_are_tightened() {
    use std::os::unix::fs::PermissionsExt;

    let (_tmp, manager) = manager();
    fs::create_dir_all(manager.dir()).unwrap();
    fs::set_permissions(manager.dir(), fs::Permissions::from_mode(0o755)).unwrap();

    let key_file = manager.acquire(&test_key()).unwrap();
    let dir_mode = fs::metadata(manager.dir()).unwrap().permissions().mode();
    assert_eq!(dir_mode & 0o777, 0o700);

    key_file.release().unwrap();
}

#[test]
fn test_release_removes_file() {
    let (_tmp, manager) = manager();
    let key_file = manager.acquire(&test_key()).unwrap();
    let path = key_file.path().to_path_buf();

    assert!(path.exists());
    key_file.release().unwrap();
    assert!(!path.exists());
}

#[test]
fn test_drop_removes_file() {
    let (_tmp, manager) = manager();
    let path = {
        let key_file = manager.acquire(&test_key()).unwrap();
        key_file.path().to_path_buf()
    };
    assert!(!path.exists());
}

#[test]
fn test_release_tolerates_missing_file() {
    let (_tmp, manager) = manager();
    let key_file = manager.acquire(&test_key()).unwrap();
    fs::remove_file(key_file.path()).unwrap();
    assert!(key_file.release().is_ok());
}

#[test]
fn test_file_names_are_unique() {
    let (_tmp, manager) = manager();
    let key = test_key();

    let files: Vec<KeyFile> = (0..20).map(|_| manager.acquire(&key).unwrap()).collect();
    let names: HashSet<_> = files.iter().map(|f| f.path().to_path_buf()).collect();
    assert_eq!(names.len(), files.len());

    for file in &files {
        let name = file.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("tsig-"));
        assert!(name.ends_with(".key"));
    }

    for file in files {
        file.release().unwrap();
    }
    assert_eq!(fs::read_dir(manager.dir()).unwrap().count(), 0);
}

#[test]
fn test_unwritable_directory_is_reported() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("not-a-dir");
    fs::write(&blocker, b"").unwrap();

    let manager = KeyFileManager::new(blocker.join("keys"));
    let err = manager.acquire(&test_key()).unwrap_err();
    assert!(matches!(err, KeyFileError::Directory { .. }));
}
