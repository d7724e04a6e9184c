//! 钱包生命周期集成测试
//!
//! 覆盖：创建/导入、跨实例持久化、加密记录、旧版记录兼容、并发保护

use std::sync::Arc;

use ironseed::domain::DEFAULT_SOLANA_PATH;
use ironseed::infrastructure::{
    CredentialVault, FileKvStore, KdfParams, KeyValueStore, MemoryKvStore, VaultSecret, WALLET_KEY,
};
use ironseed::service::WalletService;
use ironseed::{WalletError, WalletErrorCode};
use tempfile::TempDir;

const ABANDON_PHRASE: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
const ABANDON_ADDRESS: &str = "HAgk14JpMQLgt6rVgv7cBQFJWFto5Dqxi472uT3DKpqk";

fn fast_kdf() -> KdfParams {
    KdfParams {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

fn secret(passphrase: &str) -> VaultSecret {
    VaultSecret::from_passphrase(passphrase).unwrap()
}

fn service_with<S: KeyValueStore>(store: S, passphrase: &str) -> WalletService<S> {
    let vault = CredentialVault::new(store, secret(passphrase), fast_kdf());
    WalletService::new(vault, DEFAULT_SOLANA_PATH.parse().unwrap())
}

fn memory_service() -> WalletService<MemoryKvStore> {
    service_with(MemoryKvStore::new(), "integration-secret")
}

#[tokio::test]
async fn test_create_wallet_produces_consistent_credential() {
    let service = memory_service();
    assert!(!service.has_wallet().await.unwrap());

    let credential = service.create_wallet().await.unwrap();
    assert_eq!(credential.mnemonic().split(' ').count(), 12);
    assert_eq!(credential.path().to_string(), DEFAULT_SOLANA_PATH);

    // 重新导入同一助记词得到同一地址
    let reimported = service.import_phrase(credential.mnemonic()).await.unwrap();
    assert_eq!(reimported, credential);

    assert!(service.has_wallet().await.unwrap());
    assert_eq!(
        service.public_address().await.unwrap(),
        credential.public_key()
    );
}

#[tokio::test]
async fn test_import_known_phrase() {
    let service = memory_service();
    let credential = service.import_phrase(ABANDON_PHRASE).await.unwrap();
    assert_eq!(credential.public_key(), ABANDON_ADDRESS);

    let loaded = service.current_wallet().await.unwrap().unwrap();
    assert_eq!(loaded, credential);
}

#[tokio::test]
async fn test_import_normalizes_pasted_input() {
    let service = memory_service();
    let pasted = format!("  {}  ", ABANDON_PHRASE.to_uppercase().replace(' ', "\n"));
    let credential = service.import_phrase(&pasted).await.unwrap();
    assert_eq!(credential.public_key(), ABANDON_ADDRESS);

    let words: Vec<&str> = ABANDON_PHRASE.split(' ').collect();
    let from_slots = service.import_wallet(&words).await.unwrap();
    assert_eq!(from_slots, credential);
}

#[tokio::test]
async fn test_invalid_import_leaves_existing_wallet() {
    let service = memory_service();
    let existing = service.create_wallet().await.unwrap();

    let bad_checksum = ABANDON_PHRASE.replace("about", "abandon");
    for input in [
        "abandon abandon abandon",
        bad_checksum.as_str(),
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon zzzz",
    ] {
        let err = service.import_phrase(input).await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidMnemonic(_)), "{}", input);
        assert!(err.is_user_correctable());
        assert_eq!(err.code(), WalletErrorCode::InvalidMnemonic);
    }

    let current = service.current_wallet().await.unwrap().unwrap();
    assert_eq!(current, existing);
}

#[tokio::test]
async fn test_wallet_persists_across_instances() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet-store.json");

    let created = {
        let service = service_with(FileKvStore::new(&path), "file-secret");
        service.import_phrase(ABANDON_PHRASE).await.unwrap()
    };

    let service = service_with(FileKvStore::new(&path), "file-secret");
    let loaded = service.current_wallet().await.unwrap().unwrap();
    assert_eq!(loaded, created);
    assert_eq!(service.public_address().await.unwrap(), ABANDON_ADDRESS);
}

#[tokio::test]
async fn test_sealed_record_hides_secrets() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet-store.json");

    let service = service_with(FileKvStore::new(&path), "file-secret");
    let credential = service.import_phrase(ABANDON_PHRASE).await.unwrap();

    let on_disk = std::fs::read_to_string(&path).unwrap();
    assert!(on_disk.contains(ABANDON_ADDRESS));
    assert!(!on_disk.contains("abandon"));
    assert!(!on_disk.contains(credential.private_key()));
}

#[tokio::test]
async fn test_wrong_secret_cannot_open_wallet() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet-store.json");

    service_with(FileKvStore::new(&path), "right-secret")
        .import_phrase(ABANDON_PHRASE)
        .await
        .unwrap();

    let intruder = service_with(FileKvStore::new(&path), "wrong-secret");
    // 地址是明文元数据，仍可读取
    assert_eq!(intruder.public_address().await.unwrap(), ABANDON_ADDRESS);
    assert!(matches!(
        intruder.current_wallet().await,
        Err(WalletError::Decryption(_))
    ));
}

#[tokio::test]
async fn test_legacy_plaintext_record_is_readable() {
    let source = memory_service();
    let credential = source.import_phrase(ABANDON_PHRASE).await.unwrap();

    let store = MemoryKvStore::new();
    store
        .set(WALLET_KEY, serde_json::to_string(&credential).unwrap())
        .await
        .unwrap();

    let service = service_with(store, "integration-secret");
    assert_eq!(service.public_address().await.unwrap(), ABANDON_ADDRESS);
    let loaded = service.current_wallet().await.unwrap().unwrap();
    assert_eq!(loaded, credential);
}

#[tokio::test]
async fn test_empty_array_placeholder_means_no_wallet() {
    let store = MemoryKvStore::new();
    store.set(WALLET_KEY, "[]".to_string()).await.unwrap();

    let service = service_with(store, "integration-secret");
    assert!(service.current_wallet().await.unwrap().is_none());
    assert!(!service.has_wallet().await.unwrap());
    assert!(matches!(
        service.public_address().await,
        Err(WalletError::WalletNotFound)
    ));
}

#[tokio::test]
async fn test_garbage_record_is_storage_error() {
    let store = MemoryKvStore::new();
    store.set(WALLET_KEY, "{not json".to_string()).await.unwrap();

    let service = service_with(store, "integration-secret");
    assert!(matches!(
        service.current_wallet().await,
        Err(WalletError::Storage(_))
    ));
}

#[tokio::test]
async fn test_reset_wallet() {
    let service = memory_service();
    service.create_wallet().await.unwrap();
    service.reset_wallet().await.unwrap();

    assert!(service.current_wallet().await.unwrap().is_none());
    assert!(!service.has_wallet().await.unwrap());
}

#[tokio::test]
async fn test_concurrent_create_and_import_is_rejected() {
    let service = memory_service();

    let (created, imported) = tokio::join!(
        service.create_wallet(),
        service.import_phrase(ABANDON_PHRASE)
    );

    let created = created.unwrap();
    assert!(matches!(imported, Err(WalletError::OperationInFlight)));

    // 被拒绝的操作不影响已存储的凭证
    let current = service.current_wallet().await.unwrap().unwrap();
    assert_eq!(current, created);
}

#[tokio::test]
async fn test_service_shared_across_tasks() {
    let service = Arc::new(memory_service());

    let worker = {
        let service = service.clone();
        tokio::spawn(async move { service.import_phrase(ABANDON_PHRASE).await })
    };
    let credential = worker.await.unwrap().unwrap();

    assert_eq!(credential.public_key(), ABANDON_ADDRESS);
    assert_eq!(service.public_address().await.unwrap(), ABANDON_ADDRESS);
}
