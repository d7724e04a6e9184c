//! 凭证保管库
//!
//! 唯一读写 `"wallet"` 键的代码。写入的记录是加密信封：
//!
//! ```text
//! { version, path, publicKey, sealedAt,
//!   kdf: { algorithm, salt, memoryKib, iterations, parallelism },
//!   nonce, ciphertext }
//! ```
//!
//! `path`/`publicKey` 保持明文，宿主无需解锁即可显示地址；
//! `mnemonic`/`privateKey` 经 AES-256-GCM 加密。
//! 旧版明文记录与 `[]` 占位值仍可读取。

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::domain::credential::WalletCredential;
use crate::domain::derivation::DerivationPath;
use crate::error::{WalletError, WalletResult};
use crate::infrastructure::encryption::{self, KdfParams, SealedBox, VaultSecret, NONCE_LEN, SALT_LEN};
use crate::infrastructure::kv_store::KeyValueStore;

/// 持久化键
pub const WALLET_KEY: &str = "wallet";

const ENVELOPE_VERSION: u32 = 1;
const KDF_ALGORITHM: &str = "argon2id";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KdfDescriptor {
    algorithm: String,
    salt: String,
    #[serde(flatten)]
    params: KdfParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SealedEnvelope {
    version: u32,
    path: DerivationPath,
    public_key: String,
    sealed_at: DateTime<Utc>,
    kdf: KdfDescriptor,
    nonce: String,
    ciphertext: String,
}

impl SealedEnvelope {
    fn associated_data(path: &DerivationPath, public_key: &str, version: u32) -> Vec<u8> {
        format!("v{}|{}|{}", version, path, public_key).into_bytes()
    }

    fn sealed_box(&self) -> WalletResult<SealedBox> {
        if self.kdf.algorithm != KDF_ALGORITHM {
            return Err(WalletError::Storage(format!(
                "unsupported kdf algorithm: {}",
                self.kdf.algorithm
            )));
        }
        Ok(SealedBox {
            salt: decode_fixed::<SALT_LEN>(&self.kdf.salt, "salt")?,
            nonce: decode_fixed::<NONCE_LEN>(&self.nonce, "nonce")?,
            ciphertext: BASE64
                .decode(&self.ciphertext)
                .map_err(|e| WalletError::Storage(format!("invalid ciphertext encoding: {}", e)))?,
        })
    }
}

/// 加密部分
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretPayload {
    mnemonic: String,
    private_key: String,
}

impl Drop for SecretPayload {
    fn drop(&mut self) {
        self.mnemonic.zeroize();
        self.private_key.zeroize();
    }
}

/// 已存储记录的各种形态
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    Sealed(SealedEnvelope),
    Legacy(WalletCredential),
    /// 旧版本用 `[]` 表示"无钱包"
    Placeholder(Vec<serde_json::Value>),
}

fn decode_fixed<const N: usize>(encoded: &str, field: &str) -> WalletResult<[u8; N]> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| WalletError::Storage(format!("invalid {} encoding: {}", field, e)))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| WalletError::Storage(format!("{} must be {} bytes", field, N)))
}

/// 凭证保管库
pub struct CredentialVault<S> {
    store: S,
    secret: VaultSecret,
    kdf: KdfParams,
}

impl<S: KeyValueStore> CredentialVault<S> {
    pub fn new(store: S, secret: VaultSecret, kdf: KdfParams) -> Self {
        Self { store, secret, kdf }
    }

    pub fn kv_store(&self) -> &S {
        &self.store
    }

    /// 整体替换已存储的凭证
    pub async fn store(&self, credential: &WalletCredential) -> WalletResult<()> {
        let path = credential.path().clone();
        let public_key = credential.public_key().to_string();
        let payload = SecretPayload {
            mnemonic: credential.mnemonic().to_string(),
            private_key: credential.private_key().to_string(),
        };

        let secret = self.secret.clone();
        let kdf = self.kdf;
        let aad = SealedEnvelope::associated_data(&path, &public_key, ENVELOPE_VERSION);

        // Argon2id 是 CPU 密集型
        let sealed = tokio::task::spawn_blocking(move || -> WalletResult<SealedBox> {
            let mut plaintext = serde_json::to_vec(&payload)?;
            let sealed = encryption::seal(&plaintext, &aad, &secret, kdf);
            plaintext.zeroize();
            sealed
        })
        .await??;

        let envelope = SealedEnvelope {
            version: ENVELOPE_VERSION,
            path,
            public_key,
            sealed_at: Utc::now(),
            kdf: KdfDescriptor {
                algorithm: KDF_ALGORITHM.to_string(),
                salt: BASE64.encode(sealed.salt),
                params: kdf,
            },
            nonce: BASE64.encode(sealed.nonce),
            ciphertext: BASE64.encode(&sealed.ciphertext),
        };

        self.store
            .set(WALLET_KEY, serde_json::to_string(&envelope)?)
            .await?;

        info!(
            address = %envelope.public_key,
            path = %envelope.path,
            "wallet credential stored"
        );
        Ok(())
    }

    /// 读取并解密凭证；无记录返回 `None`
    pub async fn load(&self) -> WalletResult<Option<WalletCredential>> {
        let Some(raw) = self.store.get(WALLET_KEY).await? else {
            return Ok(None);
        };

        match Self::parse(&raw)? {
            StoredRecord::Placeholder(items) if items.is_empty() => Ok(None),
            StoredRecord::Placeholder(_) => Err(WalletError::Storage(
                "unexpected array in wallet record".to_string(),
            )),
            StoredRecord::Legacy(credential) => {
                // 明文记录没有认证，逐字段校验后才可使用
                let credential = tokio::task::spawn_blocking(move || {
                    credential.verify_consistency()?;
                    Ok::<_, WalletError>(credential)
                })
                .await??;

                warn!(
                    address = %credential.public_key(),
                    "plaintext wallet record found; it will be sealed on next store"
                );
                Ok(Some(credential))
            }
            StoredRecord::Sealed(envelope) => self.open(envelope).await.map(Some),
        }
    }

    /// 只读取明文元数据中的地址（无需解锁）
    pub async fn stored_address(&self) -> WalletResult<Option<String>> {
        let Some(raw) = self.store.get(WALLET_KEY).await? else {
            return Ok(None);
        };

        Ok(match Self::parse(&raw)? {
            StoredRecord::Sealed(envelope) => Some(envelope.public_key),
            StoredRecord::Legacy(credential) => Some(credential.public_key().to_string()),
            StoredRecord::Placeholder(_) => None,
        })
    }

    pub async fn clear(&self) -> WalletResult<()> {
        self.store.remove(WALLET_KEY).await?;
        info!("wallet credential cleared");
        Ok(())
    }

    fn parse(raw: &str) -> WalletResult<StoredRecord> {
        serde_json::from_str(raw)
            .map_err(|e| WalletError::Storage(format!("unrecognized wallet record: {}", e)))
    }

    async fn open(&self, envelope: SealedEnvelope) -> WalletResult<WalletCredential> {
        if envelope.version != ENVELOPE_VERSION {
            return Err(WalletError::Storage(format!(
                "unsupported envelope version {}",
                envelope.version
            )));
        }

        let sealed = envelope.sealed_box()?;
        let aad =
            SealedEnvelope::associated_data(&envelope.path, &envelope.public_key, envelope.version);
        let secret = self.secret.clone();
        let kdf = envelope.kdf.params;

        let payload = tokio::task::spawn_blocking(move || -> WalletResult<SecretPayload> {
            let plaintext = encryption::open(&sealed, &aad, &secret, kdf)?;
            serde_json::from_slice(&plaintext)
                .map_err(|e| WalletError::Decryption(format!("malformed payload: {}", e)))
        })
        .await??;

        Ok(WalletCredential::from_stored(
            payload.mnemonic.clone(),
            envelope.path,
            envelope.public_key,
            payload.private_key.clone(),
        ))
    }
}
