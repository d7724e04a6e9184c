//! 凭证静态加密
//!
//! Argon2id 从宿主提供的 `VaultSecret` 拉伸出 256 位密钥（每次加密使用新的随机盐），
//! 再用 AES-256-GCM 加密。公开元数据作为关联数据参与认证，篡改即解密失败。

use std::fmt;

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;

/// 读取记录时允许的最大内存成本（1 GiB）
const MAX_MEMORY_KIB: u32 = 1024 * 1024;

/// Argon2id 参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    fn to_argon2(self) -> WalletResult<Argon2<'static>> {
        if self.memory_kib > MAX_MEMORY_KIB {
            return Err(WalletError::Encryption(format!(
                "kdf memory cost {} KiB exceeds limit",
                self.memory_kib
            )));
        }
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| WalletError::Encryption(format!("invalid kdf params: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    pub fn validate(&self) -> WalletResult<()> {
        self.to_argon2().map(|_| ())
    }
}

/// 宿主提供的保管库口令（drop 时清零）
#[derive(Clone)]
pub struct VaultSecret(Zeroizing<Vec<u8>>);

impl VaultSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> WalletResult<Self> {
        let bytes = Zeroizing::new(bytes.into());
        if bytes.is_empty() {
            return Err(WalletError::Encryption(
                "vault secret must not be empty".to_string(),
            ));
        }
        Ok(Self(bytes))
    }

    pub fn from_passphrase(passphrase: &str) -> WalletResult<Self> {
        Self::new(passphrase.as_bytes().to_vec())
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for VaultSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultSecret([REDACTED])")
    }
}

/// 加密结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBox {
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

/// Argon2id 拉伸密钥
pub fn derive_key(
    secret: &VaultSecret,
    salt: &[u8],
    params: KdfParams,
) -> WalletResult<Zeroizing<[u8; KEY_LEN]>> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    params
        .to_argon2()?
        .hash_password_into(secret.as_bytes(), salt, &mut key[..])
        .map_err(|e| WalletError::Encryption(format!("key stretching failed: {}", e)))?;
    Ok(key)
}

/// 加密
///
/// # Arguments
/// * `plaintext` - 秘密数据
/// * `aad` - 关联数据（明文保存，但参与认证）
pub fn seal(
    plaintext: &[u8],
    aad: &[u8],
    secret: &VaultSecret,
    params: KdfParams,
) -> WalletResult<SealedBox> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let key = derive_key(secret, &salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| WalletError::Encryption(format!("invalid key: {}", e)))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|e| WalletError::Encryption(format!("encryption failed: {}", e)))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(nonce.as_slice());

    Ok(SealedBox {
        salt,
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// 解密；口令错误或数据被篡改都返回 `WalletError::Decryption`
pub fn open(
    sealed: &SealedBox,
    aad: &[u8],
    secret: &VaultSecret,
    params: KdfParams,
) -> WalletResult<Zeroizing<Vec<u8>>> {
    let key = derive_key(secret, &sealed.salt, params)
        .map_err(|e| WalletError::Decryption(e.to_string()))?;
    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| WalletError::Decryption(format!("invalid key: {}", e)))?;

    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&sealed.nonce),
            Payload {
                msg: &sealed.ciphertext,
                aad,
            },
        )
        .map_err(|_| {
            WalletError::Decryption("authentication failed (wrong secret or tampered data)".to_string())
        })?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    // 测试用低成本参数
    fn fast_params() -> KdfParams {
        KdfParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn secret(s: &str) -> VaultSecret {
        VaultSecret::from_passphrase(s).unwrap()
    }

    #[test]
    fn test_seal_open_round_trip() {
        let sealed = seal(b"top secret", b"meta", &secret("pw"), fast_params()).unwrap();
        assert_ne!(sealed.ciphertext, b"top secret");

        let opened = open(&sealed, b"meta", &secret("pw"), fast_params()).unwrap();
        assert_eq!(opened.as_slice(), b"top secret");
    }

    #[test]
    fn test_seal_uses_fresh_salt_and_nonce() {
        let a = seal(b"data", b"", &secret("pw"), fast_params()).unwrap();
        let b = seal(b"data", b"", &secret("pw"), fast_params()).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_secret_fails() {
        let sealed = seal(b"data", b"", &secret("right"), fast_params()).unwrap();
        let err = open(&sealed, b"", &secret("wrong"), fast_params()).unwrap_err();
        assert!(matches!(err, WalletError::Decryption(_)));
    }

    #[test]
    fn test_tampered_aad_or_ciphertext_fails() {
        let sealed = seal(b"data", b"meta", &secret("pw"), fast_params()).unwrap();
        assert!(matches!(
            open(&sealed, b"other", &secret("pw"), fast_params()),
            Err(WalletError::Decryption(_))
        ));

        let mut tampered = sealed.clone();
        tampered.ciphertext[0] ^= 0xff;
        assert!(matches!(
            open(&tampered, b"meta", &secret("pw"), fast_params()),
            Err(WalletError::Decryption(_))
        ));
    }

    #[test]
    fn test_derive_key_deterministic_per_salt() {
        let s = secret("pw");
        let a = derive_key(&s, &[1u8; SALT_LEN], fast_params()).unwrap();
        let b = derive_key(&s, &[1u8; SALT_LEN], fast_params()).unwrap();
        let c = derive_key(&s, &[2u8; SALT_LEN], fast_params()).unwrap();
        assert_eq!(*a, *b);
        assert_ne!(*a, *c);
    }

    #[test]
    fn test_rejects_empty_secret_and_bad_params() {
        assert!(VaultSecret::new(Vec::new()).is_err());
        assert!(KdfParams::default().validate().is_ok());
        assert!(KdfParams {
            memory_kib: 1,
            iterations: 1,
            parallelism: 1
        }
        .validate()
        .is_err());
        assert!(KdfParams {
            memory_kib: MAX_MEMORY_KIB + 1,
            iterations: 1,
            parallelism: 1
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_secret_debug_redacted() {
        assert_eq!(format!("{:?}", secret("hunter2")), "VaultSecret([REDACTED])");
    }
}
