//! ed25519 密钥对
//!
//! Solana 约定：64 字节私钥编码 = secret(32) || public(32)，Base58 编码；
//! 地址 = 32 字节公钥的 Base58 编码。

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};

pub const SECRET_KEY_LEN: usize = 32;
pub const PUBLIC_KEY_LEN: usize = 32;
pub const KEYPAIR_LEN: usize = 64;

/// ed25519 签名密钥对
///
/// `SigningKey` 在 drop 时自动清零。
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    pub fn from_secret_bytes(secret: &[u8; SECRET_KEY_LEN]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// 从 64 字节编码还原，公钥半部分必须与私钥推导出的公钥一致
    pub fn from_keypair_bytes(bytes: &[u8]) -> WalletResult<Self> {
        if bytes.len() != KEYPAIR_LEN {
            return Err(WalletError::Decoding(format!(
                "expected {} bytes, got {}",
                KEYPAIR_LEN,
                bytes.len()
            )));
        }

        let mut secret = Zeroizing::new([0u8; SECRET_KEY_LEN]);
        secret.copy_from_slice(&bytes[..SECRET_KEY_LEN]);
        let keypair = Self::from_secret_bytes(&secret);

        let expected = keypair.public_key_bytes();
        if !bool::from(expected[..].ct_eq(&bytes[SECRET_KEY_LEN..])) {
            return Err(WalletError::Decoding(
                "public key half does not match secret key".to_string(),
            ));
        }

        Ok(keypair)
    }

    /// 从 Base58 编码的 64 字节私钥还原
    pub fn from_base58(encoded: &str) -> WalletResult<Self> {
        let bytes = Zeroizing::new(
            bs58::decode(encoded.trim())
                .into_vec()
                .map_err(|e| WalletError::Decoding(format!("invalid base58: {}", e)))?,
        );
        Self::from_keypair_bytes(&bytes)
    }

    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Solana 地址
    pub fn public_address(&self) -> String {
        bs58::encode(self.public_key_bytes()).into_string()
    }

    /// secret || public
    pub fn to_keypair_bytes(&self) -> Zeroizing<[u8; KEYPAIR_LEN]> {
        Zeroizing::new(self.signing_key.to_keypair_bytes())
    }

    /// Base58 编码的 64 字节私钥
    pub fn to_base58(&self) -> Zeroizing<String> {
        Zeroizing::new(bs58::encode(self.to_keypair_bytes().as_slice()).into_string())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.verifying_key().verify(message, signature).is_ok()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public_address", &self.public_address())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// 校验 Solana 地址：Base58 且解码后恰好 32 字节
pub fn validate_address(address: &str) -> WalletResult<[u8; PUBLIC_KEY_LEN]> {
    let bytes = bs58::decode(address.trim())
        .into_vec()
        .map_err(|e| WalletError::InvalidAddress(format!("invalid base58: {}", e)))?;

    bytes.as_slice().try_into().map_err(|_| {
        WalletError::InvalidAddress(format!(
            "expected {} bytes, got {}",
            PUBLIC_KEY_LEN,
            bytes.len()
        ))
    })
}
