//! 钱包凭证
//!
//! 凭证是不可变的四元组 `{mnemonic, path, publicKey, privateKey}`，
//! 只能整体替换，只有显式重置才会删除。

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::domain::derivation::{
    derive_keypair, mnemonic_to_seed, DerivationPath, WALLET_SEED_PASSPHRASE,
};
use crate::domain::keypair::Keypair;
use crate::domain::mnemonic::RecoveryPhrase;
use crate::error::{WalletError, WalletResult};

/// 编码后的密钥对
pub struct EncodedKeypair {
    /// Base58(32 字节公钥)
    pub public_address: String,
    /// Base58(64 字节 secret || public)
    pub encoded_private_key: Zeroizing<String>,
}

/// 编码密钥对
pub fn encode_keypair(keypair: &Keypair) -> EncodedKeypair {
    EncodedKeypair {
        public_address: keypair.public_address(),
        encoded_private_key: keypair.to_base58(),
    }
}

/// 钱包凭证
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletCredential {
    mnemonic: String,
    path: DerivationPath,
    public_key: String,
    private_key: String,
}

impl WalletCredential {
    /// 聚合凭证字段（纯函数，不做派生）
    pub fn bundle(
        mnemonic: &RecoveryPhrase,
        path: DerivationPath,
        public_address: String,
        encoded_private_key: &str,
    ) -> Self {
        Self {
            mnemonic: mnemonic.phrase().to_string(),
            path,
            public_key: public_address,
            private_key: encoded_private_key.to_string(),
        }
    }

    /// 由助记词、路径和已派生的密钥对构造
    pub fn from_parts(phrase: &RecoveryPhrase, path: DerivationPath, keypair: &Keypair) -> Self {
        let encoded = encode_keypair(keypair);
        Self::bundle(
            phrase,
            path,
            encoded.public_address,
            &encoded.encoded_private_key,
        )
    }

    /// 从存储记录还原
    ///
    /// 不做校验：加密记录由 AEAD 认证，旧版明文记录须再调用 `verify_consistency`。
    pub(crate) fn from_stored(
        mnemonic: String,
        path: DerivationPath,
        public_key: String,
        private_key: String,
    ) -> Self {
        Self {
            mnemonic,
            path,
            public_key,
            private_key,
        }
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    /// Base58 公钥（即 Solana 地址）
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Base58 编码的 64 字节私钥
    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// 重新解析助记词
    pub fn recovery_phrase(&self) -> WalletResult<RecoveryPhrase> {
        RecoveryPhrase::parse(&self.mnemonic)
    }

    /// 校验四个字段彼此一致
    ///
    /// 助记词须通过校验和，私钥须可解码，且私钥与助记词按 `path`
    /// 派生出的地址都必须等于 `public_key`。包含一次 PBKDF2，属于 CPU 密集型。
    pub fn verify_consistency(&self) -> WalletResult<()> {
        let phrase = self.recovery_phrase().map_err(|e| {
            WalletError::Storage(format!("stored mnemonic is invalid: {}", e))
        })?;

        let keypair = Keypair::from_base58(&self.private_key)?;
        if keypair.public_address() != self.public_key {
            return Err(WalletError::Decoding(
                "stored public key does not match private key".to_string(),
            ));
        }

        let seed = mnemonic_to_seed(&phrase, WALLET_SEED_PASSPHRASE)?;
        if derive_keypair(&seed, &self.path)?.public_address() != self.public_key {
            return Err(WalletError::Storage(
                "stored mnemonic does not restore the stored address".to_string(),
            ));
        }
        Ok(())
    }
}

impl Drop for WalletCredential {
    fn drop(&mut self) {
        self.mnemonic.zeroize();
        self.private_key.zeroize();
    }
}

impl fmt::Debug for WalletCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletCredential")
            .field("path", &self.path.to_string())
            .field("public_key", &self.public_key)
            .field("mnemonic", &"[REDACTED]")
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}
