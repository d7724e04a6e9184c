//! 交易签名网关
//!
//! 从存储的 Base58 私钥重建签名句柄并对消息签名。
//! 纯本地操作，从不提交交易。

use ed25519_dalek::Signature;
use tracing::debug;

use crate::domain::keypair::Keypair;
use crate::domain::transaction::{Message, Pubkey, SignedTransaction};
use crate::error::{WalletError, WalletResult};

/// 签名能力
pub trait TransactionSigner: Send + Sync {
    fn public_key(&self) -> Pubkey;

    fn sign_message(&self, message: &[u8]) -> Signature;
}

/// 由存储私钥重建的签名句柄
#[derive(Debug, Clone)]
pub struct SigningHandle {
    keypair: Keypair,
}

impl SigningHandle {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn address(&self) -> String {
        self.keypair.public_address()
    }
}

impl TransactionSigner for SigningHandle {
    fn public_key(&self) -> Pubkey {
        Pubkey::new(self.keypair.public_key_bytes())
    }

    fn sign_message(&self, message: &[u8]) -> Signature {
        self.keypair.sign(message)
    }
}

/// 从 Base58 编码的 64 字节私钥重建签名句柄
///
/// 任何失败都返回 `WalletError::Decoding`（存储损坏，而非用户输入错误）。
pub fn load_signer(encoded_private_key: &str) -> WalletResult<SigningHandle> {
    Keypair::from_base58(encoded_private_key).map(SigningHandle::new)
}

/// 对消息签名
///
/// 签名者必须是消息唯一的必需签名者。
pub fn sign<T: TransactionSigner + ?Sized>(
    signer: &T,
    message: &Message,
) -> WalletResult<SignedTransaction> {
    let public_key = signer.public_key();
    if message.signers() != [public_key].as_slice() {
        return Err(WalletError::Signing(format!(
            "{} is not the sole required signer",
            public_key
        )));
    }

    let bytes = message.serialize()?;
    let signature = signer.sign_message(&bytes);

    let signed = SignedTransaction::new(vec![signature.to_bytes()], bytes, vec![public_key]);
    debug!(signer = %public_key, "message signed");
    Ok(signed)
}

/// 对外部构建的交易（legacy 或 v0 线格式）签名
///
/// 找到签名者所在的签名槽位并填入签名，其余槽位保持不变。
pub fn sign_serialized<T: TransactionSigner + ?Sized>(
    signer: &T,
    wire_bytes: &[u8],
) -> WalletResult<SignedTransaction> {
    let mut tx = SignedTransaction::from_wire_bytes(wire_bytes)?;
    let public_key = signer.public_key();

    let signature = signer.sign_message(tx.message_bytes());
    if !tx.set_signature(&public_key, signature.to_bytes()) {
        return Err(WalletError::Signing(format!(
            "{} is not a required signer of this transaction",
            public_key
        )));
    }

    debug!(signer = %public_key, "serialized transaction signed");
    Ok(tx)
}

/// Base64 线格式版本
pub fn sign_serialized_base64<T: TransactionSigner + ?Sized>(
    signer: &T,
    encoded: &str,
) -> WalletResult<SignedTransaction> {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| WalletError::InvalidTransaction(format!("invalid base64: {}", e)))?;
    sign_serialized(signer, &bytes)
}
