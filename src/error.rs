//! 钱包核心错误类型
//!
//! 错误按处理方式分类：可由用户修正的输入错误内联提示，
//! 派生/解码等致命错误需要阻断式提示。

use thiserror::Error;

use crate::domain::transaction::SignedTransaction;

pub type WalletResult<T> = std::result::Result<T, WalletError>;

/// 助记词校验错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MnemonicError {
    #[error("expected 12 words, got {0}")]
    InvalidWordCount(usize),

    /// 1-based 位置
    #[error("word #{position} is not in the BIP39 English word list")]
    UnknownWord { position: usize },

    #[error("checksum validation failed")]
    ChecksumFailed,
}

/// 错误分类（决定界面呈现方式）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 用户可修正的输入错误
    InvalidInput,
    /// 当前操作致命失败，需要从头重试
    Fatal,
    /// 存储的数据已损坏
    Corruption,
    /// 外部协作方失败（RPC / 广播）
    External,
    /// 已有操作正在进行
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletErrorCode {
    InvalidInput,
    InvalidMnemonic,
    InvalidDerivationPath,
    DerivationFailed,
    DecodingFailed,
    InvalidAddress,
    InvalidAmount,
    InvalidTransaction,
    SigningFailed,
    EncryptionFailed,
    DecryptionFailed,
    StorageError,
    WalletNotFound,
    OperationInFlight,
    RpcError,
    BroadcastFailed,
    ConfigError,
}

impl WalletErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletErrorCode::InvalidInput => "invalid_input",
            WalletErrorCode::InvalidMnemonic => "invalid_mnemonic",
            WalletErrorCode::InvalidDerivationPath => "invalid_derivation_path",
            WalletErrorCode::DerivationFailed => "derivation_failed",
            WalletErrorCode::DecodingFailed => "decoding_failed",
            WalletErrorCode::InvalidAddress => "invalid_address",
            WalletErrorCode::InvalidAmount => "invalid_amount",
            WalletErrorCode::InvalidTransaction => "invalid_transaction",
            WalletErrorCode::SigningFailed => "signing_failed",
            WalletErrorCode::EncryptionFailed => "encryption_failed",
            WalletErrorCode::DecryptionFailed => "decryption_failed",
            WalletErrorCode::StorageError => "storage_error",
            WalletErrorCode::WalletNotFound => "wallet_not_found",
            WalletErrorCode::OperationInFlight => "operation_in_flight",
            WalletErrorCode::RpcError => "rpc_error",
            WalletErrorCode::BroadcastFailed => "broadcast_failed",
            WalletErrorCode::ConfigError => "config_error",
        }
    }
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(#[from] MnemonicError),

    #[error("invalid derivation path: {0}")]
    InvalidPath(String),

    #[error("key derivation failed: {0}")]
    Derivation(String),

    /// 存储的私钥无法还原为密钥对（存储损坏或编码错误）
    #[error("stored private key could not be decoded: {0}")]
    Decoding(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("no wallet provisioned")]
    WalletNotFound,

    #[error("another wallet operation is already in flight")]
    OperationInFlight,

    #[error("rpc error: {0}")]
    Rpc(String),

    /// 签名成功但提交失败；`signed` 仍然有效，可重新提交
    #[error("broadcast failed: {message}")]
    Broadcast {
        message: String,
        signed: Box<SignedTransaction>,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl WalletError {
    pub fn code(&self) -> WalletErrorCode {
        match self {
            WalletError::InvalidInput(_) => WalletErrorCode::InvalidInput,
            WalletError::InvalidMnemonic(_) => WalletErrorCode::InvalidMnemonic,
            WalletError::InvalidPath(_) => WalletErrorCode::InvalidDerivationPath,
            WalletError::Derivation(_) => WalletErrorCode::DerivationFailed,
            WalletError::Decoding(_) => WalletErrorCode::DecodingFailed,
            WalletError::InvalidAddress(_) => WalletErrorCode::InvalidAddress,
            WalletError::InvalidAmount(_) => WalletErrorCode::InvalidAmount,
            WalletError::InvalidTransaction(_) => WalletErrorCode::InvalidTransaction,
            WalletError::Signing(_) => WalletErrorCode::SigningFailed,
            WalletError::Encryption(_) => WalletErrorCode::EncryptionFailed,
            WalletError::Decryption(_) => WalletErrorCode::DecryptionFailed,
            WalletError::Storage(_) => WalletErrorCode::StorageError,
            WalletError::WalletNotFound => WalletErrorCode::WalletNotFound,
            WalletError::OperationInFlight => WalletErrorCode::OperationInFlight,
            WalletError::Rpc(_) => WalletErrorCode::RpcError,
            WalletError::Broadcast { .. } => WalletErrorCode::BroadcastFailed,
            WalletError::Config(_) => WalletErrorCode::ConfigError,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::InvalidInput(_)
            | WalletError::InvalidMnemonic(_)
            | WalletError::InvalidPath(_)
            | WalletError::InvalidAddress(_)
            | WalletError::InvalidAmount(_)
            | WalletError::InvalidTransaction(_)
            | WalletError::WalletNotFound => ErrorKind::InvalidInput,
            WalletError::Derivation(_)
            | WalletError::Signing(_)
            | WalletError::Encryption(_)
            | WalletError::Config(_) => ErrorKind::Fatal,
            WalletError::Decoding(_) | WalletError::Decryption(_) | WalletError::Storage(_) => {
                ErrorKind::Corruption
            }
            WalletError::Rpc(_) | WalletError::Broadcast { .. } => ErrorKind::External,
            WalletError::OperationInFlight => ErrorKind::Busy,
        }
    }

    /// 是否可以内联提示（而非阻断式提示）
    pub fn is_user_correctable(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidInput | ErrorKind::Busy)
    }

    /// 广播失败时取回已签名交易以便重新提交
    pub fn into_signed_transaction(self) -> Option<SignedTransaction> {
        match self {
            WalletError::Broadcast { signed, .. } => Some(*signed),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::Storage(format!("JSON serialization error: {}", err))
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        WalletError::Storage(format!("I/O error: {}", err))
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(err: reqwest::Error) -> Self {
        WalletError::Rpc(err.to_string())
    }
}

impl From<tokio::task::JoinError> for WalletError {
    fn from(err: tokio::task::JoinError) -> Self {
        WalletError::Derivation(format!("background task failed: {}", err))
    }
}
