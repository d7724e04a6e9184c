//! IronSeed - Solana 钱包密钥派生与凭证核心
//!
//! 助记词生成/校验、SLIP-10 派生、加密持久化、交易签名。
//! 私钥与助记词只在本地处理，不经过任何网络接口。

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod service;

// 重新导出常用类型
pub use config::Config;
pub use error::{WalletError, WalletErrorCode, WalletResult};

pub mod prelude {
    pub use crate::{
        config::Config,
        domain::{
            Blockhash, DerivationPath, Keypair, Message, PhraseSlots, Pubkey, RecoveryPhrase,
            SignedTransaction, WalletCredential,
        },
        error::{WalletError, WalletErrorCode, WalletResult},
        infrastructure::{
            ChainClient, CredentialVault, FileKvStore, KdfParams, KeyValueStore, MemoryKvStore,
            SolanaRpcClient, VaultSecret,
        },
        service::WalletService,
    };
}
