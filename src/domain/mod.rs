//! Domain 模块
//!
//! 助记词、派生、凭证与交易消息等纯逻辑，不涉及 I/O

pub mod chain_config;
pub mod credential;
pub mod derivation;
pub mod keypair;
pub mod mnemonic;
pub mod phrase_input;
pub mod transaction;

// 重新导出常用类型
pub use chain_config::{ChainProfile, Cluster, DEFAULT_SOLANA_PATH, LAMPORTS_PER_SOL};
pub use credential::{encode_keypair, EncodedKeypair, WalletCredential};
pub use derivation::{
    derive_keypair, mnemonic_to_seed, DerivationPath, KeyDerivation, Seed, Slip10Ed25519,
};
pub use keypair::Keypair;
pub use mnemonic::RecoveryPhrase;
pub use phrase_input::PhraseSlots;
pub use transaction::{parse_sol_amount, Blockhash, Message, Pubkey, SignedTransaction};
