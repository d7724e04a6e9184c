pub mod signer; // 签名网关（纯本地）
pub mod wallet_service;

pub use signer::{load_signer, SigningHandle, TransactionSigner};
pub use wallet_service::WalletService;
