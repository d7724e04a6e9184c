pub mod credential_vault;
pub mod encryption;
pub mod kv_store;
pub mod logging;
pub mod rpc_client;

pub use credential_vault::{CredentialVault, WALLET_KEY};
pub use encryption::{KdfParams, VaultSecret};
pub use kv_store::{FileKvStore, KeyValueStore, MemoryKvStore};
pub use rpc_client::{ChainClient, SignatureInfo, SolanaRpcClient};
