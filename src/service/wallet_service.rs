//! 钱包编排服务
//!
//! 创建 / 导入 / 签名 / 发送。派生与 KDF 在阻塞线程池上执行；
//! 创建与导入共用一个进行中标志，同一时间只允许一个。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::domain::credential::WalletCredential;
use crate::domain::derivation::{
    mnemonic_to_seed, DerivationPath, KeyDerivation, Slip10Ed25519, WALLET_SEED_PASSPHRASE,
};
use crate::domain::mnemonic::{self, split_words, RecoveryPhrase};
use crate::domain::transaction::{parse_sol_amount, Blockhash, Message, Pubkey, SignedTransaction};
use crate::error::{WalletError, WalletResult};
use crate::infrastructure::credential_vault::CredentialVault;
use crate::infrastructure::encryption::VaultSecret;
use crate::infrastructure::kv_store::KeyValueStore;
use crate::infrastructure::rpc_client::{ChainClient, SignatureInfo};
use crate::service::signer::{self, SigningHandle, TransactionSigner};

// 进行中标志的 RAII 守卫
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> WalletResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WalletError::OperationInFlight)?;
        Ok(Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// 钱包服务
pub struct WalletService<S> {
    vault: CredentialVault<S>,
    derivation_path: DerivationPath,
    deriver: Arc<dyn KeyDerivation>,
    in_flight: AtomicBool,
}

impl<S: KeyValueStore> WalletService<S> {
    pub fn new(vault: CredentialVault<S>, derivation_path: DerivationPath) -> Self {
        Self {
            vault,
            derivation_path,
            deriver: Arc::new(Slip10Ed25519),
            in_flight: AtomicBool::new(false),
        }
    }

    /// 按配置构造（派生路径、KDF 参数）
    pub fn from_config(config: &Config, store: S, secret: VaultSecret) -> WalletResult<Self> {
        let path = config.wallet.derivation_path()?;
        let kdf = config.storage.kdf_params();
        kdf.validate()
            .map_err(|e| WalletError::Config(e.to_string()))?;
        Ok(Self::new(CredentialVault::new(store, secret, kdf), path))
    }

    /// 替换派生策略
    pub fn with_deriver(mut self, deriver: Arc<dyn KeyDerivation>) -> Self {
        self.deriver = deriver;
        self
    }

    pub fn derivation_path(&self) -> &DerivationPath {
        &self.derivation_path
    }

    pub fn vault(&self) -> &CredentialVault<S> {
        &self.vault
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 创建 / 导入
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 生成新助记词、派生密钥对并持久化
    pub async fn create_wallet(&self) -> WalletResult<WalletCredential> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;

        let path = self.derivation_path.clone();
        let deriver = self.deriver.clone();
        let credential = tokio::task::spawn_blocking(move || {
            let phrase = mnemonic::generate()?;
            derive_credential(deriver.as_ref(), &phrase, path)
        })
        .await??;

        self.vault.store(&credential).await?;

        info!(
            address = %credential.public_key(),
            path = %credential.path(),
            "wallet created"
        );
        Ok(credential)
    }

    /// 从 12 个单词导入
    ///
    /// 校验失败时返回 `WalletError::InvalidMnemonic`，不会进行派生。
    pub async fn import_wallet<W: AsRef<str>>(&self, words: &[W]) -> WalletResult<WalletCredential> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;

        let phrase = RecoveryPhrase::from_words(words)?;

        let path = self.derivation_path.clone();
        let deriver = self.deriver.clone();
        let credential = tokio::task::spawn_blocking(move || {
            derive_credential(deriver.as_ref(), &phrase, path)
        })
        .await??;

        self.vault.store(&credential).await?;

        info!(
            address = %credential.public_key(),
            path = %credential.path(),
            "wallet imported"
        );
        Ok(credential)
    }

    /// 从整段粘贴的短语导入
    pub async fn import_phrase(&self, phrase: &str) -> WalletResult<WalletCredential> {
        self.import_wallet(&split_words(phrase)).await
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 查询 / 重置
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn current_wallet(&self) -> WalletResult<Option<WalletCredential>> {
        self.vault.load().await
    }

    pub async fn has_wallet(&self) -> WalletResult<bool> {
        Ok(self.vault.stored_address().await?.is_some())
    }

    /// 当前钱包地址（无需解锁）
    pub async fn public_address(&self) -> WalletResult<String> {
        self.vault
            .stored_address()
            .await?
            .ok_or(WalletError::WalletNotFound)
    }

    /// 显式删除钱包
    pub async fn reset_wallet(&self) -> WalletResult<()> {
        self.vault.clear().await?;
        warn!("wallet reset");
        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 签名 / 发送
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 构造并签名 SOL 转账（不联网）
    pub fn sign_transfer(
        &self,
        credential: &WalletCredential,
        recipient: &str,
        amount_sol: &str,
        recent_blockhash: Blockhash,
    ) -> WalletResult<SignedTransaction> {
        let to: Pubkey = recipient.parse()?;
        let lamports = parse_sol_amount(amount_sol)?;
        sign_transfer_lamports(credential, &to, lamports, recent_blockhash)
    }

    /// 获取区块哈希、签名并提交
    ///
    /// 提交失败时返回 `WalletError::Broadcast`，其中的已签名交易仍可重新提交。
    pub async fn send_transfer(
        &self,
        client: &dyn ChainClient,
        credential: &WalletCredential,
        recipient: &str,
        amount_sol: &str,
    ) -> WalletResult<String> {
        // 先校验输入再联网
        let to: Pubkey = recipient.parse()?;
        let lamports = parse_sol_amount(amount_sol)?;

        let blockhash = client.latest_blockhash().await?;
        let signed = sign_transfer_lamports(credential, &to, lamports, blockhash)?;

        match client.send_transaction(&signed).await {
            Ok(signature) => {
                info!(
                    signature = %signature,
                    from = %credential.public_key(),
                    to = %to,
                    lamports,
                    "transfer submitted"
                );
                Ok(signature)
            }
            Err(e) => {
                warn!(
                    signature = %signed.signature_base58().unwrap_or_default(),
                    error = %e,
                    "transfer submission failed"
                );
                Err(WalletError::Broadcast {
                    message: e.to_string(),
                    signed: Box::new(signed),
                })
            }
        }
    }

    /// 对外部构建的 base64 交易签名（兑换流程）
    pub fn sign_serialized_transaction(
        &self,
        credential: &WalletCredential,
        encoded_transaction: &str,
    ) -> WalletResult<SignedTransaction> {
        let handle = load_checked_signer(credential)?;
        let signed = signer::sign_serialized_base64(&handle, encoded_transaction)?;
        info!(
            address = %credential.public_key(),
            signatures = signed.signatures().len(),
            "external transaction signed"
        );
        Ok(signed)
    }

    /// 当前钱包余额（lamports）
    pub async fn balance(&self, client: &dyn ChainClient) -> WalletResult<u64> {
        let address: Pubkey = self.public_address().await?.parse()?;
        client.get_balance(&address).await
    }

    /// 当前钱包最近的交易签名
    pub async fn recent_activity(
        &self,
        client: &dyn ChainClient,
        limit: usize,
    ) -> WalletResult<Vec<SignatureInfo>> {
        let address: Pubkey = self.public_address().await?.parse()?;
        client.recent_signatures(&address, limit).await
    }
}

/// 助记词 → 种子 → 密钥对 → 凭证
fn derive_credential(
    deriver: &dyn KeyDerivation,
    phrase: &RecoveryPhrase,
    path: DerivationPath,
) -> WalletResult<WalletCredential> {
    let seed = mnemonic_to_seed(phrase, WALLET_SEED_PASSPHRASE)?;
    let keypair = deriver.derive(&seed, &path)?;
    Ok(WalletCredential::from_parts(phrase, path, &keypair))
}

/// 重建签名句柄，并确认与凭证中的公钥一致
fn load_checked_signer(credential: &WalletCredential) -> WalletResult<SigningHandle> {
    let handle = signer::load_signer(credential.private_key())?;
    if handle.address() != credential.public_key() {
        return Err(WalletError::Decoding(
            "stored public key does not match private key".to_string(),
        ));
    }
    Ok(handle)
}

fn sign_transfer_lamports(
    credential: &WalletCredential,
    to: &Pubkey,
    lamports: u64,
    recent_blockhash: Blockhash,
) -> WalletResult<SignedTransaction> {
    let handle = load_checked_signer(credential)?;
    let message = Message::new_transfer(&handle.public_key(), to, lamports, recent_blockhash);
    let signed = signer::sign(&handle, &message)?;

    info!(
        signature = %signed.signature_base58().unwrap_or_default(),
        from = %credential.public_key(),
        to = %to,
        lamports,
        "transfer signed"
    );
    Ok(signed)
}
