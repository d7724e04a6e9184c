//! 种子与密钥派生
//!
//! 助记词 → BIP39 种子（PBKDF2-HMAC-SHA512, 2048 轮）→ SLIP-0010 ed25519 派生。
//!
//! SLIP-0010 的 ed25519 曲线只支持硬化派生，路径中的每一段都必须带 `'`（或 `h`）。

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use zeroize::{Zeroize, Zeroizing};

use crate::domain::keypair::Keypair;
use crate::domain::mnemonic::RecoveryPhrase;
use crate::error::{WalletError, WalletResult};

type HmacSha512 = Hmac<Sha512>;

/// 硬化索引偏移量 2^31
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// BIP39 种子长度
pub const SEED_LEN: usize = 64;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 派生路径
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 已解析的派生路径（全部为硬化段）
///
/// `indices` 保存未加偏移量的索引值，例如 `m/44'/501'/0'/0'` → `[44, 501, 0, 0]`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DerivationPath {
    indices: Vec<u32>,
}

impl DerivationPath {
    /// 解析路径字符串
    ///
    /// 规则：必须以 `m/` 开头，至少一段，每段以 `'` 或 `h` 结尾，索引 < 2^31。
    pub fn parse(path: &str) -> WalletResult<Self> {
        let path = path.trim();

        let segments = path
            .strip_prefix("m/")
            .ok_or_else(|| WalletError::InvalidPath(format!("must start with 'm/': {}", path)))?;

        if segments.is_empty() {
            return Err(WalletError::InvalidPath("empty derivation path".to_string()));
        }

        let mut indices = Vec::new();
        for segment in segments.split('/') {
            let number = segment
                .strip_suffix('\'')
                .or_else(|| segment.strip_suffix('h'))
                .ok_or_else(|| {
                    WalletError::InvalidPath(format!(
                        "ed25519 requires every segment to be hardened: '{}'",
                        segment
                    ))
                })?;

            let index: u32 = number.parse().map_err(|_| {
                WalletError::InvalidPath(format!("invalid index '{}'", segment))
            })?;

            if index >= HARDENED_OFFSET {
                return Err(WalletError::InvalidPath(format!(
                    "index out of range: {}",
                    index
                )));
            }

            indices.push(index);
        }

        Ok(Self { indices })
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn depth(&self) -> usize {
        self.indices.len()
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for index in &self.indices {
            write!(f, "/{}'", index)?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DerivationPath {
    type Error = WalletError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DerivationPath> for String {
    fn from(path: DerivationPath) -> Self {
        path.to_string()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 种子
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// BIP39 种子（64 字节，drop 时清零，从不持久化）
pub struct Seed(Zeroizing<[u8; SEED_LEN]>);

impl Seed {
    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed([REDACTED])")
    }
}

/// 钱包使用空的 BIP39 口令
pub const WALLET_SEED_PASSPHRASE: &str = "";

/// 助记词 → 种子
///
/// 盐为 `"mnemonic" || passphrase`，钱包默认使用空口令。
pub fn mnemonic_to_seed(phrase: &RecoveryPhrase, passphrase: &str) -> WalletResult<Seed> {
    let mnemonic = phrase.to_bip39()?;
    Ok(Seed::from_bytes(mnemonic.to_seed(passphrase)))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 派生策略
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 密钥派生策略 trait（每种曲线一个实现）
pub trait KeyDerivation: Send + Sync {
    /// 曲线名称
    fn curve(&self) -> &'static str;

    /// 从种子按路径派生密钥对
    fn derive(&self, seed: &Seed, path: &DerivationPath) -> WalletResult<Keypair>;
}

/// SLIP-0010 ed25519 派生
pub struct Slip10Ed25519;

impl Slip10Ed25519 {
    const MASTER_SECRET: &'static [u8] = b"ed25519 seed";

    /// I = HMAC-SHA512(Key = "ed25519 seed", Data = seed)
    fn master_key(seed: &[u8]) -> WalletResult<([u8; 32], [u8; 32])> {
        let mut mac = HmacSha512::new_from_slice(Self::MASTER_SECRET)
            .map_err(|e| WalletError::Derivation(format!("HMAC init failed: {}", e)))?;
        mac.update(seed);
        Ok(split_output(mac))
    }

    /// I = HMAC-SHA512(Key = chain_code, Data = 0x00 || key || ser32(index | 2^31))
    fn child_key(
        parent_key: &[u8; 32],
        parent_chain_code: &[u8; 32],
        index: u32,
    ) -> WalletResult<([u8; 32], [u8; 32])> {
        let mut mac = HmacSha512::new_from_slice(parent_chain_code)
            .map_err(|e| WalletError::Derivation(format!("HMAC init failed: {}", e)))?;
        mac.update(&[0x00]);
        mac.update(parent_key);
        mac.update(&(index | HARDENED_OFFSET).to_be_bytes());
        Ok(split_output(mac))
    }

    /// 派生原始 32 字节私钥
    pub fn derive_secret(
        &self,
        seed: &[u8],
        path: &DerivationPath,
    ) -> WalletResult<Zeroizing<[u8; 32]>> {
        let (mut key, mut chain_code) = Self::master_key(seed)?;

        for &index in path.indices() {
            let (child_key, child_chain_code) = Self::child_key(&key, &chain_code, index)?;
            key.zeroize();
            chain_code.zeroize();
            key = child_key;
            chain_code = child_chain_code;
        }

        chain_code.zeroize();
        let secret = Zeroizing::new(key);
        key.zeroize();
        Ok(secret)
    }
}

impl KeyDerivation for Slip10Ed25519 {
    fn curve(&self) -> &'static str {
        "ed25519"
    }

    fn derive(&self, seed: &Seed, path: &DerivationPath) -> WalletResult<Keypair> {
        let secret = self.derive_secret(seed.as_bytes(), path)?;
        Ok(Keypair::from_secret_bytes(&secret))
    }
}

// HMAC 输出拆分为 (IL, IR)，中间缓冲区清零
fn split_output(mac: HmacSha512) -> ([u8; 32], [u8; 32]) {
    let mut buf = [0u8; 64];
    buf.copy_from_slice(&mac.finalize().into_bytes());

    let mut key = [0u8; 32];
    let mut chain_code = [0u8; 32];
    key.copy_from_slice(&buf[..32]);
    chain_code.copy_from_slice(&buf[32..]);
    buf.zeroize();

    (key, chain_code)
}

/// 使用 SLIP-0010 ed25519 派生密钥对
pub fn derive_keypair(seed: &Seed, path: &DerivationPath) -> WalletResult<Keypair> {
    Slip10Ed25519.derive(seed, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chain_config::DEFAULT_SOLANA_PATH;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn slip10_vector_seed() -> Vec<u8> {
        hex::decode("000102030405060708090a0b0c0d0e0f").unwrap()
    }

    #[test]
    fn test_parse_default_path() {
        let path = DerivationPath::parse(DEFAULT_SOLANA_PATH).unwrap();
        assert_eq!(path.indices(), &[44, 501, 0, 0]);
        assert_eq!(path.depth(), 4);
        assert_eq!(path.to_string(), DEFAULT_SOLANA_PATH);
    }

    #[test]
    fn test_parse_accepts_h_notation() {
        let path: DerivationPath = "m/44h/501h/2h/0h".parse().unwrap();
        assert_eq!(path.to_string(), "m/44'/501'/2'/0'");
    }

    #[test]
    fn test_parse_rejects_invalid_paths() {
        for bad in [
            "",
            "m",
            "m/",
            "44'/501'/0'/0'",
            "m/44'/501'/0'/0",
            "m/44'//0'",
            "m/abc'",
            "m/2147483648'",
        ] {
            let err = DerivationPath::parse(bad).unwrap_err();
            assert!(
                matches!(err, WalletError::InvalidPath(_)),
                "expected InvalidPath for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_path_serde_as_string() {
        let path = DerivationPath::parse(DEFAULT_SOLANA_PATH).unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"m/44'/501'/0'/0'\"");
        let back: DerivationPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
        assert!(serde_json::from_str::<DerivationPath>("\"m/44/501\"").is_err());
    }

    #[test]
    fn test_bip39_seed_vector() {
        let phrase = RecoveryPhrase::parse(TEST_MNEMONIC).unwrap();
        let seed = mnemonic_to_seed(&phrase, "").unwrap();
        assert_eq!(
            hex::encode(seed.as_bytes()),
            "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc1\
             9a5ac40b389cd370d086206dec8aa6c43daea6690f20ad3d8d48b2d2ce9e38e4"
        );
    }

    #[test]
    fn test_passphrase_changes_seed() {
        let phrase = RecoveryPhrase::parse(TEST_MNEMONIC).unwrap();
        let plain = mnemonic_to_seed(&phrase, "").unwrap();
        let salted = mnemonic_to_seed(&phrase, "TREZOR").unwrap();
        assert_ne!(plain.as_bytes(), salted.as_bytes());
    }

    #[test]
    fn test_slip10_master_vector() {
        let (key, chain_code) = Slip10Ed25519::master_key(&slip10_vector_seed()).unwrap();
        assert_eq!(
            hex::encode(key),
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"
        );
        assert_eq!(
            hex::encode(chain_code),
            "90046a93de5380a72b5e45010748567d5ea02bbf6522f979e05c0d8d8ca9fffb"
        );
    }

    #[test]
    fn test_slip10_first_hardened_child_vector() {
        let path = DerivationPath::parse("m/0'").unwrap();
        let secret = Slip10Ed25519
            .derive_secret(&slip10_vector_seed(), &path)
            .unwrap();
        assert_eq!(
            hex::encode(*secret),
            "68e0fe46dfb67e368c75379acec591dad19df3cde26e63b93a8e704f1dade7a3"
        );

        let keypair = Keypair::from_secret_bytes(&secret);
        assert_eq!(
            hex::encode(keypair.public_key_bytes()),
            "8c8a13df77a28f3445213a0f432fde644acaa215fc72dcdf300d5efaa85d350c"
        );
    }

    #[test]
    fn test_golden_solana_address() {
        let phrase = RecoveryPhrase::parse(TEST_MNEMONIC).unwrap();
        let seed = mnemonic_to_seed(&phrase, "").unwrap();
        let path = DerivationPath::parse(DEFAULT_SOLANA_PATH).unwrap();
        let keypair = derive_keypair(&seed, &path).unwrap();
        assert_eq!(
            keypair.public_address(),
            "HAgk14JpMQLgt6rVgv7cBQFJWFto5Dqxi472uT3DKpqk"
        );
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let phrase = RecoveryPhrase::parse(TEST_MNEMONIC).unwrap();
        let path = DerivationPath::parse(DEFAULT_SOLANA_PATH).unwrap();

        let first = derive_keypair(&mnemonic_to_seed(&phrase, "").unwrap(), &path).unwrap();
        let second = derive_keypair(&mnemonic_to_seed(&phrase, "").unwrap(), &path).unwrap();
        assert_eq!(first.public_key_bytes(), second.public_key_bytes());
        assert_eq!(*first.to_keypair_bytes(), *second.to_keypair_bytes());
    }

    #[test]
    fn test_different_accounts_give_different_keys() {
        let phrase = RecoveryPhrase::parse(TEST_MNEMONIC).unwrap();
        let seed = mnemonic_to_seed(&phrase, "").unwrap();
        let a = derive_keypair(&seed, &"m/44'/501'/0'/0'".parse().unwrap()).unwrap();
        let b = derive_keypair(&seed, &"m/44'/501'/1'/0'".parse().unwrap()).unwrap();
        assert_ne!(a.public_address(), b.public_address());
    }

    #[test]
    fn test_seed_debug_is_redacted() {
        let seed = Seed::from_bytes([7u8; SEED_LEN]);
        assert_eq!(format!("{:?}", seed), "Seed([REDACTED])");
    }
}
