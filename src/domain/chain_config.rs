//! Solana 链配置
//!
//! 钱包只支持一条链（Solana, ed25519 / SLIP-0010），
//! 但派生路径、集群端点等仍然作为显式配置值传递。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::derivation::DerivationPath;
use crate::error::{WalletError, WalletResult};

/// SLIP-44 coin type
pub const SOLANA_COIN_TYPE: u32 = 501;

/// 默认派生路径（Phantom / Solflare 兼容）
pub const DEFAULT_SOLANA_PATH: &str = "m/44'/501'/0'/0'";

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// 链描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainProfile {
    pub name: &'static str,
    pub symbol: &'static str,
    /// BIP44 coin type
    pub coin_type: u32,
    /// 最小单位小数位数
    pub decimals: u32,
    pub default_path: &'static str,
}

impl ChainProfile {
    pub fn solana() -> Self {
        Self {
            name: "Solana",
            symbol: "SOL",
            coin_type: SOLANA_COIN_TYPE,
            decimals: 9,
            default_path: DEFAULT_SOLANA_PATH,
        }
    }

    /// 默认派生路径（已解析）
    pub fn default_derivation_path(&self) -> WalletResult<DerivationPath> {
        self.default_path.parse()
    }

    /// 指定账户的派生路径: m/44'/coin'/account'/0'
    pub fn derivation_path(&self, account: u32) -> WalletResult<DerivationPath> {
        format!("m/44'/{}'/{}'/0'", self.coin_type, account).parse()
    }
}

/// Solana 集群
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Cluster {
    #[default]
    Devnet,
    Testnet,
    MainnetBeta,
    /// 自定义 RPC 端点
    Custom(String),
}

impl Cluster {
    pub fn rpc_url(&self) -> &str {
        match self {
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::MainnetBeta => "https://api.mainnet-beta.solana.com",
            Cluster::Custom(url) => url,
        }
    }

    pub fn is_mainnet(&self) -> bool {
        matches!(self, Cluster::MainnetBeta)
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cluster::Devnet => write!(f, "devnet"),
            Cluster::Testnet => write!(f, "testnet"),
            Cluster::MainnetBeta => write!(f, "mainnet-beta"),
            Cluster::Custom(url) => write!(f, "{}", url),
        }
    }
}

impl FromStr for Cluster {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "devnet" => Ok(Cluster::Devnet),
            "testnet" => Ok(Cluster::Testnet),
            "mainnet" | "mainnet-beta" => Ok(Cluster::MainnetBeta),
            lower if lower.starts_with("http://") || lower.starts_with("https://") => {
                Ok(Cluster::Custom(s.to_string()))
            }
            _ => Err(WalletError::Config(format!("Unknown Solana cluster: {}", s))),
        }
    }
}

impl TryFrom<String> for Cluster {
    type Error = WalletError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Cluster> for String {
    fn from(cluster: Cluster) -> Self {
        cluster.to_string()
    }
}
