//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::chain_config::{Cluster, DEFAULT_SOLANA_PATH};
use crate::domain::derivation::DerivationPath;
use crate::error::{WalletError, WalletResult};
use crate::infrastructure::encryption::{KdfParams, VaultSecret};

/// 钱包核心配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 派生配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// 派生路径（终端用户不可修改）
    pub derivation_path: String,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub store_path: String,
    pub kdf_memory_kib: u32,
    pub kdf_iterations: u32,
    pub kdf_parallelism: u32,
}

/// Solana 网络配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// devnet / testnet / mainnet-beta
    pub cluster: String,
    /// 覆盖集群默认端点
    #[serde(default)]
    pub rpc_url: Option<String>,
    pub timeout_secs: u64,
    pub commitment: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub enable_file_logging: bool,
    pub log_file_path: Option<String>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            derivation_path: std::env::var("WALLET_DERIVATION_PATH")
                .unwrap_or_else(|_| DEFAULT_SOLANA_PATH.to_string()),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let kdf = KdfParams::default();
        Self {
            store_path: std::env::var("WALLET_STORE_PATH")
                .unwrap_or_else(|_| "./data/wallet.json".into()),
            kdf_memory_kib: std::env::var("WALLET_KDF_MEMORY_KIB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(kdf.memory_kib),
            kdf_iterations: std::env::var("WALLET_KDF_ITERATIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(kdf.iterations),
            kdf_parallelism: std::env::var("WALLET_KDF_PARALLELISM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(kdf.parallelism),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cluster: std::env::var("SOLANA_CLUSTER").unwrap_or_else(|_| "devnet".into()),
            rpc_url: std::env::var("SOLANA_RPC_URL").ok(),
            timeout_secs: std::env::var("RPC_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            commitment: "confirmed".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            enable_file_logging: std::env::var("LOG_FILE_ENABLED")
                .ok()
                .map(|v| v == "1")
                .unwrap_or(false),
            log_file_path: std::env::var("LOG_FILE_PATH").ok(),
        }
    }
}

impl WalletConfig {
    pub fn derivation_path(&self) -> WalletResult<DerivationPath> {
        self.derivation_path.parse()
    }
}

impl StorageConfig {
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            memory_kib: self.kdf_memory_kib,
            iterations: self.kdf_iterations,
            parallelism: self.kdf_parallelism,
        }
    }

    /// 从 `WALLET_VAULT_KEY` 读取保管库口令
    pub fn vault_secret_from_env() -> Result<VaultSecret> {
        let key = std::env::var("WALLET_VAULT_KEY")
            .context("WALLET_VAULT_KEY environment variable not set")?;

        if key.len() < 16 {
            anyhow::bail!("WALLET_VAULT_KEY too short (min 16)");
        }

        VaultSecret::from_passphrase(&key).map_err(|e| anyhow::anyhow!(e))
    }
}

impl NetworkConfig {
    pub fn cluster(&self) -> WalletResult<Cluster> {
        self.cluster.parse()
    }

    /// 实际使用的 RPC 端点
    pub fn rpc_endpoint(&self) -> WalletResult<String> {
        match &self.rpc_url {
            Some(url) if !url.trim().is_empty() => Ok(url.trim().to_string()),
            _ => Ok(self.cluster()?.rpc_url().to_string()),
        }
    }
}

impl Config {
    /// 从环境变量加载配置（先读取 `.env`）
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            wallet: WalletConfig::default(),
            storage: StorageConfig::default(),
            network: NetworkConfig::default(),
            logging: LoggingConfig::default(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        self.wallet
            .derivation_path()
            .map_err(config_error)
            .context("WALLET_DERIVATION_PATH is invalid")?;

        if self.storage.store_path.trim().is_empty() {
            anyhow::bail!("WALLET_STORE_PATH must not be empty");
        }

        self.storage
            .kdf_params()
            .validate()
            .map_err(config_error)
            .context("WALLET_KDF_* parameters are invalid")?;

        self.network.rpc_endpoint().map_err(config_error)?;

        if self.network.timeout_secs == 0 {
            anyhow::bail!("RPC_TIMEOUT_SECS must be greater than 0");
        }

        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        Ok(())
    }
}

#[cfg(test)]
impl Config {
    /// 不读环境变量的固定配置
    pub(crate) fn fixed() -> Self {
        let kdf = KdfParams::default();
        Self {
            wallet: WalletConfig {
                derivation_path: DEFAULT_SOLANA_PATH.to_string(),
            },
            storage: StorageConfig {
                store_path: "./data/wallet.json".into(),
                kdf_memory_kib: kdf.memory_kib,
                kdf_iterations: kdf.iterations,
                kdf_parallelism: kdf.parallelism,
            },
            network: NetworkConfig {
                cluster: "devnet".into(),
                rpc_url: None,
                timeout_secs: 30,
                commitment: "confirmed".into(),
            },
            logging: LoggingConfig {
                level: "info".into(),
                format: "text".into(),
                enable_file_logging: false,
                log_file_path: None,
            },
        }
    }
}

fn config_error(err: WalletError) -> anyhow::Error {
    anyhow::anyhow!(err)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use tempfile::NamedTempFile;

    use super::*;

    // 修改进程环境变量的测试串行执行
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_config_from_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("WALLET_DERIVATION_PATH", "m/44'/501'/7'/0'");
        let config = Config::from_env().unwrap();
        std::env::remove_var("WALLET_DERIVATION_PATH");

        assert_eq!(config.wallet.derivation_path, "m/44'/501'/7'/0'");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fixed_config_ignores_environment() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("WALLET_DERIVATION_PATH", "m/44'/501'/9'/0'");
        let config = Config::fixed();
        std::env::remove_var("WALLET_DERIVATION_PATH");

        assert_eq!(config.wallet.derivation_path, DEFAULT_SOLANA_PATH);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[wallet]
derivation_path = "m/44'/501'/2'/0'"

[storage]
store_path = "/tmp/ironseed/wallet.json"
kdf_memory_kib = 8192
kdf_iterations = 3
kdf_parallelism = 1

[network]
cluster = "mainnet-beta"
timeout_secs = 15
commitment = "finalized"

[logging]
level = "debug"
format = "json"
enable_file_logging = false
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(
            config.wallet.derivation_path().unwrap().to_string(),
            "m/44'/501'/2'/0'"
        );
        assert_eq!(config.storage.kdf_params().memory_kib, 8192);
        assert_eq!(config.network.cluster().unwrap(), Cluster::MainnetBeta);
        assert_eq!(
            config.network.rpc_endpoint().unwrap(),
            "https://api.mainnet-beta.solana.com"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rpc_url_overrides_cluster() {
        let network = NetworkConfig {
            cluster: "devnet".into(),
            rpc_url: Some("http://127.0.0.1:8899".into()),
            timeout_secs: 5,
            commitment: "confirmed".into(),
        };
        assert_eq!(network.rpc_endpoint().unwrap(), "http://127.0.0.1:8899");
    }

    #[test]
    fn test_config_validation_rejects_bad_values() {
        let mut config = Config::fixed();
        config.wallet.derivation_path = "m/44'/501'/0'/0".into();
        assert!(config.validate().is_err());

        let mut config = Config::fixed();
        config.network.cluster = "moonnet".into();
        config.network.rpc_url = None;
        assert!(config.validate().is_err());

        let mut config = Config::fixed();
        config.storage.kdf_memory_kib = 1;
        assert!(config.validate().is_err());

        let mut config = Config::fixed();
        config.logging.format = "xml".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_vault_secret_from_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("WALLET_VAULT_KEY", "short");
        let short = StorageConfig::vault_secret_from_env();

        std::env::set_var("WALLET_VAULT_KEY", "a-sufficiently-long-vault-key");
        let long = StorageConfig::vault_secret_from_env();
        std::env::remove_var("WALLET_VAULT_KEY");

        assert!(short.is_err());
        assert!(long.is_ok());
    }
}
