//! Solana JSON-RPC 客户端
//!
//! 网络访问通过显式传入的 `ChainClient` 句柄完成，不使用模块级全局连接。

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::config::NetworkConfig;
use crate::domain::transaction::{Blockhash, Pubkey, SignedTransaction};
use crate::error::{WalletError, WalletResult};

/// 历史签名默认条数
pub const DEFAULT_SIGNATURE_LIMIT: usize = 20;

/// 历史签名记录
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub confirmation_status: Option<String>,
}

impl SignatureInfo {
    pub fn is_success(&self) -> bool {
        self.err.as_ref().map_or(true, |e| e.is_null())
    }
}

/// 链客户端（外部协作方）
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn latest_blockhash(&self) -> WalletResult<Blockhash>;

    /// 提交已签名交易，返回交易签名
    async fn send_transaction(&self, tx: &SignedTransaction) -> WalletResult<String>;

    /// 余额（lamports）
    async fn get_balance(&self, address: &Pubkey) -> WalletResult<u64>;

    async fn recent_signatures(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> WalletResult<Vec<SignatureInfo>>;
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'a str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

impl<'a> JsonRpcRequest<'a> {
    fn new(method: &'a str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        }
    }
}

#[derive(Deserialize)]
struct RpcContextValue<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlockhash {
    blockhash: String,
}

/// 从 JSON-RPC 响应中取出 `result`
fn parse_result<T: DeserializeOwned>(mut response: serde_json::Value) -> WalletResult<T> {
    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(WalletError::Rpc(message));
    }

    let result = response
        .get_mut("result")
        .map(serde_json::Value::take)
        .ok_or_else(|| WalletError::Rpc("missing result in RPC response".to_string()))?;

    serde_json::from_value(result)
        .map_err(|e| WalletError::Rpc(format!("unexpected RPC result: {}", e)))
}

fn parse_latest_blockhash(response: serde_json::Value) -> WalletResult<Blockhash> {
    let result: RpcContextValue<LatestBlockhash> = parse_result(response)?;
    result
        .value
        .blockhash
        .parse()
        .map_err(|e: WalletError| WalletError::Rpc(e.to_string()))
}

fn parse_balance(response: serde_json::Value) -> WalletResult<u64> {
    let result: RpcContextValue<u64> = parse_result(response)?;
    Ok(result.value)
}

/// JSON-RPC 实现
pub struct SolanaRpcClient {
    http_client: reqwest::Client,
    url: String,
    commitment: String,
}

impl SolanaRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> WalletResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| WalletError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            url: url.into(),
            commitment: "confirmed".to_string(),
        })
    }

    pub fn from_config(config: &NetworkConfig) -> WalletResult<Self> {
        let mut client = Self::new(
            config.rpc_endpoint()?,
            Duration::from_secs(config.timeout_secs),
        )?;
        client.commitment = config.commitment.clone();
        Ok(client)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> WalletResult<serde_json::Value> {
        debug!(method, url = %self.url, "solana rpc call");

        let response = self
            .http_client
            .post(&self.url)
            .json(&JsonRpcRequest::new(method, params))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(WalletError::Rpc(format!("{} returned HTTP {}", method, status)));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ChainClient for SolanaRpcClient {
    async fn latest_blockhash(&self) -> WalletResult<Blockhash> {
        let response = self
            .call(
                "getLatestBlockhash",
                serde_json::json!([{ "commitment": self.commitment }]),
            )
            .await?;
        parse_latest_blockhash(response)
    }

    async fn send_transaction(&self, tx: &SignedTransaction) -> WalletResult<String> {
        let response = self
            .call(
                "sendTransaction",
                serde_json::json!([
                    tx.to_base64()?,
                    {
                        "encoding": "base64",
                        "skipPreflight": false,
                        "preflightCommitment": self.commitment
                    }
                ]),
            )
            .await?;
        parse_result(response)
    }

    async fn get_balance(&self, address: &Pubkey) -> WalletResult<u64> {
        let response = self
            .call(
                "getBalance",
                serde_json::json!([address.to_string(), { "commitment": self.commitment }]),
            )
            .await?;
        parse_balance(response)
    }

    async fn recent_signatures(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> WalletResult<Vec<SignatureInfo>> {
        let response = self
            .call(
                "getSignaturesForAddress",
                serde_json::json!([address.to_string(), { "limit": limit }]),
            )
            .await?;
        parse_result(response)
    }
}
