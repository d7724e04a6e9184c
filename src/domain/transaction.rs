//! Solana 交易消息与线格式
//!
//! 只覆盖钱包需要的部分：
//! - 单条 System Program `Transfer` 指令的 legacy 消息构造
//! - 签名后交易的线格式编码（compact-u16 长度前缀）
//! - 外部构建的 legacy / v0 交易的签名者定位（用于兑换流程）

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::chain_config::LAMPORTS_PER_SOL;
use crate::domain::keypair::validate_address;
use crate::error::{WalletError, WalletResult};

pub const SIGNATURE_LEN: usize = 64;
pub const HASH_LEN: usize = 32;

/// System Program `Transfer` 指令编号
const SYSTEM_TRANSFER_TAG: u32 = 2;

/// 版本化消息前缀位
const VERSION_PREFIX_MASK: u8 = 0x80;

/// SOL 金额最多 9 位小数
const MAX_SOL_DECIMALS: u32 = 9;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 基础类型
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 32 字节账户公钥
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pubkey([u8; 32]);

impl Pubkey {
    /// System Program (`11111111111111111111111111111111`)
    pub const SYSTEM_PROGRAM: Pubkey = Pubkey([0u8; 32]);

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for Pubkey {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_address(s).map(Self)
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self)
    }
}

/// 最近区块哈希
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Blockhash([u8; HASH_LEN]);

impl Blockhash {
    pub const fn new(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl FromStr for Blockhash {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| WalletError::InvalidTransaction(format!("invalid blockhash: {}", e)))?;
        let hash: [u8; HASH_LEN] = bytes.as_slice().try_into().map_err(|_| {
            WalletError::InvalidTransaction(format!(
                "blockhash must be {} bytes, got {}",
                HASH_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(hash))
    }
}

impl fmt::Display for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blockhash({})", self)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// compact-u16
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 写入 compact-u16（每字节 7 位，最多 3 字节）
pub fn encode_compact_u16(value: usize, out: &mut Vec<u8>) -> WalletResult<()> {
    if value > u16::MAX as usize {
        return Err(WalletError::InvalidTransaction(format!(
            "length {} exceeds compact-u16 range",
            value
        )));
    }

    let mut remaining = value;
    loop {
        let mut byte = (remaining & 0x7f) as u8;
        remaining >>= 7;
        if remaining == 0 {
            out.push(byte);
            return Ok(());
        }
        byte |= 0x80;
        out.push(byte);
    }
}

/// 读取 compact-u16，返回 (值, 消耗字节数)
///
/// 只接受最短编码：续位之后的末字节不能为 0。
pub fn decode_compact_u16(bytes: &[u8]) -> WalletResult<(usize, usize)> {
    let mut value = 0usize;
    for (i, &byte) in bytes.iter().take(3).enumerate() {
        value |= ((byte & 0x7f) as usize) << (7 * i);
        if byte & 0x80 == 0 {
            if i > 0 && byte == 0 {
                return Err(WalletError::InvalidTransaction(
                    "non-canonical compact-u16 length".to_string(),
                ));
            }
            if value > u16::MAX as usize {
                break;
            }
            return Ok((value, i + 1));
        }
    }
    Err(WalletError::InvalidTransaction(
        "malformed compact-u16 length".to_string(),
    ))
}

// 按偏移量读取的小游标
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, len: usize) -> WalletResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| WalletError::InvalidTransaction("unexpected end of data".to_string()))?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u8(&mut self) -> WalletResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn compact_u16(&mut self) -> WalletResult<usize> {
        let (value, used) = decode_compact_u16(&self.bytes[self.offset.min(self.bytes.len())..])?;
        self.offset += used;
        Ok(value)
    }

    fn array32(&mut self) -> WalletResult<[u8; 32]> {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.take(32)?);
        Ok(out)
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.offset..]
    }

    fn is_empty(&self) -> bool {
        self.offset >= self.bytes.len()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 消息
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

/// legacy 消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Blockhash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// 构造 SOL 转账消息
    ///
    /// 账户顺序：`[from, to, system_program]`，header `[1, 0, 1]`。
    /// 自己转给自己时收敛为 `[from, system_program]`。
    pub fn new_transfer(
        from: &Pubkey,
        to: &Pubkey,
        lamports: u64,
        recent_blockhash: Blockhash,
    ) -> Self {
        let mut data = Vec::with_capacity(12);
        data.extend_from_slice(&SYSTEM_TRANSFER_TAG.to_le_bytes());
        data.extend_from_slice(&lamports.to_le_bytes());

        let (account_keys, program_id_index, accounts) = if from == to {
            (vec![*from, Pubkey::SYSTEM_PROGRAM], 1, vec![0, 0])
        } else {
            (vec![*from, *to, Pubkey::SYSTEM_PROGRAM], 2, vec![0, 1])
        };

        Self {
            header: MessageHeader {
                num_required_signatures: 1,
                num_readonly_signed_accounts: 0,
                num_readonly_unsigned_accounts: 1,
            },
            account_keys,
            recent_blockhash,
            instructions: vec![CompiledInstruction {
                program_id_index,
                accounts,
                data,
            }],
        }
    }

    /// 需要签名的账户（前 `num_required_signatures` 个）
    pub fn signers(&self) -> &[Pubkey] {
        let n = (self.header.num_required_signatures as usize).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    /// 序列化为签名所覆盖的字节
    pub fn serialize(&self) -> WalletResult<Vec<u8>> {
        let mut out = Vec::with_capacity(128);
        out.push(self.header.num_required_signatures);
        out.push(self.header.num_readonly_signed_accounts);
        out.push(self.header.num_readonly_unsigned_accounts);

        encode_compact_u16(self.account_keys.len(), &mut out)?;
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }

        out.extend_from_slice(self.recent_blockhash.as_bytes());

        encode_compact_u16(self.instructions.len(), &mut out)?;
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            encode_compact_u16(ix.accounts.len(), &mut out)?;
            out.extend_from_slice(&ix.accounts);
            encode_compact_u16(ix.data.len(), &mut out)?;
            out.extend_from_slice(&ix.data);
        }

        Ok(out)
    }

    /// 解析 legacy 消息
    pub fn deserialize(bytes: &[u8]) -> WalletResult<Self> {
        if bytes.first().is_some_and(|b| b & VERSION_PREFIX_MASK != 0) {
            return Err(WalletError::InvalidTransaction(
                "versioned message is not a legacy message".to_string(),
            ));
        }

        let mut reader = Reader::new(bytes);
        let header = MessageHeader {
            num_required_signatures: reader.u8()?,
            num_readonly_signed_accounts: reader.u8()?,
            num_readonly_unsigned_accounts: reader.u8()?,
        };

        let key_count = reader.compact_u16()?;
        let mut account_keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            account_keys.push(Pubkey(reader.array32()?));
        }

        let recent_blockhash = Blockhash(reader.array32()?);

        let ix_count = reader.compact_u16()?;
        let mut instructions = Vec::with_capacity(ix_count);
        for _ in 0..ix_count {
            let program_id_index = reader.u8()?;
            let account_len = reader.compact_u16()?;
            let accounts = reader.take(account_len)?.to_vec();
            let data_len = reader.compact_u16()?;
            let data = reader.take(data_len)?.to_vec();
            instructions.push(CompiledInstruction {
                program_id_index,
                accounts,
                data,
            });
        }

        if !reader.is_empty() {
            return Err(WalletError::InvalidTransaction(
                "trailing bytes after message".to_string(),
            ));
        }

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }

    /// 若为单条 System Transfer，返回 (from, to, lamports)
    pub fn as_transfer(&self) -> Option<(Pubkey, Pubkey, u64)> {
        let [ix] = self.instructions.as_slice() else {
            return None;
        };
        let program = self.account_keys.get(ix.program_id_index as usize)?;
        if *program != Pubkey::SYSTEM_PROGRAM || ix.data.len() != 12 || ix.accounts.len() != 2 {
            return None;
        }
        let tag = u32::from_le_bytes(ix.data[..4].try_into().ok()?);
        if tag != SYSTEM_TRANSFER_TAG {
            return None;
        }
        let lamports = u64::from_le_bytes(ix.data[4..].try_into().ok()?);
        let from = *self.account_keys.get(ix.accounts[0] as usize)?;
        let to = *self.account_keys.get(ix.accounts[1] as usize)?;
        Some((from, to, lamports))
    }
}

/// 从已序列化的消息（legacy 或 v0）中读取必需签名者
///
/// 只解析 header 与静态账户表，其余部分原样保留。
pub fn required_signers(message: &[u8]) -> WalletResult<Vec<Pubkey>> {
    let mut reader = Reader::new(message);

    let first = *message
        .first()
        .ok_or_else(|| WalletError::InvalidTransaction("empty message".to_string()))?;
    if first & VERSION_PREFIX_MASK != 0 {
        let version = reader.u8()? & !VERSION_PREFIX_MASK;
        if version != 0 {
            return Err(WalletError::InvalidTransaction(format!(
                "unsupported message version {}",
                version
            )));
        }
    }

    let num_required = reader.u8()? as usize;
    reader.take(2)?;

    let key_count = reader.compact_u16()?;
    if num_required == 0 || num_required > key_count {
        return Err(WalletError::InvalidTransaction(format!(
            "{} required signers but {} account keys",
            num_required, key_count
        )));
    }

    let mut signers = Vec::with_capacity(num_required);
    for i in 0..key_count {
        let key = Pubkey(reader.array32()?);
        if i < num_required {
            signers.push(key);
        }
    }

    // 至少要有区块哈希
    reader.take(HASH_LEN)?;

    Ok(signers)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 已签名交易
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 已签名交易
///
/// 线格式：`compact(签名数) || 签名[64] * n || 消息字节`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    signatures: Vec<[u8; SIGNATURE_LEN]>,
    message: Vec<u8>,
    signers: Vec<Pubkey>,
}

impl SignedTransaction {
    pub(crate) fn new(
        signatures: Vec<[u8; SIGNATURE_LEN]>,
        message: Vec<u8>,
        signers: Vec<Pubkey>,
    ) -> Self {
        Self {
            signatures,
            message,
            signers,
        }
    }

    /// 解析线格式（签名槽位可为全零）
    pub fn from_wire_bytes(bytes: &[u8]) -> WalletResult<Self> {
        let mut reader = Reader::new(bytes);
        let count = reader.compact_u16()?;

        let mut signatures = Vec::with_capacity(count);
        for _ in 0..count {
            let mut signature = [0u8; SIGNATURE_LEN];
            signature.copy_from_slice(reader.take(SIGNATURE_LEN)?);
            signatures.push(signature);
        }

        let message = reader.rest().to_vec();
        let signers = required_signers(&message)?;
        if signers.len() != count {
            return Err(WalletError::InvalidTransaction(format!(
                "{} signature slots but {} required signers",
                count,
                signers.len()
            )));
        }

        Ok(Self {
            signatures,
            message,
            signers,
        })
    }

    pub fn from_base64(encoded: &str) -> WalletResult<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| WalletError::InvalidTransaction(format!("invalid base64: {}", e)))?;
        Self::from_wire_bytes(&bytes)
    }

    pub fn signatures(&self) -> &[[u8; SIGNATURE_LEN]] {
        &self.signatures
    }

    pub fn message_bytes(&self) -> &[u8] {
        &self.message
    }

    pub fn signers(&self) -> &[Pubkey] {
        &self.signers
    }

    /// 填充指定签名者的签名槽位
    pub(crate) fn set_signature(&mut self, signer: &Pubkey, signature: [u8; SIGNATURE_LEN]) -> bool {
        match self.signers.iter().position(|s| s == signer) {
            Some(index) => {
                self.signatures[index] = signature;
                true
            }
            None => false,
        }
    }

    pub fn to_wire_bytes(&self) -> WalletResult<Vec<u8>> {
        let mut out = Vec::with_capacity(1 + self.signatures.len() * SIGNATURE_LEN + self.message.len());
        encode_compact_u16(self.signatures.len(), &mut out)?;
        for signature in &self.signatures {
            out.extend_from_slice(signature);
        }
        out.extend_from_slice(&self.message);
        Ok(out)
    }

    pub fn to_base64(&self) -> WalletResult<String> {
        Ok(BASE64.encode(self.to_wire_bytes()?))
    }

    /// 首个签名（即交易 ID）
    pub fn signature_base58(&self) -> Option<String> {
        self.signatures
            .first()
            .map(|s| bs58::encode(s).into_string())
    }

    /// 所有签名均对消息字节有效
    pub fn verify(&self) -> bool {
        !self.signatures.is_empty()
            && self.signatures.len() == self.signers.len()
            && self
                .signatures
                .iter()
                .zip(&self.signers)
                .all(|(sig, key)| verify_signature(key, &self.message, sig))
    }

    /// 指定签名者的签名是否有效
    pub fn is_signed_by(&self, signer: &Pubkey) -> bool {
        self.signers
            .iter()
            .position(|s| s == signer)
            .is_some_and(|i| verify_signature(signer, &self.message, &self.signatures[i]))
    }
}

fn verify_signature(key: &Pubkey, message: &[u8], signature: &[u8; SIGNATURE_LEN]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(key.as_bytes()) else {
        return false;
    };
    verifying_key
        .verify(message, &Signature::from_bytes(signature))
        .is_ok()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 金额
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// SOL 十进制字符串 → lamports
///
/// 必须为正数，最多 9 位小数。
pub fn parse_sol_amount(amount: &str) -> WalletResult<u64> {
    let trimmed = amount.trim();
    let value = Decimal::from_str(trimmed)
        .map_err(|_| WalletError::InvalidAmount(format!("not a number: '{}'", trimmed)))?
        .normalize();

    if value.is_sign_negative() || value.is_zero() {
        return Err(WalletError::InvalidAmount(
            "amount must be greater than zero".to_string(),
        ));
    }

    if value.scale() > MAX_SOL_DECIMALS {
        return Err(WalletError::InvalidAmount(format!(
            "at most {} decimal places allowed",
            MAX_SOL_DECIMALS
        )));
    }

    value
        .checked_mul(Decimal::from(LAMPORTS_PER_SOL))
        .and_then(|lamports| lamports.to_u64())
        .ok_or_else(|| WalletError::InvalidAmount("amount too large".to_string()))
}

/// lamports → SOL 十进制字符串
pub fn format_lamports(lamports: u64) -> String {
    (Decimal::from(lamports) / Decimal::from(LAMPORTS_PER_SOL))
        .normalize()
        .to_string()
}
