//! BIP39 助记词编解码
//!
//! 固定 12 词：128 位熵 + 4 位校验和（SHA-256(熵) 的前 4 位）。
//! 任何密钥派生之前都必须先通过校验。

use std::fmt;
use std::str::FromStr;

use bip39::{Language, Mnemonic};
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{MnemonicError, WalletError, WalletResult};

/// 助记词词数
pub const WORD_COUNT: usize = 12;
/// 熵字节数（128 位）
pub const ENTROPY_BYTES: usize = 16;

/// 恢复短语（已校验的 12 个单词）
///
/// 只能通过 [`generate`]、[`from_entropy`] 或 [`RecoveryPhrase::parse`] 构造，
/// 因此持有该类型即代表校验和已通过。
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RecoveryPhrase {
    words: Vec<String>,
}

// 不输出单词内容
impl fmt::Debug for RecoveryPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryPhrase")
            .field("word_count", &self.words.len())
            .field("words", &"[REDACTED]")
            .finish()
    }
}

impl RecoveryPhrase {
    /// 解析用户输入（整段粘贴）
    ///
    /// 按任意空白切分，逐词去空白并转小写，然后做完整校验。
    pub fn parse(input: &str) -> WalletResult<Self> {
        Self::from_words(&split_words(input))
    }

    /// 从单词序列构造（导入表单的 12 个输入框）
    pub fn from_words<S: AsRef<str>>(words: &[S]) -> WalletResult<Self> {
        let words = checked_words(words)?;
        Ok(Self { words })
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// 空格连接的短语
    ///
    /// 注意：返回值是秘密材料，调用方负责不记录日志。
    pub fn phrase(&self) -> Zeroizing<String> {
        Zeroizing::new(self.words.join(" "))
    }

    /// 还原熵
    pub fn entropy(&self) -> WalletResult<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new(self.to_bip39()?.to_entropy()))
    }

    pub(crate) fn to_bip39(&self) -> WalletResult<Mnemonic> {
        let phrase = self.phrase();
        Mnemonic::parse_in_normalized(Language::English, &phrase)
            .map_err(|e| WalletError::InvalidMnemonic(map_bip39_error(e)))
    }
}

impl FromStr for RecoveryPhrase {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// 生成新的恢复短语（OS CSPRNG）
pub fn generate() -> WalletResult<RecoveryPhrase> {
    let mut entropy = [0u8; ENTROPY_BYTES];
    OsRng.fill_bytes(&mut entropy);
    let phrase = from_entropy(&entropy);
    entropy.zeroize();
    phrase
}

/// 把 128 位熵编码为 12 个单词
pub fn from_entropy(entropy: &[u8; ENTROPY_BYTES]) -> WalletResult<RecoveryPhrase> {
    let mnemonic = Mnemonic::from_entropy_in(Language::English, entropy)
        .map_err(|e| WalletError::Derivation(format!("entropy encoding failed: {}", e)))?;
    let words = split_words(&mnemonic.to_string());
    Ok(RecoveryPhrase { words })
}

/// 校验候选单词序列
///
/// 依次检查：词数、词表、校验和。
pub fn check<S: AsRef<str>>(words: &[S]) -> Result<(), MnemonicError> {
    checked_words(words).map(|_| ()).map_err(|e| match e {
        WalletError::InvalidMnemonic(inner) => inner,
        _ => MnemonicError::ChecksumFailed,
    })
}

pub fn validate<S: AsRef<str>>(words: &[S]) -> bool {
    check(words).is_ok()
}

/// 单词是否在 BIP39 英文词表中（用于逐格提示）
pub fn is_valid_word(word: &str) -> bool {
    let word = normalize_word(word);
    Language::English
        .word_list()
        .binary_search(&word.as_str())
        .is_ok()
}

/// 去首尾空白并转小写
pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

/// 按任意空白切分并规范化
pub fn split_words(input: &str) -> Vec<String> {
    input.split_whitespace().map(normalize_word).collect()
}

fn checked_words<S: AsRef<str>>(words: &[S]) -> WalletResult<Vec<String>> {
    let normalized: Vec<String> = words.iter().map(|w| normalize_word(w.as_ref())).collect();

    if normalized.len() != WORD_COUNT {
        return Err(MnemonicError::InvalidWordCount(normalized.len()).into());
    }

    if let Some(position) = normalized.iter().position(|w| !is_valid_word(w)) {
        return Err(MnemonicError::UnknownWord {
            position: position + 1,
        }
        .into());
    }

    let joined = Zeroizing::new(normalized.join(" "));
    Mnemonic::parse_in_normalized(Language::English, &joined)
        .map_err(|e| WalletError::InvalidMnemonic(map_bip39_error(e)))?;

    Ok(normalized)
}

fn map_bip39_error(err: bip39::Error) -> MnemonicError {
    match err {
        bip39::Error::BadWordCount(count) => MnemonicError::InvalidWordCount(count),
        bip39::Error::UnknownWord(index) => MnemonicError::UnknownWord {
            position: index + 1,
        },
        _ => MnemonicError::ChecksumFailed,
    }
}
