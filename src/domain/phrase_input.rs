//! 助记词导入表单模型
//!
//! 12 个输入框：
//! - 任一输入框粘贴完整的 12 个单词时，一次性填满全部输入框，焦点移到最后一格；
//! - 否则只更新当前格；输入以空格结尾时焦点前进一格。

use crate::domain::mnemonic::{normalize_word, split_words, RecoveryPhrase, WORD_COUNT};
use crate::error::{WalletError, WalletResult};

/// 导入表单状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhraseSlots {
    slots: [String; WORD_COUNT],
    focus: usize,
}

impl PhraseSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新第 `index` 格，返回更新后的焦点位置
    pub fn update(&mut self, index: usize, value: &str) -> WalletResult<usize> {
        if index >= WORD_COUNT {
            return Err(WalletError::InvalidInput(format!(
                "slot index {} out of range 0..{}",
                index, WORD_COUNT
            )));
        }

        let pasted = split_words(value);
        if pasted.len() == WORD_COUNT {
            for (slot, word) in self.slots.iter_mut().zip(pasted) {
                *slot = word;
            }
            self.focus = WORD_COUNT - 1;
            return Ok(self.focus);
        }

        self.slots[index] = normalize_word(value);
        self.focus = if value.ends_with(' ') && index < WORD_COUNT - 1 {
            index + 1
        } else {
            index
        };
        Ok(self.focus)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    /// 所有格都已填写
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|w| !w.is_empty())
    }

    pub fn words(&self) -> &[String] {
        &self.slots
    }

    /// 校验并生成恢复短语
    pub fn to_phrase(&self) -> WalletResult<RecoveryPhrase> {
        RecoveryPhrase::from_words(&self.slots)
    }
}
