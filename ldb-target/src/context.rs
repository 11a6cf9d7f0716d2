//! 割り込みコンテキストスタック
//!
//! トラップ層が停止のたびにレジスタファイルを積む。リゾルバは最上位を読むだけ。

use crate::registers::RegisterFile;
use thiserror::Error;

/// 1スレッドあたりに積める割り込みコンテキストの上限
pub const MAX_INTERRUPTS: usize = 1024;

/// コンテキストスタック操作のエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("interrupt context stack overflow ({0} contexts)")]
    Overflow(usize),
}

/// 割り込みコンテキストスタック
#[derive(Debug, Clone, Default)]
pub struct InterruptContexts {
    contexts: Vec<RegisterFile>,
}

impl InterruptContexts {
    /// 空のスタックを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// コンテキストを積む（トラップ層から呼ばれる）
    pub fn push(&mut self, context: RegisterFile) -> Result<(), ContextError> {
        if self.contexts.len() >= MAX_INTERRUPTS {
            return Err(ContextError::Overflow(self.contexts.len()));
        }
        self.contexts.push(context);
        Ok(())
    }

    /// 最上位のコンテキストを取り除く（トラップ層から呼ばれる）
    pub fn pop(&mut self) -> Option<RegisterFile> {
        self.contexts.pop()
    }

    /// 現在（最新）のコンテキスト
    pub fn current(&self) -> Option<&RegisterFile> {
        self.contexts.last()
    }

    pub fn depth(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
