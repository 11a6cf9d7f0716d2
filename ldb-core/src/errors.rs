//! 引数解決のエラー
//!
//! どのエラーもコマンド全体を中断させる。コンソールループはメッセージを表示し、
//! その行の残りを捨てて次の入力に戻る。

use ldb_heap::Word;
use thiserror::Error;

/// 引数解決のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("expected a number")]
    ExpectedNumber,

    #[error("expected an address")]
    ExpectedAddress,

    #[error("expected an object")]
    ExpectedObject,

    #[error("expected a name")]
    ExpectedName,

    #[error("invalid number: '{0}'")]
    InvalidNumber(String),

    #[error("invalid address: '{0}'")]
    InvalidAddress(String),

    #[error("invalid object: '{0}'")]
    InvalidObject(String),

    #[error("invalid variable name: '{0}'")]
    InvalidName(String),

    #[error("unknown variable: '{0}'")]
    UnknownVariable(String),

    #[error("bogus register: '{0}'")]
    UnknownRegister(String),

    #[error("variable '{0}' is not valid -- there is no current interrupt context")]
    NoInterruptContext(String),

    #[error("invalid runtime address: 0x{0:x}")]
    UnsafeAddress(Word),

    #[error("failed to read memory at 0x{addr:x}: {message}")]
    ReadFailed { addr: Word, message: String },
}

/// 引数解決の結果型
pub type Result<T> = std::result::Result<T, ResolveError>;
