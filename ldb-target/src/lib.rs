//! ldb ターゲット側のアクセス層
//!
//! このクレートは、検査対象ランタイムのメモリとレジスタを読み取るための低レベル機能を提供します。
//! ptraceによる実プロセスへのアタッチと、プロセス内に構築したメモリイメージの両方を扱います。

pub mod process;
pub mod memory;
pub mod image;
pub mod registers;
pub mod context;

pub use process::Process;
pub use memory::{MemoryMapping, MemoryReader, ProcessMemory};
pub use image::ImageMemory;
pub use registers::{Arch, RegisterFile, Registers};
pub use context::{ContextError, InterruptContexts, MAX_INTERRUPTS};

/// マシンワード
pub type Word = u64;

/// 1ワードのバイト数
pub const WORD_BYTES: u64 = 8;

/// ターゲット制御の結果型
pub type Result<T> = anyhow::Result<T>;
