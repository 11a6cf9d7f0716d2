//! ldb ランタイムヒープモデル
//!
//! このクレートは、検査対象ランタイムのオブジェクト表現（タグ付きポインタ）と
//! ヒープ空間（static / immobile / dynamic）のレイアウト、シンボル探索を提供します。

pub mod lowtag;
pub mod space;
pub mod search;
pub mod builder;

pub use lowtag::{ObjectKind, TaggedRef};
pub use space::{FreePointer, Segment, Space, SpaceId, SpaceLayout};
pub use search::{HeapScanner, SymbolSearch};
pub use builder::ImageBuilder;

pub use ldb_target::{Word, WORD_BYTES};

/// ヒープ操作の結果型
pub type Result<T> = anyhow::Result<T>;
