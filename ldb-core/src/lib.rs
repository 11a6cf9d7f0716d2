//! ldb モニタのコア機能
//!
//! このクレートは、デバッガコンソールに入力された引数を値に解決するロジックを提供します。
//! トークン分割、数値リテラル、`$` 変数とレジスタ、`@` による参照外し、
//! ヒープ上のシンボル探索を組み合わせて、数値・アドレス・タグ付きオブジェクトを得ます。

pub mod command;
pub mod env;
pub mod errors;
pub mod locate;
pub mod monitor;
pub mod parse;
pub mod resolve;
pub mod token;

pub use command::Command;
pub use env::{Environment, VarValue, VariableTable};
pub use errors::ResolveError;
pub use locate::SymbolLocator;
pub use monitor::{Control, Monitor};
pub use resolve::Resolver;
pub use token::{Cursor, Token};

// 他のクレートから使用するために再エクスポート
pub use ldb_heap::{SpaceLayout, TaggedRef};
pub use ldb_target::Arch;

/// モニタの結果型
pub type Result<T> = anyhow::Result<T>;
