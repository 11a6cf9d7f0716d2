//! コマンド引数の解決
//!
//! 各リゾルバは共有カーソルからトークンを1つ取り出し、先頭の記号で経路を選ぶ。
//! 失敗はすべて `ResolveError` としてコンソールループまで伝播し、コマンド全体を中断する。

use crate::env::Environment;
use crate::errors::{ResolveError, Result};
use crate::locate::SymbolLocator;
use crate::parse::parse_unsigned;
use crate::token::Cursor;
use ldb_heap::{TaggedRef, Word};

/// アドレスとして使う `$` 値から落とす下位ビット（クワッドワード境界）
const VARIABLE_ADDRESS_MASK: Word = 7;
/// 数値アドレスから落とす下位ビット（ワード境界）
const NUMERIC_ADDRESS_MASK: Word = 3;

/// 引数リゾルバ
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    env: Environment<'a>,
    heap: SymbolLocator<'a>,
}

impl<'a> Resolver<'a> {
    pub fn new(env: Environment<'a>, heap: SymbolLocator<'a>) -> Self {
        Self { env, heap }
    }

    /// 数値引数を解決する
    pub fn resolve_number(&self, cursor: &mut Cursor<'_>) -> Result<Word> {
        let token = cursor.next_token().ok_or(ResolveError::ExpectedNumber)?;
        parse_unsigned(token.text).map_err(|_| ResolveError::InvalidNumber(token.text.to_string()))
    }

    /// アドレス引数を解決する
    ///
    /// `$` 付きは環境から引いて下位3ビットを、数値は下位2ビットを落とす。
    /// `safety` が真ならランタイム所有のメモリかどうかも検査する。
    pub fn resolve_address(&self, cursor: &mut Cursor<'_>, safety: bool) -> Result<Word> {
        let token = cursor.next_token().ok_or(ResolveError::ExpectedAddress)?;

        let addr = if token.text.starts_with('$') {
            self.env.resolve(token.text)? & !VARIABLE_ADDRESS_MASK
        } else {
            parse_unsigned(token.text)
                .map_err(|_| ResolveError::InvalidNumber(token.text.to_string()))?
                & !NUMERIC_ADDRESS_MASK
        };

        if safety && !self.heap.is_valid_address(addr) {
            return Err(ResolveError::UnsafeAddress(addr));
        }

        Ok(addr)
    }

    /// オブジェクト引数を解決する
    ///
    /// - `$...`: レジスタか変数の値をそのまま返す（実行中に捕捉した値はタグ付き済み）
    /// - `@addr`: アドレスのワードを読んで返す
    /// - それ以外: 数値、だめならヒープ上のシンボル名
    pub fn resolve_object(&self, cursor: &mut Cursor<'_>) -> Result<TaggedRef> {
        let token = cursor.next_token().ok_or(ResolveError::ExpectedObject)?;
        let text = token.text;

        if text.starts_with('$') {
            tracing::debug!("Resolving '{}' through the environment", text);
            return self.env.resolve(text).map(TaggedRef);
        }

        if let Some(rest) = text.strip_prefix('@') {
            return self.dereference(rest, text);
        }

        if let Ok(value) = parse_unsigned(text) {
            return Ok(TaggedRef(value));
        }

        self.heap
            .find_symbol(text)
            .ok_or_else(|| ResolveError::InvalidObject(text.to_string()))
    }

    /// `@addr` のアドレスを検証し、そこにあるワードを読む
    fn dereference(&self, rest: &str, token: &str) -> Result<TaggedRef> {
        let pointer = parse_unsigned(rest)
            .map_err(|_| ResolveError::InvalidAddress(token.to_string()))?
            & !NUMERIC_ADDRESS_MASK;

        if !self.heap.is_valid_address(pointer) {
            return Err(ResolveError::InvalidAddress(token.to_string()));
        }

        let value = self
            .heap
            .memory()
            .read_word(pointer)
            .map_err(|e| ResolveError::ReadFailed {
                addr: pointer,
                message: e.to_string(),
            })?;

        tracing::debug!("Dereferenced 0x{:x} -> 0x{:x}", pointer, value);
        Ok(TaggedRef(value))
    }

    /// シンボル探索をそのまま公開する（`search` コマンド用）
    pub fn find_symbol(&self, name: &str) -> Option<TaggedRef> {
        self.heap.find_symbol(name)
    }

    pub fn is_valid_address(&self, addr: Word) -> bool {
        self.heap.is_valid_address(addr)
    }
}
