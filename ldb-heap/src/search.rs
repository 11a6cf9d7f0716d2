//! セグメント内のシンボル探索

use crate::lowtag::{
    is_header, object_words, widetag_of, TaggedRef, OTHER_POINTER_LOWTAG, SIMPLE_BASE_STRING_WIDETAG,
    STRING_DATA_SLOT, STRING_LENGTH_SLOT, SYMBOL_NAME_SLOT, SYMBOL_WIDETAG, N_FIXNUM_TAG_BITS,
};
use crate::space::Segment;
use crate::{Result, Word, WORD_BYTES};
use ldb_target::MemoryReader;

/// 名前の長さの上限（壊れたヒープで巨大な読み取りをしないため）
const MAX_NAME_LENGTH: Word = 4096;

/// 範囲を限定したシンボル探索
pub trait SymbolSearch {
    /// セグメント内で印字名が `name` と一致するシンボルのヘッダアドレスを返す
    fn search(&self, memory: &dyn MemoryReader, segment: Segment, name: &str) -> Option<Word>;
}

/// オブジェクトを先頭から順にたどる線形探索
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapScanner;

impl HeapScanner {
    pub fn new() -> Self {
        Self
    }

    /// シンボルの名前スロットが指す文字列を読む
    pub fn symbol_name(&self, memory: &dyn MemoryReader, symbol: Word) -> Result<String> {
        let name = TaggedRef(memory.read_word(symbol + SYMBOL_NAME_SLOT * WORD_BYTES)?);
        if name.lowtag() != OTHER_POINTER_LOWTAG {
            return Err(anyhow::anyhow!("Symbol at 0x{:x} has a non-pointer name slot", symbol));
        }

        let string = name.untagged();
        let header = memory.read_word(string)?;
        if widetag_of(header) != SIMPLE_BASE_STRING_WIDETAG {
            return Err(anyhow::anyhow!("Symbol name at 0x{:x} is not a string", string));
        }

        let length = memory.read_word(string + STRING_LENGTH_SLOT * WORD_BYTES)? >> N_FIXNUM_TAG_BITS;
        if length > MAX_NAME_LENGTH {
            return Err(anyhow::anyhow!("Symbol name at 0x{:x} is too long ({} bytes)", string, length));
        }

        let bytes = memory.read_bytes(string + STRING_DATA_SLOT * WORD_BYTES, length as usize)?;
        String::from_utf8(bytes).map_err(|e| anyhow::anyhow!("Symbol name is not UTF-8: {}", e))
    }
}

impl SymbolSearch for HeapScanner {
    fn search(&self, memory: &dyn MemoryReader, segment: Segment, name: &str) -> Option<Word> {
        let end = segment.end();
        let mut addr = segment.start;

        while addr < end {
            let word = match memory.read_word(addr) {
                Ok(word) => word,
                Err(e) => {
                    tracing::debug!("Stopping scan at 0x{:x}: {}", addr, e);
                    return None;
                }
            };

            if widetag_of(word) == SYMBOL_WIDETAG {
                match self.symbol_name(memory, addr) {
                    Ok(found) if found == name => return Some(addr),
                    Ok(_) => {}
                    Err(e) => tracing::trace!("Skipping symbol at 0x{:x}: {}", addr, e),
                }
            }

            // ヘッダならオブジェクト全体を、そうでなければ2ワード（コンス等）を飛ばす
            let step = if is_header(word) { object_words(word) } else { 2 };
            addr = addr.saturating_add(step * WORD_BYTES);
        }

        None
    }
}
