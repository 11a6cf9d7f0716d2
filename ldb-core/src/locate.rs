//! ヒープ上のシンボル探索

use ldb_heap::lowtag::OTHER_POINTER_LOWTAG;
use ldb_heap::{SpaceId, SpaceLayout, SymbolSearch, TaggedRef, Word};
use ldb_target::MemoryReader;

/// ヒープ空間を順に探索してシンボルを見つける
#[derive(Clone, Copy)]
pub struct SymbolLocator<'a> {
    memory: &'a dyn MemoryReader,
    spaces: &'a SpaceLayout,
    search: &'a dyn SymbolSearch,
}

impl<'a> SymbolLocator<'a> {
    pub fn new(
        memory: &'a dyn MemoryReader,
        spaces: &'a SpaceLayout,
        search: &'a dyn SymbolSearch,
    ) -> Self {
        Self { memory, spaces, search }
    }

    /// 名前からシンボルを探し、other-pointerタグ付きの参照を返す
    ///
    /// 探索順は `SpaceId::SEARCH_ORDER`（static → immobile → dynamic）で、最初の一致を採用する。
    /// 空間の範囲は毎回取り直す。見つからなければ `None`。
    pub fn find_symbol(&self, name: &str) -> Option<TaggedRef> {
        for id in SpaceId::SEARCH_ORDER {
            let Some(segment) = self.spaces.segment(id, self.memory) else {
                continue;
            };

            tracing::debug!(
                "Searching {} space 0x{:x}-0x{:x} for '{}'",
                id,
                segment.start,
                segment.end(),
                name
            );

            if let Some(addr) = self.search.search(self.memory, segment, name) {
                tracing::debug!("Found '{}' in {} space at 0x{:x}", name, id, addr);
                return Some(TaggedRef::from_pointer(addr, OTHER_POINTER_LOWTAG));
            }
        }

        None
    }

    /// アドレスがランタイム所有の読み取り可能なメモリか
    pub fn is_valid_address(&self, addr: Word) -> bool {
        self.spaces.is_valid_runtime_address(addr, self.memory)
    }

    pub fn memory(&self) -> &'a dyn MemoryReader {
        self.memory
    }
}
