//! 合成ランタイムイメージの構築
//!
//! 実プロセスなしでコンソールを動かすためのヒープを `ImageMemory` 上に組み立てる。

use crate::lowtag::{
    make_fixnum, make_header, TaggedRef, OTHER_POINTER_LOWTAG, SIMPLE_BASE_STRING_WIDETAG, SYMBOL_NAME_SLOT,
    SYMBOL_VALUE_SLOT, SYMBOL_WIDETAG,
};
use crate::space::{FreePointer, Space, SpaceId, SpaceLayout};
use crate::{Result, Word, WORD_BYTES};
use ldb_target::ImageMemory;
use std::collections::HashMap;

/// free pointerセルを置く領域
pub const GLOBALS_START: Word = 0x2000_0000;
pub const STATIC_SPACE_START: Word = 0x5000_0000;
pub const IMMOBILE_SPACE_START: Word = 0x5010_0000;
pub const DYNAMIC_SPACE_START: Word = 0x1_0000_0000;

/// ヒープイメージビルダー
///
/// free pointerセルは割り当て領域と重ならない場所に置くこと。
pub struct ImageBuilder {
    memory: ImageMemory,
    layout: SpaceLayout,
    next_free: HashMap<SpaceId, Word>,
}

impl ImageBuilder {
    /// レイアウトに従って空間をマップする
    pub fn new(layout: SpaceLayout) -> Result<Self> {
        let mut memory = ImageMemory::new();
        let mut next_free = HashMap::new();

        for (id, space) in layout.spaces() {
            memory.map(space.start, (space.size / WORD_BYTES) as usize)?;
            next_free.insert(id, space.start);
        }

        let cells: Vec<Word> = layout
            .spaces()
            .filter_map(|(_, s)| match s.free {
                FreePointer::Cell(addr) => Some(addr),
                FreePointer::Fixed(_) => None,
            })
            .collect();
        for cell in cells {
            if !layout.spaces().any(|(_, s)| s.contains(cell)) {
                memory.map(cell, 1)?;
            }
        }

        let mut builder = Self {
            memory,
            layout,
            next_free,
        };
        for id in SpaceId::SEARCH_ORDER {
            builder.publish_free_pointer(id)?;
        }
        Ok(builder)
    }

    /// 標準的なレイアウト（static / 任意でimmobile / dynamic）でビルダーを作る
    pub fn standard(with_immobile: bool) -> Result<Self> {
        let immobile_size = 0x1_0000;
        Self::new(SpaceLayout {
            static_space: Space {
                start: STATIC_SPACE_START,
                size: 0x1_0000,
                free: FreePointer::Cell(GLOBALS_START),
            },
            immobile_space: with_immobile.then_some(Space {
                start: IMMOBILE_SPACE_START,
                size: immobile_size,
                free: FreePointer::Fixed(IMMOBILE_SPACE_START + immobile_size),
            }),
            dynamic_space: Space {
                start: DYNAMIC_SPACE_START,
                size: 0x10_0000,
                free: FreePointer::Cell(GLOBALS_START + WORD_BYTES),
            },
        })
    }

    /// 現在の割り当てポインタをfree pointerセルに書き出す
    fn publish_free_pointer(&mut self, id: SpaceId) -> Result<()> {
        let Some(space) = self.layout.space(id).copied() else {
            return Ok(());
        };
        if let FreePointer::Cell(cell) = space.free {
            let pointer = self.next_free.get(&id).copied().unwrap_or(space.start);
            self.memory.store(cell, pointer)?;
        }
        Ok(())
    }

    /// 空間から `words` ワードを割り当てる（2ワード境界に切り上げ）
    pub fn alloc(&mut self, id: SpaceId, words: Word) -> Result<Word> {
        let space = *self
            .layout
            .space(id)
            .ok_or_else(|| anyhow::anyhow!("No {} space in this layout", id))?;
        let words = (words + 1) & !1;
        let addr = self.next_free.get(&id).copied().unwrap_or(space.start);
        let next = addr + words * WORD_BYTES;
        if next > space.end() {
            return Err(anyhow::anyhow!("{} space exhausted allocating {} words", id, words));
        }
        self.next_free.insert(id, next);
        self.publish_free_pointer(id)?;
        Ok(addr)
    }

    /// 文字列オブジェクトを割り当てる
    pub fn string(&mut self, id: SpaceId, text: &str) -> Result<TaggedRef> {
        let data_words = (text.len() as Word).div_ceil(WORD_BYTES);
        let payload = 1 + data_words;
        let addr = self.alloc(id, 1 + payload)?;

        self.memory.store(addr, make_header(SIMPLE_BASE_STRING_WIDETAG, payload))?;
        self.memory.store(addr + WORD_BYTES, make_fixnum(text.len() as i64))?;
        self.memory.store_bytes(addr + 2 * WORD_BYTES, text.as_bytes())?;
        Ok(TaggedRef::from_pointer(addr, OTHER_POINTER_LOWTAG))
    }

    /// シンボルを割り当てる（名前の文字列も同じ空間に置く）
    pub fn symbol(&mut self, id: SpaceId, name: &str, value: Word) -> Result<TaggedRef> {
        let name_ref = self.string(id, name)?;
        let addr = self.alloc(id, 3)?;

        self.memory.store(addr, make_header(SYMBOL_WIDETAG, 2))?;
        self.memory.store(addr + SYMBOL_VALUE_SLOT * WORD_BYTES, value)?;
        self.memory.store(addr + SYMBOL_NAME_SLOT * WORD_BYTES, name_ref.raw())?;
        Ok(TaggedRef::from_pointer(addr, OTHER_POINTER_LOWTAG))
    }

    /// 任意のワードを書き込む
    pub fn store(&mut self, addr: Word, value: Word) -> Result<()> {
        self.memory.store(addr, value)
    }

    pub fn layout(&self) -> &SpaceLayout {
        &self.layout
    }

    pub fn memory(&self) -> &ImageMemory {
        &self.memory
    }

    pub fn finish(self) -> (ImageMemory, SpaceLayout) {
        (self.memory, self.layout)
    }
}
