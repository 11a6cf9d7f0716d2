//! ヒープ空間のレイアウト
//!
//! 各空間の予約範囲と、現在どこまで割り当て済みか（free pointer）を保持する。
//! dynamic空間の割り当て位置はランタイムが進めるので、問い合わせのたびに読み直す。

use crate::{Word, WORD_BYTES};
use ldb_target::MemoryReader;
use std::fmt;

/// ヒープ空間の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpaceId {
    Static,
    Immobile,
    Dynamic,
}

impl SpaceId {
    /// シンボル探索の順序
    ///
    /// 同名のシンボルが複数の空間にある場合、先に現れる空間のものが後の空間のものを隠す。
    /// つまりstaticの定義がdynamicで後から定義された同名シンボルより優先される。
    pub const SEARCH_ORDER: [SpaceId; 3] = [SpaceId::Static, SpaceId::Immobile, SpaceId::Dynamic];
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpaceId::Static => "static",
            SpaceId::Immobile => "immobile",
            SpaceId::Dynamic => "dynamic",
        };
        f.write_str(name)
    }
}

/// 空間の割り当て上限の求め方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreePointer {
    /// 固定の終端アドレス
    Fixed(Word),
    /// ランタイム内のワードに現在の割り当てポインタが入っている
    Cell(Word),
}

/// 1つのヒープ空間
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Space {
    pub start: Word,
    /// 予約サイズ（バイト）
    pub size: Word,
    pub free: FreePointer,
}

impl Space {
    /// 予約範囲の終端
    pub fn end(&self) -> Word {
        self.start.saturating_add(self.size)
    }

    pub fn contains(&self, addr: Word) -> bool {
        addr >= self.start && addr < self.end()
    }
}

/// 探索対象となる割り当て済み範囲 `[start, start + word_count * 8)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: Word,
    pub word_count: Word,
}

impl Segment {
    pub fn end(&self) -> Word {
        self.start + self.word_count * WORD_BYTES
    }
}

/// ランタイムのヒープ空間構成
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceLayout {
    pub static_space: Space,
    /// 一部のランタイム構成でのみ存在する
    pub immobile_space: Option<Space>,
    pub dynamic_space: Space,
}

impl SpaceLayout {
    pub fn space(&self, id: SpaceId) -> Option<&Space> {
        match id {
            SpaceId::Static => Some(&self.static_space),
            SpaceId::Immobile => self.immobile_space.as_ref(),
            SpaceId::Dynamic => Some(&self.dynamic_space),
        }
    }

    /// 構成済みの空間を探索順に返す
    pub fn spaces(&self) -> impl Iterator<Item = (SpaceId, &Space)> {
        SpaceId::SEARCH_ORDER
            .into_iter()
            .filter_map(move |id| self.space(id).map(|s| (id, s)))
    }

    /// 空間の割り当て済み範囲を求める
    ///
    /// free pointerはその都度メモリから読む。読めない場合は空の範囲として扱う。
    pub fn segment(&self, id: SpaceId, memory: &dyn MemoryReader) -> Option<Segment> {
        let space = self.space(id)?;
        let high_water = match space.free {
            FreePointer::Fixed(end) => end,
            FreePointer::Cell(addr) => match memory.read_word(addr) {
                Ok(pointer) => pointer,
                Err(e) => {
                    tracing::warn!("Failed to read {} space free pointer at 0x{:x}: {}", id, addr, e);
                    space.start
                }
            },
        };

        let high_water = high_water.clamp(space.start, space.end());
        Some(Segment {
            start: space.start,
            word_count: (high_water - space.start) / WORD_BYTES,
        })
    }

    /// アドレスがランタイム所有の読み取り可能なメモリ内にあるか
    pub fn is_valid_runtime_address(&self, addr: Word, memory: &dyn MemoryReader) -> bool {
        self.spaces().any(|(_, s)| s.contains(addr)) && memory.is_readable(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldb_target::ImageMemory;

    fn layout() -> SpaceLayout {
        SpaceLayout {
            static_space: Space {
                start: 0x1000,
                size: 0x100,
                free: FreePointer::Cell(0x8000),
            },
            immobile_space: None,
            dynamic_space: Space {
                start: 0x4000,
                size: 0x1000,
                free: FreePointer::Cell(0x8008),
            },
        }
    }

    #[test]
    fn test_segment_reads_free_pointer_each_time() {
        let layout = layout();
        let mut memory = ImageMemory::new();
        memory.map(0x8000, 2).unwrap();
        memory.store(0x8008, 0x4040).unwrap();

        let seg = layout.segment(SpaceId::Dynamic, &memory).unwrap();
        assert_eq!(seg, Segment { start: 0x4000, word_count: 8 });

        memory.store(0x8008, 0x4080).unwrap();
        let seg = layout.segment(SpaceId::Dynamic, &memory).unwrap();
        assert_eq!(seg.word_count, 16);
        assert_eq!(seg.end(), 0x4080);
    }

    #[test]
    fn test_segment_clamps_and_skips_missing_space() {
        let layout = layout();
        let mut memory = ImageMemory::new();
        memory.map(0x8000, 2).unwrap();
        memory.store(0x8000, 0xFFFF_0000).unwrap();

        assert_eq!(layout.segment(SpaceId::Static, &memory).unwrap().word_count, 0x20);
        assert!(layout.segment(SpaceId::Immobile, &memory).is_none());
    }

    #[test]
    fn test_unreadable_free_pointer_is_empty() {
        let layout = layout();
        let memory = ImageMemory::new();
        assert_eq!(layout.segment(SpaceId::Static, &memory).unwrap().word_count, 0);
    }

    #[test]
    fn test_valid_runtime_address() {
        let layout = layout();
        let mut memory = ImageMemory::new();
        memory.map(0x1000, 0x20).unwrap();
        memory.map(0x8000, 2).unwrap();

        assert!(layout.is_valid_runtime_address(0x1008, &memory));
        // マップ済みでもランタイムの空間外
        assert!(!layout.is_valid_runtime_address(0x8000, &memory));
        // 空間内だがマップされていない
        assert!(!layout.is_valid_runtime_address(0x4000, &memory));
    }
}
