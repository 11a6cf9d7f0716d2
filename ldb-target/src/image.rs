//! プロセス内メモリイメージ
//!
//! ランタイムのアドレス空間をワード単位のリージョンとして保持する。
//! `demo` コマンドとテストで、実プロセスの代わりに検査対象として使う。

use crate::memory::MemoryReader;
use crate::{Result, Word, WORD_BYTES};

/// 連続したワード領域
#[derive(Debug, Clone)]
struct Region {
    base: Word,
    words: Vec<Word>,
}

impl Region {
    fn end(&self) -> Word {
        self.base + self.words.len() as Word * WORD_BYTES
    }

    fn contains(&self, addr: Word) -> bool {
        addr >= self.base && addr < self.end()
    }
}

/// ワード単位のリージョンで構成されたメモリイメージ
#[derive(Debug, Clone, Default)]
pub struct ImageMemory {
    regions: Vec<Region>,
}

impl ImageMemory {
    /// 空のイメージを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// `base` から `words` ワード分のゼロ埋めリージョンをマップする
    pub fn map(&mut self, base: Word, words: usize) -> Result<()> {
        if base % WORD_BYTES != 0 {
            return Err(anyhow::anyhow!("Region base 0x{:x} is not word aligned", base));
        }
        let end = base
            .checked_add(words as Word * WORD_BYTES)
            .ok_or_else(|| anyhow::anyhow!("Region at 0x{:x} overflows the address space", base))?;
        if self.regions.iter().any(|r| base < r.end() && r.base < end) {
            return Err(anyhow::anyhow!("Region 0x{:x}-0x{:x} overlaps an existing region", base, end));
        }
        self.regions.push(Region {
            base,
            words: vec![0; words],
        });
        Ok(())
    }

    /// 1ワード書き込む（イメージの構築用）
    pub fn store(&mut self, addr: Word, value: Word) -> Result<()> {
        let (region, index) = self.locate_mut(addr)?;
        region.words[index] = value;
        Ok(())
    }

    /// バイト列を書き込む（イメージの構築用）
    pub fn store_bytes(&mut self, addr: Word, bytes: &[u8]) -> Result<()> {
        for (i, chunk) in bytes.chunks(WORD_BYTES as usize).enumerate() {
            let word_addr = addr + i as Word * WORD_BYTES;
            let mut word = self.read_word(word_addr)?.to_le_bytes();
            word[..chunk.len()].copy_from_slice(chunk);
            self.store(word_addr, Word::from_le_bytes(word))?;
        }
        Ok(())
    }

    fn locate(&self, addr: Word) -> Result<(&Region, usize)> {
        let region = self
            .regions
            .iter()
            .find(|r| r.contains(addr))
            .ok_or_else(|| anyhow::anyhow!("Address 0x{:x} is not mapped", addr))?;
        if addr % WORD_BYTES != 0 {
            return Err(anyhow::anyhow!("Address 0x{:x} is not word aligned", addr));
        }
        Ok((region, ((addr - region.base) / WORD_BYTES) as usize))
    }

    fn locate_mut(&mut self, addr: Word) -> Result<(&mut Region, usize)> {
        if addr % WORD_BYTES != 0 {
            return Err(anyhow::anyhow!("Address 0x{:x} is not word aligned", addr));
        }
        let region = self
            .regions
            .iter_mut()
            .find(|r| r.contains(addr))
            .ok_or_else(|| anyhow::anyhow!("Address 0x{:x} is not mapped", addr))?;
        let index = ((addr - region.base) / WORD_BYTES) as usize;
        Ok((region, index))
    }
}

impl MemoryReader for ImageMemory {
    fn read_bytes(&self, addr: Word, size: usize) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(size);
        let mut cursor = addr - addr % WORD_BYTES;
        let mut skip = (addr % WORD_BYTES) as usize;

        while data.len() < size {
            let (region, index) = self.locate(cursor)?;
            let bytes = region.words[index].to_le_bytes();
            let take = (size - data.len()).min(bytes.len() - skip);
            data.extend_from_slice(&bytes[skip..skip + take]);
            skip = 0;
            cursor += WORD_BYTES;
        }

        Ok(data)
    }

    fn is_readable(&self, addr: Word) -> bool {
        self.regions.iter().any(|r| r.contains(addr))
    }
}
