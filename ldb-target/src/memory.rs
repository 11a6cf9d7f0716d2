//! メモリアクセス機能
//!
//! 読み取り専用。ランタイムのメモリに書き込む経路は持たない。

use crate::{Result, Word, WORD_BYTES};
use nix::unistd::Pid;
use std::fs::File;
use std::io::{BufRead, BufReader, Read as _, Seek, SeekFrom};

/// ランタイムのメモリを読み取るためのインターフェース
pub trait MemoryReader {
    /// 指定アドレスからバイト列を読み取る
    fn read_bytes(&self, addr: Word, size: usize) -> Result<Vec<u8>>;

    /// 指定アドレスがマップ済みかつ読み取り可能か
    fn is_readable(&self, addr: Word) -> bool;

    /// 1ワード読み取る（リトルエンディアン）
    fn read_word(&self, addr: Word) -> Result<Word> {
        let bytes = self.read_bytes(addr, WORD_BYTES as usize)?;
        let array: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
            anyhow::anyhow!(
                "Failed to convert {} bytes to a word (expected 8 bytes)",
                bytes.len()
            )
        })?;
        Ok(Word::from_le_bytes(array))
    }
}

/// メモリマッピング情報
#[derive(Debug, Clone)]
pub struct MemoryMapping {
    pub start: Word,
    pub end: Word,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
}

impl MemoryMapping {
    /// アドレスがこのマッピングに含まれるか
    pub fn contains(&self, addr: Word) -> bool {
        addr >= self.start && addr < self.end
    }

    /// /proc/pid/maps の1行をパースする
    ///
    /// フォーマット: "address perms offset dev inode pathname"
    pub fn parse_line(line: &str) -> Result<Option<Self>> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            return Ok(None);
        }

        let Some((start, end)) = parts[0].split_once('-') else {
            return Ok(None);
        };

        let start = Word::from_str_radix(start, 16)
            .map_err(|e| anyhow::anyhow!("Failed to parse start address: {}", e))?;
        let end = Word::from_str_radix(end, 16)
            .map_err(|e| anyhow::anyhow!("Failed to parse end address: {}", e))?;

        let perms = parts[1].as_bytes();
        Ok(Some(Self {
            start,
            end,
            readable: perms.first() == Some(&b'r'),
            writable: perms.get(1) == Some(&b'w'),
            executable: perms.get(2) == Some(&b'x'),
        }))
    }
}

/// ptraceでアタッチしたプロセスのメモリ
pub struct ProcessMemory {
    pid: Pid,
}

impl ProcessMemory {
    /// メモリアクセスを作成する
    pub fn new(pid: i32) -> Self {
        Self {
            pid: Pid::from_raw(pid),
        }
    }

    /// /proc/pid/mem のパスを取得する
    fn mem_path(&self) -> String {
        format!("/proc/{}/mem", self.pid)
    }

    /// メモリからデータを読み取る
    ///
    /// /proc/pid/memを使用してターゲットプロセスのメモリを読み取ります。
    /// /proc/pid/memが使用できない場合（EIOエラー）、PTRACE_PEEKDATAにフォールバックします。
    pub fn read(&self, addr: Word, size: usize) -> Result<Vec<u8>> {
        match self.read_via_proc_mem(addr, size) {
            Ok(data) => Ok(data),
            Err(e) => {
                if let Some(io_err) = e.downcast_ref::<std::io::Error>() {
                    if io_err.raw_os_error() == Some(nix::libc::EIO) {
                        tracing::debug!("EIO on /proc mem read at 0x{:x}, falling back to ptrace", addr);
                        return self.read_via_ptrace(addr, size);
                    }
                }
                Err(e)
            }
        }
    }

    /// /proc/pid/mem経由でメモリを読み取る（内部実装）
    fn read_via_proc_mem(&self, addr: Word, size: usize) -> Result<Vec<u8>> {
        let mem_path = self.mem_path();
        let mut file = File::open(&mem_path)
            .map_err(|e| anyhow::anyhow!("Failed to open {}: {}", mem_path, e))?;

        file.seek(SeekFrom::Start(addr))?;

        let mut buffer = vec![0u8; size];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    /// PTRACE_PEEKDATAを使用してメモリからデータを読み取る
    ///
    /// /proc/pid/memが使用できない場合のフォールバック。
    pub fn read_via_ptrace(&self, addr: Word, size: usize) -> Result<Vec<u8>> {
        use nix::sys::ptrace;

        let mut data = Vec::with_capacity(size);
        let word_size = std::mem::size_of::<nix::libc::c_long>();

        for offset in (0..size).step_by(word_size) {
            let word_addr = addr.wrapping_add(offset as Word);
            let word = ptrace::read(self.pid, word_addr as usize as *mut std::ffi::c_void)
                .map_err(|e| anyhow::anyhow!("Failed to read via ptrace at 0x{:x}: {}", word_addr, e))?;

            let bytes = word.to_ne_bytes();
            let copy_size = (size - offset).min(word_size);
            data.extend_from_slice(&bytes[..copy_size]);
        }

        data.truncate(size);
        Ok(data)
    }

    /// /proc/pid/maps を解析してメモリマッピング情報を取得する
    pub fn get_mappings(&self) -> Result<Vec<MemoryMapping>> {
        let maps_path = format!("/proc/{}/maps", self.pid);
        let file = File::open(&maps_path)
            .map_err(|e| anyhow::anyhow!("Failed to open {}: {}", maps_path, e))?;
        let reader = BufReader::new(file);

        let mut mappings = Vec::new();
        for line in reader.lines() {
            if let Some(mapping) = MemoryMapping::parse_line(&line?)? {
                mappings.push(mapping);
            }
        }

        Ok(mappings)
    }
}

impl MemoryReader for ProcessMemory {
    fn read_bytes(&self, addr: Word, size: usize) -> Result<Vec<u8>> {
        self.read(addr, size)
    }

    fn is_readable(&self, addr: Word) -> bool {
        match self.get_mappings() {
            Ok(mappings) => mappings.iter().any(|m| m.readable && m.contains(addr)),
            Err(e) => {
                tracing::warn!("Failed to read memory mappings: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_maps_line() {
        let line = "7f1234567000-7f1234568000 r-xp 00000000 08:01 123456 /lib/libc.so";
        let m = MemoryMapping::parse_line(line).unwrap().unwrap();
        assert_eq!(m.start, 0x7f1234567000);
        assert_eq!(m.end, 0x7f1234568000);
        assert!(m.readable);
        assert!(!m.writable);
        assert!(m.executable);
        assert!(m.contains(0x7f1234567fff));
        assert!(!m.contains(0x7f1234568000));
    }

    #[test]
    fn test_parse_maps_line_short() {
        assert!(MemoryMapping::parse_line("").unwrap().is_none());
        assert!(MemoryMapping::parse_line("nodash rw-p").unwrap().is_none());
        assert!(MemoryMapping::parse_line("zz-10 rw-p").is_err());
    }

    #[test]
    fn test_read_own_process() {
        // 自プロセスの /proc/self/mem は ptrace なしで読める
        let value: u64 = 0x1122_3344_5566_7788;
        let memory = ProcessMemory::new(std::process::id() as i32);
        let addr = &value as *const u64 as Word;
        assert!(memory.is_readable(addr));
        assert_eq!(memory.read_word(addr).unwrap(), value);
    }
}
