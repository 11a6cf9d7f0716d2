//! レジスタアクセス機能
//!
//! アーキテクチャごとのレジスタ名テーブルと、論理レジスタ番号から
//! レジスタファイル内の物理スロットへの変換を扱う。

use crate::{Result, Word};
use nix::unistd::Pid;

/// アーキテクチャのレジスタ定義
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arch {
    /// アーキテクチャ名
    pub name: &'static str,
    /// 論理レジスタ番号順の正式名
    pub register_names: &'static [&'static str],
    /// 論理レジスタ1つあたりのスロット数
    ///
    /// x86ではレジスタがコンテキスト内で1つおきに格納されるため2になる。
    pub stride: usize,
}

impl Arch {
    pub const X86_64: Arch = Arch {
        name: "x86-64",
        register_names: &[
            "RAX", "RCX", "RDX", "RBX", "RSP", "RBP", "RSI", "RDI",
            "R8", "R9", "R10", "R11", "R12", "R13", "R14", "R15",
        ],
        stride: 1,
    };

    pub const X86: Arch = Arch {
        name: "x86",
        register_names: &["EAX", "ECX", "EDX", "EBX", "ESP", "EBP", "ESI", "EDI"],
        stride: 2,
    };

    /// サポートしているアーキテクチャ
    pub const ALL: [Arch; 2] = [Arch::X86_64, Arch::X86];

    /// ホストのアーキテクチャに対応する定義を返す
    pub fn host() -> Arch {
        if cfg!(target_arch = "x86") {
            Arch::X86
        } else {
            Arch::X86_64
        }
    }

    /// 名前からアーキテクチャを探す
    pub fn by_name(name: &str) -> Option<Arch> {
        Arch::ALL.into_iter().find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// 論理レジスタの数
    pub fn register_count(&self) -> usize {
        self.register_names.len()
    }

    /// レジスタファイルのスロット数
    pub fn slot_count(&self) -> usize {
        self.register_count() * self.stride
    }

    /// レジスタ名（大文字小文字を区別しない）から論理レジスタ番号を引く
    pub fn register_by_name(&self, name: &str) -> Option<usize> {
        self.register_names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
    }

    /// 論理レジスタ番号を物理スロットに変換する
    pub fn slot_of(&self, regnum: usize) -> Option<usize> {
        (regnum < self.register_count()).then(|| regnum * self.stride)
    }
}

/// 1つの停止コンテキストで捕捉したレジスタ値
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    arch: Arch,
    slots: Vec<Word>,
    pc: Word,
}

impl RegisterFile {
    /// すべてゼロのレジスタファイルを作成する
    pub fn new(arch: Arch) -> Self {
        Self {
            arch,
            slots: vec![0; arch.slot_count()],
            pc: 0,
        }
    }

    /// 論理レジスタ番号順の値からレジスタファイルを作成する
    pub fn from_values(arch: Arch, values: &[Word], pc: Word) -> Result<Self> {
        if values.len() != arch.register_count() {
            return Err(anyhow::anyhow!(
                "Expected {} register values for {}, got {}",
                arch.register_count(),
                arch.name,
                values.len()
            ));
        }
        let mut file = Self::new(arch);
        for (regnum, value) in values.iter().enumerate() {
            file.set(regnum, *value)?;
        }
        file.pc = pc;
        Ok(file)
    }

    /// 論理レジスタ番号で値を読む
    pub fn get(&self, regnum: usize) -> Option<Word> {
        self.arch.slot_of(regnum).map(|slot| self.slots[slot])
    }

    /// 論理レジスタ番号で値を設定する
    pub fn set(&mut self, regnum: usize, value: Word) -> Result<()> {
        let slot = self
            .arch
            .slot_of(regnum)
            .ok_or_else(|| anyhow::anyhow!("Register {} out of range for {}", regnum, self.arch.name))?;
        self.slots[slot] = value;
        Ok(())
    }

    /// プログラムカウンタ
    pub fn pc(&self) -> Word {
        self.pc
    }

    /// (名前, 値) の組を論理レジスタ番号順に返す
    pub fn named_values(&self) -> impl Iterator<Item = (&'static str, Word)> + '_ {
        self.arch
            .register_names
            .iter()
            .enumerate()
            .map(|(regnum, name)| (*name, self.slots[regnum * self.arch.stride]))
    }
}

/// ptraceによるレジスタ読み取り
pub struct Registers {
    pid: Pid,
}

impl Registers {
    /// レジスタアクセスを作成する
    pub fn new(pid: i32) -> Self {
        Self {
            pid: Pid::from_raw(pid),
        }
    }

    /// 停止中のスレッドのレジスタをレジスタファイルとして捕捉する
    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    pub fn capture(&self, arch: Arch) -> Result<RegisterFile> {
        if arch != Arch::X86_64 {
            return Err(anyhow::anyhow!("Cannot capture {} registers from an x86-64 process", arch.name));
        }
        let regs = nix::sys::ptrace::getregs(self.pid)?;
        let values = [
            regs.rax, regs.rcx, regs.rdx, regs.rbx, regs.rsp, regs.rbp, regs.rsi, regs.rdi,
            regs.r8, regs.r9, regs.r10, regs.r11, regs.r12, regs.r13, regs.r14, regs.r15,
        ];
        RegisterFile::from_values(arch, &values, regs.rip)
    }

    /// 停止中のスレッドのレジスタをレジスタファイルとして捕捉する
    #[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
    pub fn capture(&self, arch: Arch) -> Result<RegisterFile> {
        Err(anyhow::anyhow!(
            "Register capture for {} (pid {}) is only supported on x86-64 Linux",
            arch.name,
            self.pid
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_by_name_case_insensitive() {
        assert_eq!(Arch::X86_64.register_by_name("rax"), Some(0));
        assert_eq!(Arch::X86_64.register_by_name("Rdi"), Some(7));
        assert_eq!(Arch::X86_64.register_by_name("r15"), Some(15));
        assert_eq!(Arch::X86_64.register_by_name("eax"), None);
        assert_eq!(Arch::X86.register_by_name("esp"), Some(4));
    }

    #[test]
    fn test_interleaved_slots() {
        assert_eq!(Arch::X86.slot_of(3), Some(6));
        assert_eq!(Arch::X86.slot_of(8), None);
        assert_eq!(Arch::X86_64.slot_of(3), Some(3));
        assert_eq!(Arch::X86.slot_count(), 16);
    }

    #[test]
    fn test_register_file_from_values() {
        let values: Vec<Word> = (0..8).map(|i| 0x100 + i).collect();
        let file = RegisterFile::from_values(Arch::X86, &values, 0xdead).unwrap();
        assert_eq!(file.get(0), Some(0x100));
        assert_eq!(file.get(7), Some(0x107));
        assert_eq!(file.get(8), None);
        assert_eq!(file.pc(), 0xdead);

        let names: Vec<_> = file.named_values().map(|(n, _)| n).collect();
        assert_eq!(names[1], "ECX");

        assert!(RegisterFile::from_values(Arch::X86, &values[..3], 0).is_err());
    }

    #[test]
    fn test_arch_by_name() {
        assert_eq!(Arch::by_name("X86-64"), Some(Arch::X86_64));
        assert_eq!(Arch::by_name("x86"), Some(Arch::X86));
        assert_eq!(Arch::by_name("sparc"), None);
    }
}
