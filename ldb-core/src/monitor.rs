//! モニタのメインロジック

use crate::env::{Environment, VarValue, VariableTable};
use crate::errors::ResolveError;
use crate::locate::SymbolLocator;
use crate::resolve::Resolver;
use crate::token::Cursor;
use crate::{Command, Result};
use ldb_heap::lowtag::{make_fixnum, widetag_of, ObjectKind, SYMBOL_WIDETAG};
use ldb_heap::{HeapScanner, ImageBuilder, SpaceId, SpaceLayout, SymbolSearch, TaggedRef, Word, WORD_BYTES};
use ldb_target::{Arch, InterruptContexts, MemoryReader, Process, ProcessMemory, RegisterFile, Registers};
use std::io::Write;

/// コマンド実行後の継続指示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// モニタ
///
/// 検査対象のメモリ、ヒープ空間の構成、変数テーブル、割り込みコンテキストを保持し、
/// コマンド行ごとにリゾルバを組み立てる。
pub struct Monitor {
    /// アタッチ中のプロセス（ドロップでデタッチ）
    process: Option<Process>,
    /// 検査対象のメモリ
    memory: Box<dyn MemoryReader>,
    /// ヒープ空間の構成
    spaces: SpaceLayout,
    /// シンボル探索
    search: Box<dyn SymbolSearch>,
    /// デバッガ変数
    vars: VariableTable,
    /// 割り込みコンテキスト（トラップ層が積む）
    contexts: InterruptContexts,
    /// レジスタ定義
    arch: Arch,
}

impl Monitor {
    /// 新しいモニタを作成する
    pub fn new(memory: Box<dyn MemoryReader>, spaces: SpaceLayout, arch: Arch) -> Self {
        Self {
            process: None,
            memory,
            spaces,
            search: Box::new(HeapScanner::new()),
            vars: VariableTable::new(),
            contexts: InterruptContexts::new(),
            arch,
        }
    }

    /// 既存のプロセスにアタッチし、停止時のレジスタを割り込みコンテキストとして積む
    pub fn attach(pid: i32, spaces: SpaceLayout, arch: Arch) -> Result<Self> {
        let process = Process::attach(pid)?;
        let context = Registers::new(pid).capture(arch)?;

        let mut monitor = Self::new(Box::new(ProcessMemory::new(pid)), spaces, arch);
        monitor.contexts.push(context)?;
        monitor.process = Some(process);
        Ok(monitor)
    }

    /// 合成したランタイムイメージでモニタを作成する
    ///
    /// static / immobile / dynamic の各空間にいくつかのシンボルを置き、
    /// スタック領域を指すレジスタを持つ割り込みコンテキストを1つ積む。
    pub fn demo(arch: Arch) -> Result<Self> {
        let mut builder = ImageBuilder::standard(true)?;

        let nil = builder.symbol(SpaceId::Static, "NIL", 0)?;
        let t = builder.symbol(SpaceId::Static, "T", 0)?;
        builder.symbol(SpaceId::Immobile, "*PACKAGE*", nil.raw())?;
        let foo = builder.symbol(SpaceId::Dynamic, "*FOO*", make_fixnum(123))?;
        // staticの T に隠される
        builder.symbol(SpaceId::Dynamic, "T", make_fixnum(-1))?;

        let stack = builder.alloc(SpaceId::Dynamic, 8)?;
        for i in 0..8 {
            builder.store(stack + i * WORD_BYTES, make_fixnum(i as i64 * 10))?;
        }

        let mut values = vec![0; arch.register_count()];
        values[0] = make_fixnum(42);
        values[1] = foo.raw();
        values[2] = t.raw();
        values[4] = stack;
        let context = RegisterFile::from_values(arch, &values, 0x4000_1000)?;

        let (memory, layout) = builder.finish();
        let mut monitor = Self::new(Box::new(memory), layout, arch);
        monitor.contexts.push(context)?;
        monitor.vars.define_word("nil", nil.raw());
        monitor.vars.define_word("t", t.raw());
        monitor.vars.define_register("sp", 4);
        Ok(monitor)
    }

    /// シンボル探索の実装を差し替える
    pub fn with_search(mut self, search: Box<dyn SymbolSearch>) -> Self {
        self.search = search;
        self
    }

    /// 現在の状態を参照するリゾルバを作る
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(
            Environment::new(&self.vars, &self.contexts, self.arch),
            SymbolLocator::new(self.memory.as_ref(), &self.spaces, self.search.as_ref()),
        )
    }

    pub fn vars(&self) -> &VariableTable {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut VariableTable {
        &mut self.vars
    }

    pub fn contexts(&self) -> &InterruptContexts {
        &self.contexts
    }

    /// トラップ層が割り込みコンテキストを積むためのアクセス
    pub fn contexts_mut(&mut self) -> &mut InterruptContexts {
        &mut self.contexts
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    pub fn spaces(&self) -> &SpaceLayout {
        &self.spaces
    }

    /// アタッチ中のプロセスID
    pub fn pid(&self) -> Option<i32> {
        self.process.as_ref().map(|p| p.pid())
    }

    /// コマンド行を1行実行する
    ///
    /// 引数の解決に失敗した時点で行の残りは捨てる。
    pub fn execute(&mut self, line: &str, out: &mut dyn Write) -> Result<Control> {
        let mut cursor = Cursor::new(line);
        let Some(token) = cursor.next_token() else {
            return Ok(Control::Continue);
        };

        let Some(command) = Command::parse(token.text) else {
            writeln!(out, "unknown command: '{}'", token.text)?;
            writeln!(out, "Type 'help' for available commands.")?;
            return Ok(Control::Continue);
        };

        tracing::debug!("Executing {:?}", command);

        match command {
            Command::Print => self.print(&mut cursor, out)?,
            Command::Dump => self.dump(&mut cursor, out)?,
            Command::Regs => self.regs(out)?,
            Command::Search => self.search_symbol(&mut cursor, out)?,
            Command::Set => self.set(&mut cursor, out)?,
            Command::Vars => self.list_vars(out)?,
            Command::Contexts => writeln!(out, "{} interrupt context(s)", self.contexts.depth())?,
            Command::Help => print_help(out)?,
            Command::Quit => return Ok(Control::Quit),
        }

        Ok(Control::Continue)
    }

    /// オブジェクトを1つ以上表示する
    fn print(&self, cursor: &mut Cursor<'_>, out: &mut dyn Write) -> Result<()> {
        let resolver = self.resolver();
        loop {
            let obj = resolver.resolve_object(cursor)?;
            writeln!(out, "{}", self.describe(obj))?;
            if !cursor.more_input() {
                return Ok(());
            }
        }
    }

    /// メモリをワード単位で表示する
    fn dump(&self, cursor: &mut Cursor<'_>, out: &mut dyn Write) -> Result<()> {
        let resolver = self.resolver();
        let addr = resolver.resolve_address(cursor, true)?;
        let count = if cursor.more_input() {
            resolver.resolve_number(cursor)?
        } else {
            1
        };

        for i in 0..count {
            let Some(at) = addr.checked_add(i.wrapping_mul(WORD_BYTES)) else {
                break;
            };
            if !resolver.is_valid_address(at) {
                writeln!(out, "0x{:016x}: {}", at, ResolveError::UnsafeAddress(at))?;
                break;
            }
            let word = self.memory.read_word(at)?;
            writeln!(out, "0x{:016x}: 0x{:016x}  {}", at, word, TaggedRef(word).kind())?;
        }

        Ok(())
    }

    /// 現在の割り込みコンテキストのレジスタを表示する
    fn regs(&self, out: &mut dyn Write) -> Result<()> {
        let Some(context) = self.contexts.current() else {
            writeln!(out, "there is no current interrupt context")?;
            return Ok(());
        };

        for (name, value) in context.named_values() {
            writeln!(out, "{:>4} = 0x{:016x}", name, value)?;
        }
        writeln!(out, "{:>4} = 0x{:016x}", "PC", context.pc())?;
        Ok(())
    }

    /// ヒープ上のシンボルを検索する
    fn search_symbol(&self, cursor: &mut Cursor<'_>, out: &mut dyn Write) -> Result<()> {
        let name = cursor.next_token().ok_or(ResolveError::ExpectedName)?;

        match self.resolver().find_symbol(name.text) {
            Some(obj) => writeln!(out, "{} = {}", name.text, self.describe(obj))?,
            None => writeln!(out, "symbol '{}' not found", name.text)?,
        }
        Ok(())
    }

    /// 変数を定義する
    fn set(&mut self, cursor: &mut Cursor<'_>, out: &mut dyn Write) -> Result<()> {
        let token = cursor.next_token().ok_or(ResolveError::ExpectedName)?;
        let name = token.text.strip_prefix('$').unwrap_or(token.text);
        if name.is_empty() {
            return Err(ResolveError::InvalidName(token.text.to_string()).into());
        }

        let value = self.resolver().resolve_object(cursor)?;
        self.vars.define_word(name, value.raw());
        writeln!(out, "${} = {}", name, self.describe(value))?;
        Ok(())
    }

    /// 変数一覧を表示する
    fn list_vars(&self, out: &mut dyn Write) -> Result<()> {
        if self.vars.is_empty() {
            writeln!(out, "no variables defined")?;
            return Ok(());
        }

        for (name, value) in self.vars.iter() {
            match value {
                VarValue::Word(word) => writeln!(out, "${} = 0x{:016x}", name, word)?,
                VarValue::Register(regnum) => {
                    let reg = self.arch.register_names.get(regnum).copied().unwrap_or("?");
                    writeln!(out, "${} = register {} ({})", name, regnum, reg)?;
                }
            }
        }
        Ok(())
    }

    /// 表示用の説明。シンボルなら名前も付ける
    fn describe(&self, obj: TaggedRef) -> String {
        if obj.kind() == ObjectKind::OtherPointer {
            if let Some(name) = self.symbol_name(obj.untagged()) {
                return format!("{} (symbol {})", obj, name);
            }
        }
        obj.to_string()
    }

    fn symbol_name(&self, addr: Word) -> Option<String> {
        if !self.spaces.is_valid_runtime_address(addr, self.memory.as_ref()) {
            return None;
        }
        let header = self.memory.read_word(addr).ok()?;
        if widetag_of(header) != SYMBOL_WIDETAG {
            return None;
        }
        HeapScanner::new().symbol_name(self.memory.as_ref(), addr).ok()
    }
}

fn print_help(out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Available commands:")?;
    writeln!(out)?;
    writeln!(out, "  help           - Show this help message")?;
    writeln!(out, "  quit/exit/q    - Exit the monitor")?;
    writeln!(out)?;
    writeln!(out, "Inspection commands:")?;
    writeln!(out, "  print <obj>... - Print objects (p)")?;
    writeln!(out, "  dump <addr> [n] - Dump n words starting at addr (x)")?;
    writeln!(out, "  regs           - Show registers of the current interrupt context")?;
    writeln!(out, "  search <name>  - Find a symbol in the heap")?;
    writeln!(out, "  set <name> <obj> - Define a variable")?;
    writeln!(out, "  vars           - List variables")?;
    writeln!(out, "  contexts       - Show interrupt context depth")?;
    writeln!(out)?;
    writeln!(out, "Arguments:")?;
    writeln!(out, "  123 0x7b #x7b #o173 0173  - numbers")?;
    writeln!(out, "  $rax $R0 $name            - registers and variables")?;
    writeln!(out, "  @addr                     - word stored at addr")?;
    writeln!(out, "  NAME                      - symbol in the heap")?;
    Ok(())
}
