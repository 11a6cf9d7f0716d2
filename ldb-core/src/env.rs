//! `$name` の解決（変数テーブルとレジスタ）

use crate::errors::{ResolveError, Result};
use ldb_heap::Word;
use ldb_target::{Arch, InterruptContexts};
use std::collections::BTreeMap;

/// 変数の中身
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarValue {
    /// 保存されたワード
    Word(Word),
    /// 現在の割り込みコンテキストのレジスタ（論理番号）
    Register(usize),
}

/// 名前付きデバッガ変数のテーブル（名前は大文字小文字を区別する）
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    vars: BTreeMap<String, VarValue>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// ワード値の変数を定義する（既存なら上書き）
    pub fn define_word(&mut self, name: &str, value: Word) {
        self.vars.insert(name.to_string(), VarValue::Word(value));
    }

    /// レジスタを参照する変数を定義する
    pub fn define_register(&mut self, name: &str, regnum: usize) {
        self.vars.insert(name.to_string(), VarValue::Register(regnum));
    }

    pub fn get(&self, name: &str) -> Option<VarValue> {
        self.vars.get(name).copied()
    }

    /// 名前順に列挙する
    pub fn iter(&self) -> impl Iterator<Item = (&str, VarValue)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// `$` 付きトークンを解決する環境
///
/// 割り込みコンテキストは借用した読み取り専用のビューとして受け取る。
#[derive(Clone, Copy)]
pub struct Environment<'a> {
    vars: &'a VariableTable,
    contexts: &'a InterruptContexts,
    arch: Arch,
}

impl<'a> Environment<'a> {
    pub fn new(vars: &'a VariableTable, contexts: &'a InterruptContexts, arch: Arch) -> Self {
        Self { vars, contexts, arch }
    }

    /// `$` 付きトークンをワードに解決する
    ///
    /// `$` の直後が英字ならまずレジスタ（`$R<n>` かレジスタ名）として解釈し、
    /// そうでなければ変数テーブルを引く。値にマスクはかけない。
    pub fn resolve(&self, token: &str) -> Result<Word> {
        let name = token.strip_prefix('$').unwrap_or(token);

        if name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            if let Some(regnum) = self.register_number(name, token)? {
                return self.read_register(regnum, token);
            }
        }

        self.lookup_variable(name, token)
    }

    /// 変数テーブルだけを引く
    pub fn lookup_variable(&self, name: &str, token: &str) -> Result<Word> {
        match self.vars.get(name) {
            Some(VarValue::Word(value)) => Ok(value),
            Some(VarValue::Register(regnum)) => self.read_register(regnum, token),
            None => Err(ResolveError::UnknownVariable(token.to_string())),
        }
    }

    /// レジスタ指定なら論理レジスタ番号を返す
    ///
    /// `R<数字>` は番号の直接指定で、範囲外はエラー。
    /// それ以外はアーキテクチャのレジスタ名と照合する。どちらでもなければ `None`。
    fn register_number(&self, name: &str, token: &str) -> Result<Option<usize>> {
        if let Some(digits) = name.strip_prefix(['R', 'r']) {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                if self.contexts.is_empty() {
                    return Err(ResolveError::NoInterruptContext(token.to_string()));
                }
                return match digits.parse::<usize>() {
                    Ok(regnum) if regnum < self.arch.register_count() => Ok(Some(regnum)),
                    _ => Err(ResolveError::UnknownRegister(token.to_string())),
                };
            }
        }

        Ok(self.arch.register_by_name(name))
    }

    /// 現在の割り込みコンテキストからレジスタを読む
    pub fn read_register(&self, regnum: usize, token: &str) -> Result<Word> {
        let context = self
            .contexts
            .current()
            .ok_or_else(|| ResolveError::NoInterruptContext(token.to_string()))?;

        let value = context
            .get(regnum)
            .ok_or_else(|| ResolveError::UnknownRegister(token.to_string()))?;

        tracing::trace!("{} -> register {} = 0x{:x}", token, regnum, value);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldb_target::RegisterFile;

    fn contexts(arch: Arch) -> InterruptContexts {
        let values: Vec<Word> = (0..arch.register_count() as Word).map(|i| 0x1000 + i).collect();
        let mut stack = InterruptContexts::new();
        stack.push(RegisterFile::from_values(arch, &values, 0).unwrap()).unwrap();
        stack
    }

    #[test]
    fn test_register_by_number_and_name() {
        let vars = VariableTable::new();
        let stack = contexts(Arch::X86_64);
        let env = Environment::new(&vars, &stack, Arch::X86_64);

        assert_eq!(env.resolve("$R3").unwrap(), 0x1003);
        assert_eq!(env.resolve("$r15").unwrap(), 0x100F);
        assert_eq!(env.resolve("$rsp").unwrap(), 0x1004);
        assert_eq!(env.resolve("$RSI").unwrap(), 0x1006);
    }

    #[test]
    fn test_register_out_of_range() {
        let vars = VariableTable::new();
        let stack = contexts(Arch::X86_64);
        let env = Environment::new(&vars, &stack, Arch::X86_64);

        assert_eq!(env.resolve("$R16"), Err(ResolveError::UnknownRegister("$R16".into())));
        assert_eq!(
            env.resolve("$R99999999999999999999999"),
            Err(ResolveError::UnknownRegister("$R99999999999999999999999".into()))
        );
    }

    #[test]
    fn test_interleaved_arch() {
        let vars = VariableTable::new();
        let stack = contexts(Arch::X86);
        let env = Environment::new(&vars, &stack, Arch::X86);

        assert_eq!(env.resolve("$ecx").unwrap(), 0x1001);
        assert_eq!(env.resolve("$R7").unwrap(), 0x1007);
        assert_eq!(env.resolve("$R8"), Err(ResolveError::UnknownRegister("$R8".into())));
    }

    #[test]
    fn test_no_interrupt_context() {
        let vars = VariableTable::new();
        let stack = InterruptContexts::new();
        let env = Environment::new(&vars, &stack, Arch::X86_64);

        assert_eq!(env.resolve("$rax"), Err(ResolveError::NoInterruptContext("$rax".into())));
        assert_eq!(env.resolve("$R2"), Err(ResolveError::NoInterruptContext("$R2".into())));
    }

    #[test]
    fn test_variable_fallback() {
        let mut vars = VariableTable::new();
        vars.define_word("foo", 42);
        vars.define_word("Rx", 7);
        vars.define_word("1", 9);
        vars.define_register("sp", 4);
        let stack = InterruptContexts::new();
        let env = Environment::new(&vars, &stack, Arch::X86_64);

        assert_eq!(env.resolve("$foo").unwrap(), 42);
        // R の後が数字でなければ変数
        assert_eq!(env.resolve("$Rx").unwrap(), 7);
        assert_eq!(env.resolve("$1").unwrap(), 9);
        assert_eq!(env.resolve("$Foo"), Err(ResolveError::UnknownVariable("$Foo".into())));
        assert_eq!(env.resolve("$sp"), Err(ResolveError::NoInterruptContext("$sp".into())));

        let stack = contexts(Arch::X86_64);
        let env = Environment::new(&vars, &stack, Arch::X86_64);
        assert_eq!(env.resolve("$sp").unwrap(), 0x1004);
    }

    #[test]
    fn test_variable_table_iter_sorted() {
        let mut vars = VariableTable::new();
        vars.define_word("b", 2);
        vars.define_word("a", 1);
        let names: Vec<_> = vars.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(vars.len(), 2);
    }
}
