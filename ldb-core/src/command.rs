//! モニタコマンド

/// モニタコマンド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// オブジェクトを表示
    Print,
    /// メモリをワード単位で表示
    Dump,
    /// 現在の割り込みコンテキストのレジスタを表示
    Regs,
    /// ヒープ上のシンボルを検索
    Search,
    /// 変数を定義
    Set,
    /// 変数一覧
    Vars,
    /// 割り込みコンテキストの深さ
    Contexts,
    /// ヘルプ表示
    Help,
    /// 終了
    Quit,
}

impl Command {
    /// コマンド名をパースする
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "print" | "p" => Some(Command::Print),
            "dump" | "x" => Some(Command::Dump),
            "regs" => Some(Command::Regs),
            "search" => Some(Command::Search),
            "set" => Some(Command::Set),
            "vars" => Some(Command::Vars),
            "contexts" => Some(Command::Contexts),
            "help" | "h" | "?" => Some(Command::Help),
            "quit" | "q" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}
