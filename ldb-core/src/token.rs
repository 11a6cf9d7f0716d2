//! 入力行のトークン分割
//!
//! コード値がスペース以下の文字（制御文字を含む）はすべて区切りとして扱う。
//! トークンは入力行を借用したスライスで、コピーはしない。

/// 入力行上の読み取り位置
///
/// コマンドの各引数解決で `&mut` として共有し、解析の進み具合を引き継ぐ。
#[derive(Debug)]
pub struct Cursor<'a> {
    line: &'a str,
    pos: usize,
}

/// 空白で区切られたトークン
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    /// 入力行内のバイトオフセット
    pub start: usize,
    pub end: usize,
}

fn is_separator(b: u8) -> bool {
    b <= b' '
}

impl<'a> Cursor<'a> {
    pub fn new(line: &'a str) -> Self {
        Self { line, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        let bytes = self.line.as_bytes();
        while self.pos < bytes.len() && is_separator(bytes[self.pos]) {
            self.pos += 1;
        }
    }

    /// 空白を読み飛ばし、まだ入力が残っているかを返す
    pub fn more_input(&mut self) -> bool {
        self.skip_whitespace();
        self.pos < self.line.len()
    }

    /// 次のトークンを取り出す
    ///
    /// トークン直後の区切り文字1つも消費する。入力が尽きていれば `None`。
    pub fn next_token(&mut self) -> Option<Token<'a>> {
        self.skip_whitespace();

        let bytes = self.line.as_bytes();
        if self.pos >= bytes.len() {
            return None;
        }

        let start = self.pos;
        while self.pos < bytes.len() && !is_separator(bytes[self.pos]) {
            self.pos += 1;
        }
        let end = self.pos;

        if self.pos < bytes.len() {
            self.pos += 1;
        }

        Some(Token {
            text: &self.line[start..end],
            start,
            end,
        })
    }

    /// 現在位置（バイトオフセット）
    pub fn position(&self) -> usize {
        self.pos
    }

    /// 未消費の残り
    pub fn rest(&self) -> &'a str {
        &self.line[self.pos..]
    }
}
