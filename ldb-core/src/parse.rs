//! 数値リテラルのパース
//!
//! 結果は生のマシンワード。符号は扱わず、桁あふれはワード幅で折り返す。

use ldb_heap::Word;
use thiserror::Error;

/// 数値として解釈できない理由
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumberError {
    #[error("no digits")]
    Empty,

    #[error("unknown radix prefix '#{0}'")]
    UnknownRadix(String),

    #[error("digit '{digit}' is not valid in base {radix}")]
    InvalidDigit { digit: char, radix: u32 },
}

/// トークンを符号なしワードにパース
///
/// 基数の判定は次の順:
/// `0x` で16進、それ以外の先頭 `0` で8進、`#x`/`#X` で16進、`#o`/`#O` で8進、残りは10進。
///
/// # Examples
/// ```
/// use ldb_core::parse::parse_unsigned;
///
/// assert_eq!(parse_unsigned("0x1F").unwrap(), 31);
/// assert_eq!(parse_unsigned("017").unwrap(), 15);
/// assert_eq!(parse_unsigned("#xff").unwrap(), 255);
/// assert!(parse_unsigned("12a").is_err());
/// ```
pub fn parse_unsigned(text: &str) -> Result<Word, NumberError> {
    let (radix, digits) = if let Some(rest) = text.strip_prefix("0x") {
        (16, rest)
    } else if text.starts_with('0') {
        // 先頭の0は8進数の桁としてそのまま読める（"0" 単体も0になる）
        (8, text)
    } else if let Some(rest) = text.strip_prefix('#') {
        match rest.chars().next() {
            Some('x' | 'X') => (16, &rest[1..]),
            Some('o' | 'O') => (8, &rest[1..]),
            other => {
                return Err(NumberError::UnknownRadix(
                    other.map(String::from).unwrap_or_default(),
                ))
            }
        }
    } else {
        (10, text)
    };

    if digits.is_empty() {
        return Err(NumberError::Empty);
    }

    let mut value: Word = 0;
    for c in digits.chars() {
        let digit = c
            .to_digit(16)
            .filter(|d| *d < radix)
            .ok_or(NumberError::InvalidDigit { digit: c, radix })?;
        value = value.wrapping_mul(radix as Word).wrapping_add(digit as Word);
    }

    Ok(value)
}
