//! タグ付きオブジェクト表現
//!
//! ワードの下位4ビット（lowtag）で値の種類を区別する。
//! 最下位ビットが0ならfixnum、それ以外は即値かヒープへのポインタ。

use crate::Word;
use std::fmt;

/// lowtagのビット数
pub const N_LOWTAG_BITS: u32 = 4;
/// lowtagのマスク
pub const LOWTAG_MASK: Word = (1 << N_LOWTAG_BITS) - 1;
/// fixnumのタグビット数
pub const N_FIXNUM_TAG_BITS: u32 = 1;

pub const INSTANCE_POINTER_LOWTAG: Word = 0x3;
pub const LIST_POINTER_LOWTAG: Word = 0x7;
pub const FUN_POINTER_LOWTAG: Word = 0xB;
pub const OTHER_POINTER_LOWTAG: Word = 0xF;

/// ヘッダや即値のwidetag（下位8ビット）
pub const WIDETAG_MASK: Word = 0xFF;
pub const SYMBOL_WIDETAG: Word = 0x2D;
pub const SIMPLE_BASE_STRING_WIDETAG: Word = 0xE5;
pub const CHARACTER_WIDETAG: Word = 0x61;
pub const UNBOUND_MARKER_WIDETAG: Word = 0x09;

/// ヘッダワードのペイロード長フィールドの位置
pub const HEADER_LENGTH_SHIFT: u32 = 8;

/// シンボルオブジェクトのスロット
pub const SYMBOL_VALUE_SLOT: Word = 1;
pub const SYMBOL_NAME_SLOT: Word = 2;

/// 文字列オブジェクトのスロット
pub const STRING_LENGTH_SLOT: Word = 1;
pub const STRING_DATA_SLOT: Word = 2;

/// ヘッダワードを組み立てる
pub fn make_header(widetag: Word, payload_words: Word) -> Word {
    (payload_words << HEADER_LENGTH_SHIFT) | widetag
}

/// ヘッダワードからwidetagを取り出す
pub fn widetag_of(header: Word) -> Word {
    header & WIDETAG_MASK
}

/// ヘッダを含むオブジェクト全体のワード数（2ワード境界に切り上げ）
pub fn object_words(header: Word) -> Word {
    let total = 1 + (header >> HEADER_LENGTH_SHIFT);
    (total + 1) & !1
}

/// 整数をfixnum表現にする
pub fn make_fixnum(n: i64) -> Word {
    (n << N_FIXNUM_TAG_BITS) as Word
}

/// ワードがヘッダとして解釈できるか
pub fn is_header(word: Word) -> bool {
    matches!(widetag_of(word), SYMBOL_WIDETAG | SIMPLE_BASE_STRING_WIDETAG)
}

/// タグ付きワードの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Fixnum(i64),
    Character(char),
    Unbound,
    InstancePointer,
    ListPointer,
    FunctionPointer,
    OtherPointer,
    /// 上記以外の即値（widetag）
    Immediate(u8),
}

/// タグ付き参照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaggedRef(pub Word);

impl TaggedRef {
    /// 生アドレスにlowtagを付けてポインタを作る
    pub fn from_pointer(addr: Word, lowtag: Word) -> Self {
        Self((addr & !LOWTAG_MASK) | lowtag)
    }

    /// 生のワード値
    pub fn raw(self) -> Word {
        self.0
    }

    pub fn lowtag(self) -> Word {
        self.0 & LOWTAG_MASK
    }

    pub fn is_fixnum(self) -> bool {
        self.0 & ((1 << N_FIXNUM_TAG_BITS) - 1) == 0
    }

    /// ヒープを指すポインタか
    pub fn is_pointer(self) -> bool {
        matches!(
            self.lowtag(),
            INSTANCE_POINTER_LOWTAG | LIST_POINTER_LOWTAG | FUN_POINTER_LOWTAG | OTHER_POINTER_LOWTAG
        )
    }

    /// lowtagを外したアドレス
    pub fn untagged(self) -> Word {
        self.0 & !LOWTAG_MASK
    }

    pub fn kind(self) -> ObjectKind {
        if self.is_fixnum() {
            return ObjectKind::Fixnum((self.0 as i64) >> N_FIXNUM_TAG_BITS);
        }
        match self.lowtag() {
            INSTANCE_POINTER_LOWTAG => ObjectKind::InstancePointer,
            LIST_POINTER_LOWTAG => ObjectKind::ListPointer,
            FUN_POINTER_LOWTAG => ObjectKind::FunctionPointer,
            OTHER_POINTER_LOWTAG => ObjectKind::OtherPointer,
            _ => match widetag_of(self.0) {
                CHARACTER_WIDETAG => {
                    let code = (self.0 >> 8) as u32;
                    ObjectKind::Character(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
                }
                UNBOUND_MARKER_WIDETAG => ObjectKind::Unbound,
                tag => ObjectKind::Immediate(tag as u8),
            },
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Fixnum(n) => write!(f, "fixnum {}", n),
            ObjectKind::Character(c) => write!(f, "character {:?}", c),
            ObjectKind::Unbound => write!(f, "unbound marker"),
            ObjectKind::InstancePointer => write!(f, "instance pointer"),
            ObjectKind::ListPointer => write!(f, "list pointer"),
            ObjectKind::FunctionPointer => write!(f, "function pointer"),
            ObjectKind::OtherPointer => write!(f, "other pointer"),
            ObjectKind::Immediate(tag) => write!(f, "immediate (widetag 0x{:02x})", tag),
        }
    }
}

impl fmt::Display for TaggedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}: {}", self.0, self.kind())
    }
}
