use anyhow::Result;

use crate::header::{EXT_UNICODE_TABLE, Header};
use crate::memory::Memory;

pub const ZSCII_NEWLINE: u16 = 13;
pub const ZSCII_QUESTION: u8 = b'?';
const EXTRA_FIRST: u16 = 155;

/// Default translation of ZSCII 155..=223.
pub const DEFAULT_UNICODE_TABLE: [char; 69] = [
    'ä', 'ö', 'ü', 'Ä', 'Ö', 'Ü', 'ß', '»', '«', 'ë', 'ï', 'ÿ', 'Ë', 'Ï', 'á', 'é', 'í', 'ó', 'ú', 'ý', 'Á', 'É', 'Í',
    'Ó', 'Ú', 'Ý', 'à', 'è', 'ì', 'ò', 'ù', 'À', 'È', 'Ì', 'Ò', 'Ù', 'â', 'ê', 'î', 'ô', 'û', 'Â', 'Ê', 'Î', 'Ô', 'Û',
    'å', 'Å', 'ø', 'Ø', 'ã', 'ñ', 'õ', 'Ã', 'Ñ', 'Õ', 'æ', 'Æ', 'ç', 'Ç', 'þ', 'ð', 'Þ', 'Ð', '£', 'œ', 'Œ', '¡', '¿',
];

/// Extra-character table in effect for a story: its own (extension word 3) or the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnicodeTable {
    chars: Vec<char>,
}

impl Default for UnicodeTable {
    fn default() -> Self {
        Self {
            chars: DEFAULT_UNICODE_TABLE.to_vec(),
        }
    }
}

impl UnicodeTable {
    pub fn for_story(memory: &Memory, header: &Header) -> Result<Self> {
        let addr = match header.extension_word(memory, EXT_UNICODE_TABLE)? {
            Some(addr) if addr != 0 => addr as usize,
            _ => return Ok(Self::default()),
        };
        let count = memory.read8(addr)? as usize;
        let mut chars = Vec::with_capacity(count);
        for i in 0..count {
            let code = memory.read16(addr + 1 + 2 * i)?;
            chars.push(char::from_u32(code as u32).unwrap_or('?'));
        }
        Ok(Self { chars })
    }

    pub fn to_char(&self, zscii: u16) -> Option<char> {
        match zscii {
            0 => None,
            ZSCII_NEWLINE => Some('\n'),
            32..=126 => Some(zscii as u8 as char),
            EXTRA_FIRST..=251 => self.chars.get((zscii - EXTRA_FIRST) as usize).copied(),
            _ => None,
        }
    }

    pub fn from_char(&self, c: char) -> Option<u16> {
        match c {
            '\n' | '\r' => Some(ZSCII_NEWLINE),
            ' '..='~' => Some(c as u16),
            _ => self
                .chars
                .iter()
                .position(|&x| x == c)
                .map(|idx| EXTRA_FIRST + idx as u16),
        }
    }

    /// Encode text as ZSCII bytes; characters without a ZSCII code become `?`.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        text.chars()
            .map(|c| match self.from_char(c) {
                Some(code) if code <= 255 => code as u8,
                _ => ZSCII_QUESTION,
            })
            .collect()
    }
}
