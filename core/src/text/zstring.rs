//! Packed 5-bit z-character strings.

use anyhow::{Result, bail};
use once_cell::sync::Lazy;

use crate::header::Header;
use crate::memory::Memory;

use super::zscii::UnicodeTable;

/// A2 slot 0 is the 10-bit escape and slot 1 a newline in every version >= 2.
const A2_ESCAPE: u8 = 0;

/// ZSCII contents of the three alphabets, indexed by `zchar - 6`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    rows: [[u8; 26]; 3],
}

static DEFAULT_ALPHABET: Lazy<Alphabet> = Lazy::new(|| {
    let mut rows = [[0u8; 26]; 3];
    rows[0].copy_from_slice(b"abcdefghijklmnopqrstuvwxyz");
    rows[1].copy_from_slice(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ");
    rows[2].copy_from_slice(b" \r0123456789.,!?_#'\"/\\-:()");
    rows[2][0] = A2_ESCAPE;
    rows[2][1] = 13;
    Alphabet { rows }
});

impl Alphabet {
    pub fn for_story(memory: &Memory, header: &Header) -> Result<Alphabet> {
        if header.alphabet_table == 0 {
            return Ok(DEFAULT_ALPHABET.clone());
        }
        let raw = memory.read_bytes(header.alphabet_table as usize, 78)?;
        let mut rows = [[0u8; 26]; 3];
        for (row, chunk) in rows.iter_mut().zip(raw.chunks(26)) {
            row.copy_from_slice(chunk);
        }
        rows[2][0] = A2_ESCAPE;
        rows[2][1] = 13;
        Ok(Alphabet { rows })
    }

    #[inline]
    fn lookup(&self, row: usize, zchar: u8) -> u8 {
        self.rows[row][(zchar - 6) as usize]
    }

    /// Z-characters (including any shift) that produce `zscii`.
    fn find(&self, zscii: u8) -> Option<(usize, u8)> {
        for (row, chars) in self.rows.iter().enumerate() {
            let start = if row == 2 { 2 } else { 0 };
            if let Some(pos) = chars[start..].iter().position(|&c| c == zscii) {
                return Some((row, (pos + start) as u8 + 6));
            }
        }
        None
    }
}

/// Decoded z-string with the address just past its last word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub end: u32,
}

fn read_zchars(memory: &Memory, addr: u32) -> Result<(Vec<u8>, u32)> {
    let mut zchars = Vec::new();
    let mut pos = addr as usize;
    loop {
        let word = memory.read16(pos)?;
        pos += 2;
        zchars.extend([(word >> 10) as u8 & 0x1F, (word >> 5) as u8 & 0x1F, word as u8 & 0x1F]);
        if word & 0x8000 != 0 {
            return Ok((zchars, pos as u32));
        }
    }
}

pub fn decode(memory: &Memory, header: &Header, addr: u32) -> Result<DecodedText> {
    let alphabet = Alphabet::for_story(memory, header)?;
    let unicode = UnicodeTable::for_story(memory, header)?;
    let mut text = String::new();
    let end = decode_into(memory, header, &alphabet, &unicode, addr, true, &mut text)?;
    Ok(DecodedText { text, end })
}

fn decode_into(
    memory: &Memory,
    header: &Header,
    alphabet: &Alphabet,
    unicode: &UnicodeTable,
    addr: u32,
    allow_abbreviations: bool,
    out: &mut String,
) -> Result<u32> {
    let (zchars, end) = read_zchars(memory, addr)?;
    let mut row = 0usize;
    let mut i = 0;
    while i < zchars.len() {
        let z = zchars[i];
        i += 1;
        match z {
            0 => out.push(' '),
            1..=3 => {
                let Some(&idx) = zchars.get(i) else { break };
                i += 1;
                if !allow_abbreviations {
                    bail!("nested abbreviation in string at 0x{:05x}", addr);
                }
                let entry = header.abbreviations as usize + 2 * (32 * (z as usize - 1) + idx as usize);
                let target = memory.read16(entry)? as u32 * 2;
                decode_into(memory, header, alphabet, unicode, target, false, out)?;
            }
            4 => {
                row = 1;
                continue;
            }
            5 => {
                row = 2;
                continue;
            }
            6 if row == 2 => {
                let (Some(&hi), Some(&lo)) = (zchars.get(i), zchars.get(i + 1)) else {
                    break;
                };
                i += 2;
                let code = ((hi as u16) << 5) | lo as u16;
                out.push(unicode.to_char(code).unwrap_or('?'));
            }
            _ => {
                let code = alphabet.lookup(row, z) as u16;
                if let Some(c) = unicode.to_char(code) {
                    out.push(c);
                }
            }
        }
        row = 0;
    }
    Ok(end)
}

/// Encode ZSCII into the 9 z-character, 3-word dictionary form.
pub fn encode_dictionary_word(alphabet: &Alphabet, zscii: &[u8]) -> [u8; 6] {
    let mut zchars: Vec<u8> = Vec::with_capacity(9);
    for &c in zscii {
        if zchars.len() >= 9 {
            break;
        }
        match alphabet.find(c) {
            Some((0, z)) => zchars.push(z),
            Some((row, z)) => zchars.extend([3 + row as u8, z]),
            None => zchars.extend([5, 6, c >> 5, c & 0x1F]),
        }
    }
    zchars.resize(9, 5);
    let mut out = [0u8; 6];
    for (i, chunk) in zchars[..9].chunks(3).enumerate() {
        let mut word = ((chunk[0] as u16) << 10) | ((chunk[1] as u16) << 5) | chunk[2] as u16;
        if i == 2 {
            word |= 0x8000;
        }
        out[2 * i..2 * i + 2].copy_from_slice(&word.to_be_bytes());
    }
    out
}
