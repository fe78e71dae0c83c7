use std::cmp::Ordering;

use anyhow::Result;
use tracing::debug;

use crate::header::Header;
use crate::memory::Memory;

use super::zstring::{Alphabet, encode_dictionary_word};

/// Parsed dictionary header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    pub separators: Vec<u8>,
    pub entry_len: usize,
    /// Negative counts mark an unsorted (user) dictionary.
    pub count: i16,
    pub entries: u32,
}

impl Dictionary {
    pub fn read(memory: &Memory, addr: u32) -> Result<Dictionary> {
        let addr = addr as usize;
        let n = memory.read8(addr)? as usize;
        let separators = memory.read_bytes(addr + 1, n)?.to_vec();
        let entry_len = memory.read8(addr + 1 + n)? as usize;
        let count = memory.read16(addr + 2 + n)? as i16;
        Ok(Dictionary {
            separators,
            entry_len,
            count,
            entries: (addr + 4 + n) as u32,
        })
    }

    /// Address of the entry whose key equals `key`, or 0.
    pub fn lookup(&self, memory: &Memory, key: &[u8; 6]) -> Result<u32> {
        let total = self.count.unsigned_abs() as usize;
        let entry = |i: usize| self.entries as usize + i * self.entry_len;
        if self.count > 0 {
            let (mut lo, mut hi) = (0usize, total);
            while lo < hi {
                let mid = (lo + hi) / 2;
                match memory.read_bytes(entry(mid), 6)?.cmp(&key[..]) {
                    Ordering::Equal => return Ok(entry(mid) as u32),
                    Ordering::Less => lo = mid + 1,
                    Ordering::Greater => hi = mid,
                }
            }
        } else {
            for i in 0..total {
                if memory.read_bytes(entry(i), 6)? == &key[..] {
                    return Ok(entry(i) as u32);
                }
            }
        }
        Ok(0)
    }
}

/// A word found in the text buffer: start offset into the text and its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token {
    start: usize,
    len: usize,
}

fn split_words(text: &[u8], separators: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, &c) in text.iter().enumerate() {
        if c == b' ' || separators.contains(&c) {
            if let Some(s) = start.take() {
                tokens.push(Token { start: s, len: i - s });
            }
            if c != b' ' {
                tokens.push(Token { start: i, len: 1 });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(Token {
            start: s,
            len: text.len() - s,
        });
    }
    tokens
}

/// Split the text buffer into words and record each word's dictionary address,
/// length and position in the parse buffer.
pub fn tokenise(
    memory: &mut Memory,
    header: &Header,
    buffer: u32,
    parse: u32,
    dictionary: u32,
    skip_unknown: bool,
) -> Result<()> {
    let dict_addr = if dictionary == 0 { header.dictionary } else { dictionary };
    let dict = Dictionary::read(memory, dict_addr)?;
    let alphabet = Alphabet::for_story(memory, header)?;

    let text_len = memory.read8(buffer as usize + 1)? as usize;
    let text = memory.read_bytes(buffer as usize + 2, text_len)?.to_vec();
    let max_words = memory.read8(parse as usize)? as usize;
    let tokens = split_words(&text, &dict.separators);

    let written = tokens.len().min(max_words);
    for (i, token) in tokens.iter().take(written).enumerate() {
        let key = encode_dictionary_word(&alphabet, &text[token.start..token.start + token.len]);
        let found = dict.lookup(memory, &key)?;
        if found == 0 && skip_unknown {
            continue;
        }
        let slot = parse as usize + 2 + 4 * i;
        memory.write16(slot, found as u16)?;
        memory.write8(slot + 2, token.len as u8)?;
        // positions past 255 do not fit the byte; saturate
        memory.write8(slot + 3, u8::try_from(token.start + 2).unwrap_or(u8::MAX))?;
    }
    memory.write8(parse as usize + 1, written as u8)?;
    debug!(target: "zvm::text", words = written, "tokenised input");
    Ok(())
}
