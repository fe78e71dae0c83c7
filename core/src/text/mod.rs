//! Text collaborator: ZSCII conversion, z-string decoding, dictionary lookups
//! and key mapping.

mod dictionary;
mod zscii;
mod zstring;

use anyhow::Result;

use crate::header::Header;
use crate::host::KeyInput;
use crate::memory::Memory;

pub use dictionary::{Dictionary, tokenise};
pub use zscii::{DEFAULT_UNICODE_TABLE, UnicodeTable, ZSCII_NEWLINE};
pub use zstring::{Alphabet, DecodedText, decode, encode_dictionary_word};

pub trait TextCodec {
    /// Convert host text into ZSCII bytes.
    fn encode(&self, memory: &Memory, header: &Header, text: &str) -> Result<Vec<u8>>;
    fn decode(&self, memory: &Memory, header: &Header, addr: u32) -> Result<DecodedText>;
    fn zscii_to_char(&self, memory: &Memory, header: &Header, zscii: u16) -> Result<Option<char>>;
    /// Write parse results for the text buffer into the parse buffer.
    fn tokenise(
        &self,
        memory: &mut Memory,
        header: &Header,
        buffer: u32,
        parse: u32,
        dictionary: u32,
        skip_unknown: bool,
    ) -> Result<()>;
    fn encode_dictionary_word(&self, memory: &Memory, header: &Header, zscii: &[u8]) -> Result<[u8; 6]>;
    /// ZSCII value stored for a single key press.
    fn key_input(&self, memory: &Memory, header: &Header, key: KeyInput) -> Result<u16>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZsciiText;

impl TextCodec for ZsciiText {
    fn encode(&self, memory: &Memory, header: &Header, text: &str) -> Result<Vec<u8>> {
        Ok(UnicodeTable::for_story(memory, header)?.encode(text))
    }

    fn decode(&self, memory: &Memory, header: &Header, addr: u32) -> Result<DecodedText> {
        decode(memory, header, addr)
    }

    fn zscii_to_char(&self, memory: &Memory, header: &Header, zscii: u16) -> Result<Option<char>> {
        Ok(UnicodeTable::for_story(memory, header)?.to_char(zscii))
    }

    fn tokenise(
        &self,
        memory: &mut Memory,
        header: &Header,
        buffer: u32,
        parse: u32,
        dictionary: u32,
        skip_unknown: bool,
    ) -> Result<()> {
        tokenise(memory, header, buffer, parse, dictionary, skip_unknown)
    }

    fn encode_dictionary_word(&self, memory: &Memory, header: &Header, zscii: &[u8]) -> Result<[u8; 6]> {
        let alphabet = Alphabet::for_story(memory, header)?;
        Ok(encode_dictionary_word(&alphabet, zscii))
    }

    fn key_input(&self, memory: &Memory, header: &Header, key: KeyInput) -> Result<u16> {
        let code = match key {
            KeyInput::Backspace | KeyInput::Delete => 8,
            KeyInput::Enter => ZSCII_NEWLINE,
            KeyInput::Escape => 27,
            KeyInput::Up => 129,
            KeyInput::Down => 130,
            KeyInput::Left => 131,
            KeyInput::Right => 132,
            KeyInput::Function(n @ 1..=12) => 132 + n as u16,
            KeyInput::Function(_) => b'?' as u16,
            KeyInput::Char(c) => UnicodeTable::for_story(memory, header)?
                .from_char(c)
                .unwrap_or(b'?' as u16),
        };
        Ok(code)
    }
}
