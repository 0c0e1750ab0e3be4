use std::fmt;

use crate::constants::WORD_SIZE;
use crate::error::{MemoryError, Result};

/// A 4-byte memory cell.
///
/// The same bytes can be written as right-justified upper-case text or as a
/// big-endian integer. Reading back "as integer" always goes through the text
/// view, so `set_int` followed by `get_int` does not round-trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Word {
    data: [u8; WORD_SIZE],
}

impl Word {
    /// Create a zeroed word
    pub fn new() -> Self {
        Word::default()
    }

    /// Create a word holding `text` in the text view
    pub fn from_text(text: &str) -> Result<Self> {
        let mut word = Word::new();
        word.set_text(text)?;
        Ok(word)
    }

    /// Create a word holding the decimal text of `value`.
    ///
    /// Values whose decimal form needs more than 4 characters are rejected.
    pub fn from_decimal(value: i32) -> Result<Self> {
        Word::from_text(&value.to_string())
    }

    /// Create a word holding `value` in the big-endian integer view
    pub fn from_int(value: i32) -> Self {
        let mut word = Word::new();
        word.set_int(value);
        word
    }

    pub fn from_bytes(data: [u8; WORD_SIZE]) -> Self {
        Word { data }
    }

    pub fn bytes(&self) -> [u8; WORD_SIZE] {
        self.data
    }

    /// Store `text` upper-cased and padded on the left with spaces.
    ///
    /// Fails without touching the cell if the text is longer than a word or
    /// holds a character that does not fit in one byte.
    pub fn set_text(&mut self, text: &str) -> Result<()> {
        let upper = text.to_uppercase();
        let len = upper.chars().count();
        if len > WORD_SIZE {
            return Err(MemoryError::Format(format!(
                "text {:?} has {} characters, a word holds at most {}",
                text, len, WORD_SIZE
            )));
        }

        let mut data = [b' '; WORD_SIZE];
        for (slot, ch) in data[WORD_SIZE - len..].iter_mut().zip(upper.chars()) {
            *slot = u8::try_from(u32::from(ch)).map_err(|_| {
                MemoryError::Format(format!("character {:?} does not fit in one byte", ch))
            })?;
        }
        self.data = data;
        Ok(())
    }

    /// The 4 bytes as characters, padding included
    pub fn get_text(&self) -> String {
        self.data.iter().map(|&b| char::from(b)).collect()
    }

    /// Parse the text view (leading spaces trimmed) as a decimal integer
    pub fn get_int(&self) -> Result<i32> {
        let text = self.get_text();
        let trimmed = text.trim_start_matches(' ');
        trimmed
            .parse()
            .map_err(|_| MemoryError::Format(format!("word {:?} is not a decimal integer", text)))
    }

    /// Store `value` as 4 big-endian bytes
    pub fn set_int(&mut self, value: i32) {
        self.data = value.to_be_bytes();
    }

    pub fn get_byte(&self, index: usize) -> Result<u8> {
        self.data
            .get(index)
            .copied()
            .ok_or(MemoryError::out_of_range("byte index", index, WORD_SIZE))
    }

    pub fn set_byte(&mut self, index: usize, value: u8) -> Result<()> {
        let slot = self
            .data
            .get_mut(index)
            .ok_or(MemoryError::out_of_range("byte index", index, WORD_SIZE))?;
        *slot = value;
        Ok(())
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.get_text())
    }
}
