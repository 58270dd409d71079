//! Program image loading.
//!
//! Layout (all integers 32-bit little-endian):
//!
//! ```text
//! 0   string table size in bytes
//! 4   global area size in words
//! 8   public symbol count
//! 12  public symbols, two words each (name offset, code offset)
//! ..  string table, NUL-terminated strings
//! ..  code, up to the end of the image
//! ```

use std::fs;
use std::ops::Range;
use std::path::Path;

use bytecode::BytecodeDecoder;
use log::debug;

use crate::{LoadError, RuntimeError};

const WORD: usize = 4;
const HEADER_LEN: usize = 3 * WORD;

/// Largest global area an image may declare, in words.
pub const MAX_GLOBALS: usize = 1 << 20;

/// An exported entry point: a name in the string table and a code offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicSymbol {
    pub name: u32,
    pub address: u32,
}

/// A validated, immutable program image. Owns the raw bytes.
#[derive(Debug)]
pub struct Image {
    bytes: Vec<u8>,
    strings: Range<usize>,
    code: Range<usize>,
    global_count: usize,
    symbols: Vec<PublicSymbol>,
}

impl Image {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(bytes)
    }

    pub fn parse(bytes: Vec<u8>) -> Result<Self, LoadError> {
        let len = bytes.len();
        if len < HEADER_LEN {
            return Err(LoadError::TooSmall { len });
        }

        let string_table_len = non_negative(&bytes, 0, "string table size")?;
        if string_table_len > len - HEADER_LEN {
            return Err(LoadError::StringTableTooLarge {
                needed: string_table_len,
                available: len - HEADER_LEN,
            });
        }
        let global_count = non_negative(&bytes, 1, "global area size")?;
        if global_count > MAX_GLOBALS {
            return Err(LoadError::GlobalAreaTooLarge {
                count: global_count,
                max: MAX_GLOBALS,
            });
        }
        let symbol_count = non_negative(&bytes, 2, "public symbol count")?;

        let symbols_len = symbol_count.saturating_mul(2 * WORD);
        if symbols_len > len - HEADER_LEN {
            return Err(LoadError::SymbolTableTooLarge {
                needed: symbols_len,
                available: len - HEADER_LEN,
            });
        }
        let strings_start = HEADER_LEN + symbols_len;
        if string_table_len > len - strings_start {
            return Err(LoadError::StringTableTooLarge {
                needed: string_table_len,
                available: len - strings_start,
            });
        }
        let code_start = strings_start + string_table_len;

        let symbols = (0..symbol_count)
            .map(|i| {
                let at = HEADER_LEN + i * 2 * WORD;
                PublicSymbol {
                    name: read_word(&bytes, at),
                    address: read_word(&bytes, at + WORD),
                }
            })
            .collect();

        debug!(
            "loaded image: {} bytes, {} strings bytes, {} globals, {} public symbols, {} code bytes",
            len,
            string_table_len,
            global_count,
            symbol_count,
            len - code_start
        );

        Ok(Self {
            bytes,
            strings: strings_start..code_start,
            code: code_start..len,
            global_count,
            symbols,
        })
    }

    pub fn code(&self) -> &[u8] {
        &self.bytes[self.code.clone()]
    }

    pub fn string_table(&self) -> &[u8] {
        &self.bytes[self.strings.clone()]
    }

    pub fn global_count(&self) -> usize {
        self.global_count
    }

    pub fn public_symbols(&self) -> &[PublicSymbol] {
        &self.symbols
    }

    /// Code offset of the public symbol called `name`.
    pub fn public_symbol(&self, name: &str) -> Option<u32> {
        self.symbols
            .iter()
            .find(|sym| {
                self.string_at(sym.name)
                    .is_ok_and(|s| s == name.as_bytes())
            })
            .map(|sym| sym.address)
    }

    /// Validate a code offset.
    pub fn check_code_offset(&self, offset: u32) -> Result<usize, RuntimeError> {
        let len = self.code.len();
        let at = offset as usize;
        if at >= len {
            return Err(RuntimeError::CodeOutOfBounds { offset, len });
        }
        Ok(at)
    }

    /// A decoder positioned at `offset` in the code region.
    pub fn address_for(&self, offset: u32) -> Result<BytecodeDecoder<'_>, RuntimeError> {
        let at = self.check_code_offset(offset)?;
        Ok(BytecodeDecoder::at(self.code(), at))
    }

    /// The string starting at `offset` in the string table, without its
    /// terminator.
    pub fn string_at(&self, offset: u32) -> Result<&[u8], RuntimeError> {
        let table = self.string_table();
        let start = offset as usize;
        if start >= table.len() {
            return Err(RuntimeError::StringOutOfBounds {
                offset,
                len: table.len(),
            });
        }
        let rest = &table[start..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(RuntimeError::UnterminatedString { offset })?;
        Ok(&rest[..end])
    }
}

fn read_word(bytes: &[u8], at: usize) -> u32 {
    let mut word = [0u8; WORD];
    word.copy_from_slice(&bytes[at..at + WORD]);
    u32::from_le_bytes(word)
}

/// Header word `index` as a size.
fn non_negative(bytes: &[u8], index: usize, field: &'static str) -> Result<usize, LoadError> {
    let value = read_word(bytes, index * WORD) as i32;
    usize::try_from(value).map_err(|_| LoadError::NegativeSize { field, value })
}

// ── Image builder ──────────────────────────────────────────────────

/// Assembles image bytes: the inverse of [`Image::parse`].
#[derive(Debug, Default)]
pub struct ImageBuilder {
    strings: Vec<u8>,
    global_count: u32,
    symbols: Vec<PublicSymbol>,
    code: Vec<u8>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn globals(&mut self, count: u32) -> &mut Self {
        self.global_count = count;
        self
    }

    /// Append a string to the string table and return its offset.
    pub fn string(&mut self, s: &str) -> u32 {
        let offset = self.strings.len() as u32;
        self.strings.extend_from_slice(s.as_bytes());
        self.strings.push(0);
        offset
    }

    pub fn public_symbol(&mut self, name: &str, address: u32) -> &mut Self {
        let name = self.string(name);
        self.symbols.push(PublicSymbol { name, address });
        self
    }

    pub fn code(&mut self, code: Vec<u8>) -> &mut Self {
        self.code = code;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            HEADER_LEN + self.symbols.len() * 2 * WORD + self.strings.len() + self.code.len(),
        );
        out.extend_from_slice(&(self.strings.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.global_count.to_le_bytes());
        out.extend_from_slice(&(self.symbols.len() as u32).to_le_bytes());
        for sym in &self.symbols {
            out.extend_from_slice(&sym.name.to_le_bytes());
            out.extend_from_slice(&sym.address.to_le_bytes());
        }
        out.extend_from_slice(&self.strings);
        out.extend_from_slice(&self.code);
        out
    }

    pub fn image(&self) -> Result<Image, LoadError> {
        Image::parse(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(strings: i32, globals: i32, symbols: i32) -> Vec<u8> {
        [strings, globals, symbols]
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect()
    }

    #[test]
    fn too_small() {
        let err = Image::parse(vec![0; 11]).unwrap_err();
        assert!(matches!(err, LoadError::TooSmall { len: 11 }));
    }

    #[test]
    fn minimal_header_loads_with_empty_code() {
        let image = Image::parse(header(0, 0, 0)).unwrap();
        assert!(image.code().is_empty());
        assert_eq!(image.global_count(), 0);
        assert!(image.public_symbols().is_empty());
        assert!(matches!(
            image.address_for(0),
            Err(RuntimeError::CodeOutOfBounds { offset: 0, len: 0 })
        ));
    }

    #[test]
    fn negative_sizes_are_rejected() {
        for (bytes, field) in [
            (header(-1, 0, 0), "string table size"),
            (header(0, -4, 0), "global area size"),
            (header(0, 0, -2), "public symbol count"),
        ] {
            match Image::parse(bytes) {
                Err(LoadError::NegativeSize { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected a negative size error, got {other:?}"),
            }
        }
    }

    #[test]
    fn global_area_is_capped() {
        let err = Image::parse(header(0, i32::MAX, 0)).unwrap_err();
        assert!(matches!(
            err,
            LoadError::GlobalAreaTooLarge { count, max: MAX_GLOBALS } if count == i32::MAX as usize
        ));
        assert!(err.to_string().contains("too large"));

        let image = Image::parse(header(0, MAX_GLOBALS as i32, 0)).unwrap();
        assert_eq!(image.global_count(), MAX_GLOBALS);
    }

    #[test]
    fn string_table_must_fit() {
        let mut bytes = header(8, 0, 0);
        bytes.extend_from_slice(b"abc\0");
        let err = Image::parse(bytes).unwrap_err();
        assert!(matches!(
            err,
            LoadError::StringTableTooLarge { needed: 8, available: 4 }
        ));
    }

    #[test]
    fn string_table_must_fit_after_symbols() {
        let mut bytes = header(4, 0, 1);
        bytes.extend_from_slice(&[0; 8]);
        bytes.extend_from_slice(b"ab");
        let err = Image::parse(bytes).unwrap_err();
        assert!(matches!(
            err,
            LoadError::StringTableTooLarge { needed: 4, available: 2 }
        ));
    }

    #[test]
    fn symbol_table_must_fit() {
        let mut bytes = header(0, 0, 2);
        bytes.extend_from_slice(&[0; 12]);
        let err = Image::parse(bytes).unwrap_err();
        assert!(matches!(
            err,
            LoadError::SymbolTableTooLarge { needed: 16, available: 12 }
        ));
    }

    #[test]
    fn regions_are_split() {
        let mut b = ImageBuilder::new();
        b.globals(3);
        let hello = b.string("hello");
        b.public_symbol("main", 0);
        b.code(vec![0x16]);
        let image = b.image().unwrap();

        assert_eq!(image.global_count(), 3);
        assert_eq!(image.code(), &[0x16]);
        assert_eq!(image.string_at(hello).unwrap(), b"hello");
        assert_eq!(image.string_at(2).unwrap(), b"llo");
        assert_eq!(image.public_symbol("main"), Some(0));
        assert_eq!(image.public_symbol("other"), None);
    }

    #[test]
    fn string_access_is_bounds_checked() {
        let mut bytes = header(6, 0, 0);
        bytes.extend_from_slice(b"ok\0bad");
        let image = Image::parse(bytes).unwrap();

        assert_eq!(image.string_at(0).unwrap(), b"ok");
        assert!(matches!(
            image.string_at(3),
            Err(RuntimeError::UnterminatedString { offset: 3 })
        ));
        assert!(matches!(
            image.string_at(6),
            Err(RuntimeError::StringOutOfBounds { offset: 6, len: 6 })
        ));
    }

    #[test]
    fn code_offsets_are_bounds_checked() {
        let image = ImageBuilder::new().code(vec![0x18, 0x18]).image().unwrap();
        assert!(image.address_for(1).is_ok());
        assert!(matches!(
            image.check_code_offset(2),
            Err(RuntimeError::CodeOutOfBounds { offset: 2, len: 2 })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Image::load("/nonexistent/image.bc").unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
