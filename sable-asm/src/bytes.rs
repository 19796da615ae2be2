//! Object-file serialisation.
//!
//! A compiled object file is the raw little-endian dump of the program
//! words; the file size in bytes must equal `size_in_words * WORD_OCTETS`.
//! Loading validates the shape of the program header, not the executable
//! region — undecodable words there surface as runtime errors when reached.

use crate::layout::{
    HDR_MAGIC, HDR_SYMTAB_OFFSET, MAGIC, PROGRAM_HEADER_LEN, WORD_OCTETS,
};
use crate::Word;

use thiserror::Error;

/// Object-format violations detected while reading back a bytecode dump.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BytecodeError {
    /// The byte length is not a multiple of the word size.
    #[error("object size {0} is not a multiple of {WORD_OCTETS} bytes")]
    UnalignedLength(usize),
    /// The file is shorter than a program header.
    #[error("object holds {0} words, shorter than the {PROGRAM_HEADER_LEN}-word program header")]
    TooShort(usize),
    /// Word 0 is not the magic number.
    #[error("bad magic number {0:#010x}")]
    BadMagic(Word),
    /// The declared symbol-table offset does not lie inside the program.
    #[error("symbol-table offset {offset} outside program of {len} words")]
    SymtabOutOfBounds {
        /// Declared offset, in words.
        offset: usize,
        /// Total program length, in words.
        len: usize,
    },
    /// A symbol-table entry extends past the end of the program.
    #[error("truncated symbol-table entry")]
    TruncatedSymbol,
    /// A symbol-table entry carries an unknown kind tag.
    #[error("unknown symbol-table entry tag {0:#04x}")]
    UnknownSymbolTag(u8),
    /// A symbol or global name is not valid UTF-8.
    #[error("symbol name is not valid UTF-8")]
    MalformedName,
}

/// Dump program words to object-file bytes.
pub fn to_bytes(words: &[Word]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// Read program words back from object-file bytes, validating the header.
pub fn from_bytes(bytes: &[u8]) -> Result<Vec<Word>, BytecodeError> {
    if bytes.len() % WORD_OCTETS != 0 {
        return Err(BytecodeError::UnalignedLength(bytes.len()));
    }

    let words: Vec<Word> = bytes
        .chunks_exact(WORD_OCTETS)
        .map(|chunk| Word::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if words.len() < PROGRAM_HEADER_LEN {
        return Err(BytecodeError::TooShort(words.len()));
    }

    if words[HDR_MAGIC] != MAGIC {
        return Err(BytecodeError::BadMagic(words[HDR_MAGIC]));
    }

    let offset = words[HDR_SYMTAB_OFFSET] as usize;
    if offset < PROGRAM_HEADER_LEN || offset > words.len() {
        return Err(BytecodeError::SymtabOutOfBounds {
            offset,
            len: words.len(),
        });
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn program(words: &[Word]) -> Vec<Word> {
        let mut out = vec![MAGIC, PROGRAM_HEADER_LEN as Word + words.len() as Word, 0, 0];
        out.extend_from_slice(words);
        out
    }

    #[test]
    fn round_trip() {
        let words = program(&[0xdead_beef, 0x0000_0001]);

        assert_eq!(from_bytes(&to_bytes(&words)), Ok(words));
    }

    #[test]
    fn rejects_unaligned_input() {
        let mut bytes = to_bytes(&program(&[]));
        bytes.push(0);

        assert_eq!(from_bytes(&bytes), Err(BytecodeError::UnalignedLength(17)));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut words = program(&[]);
        words[HDR_MAGIC] = 0x0bad_c0de;

        assert_eq!(
            from_bytes(&to_bytes(&words)),
            Err(BytecodeError::BadMagic(0x0bad_c0de))
        );
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(3)]
    fn rejects_truncated_headers(#[case] len: usize) {
        let bytes = to_bytes(&vec![MAGIC; len]);

        assert_eq!(from_bytes(&bytes), Err(BytecodeError::TooShort(len)));
    }

    #[test]
    fn rejects_symtab_offset_past_the_end() {
        let mut words = program(&[]);
        words[HDR_SYMTAB_OFFSET] = 99;

        assert_eq!(
            from_bytes(&to_bytes(&words)),
            Err(BytecodeError::SymtabOutOfBounds { offset: 99, len: 4 })
        );
    }
}
