//! The program image: a `data_section_size` header, the read-only data
//! section it describes, and the code that follows it.
//!
//! ```text
//! offset 0      : u32 data_section_size
//! offset 4      : u8[data_section_size] data section
//! offset 4+dss  : u8[] code
//! ```

use crate::error::{Error, Result};

/// A parsed program image: its read-only data section and its code.
///
/// `ProgramImage` owns the bytes for the lifetime of the interpreter run;
/// sentinel pointers (generation `-1`, see `oxidex_mem::region`) address
/// directly into [`ProgramImage::data_section`].
pub struct ProgramImage {
    raw: Box<[u8]>,
    data_section_size: usize,
}

impl ProgramImage {
    /// Parses a program image from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TruncatedImage`] if the bytes are too short to
    /// hold the `u32` header, or shorter than the header promises.
    pub fn parse(raw: Vec<u8>) -> Result<Self> {
        if raw.len() < 4 {
            return Err(Error::TruncatedImage {
                expected: 4,
                found: raw.len(),
            });
        }
        let data_section_size = u32::from_le_bytes(raw[0..4].try_into().unwrap()) as usize;
        let needed = 4 + data_section_size;
        if raw.len() < needed {
            return Err(Error::TruncatedImage {
                expected: needed,
                found: raw.len(),
            });
        }
        Ok(Self {
            raw: raw.into_boxed_slice(),
            data_section_size,
        })
    }

    /// The read-only data section.
    #[must_use]
    pub fn data_section(&self) -> &[u8] {
        &self.raw[4..4 + self.data_section_size]
    }

    /// The code section, to be walked by the decoder starting at `pc = 0`.
    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.raw[4 + self.data_section_size..]
    }

    /// Byte address of the start of the data section within the raw image
    /// buffer. `load-from-data-section` and related opcodes compute
    /// pointers as `instrs + 4 + offset`; since our data section and code
    /// share one owned buffer, that's equivalent to indexing
    /// [`Self::data_section`] at `offset`, exposed here as a raw pointer so
    /// callers can build a sentinel `Pointer`.
    #[must_use]
    pub fn data_section_ptr(&self) -> *const u8 {
        self.raw[4..].as_ptr()
    }

    /// Total size of the data section, in bytes.
    #[must_use]
    pub fn data_section_size(&self) -> usize {
        self.data_section_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_sections() {
        let mut bytes = 2u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        bytes.extend_from_slice(&[9, 42, 0, 0, 0, 11]);
        let image = ProgramImage::parse(bytes).unwrap();
        assert_eq!(image.data_section(), &[0xAA, 0xBB]);
        assert_eq!(image.code(), &[9, 42, 0, 0, 0, 11]);
    }

    #[test]
    fn rejects_image_shorter_than_header() {
        let err = ProgramImage::parse(vec![1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            Error::TruncatedImage {
                expected: 4,
                found: 3
            }
        );
    }

    #[test]
    fn rejects_image_shorter_than_declared_data_section() {
        let bytes = 10u32.to_le_bytes().to_vec();
        let err = ProgramImage::parse(bytes).unwrap_err();
        assert_eq!(
            err,
            Error::TruncatedImage {
                expected: 14,
                found: 4
            }
        );
    }
}
