//! Assembler for zepa source. Every instruction line maps to exactly one word.
//!
//! ```text
//! ; adds 5 and 3
//! start:
//!     MV  W1, #5
//!     MV  W2, #0x3
//!     ADD W0, W1, W2
//!     HALT
//! ```

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::isa::Word;
use crate::Error;

pub mod encode;
pub mod tokenize;

pub use encode::{encode, parse_immediate};
pub use tokenize::{tokenize, SourceLine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssembleErrorKind {
    InvalidOpcode,
    InvalidRegister,
    InvalidOperandCount,
    InvalidImmediate,
}

impl fmt::Display for AssembleErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssembleErrorKind::InvalidOpcode => f.write_str("invalid opcode"),
            AssembleErrorKind::InvalidRegister => f.write_str("invalid register"),
            AssembleErrorKind::InvalidOperandCount => f.write_str("invalid operand count"),
            AssembleErrorKind::InvalidImmediate => f.write_str("invalid immediate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleError {
    kind: AssembleErrorKind,
    context: Option<Cow<'static, str>>,
    line_nr: usize,
}

impl AssembleError {
    pub(crate) fn new<C, S>(kind: AssembleErrorKind, context: C, line_nr: usize) -> Self
    where
        C: Into<Option<S>>,
        S: Into<Cow<'static, str>>,
    {
        Self {
            kind,
            context: context.into().map(|inner| inner.into()),
            line_nr,
        }
    }

    pub fn kind(&self) -> AssembleErrorKind {
        self.kind
    }

    pub fn line_nr(&self) -> usize {
        self.line_nr
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(
                f,
                "error [ln: {}]: {} - {}",
                self.line_nr, self.kind, context
            )
        } else {
            write!(f, "error [ln: {}]: {}", self.line_nr, self.kind)
        }
    }
}

impl error::Error for AssembleError {}

pub type Result<T, E = AssembleError> = std::result::Result<T, E>;

/// An assembled program: big endian instruction words laid out from address
/// zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Image {
    bytes: Vec<u8>,
}

impl Image {
    /// Wraps raw bytes, e.g. an image read back from disk.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn push(&mut self, word: Word) {
        self.bytes.extend_from_slice(&word.to_be_bytes());
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Iterates over the complete words of the image. A trailing partial
    /// word is skipped.
    pub fn words(&self) -> impl Iterator<Item = Word> + '_ {
        self.bytes
            .chunks_exact(4)
            .map(|chunk| Word::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
    }
}

/// Assembles `source` into an image.
///
/// # Errors
///
/// Every line that fails to encode is reported; the errors are collected and
/// returned together at the end.
pub fn assemble(source: &str) -> Result<Image, Vec<AssembleError>> {
    let mut image = Image::default();
    let mut errors = Vec::new();

    for line in tokenize(source) {
        log::debug!("[{}] Found instruction `{}`", line.line_nr, line.text());

        match encode(&line.tokens, line.line_nr) {
            Ok(word) => image.push(word),
            Err(err) => {
                log::error!("{}", err);
                errors.push(err);
            }
        }
    }

    if errors.is_empty() {
        Ok(image)
    } else {
        Err(errors)
    }
}

/// Reads and assembles the file at `path`.
pub fn assemble_file<P: AsRef<Path>>(path: P) -> Result<Image, Error> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(assemble(&source)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::{eyre, Result};

    #[test]
    fn assemble_add_and_mv() -> Result<()> {
        let source = r#"
            ; ADD W1, W2, W3 then MV W1, #5
            ADD W1, W2, W3
            MV W1, #5
        "#;

        let image = assemble(source).map_err(|errors| eyre!("{:?}", errors))?;

        assert_eq!(
            image.as_bytes(),
            [
                0b00110100, 0b00100010, 0b00011000, 0b00000000, //
                0b00110000, 0b00100000, 0b00000000, 0b10100000,
            ]
        );
        assert_eq!(image.words().collect::<Vec<_>>(), [0x3422_1800, 0x3020_00A0]);

        Ok(())
    }

    #[test]
    fn assemble_collects_every_error() {
        let source = r#"
            MV W1, #5
            NOP
            MV W9, #1
            ADD W0, W1, W2
            MV W1, #99999
        "#;

        let errors = assemble(source).unwrap_err();

        let found = errors
            .iter()
            .map(|err| (err.kind(), err.line_nr()))
            .collect::<Vec<_>>();
        assert_eq!(
            found,
            [
                (AssembleErrorKind::InvalidOpcode, 3),
                (AssembleErrorKind::InvalidRegister, 4),
                (AssembleErrorKind::InvalidImmediate, 6),
            ]
        );
    }

    #[test]
    fn assemble_empty_source() -> Result<()> {
        let image = assemble("; nothing here\nlabel:\n").map_err(|errors| eyre!("{:?}", errors))?;
        assert!(image.is_empty());

        Ok(())
    }

    #[test]
    fn assemble_missing_file() {
        match assemble_file("does/not/exist.asm") {
            Err(Error::Io { path, .. }) => assert_eq!(path, Path::new("does/not/exist.asm")),
            other => panic!("expected an io error, got {:?}", other),
        }
    }

    #[test]
    fn assemble_sample_file() -> Result<()> {
        let image = assemble_file(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/programs/add.asm"))?;
        assert_eq!(image.words().next(), Some(0x3020_00A0));

        Ok(())
    }
}
