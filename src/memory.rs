use std::error;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::assembler::{self, Image};
use crate::isa::Word;
use crate::Error;

pub type Byte = u8;
pub type Address = u32;

/// Size in bytes of the default memory
pub const STD_MEM_SIZE: usize = 1024;

/// Default memory
pub type StdMem = Memory<STD_MEM_SIZE>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFault {
    /// An access of `len` bytes at `address` does not fit into memory
    OutOfBounds {
        address: Address,
        len: usize,
        size: usize,
    },
    /// A program image is larger than the memory it is loaded into
    ImageTooLarge { len: usize, size: usize },
}

impl fmt::Display for MemoryFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryFault::OutOfBounds { address, len, size } => write!(
                f,
                "access of {} byte(s) at `0x{:04X}` is outside of memory ({} bytes)",
                len, address, size
            ),
            MemoryFault::ImageTooLarge { len, size } => write!(
                f,
                "image of {} bytes does not fit into memory ({} bytes)",
                len, size
            ),
        }
    }
}

impl error::Error for MemoryFault {}

/// Emulates byte addressed memory for use with the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Memory<const S: usize> {
    /// The actual data of the memory
    pub data: [Byte; S],
}

impl<const S: usize> Default for Memory<S> {
    /// Initializes zeroed memory
    fn default() -> Self {
        Memory { data: [0; S] }
    }
}

impl<const S: usize> Memory<S> {
    /// Creates memory holding `image` at address zero.
    pub fn with_image(image: &Image) -> Result<Self, MemoryFault> {
        let mut memory = Self::default();
        memory.load_image(image)?;
        Ok(memory)
    }

    fn range(&self, position: Address, len: usize) -> Result<std::ops::Range<usize>, MemoryFault> {
        let start = position as usize;
        match start.checked_add(len) {
            Some(end) if end <= S => Ok(start..end),
            _ => Err(MemoryFault::OutOfBounds {
                address: position,
                len,
                size: S,
            }),
        }
    }

    /// Reads a byte from the memory
    pub fn read_byte(&self, position: Address) -> Result<Byte, MemoryFault> {
        let range = self.range(position, 1)?;
        Ok(self.data[range.start])
    }

    /// Writes a byte to the memory
    pub fn write_byte(&mut self, position: Address, value: Byte) -> Result<(), MemoryFault> {
        let range = self.range(position, 1)?;
        self.data[range.start] = value;
        Ok(())
    }

    /// Reads a word from the memory (big endian)
    pub fn read_word(&self, position: Address) -> Result<Word, MemoryFault> {
        let range = self.range(position, 4)?;
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&self.data[range]);
        Ok(Word::from_be_bytes(bytes))
    }

    /// Writes a word to the memory (big endian)
    pub fn write_word(&mut self, position: Address, value: Word) -> Result<(), MemoryFault> {
        self.write_array(position, &value.to_be_bytes())
    }

    /// Writes an array of bytes to the memory
    pub fn write_array(&mut self, position: Address, data: &[Byte]) -> Result<(), MemoryFault> {
        let range = self.range(position, data.len())?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }

    /// Copies a program image to the start of memory.
    pub fn load_image(&mut self, image: &Image) -> Result<(), MemoryFault> {
        if image.len() > S {
            return Err(MemoryFault::ImageTooLarge {
                len: image.len(),
                size: S,
            });
        }

        self.write_array(0, image.as_bytes())
    }

    /// Assembles the file at `path` and loads it into fresh memory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let image = assembler::assemble_file(path)?;
        Ok(Self::with_image(&image)?)
    }

    /// Logs every four-byte row that holds a non-zero byte.
    pub fn dump(&self) {
        log::info!("----------Memory----------");
        for (row, chunk) in self.data.chunks(4).enumerate() {
            if chunk.iter().all(|byte| *byte == 0) {
                continue;
            }

            let bits = chunk
                .iter()
                .map(|byte| format!("{:08b}", byte))
                .collect::<Vec<_>>()
                .join(" ");
            log::info!("0x{:04X}: {}", row * 4, bits);
        }
    }
}

impl<const S: usize> FromStr for Memory<S> {
    type Err = Error;

    /// Assembles `source` and loads the resulting image at address zero.
    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let image = assembler::assemble(source)?;
        Ok(Self::with_image(&image)?)
    }
}

/// Writes a block of instructions directly into the memory, one big endian
/// word each.
#[macro_export]
macro_rules! write_instructions {
    ( $mem:ident : $pos:expr => $( $instruction:expr ),+ ) => {{
        let position: $crate::memory::Address = $pos;
        [ $( $crate::isa::Instruction::encode(&$instruction) , )+ ]
            .iter()
            .enumerate()
            .try_for_each(|(index, word)| {
                $mem.write_word(position + 4 * index as $crate::memory::Address, *word)
            })
    }};
}
