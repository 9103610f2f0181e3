//! Assembler and virtual processor for the zepa instruction set.
//!
//! Source text is assembled into an [`Image`](assembler::Image), the image is
//! loaded into [`Memory`](memory::Memory) and the memory is handed to a
//! [`Machine`](processor::Machine), which runs a fetch-decode-execute cycle
//! until it fetches the all-zero halt word.

use std::error;
use std::fmt;
use std::path::PathBuf;

pub mod assembler;
pub mod isa;
pub mod memory;
pub mod processor;

use assembler::AssembleError;
use isa::DecodeFault;
use memory::MemoryFault;

/// A fault raised while the machine runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Decode(DecodeFault),
    Memory(MemoryFault),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Decode(fault) => write!(f, "decode fault: {}", fault),
            Fault::Memory(fault) => write!(f, "memory fault: {}", fault),
        }
    }
}

impl error::Error for Fault {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Fault::Decode(fault) => Some(fault),
            Fault::Memory(fault) => Some(fault),
        }
    }
}

impl From<DecodeFault> for Fault {
    fn from(fault: DecodeFault) -> Self {
        Fault::Decode(fault)
    }
}

impl From<MemoryFault> for Fault {
    fn from(fault: MemoryFault) -> Self {
        Fault::Memory(fault)
    }
}

#[derive(Debug)]
pub enum Error {
    /// The source or image file could not be read or written
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// One or more lines failed to assemble
    Assemble(Vec<AssembleError>),
    Fault(Fault),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            Error::Assemble(errors) => {
                write!(f, "assembly failed with {} error(s)", errors.len())?;
                for err in errors {
                    write!(f, "\n  {}", err)?;
                }
                Ok(())
            }
            Error::Fault(fault) => write!(f, "{}", fault),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            Error::Assemble(_) => None,
            Error::Fault(fault) => Some(fault),
        }
    }
}

impl From<Vec<AssembleError>> for Error {
    fn from(errors: Vec<AssembleError>) -> Self {
        Error::Assemble(errors)
    }
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        Error::Fault(fault)
    }
}

impl From<MemoryFault> for Error {
    fn from(fault: MemoryFault) -> Self {
        Error::Fault(fault.into())
    }
}
