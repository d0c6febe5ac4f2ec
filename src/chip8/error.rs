use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Fatal conditions that stop the machine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("[{family:X}XNN] opcode {opcode:#06X} not recognized (pc {pc:#05X})")]
    UnknownOpcode { opcode: u16, family: u8, pc: u16 },
    #[error("memory access at {addr:#X} is out of bounds (pc {pc:#05X})")]
    MemoryOutOfBounds { addr: usize, pc: u16 },
    #[error("call stack overflow (pc {pc:#05X})")]
    StackOverflow { pc: u16 },
    #[error("return with an empty call stack (pc {pc:#05X})")]
    StackUnderflow { pc: u16 },
    #[error("rom is {size} bytes, only {capacity} fit in memory")]
    RomTooLarge { size: usize, capacity: usize },
    #[error("failed to read rom: {0}")]
    Io(#[from] std::io::Error),
    #[error("machine is halted")]
    Halted,
}
