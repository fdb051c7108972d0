use std::io;
use std::sync;

use thiserror::Error as ThisError;

// Import the minifb error type and rename it to avoid name conflicts
use minifb::Error as MinifbError;

/// A machine fault raised while executing an instruction. Faults are always
/// fatal to the run; the dispatcher wraps them in [`Error::Cpu`] together with
/// the opcode and address that caused them.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Fault {
    #[error("invalid register V{0:X}")]
    InvalidRegister(usize),
    #[error("invalid font digit {0:#04X}")]
    InvalidDigit(u8),
    #[error("stack overflow calling subroutine at {0:#05X}")]
    StackOverflow(u16),
    #[error("memory protection violation accessing {start:#05X}..={end:#05X}")]
    MemoryProtectionViolation { start: usize, end: usize },
    #[error("unknown instruction")]
    UnknownInstruction,
}

/// A custom error type for the CHIP‑8 emulator
#[derive(Debug, ThisError)]
pub enum Error {
    /// CPU errors – a fault raised by the instruction at `pc`
    #[error("CPU Error: {fault} (opcode {opcode:04X} at {pc:#05X})")]
    Cpu { opcode: u16, pc: u16, fault: Fault },
    /// The program image does not fit in the addressable program region
    #[error("Program is {size} bytes, only {max} bytes fit in memory")]
    ProgramTooLarge { size: usize, max: usize },
    /// I/O errors (e.g. reading a ROM file)
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    /// Errors resulting from poisoned mutex locks
    #[error("Mutex Poison Error: {0}")]
    Poison(String),
    /// Errors from the minifb graphics library
    #[error("Minifb Error: {0}")]
    Minifb(#[from] MinifbError),
    /// Errors starting the audio output device
    #[error("Audio Error: {0}")]
    Audio(String),
}

impl Error {
    /// The machine fault behind this error, if it came from the CPU
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Error::Cpu { fault, .. } => Some(fault),
            _ => None,
        }
    }
}

impl<T> From<sync::PoisonError<T>> for Error {
    fn from(err: sync::PoisonError<T>) -> Self {
        Error::Poison(format!("Mutex poisoned: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_error_reports_opcode_and_pc() {
        let err = Error::Cpu {
            opcode: 0x5121,
            pc: 0x204,
            fault: Fault::UnknownInstruction,
        };
        assert_eq!(
            err.to_string(),
            "CPU Error: unknown instruction (opcode 5121 at 0x204)"
        );
        assert_eq!(err.fault(), Some(&Fault::UnknownInstruction));
    }

    #[test]
    fn poison_converts() {
        let lock = sync::Arc::new(sync::Mutex::new(0u8));
        let poisoner = sync::Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        let err: Error = lock.lock().unwrap_err().into();
        assert!(matches!(err, Error::Poison(_)));
    }
}
