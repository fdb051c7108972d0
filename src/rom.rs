use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::info;

use crate::error::Error;

/// A program image read from disk, ready to be copied to 0x200
#[derive(Debug, Default)]
pub struct Rom {
    pub instructions: Vec<u8>,
}

impl Rom {
    pub fn open_file(file: &Path) -> Result<Self, Error> {
        let mut buffer = BufReader::new(File::open(file)?);
        let mut instructions = Vec::new();
        buffer.read_to_end(&mut instructions)?;

        info!("read {} bytes from {}", instructions.len(), file.display());
        Ok(Self { instructions })
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn open() -> Result<(), Error> {
        let path = std::env::temp_dir().join(format!("chip8-vm-rom-{}.ch8", std::process::id()));
        fs::write(&path, [0x00, 0xE0, 0x12, 0x02])?;

        let rom = Rom::open_file(&path);
        fs::remove_file(&path)?;

        let rom = rom?;
        assert_eq!(rom.instructions, vec![0x00, 0xE0, 0x12, 0x02]);
        assert_eq!(rom.len(), 4);
        Ok(())
    }

    #[test]
    fn missing_file() {
        let err = Rom::open_file(Path::new("./roms/does-not-exist.ch8")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
