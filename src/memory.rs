use crate::error::{Error, Fault};
use crate::timer::Timer;

pub const RAM_SIZE: usize = 4096;
pub const REGISTER_COUNT: usize = 16;
pub const STACK_SIZE: usize = 16;

/// Programs are loaded here, 0x000 to 0x1FF held the original interpreter.
pub const PROGRAM_START: u16 = 0x200;
/// The last 352 bytes are reserved for variables and display refresh.
pub const RESERVED_TOP: usize = 352;
pub const PROGRAM_END: usize = RAM_SIZE - RESERVED_TOP;
pub const MAX_PROGRAM_SIZE: usize = PROGRAM_END - PROGRAM_START as usize;

pub const FONT_START: u16 = 0x050;
pub const FONT_END: u16 = 0x0A0;
/// Each glyph is 5 bytes tall.
pub const GLYPH_SIZE: u16 = 5;

// CHIP-8 fonts consist of 16 characters, each defined by 5 bytes.
pub const FONT_DATA: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// All machine-visible state: RAM, V0-VF, I, PC, the call stack and both
/// timers. Every accessor is bounds checked.
pub struct Memory {
    ram: [u8; RAM_SIZE],
    registers: [u8; REGISTER_COUNT],
    index: u16,
    program_counter: u16,
    stack: [u16; STACK_SIZE],
    stack_pointer: usize,
    delay_timer: Timer,
    sound_timer: Timer,
}

impl Default for Memory {
    fn default() -> Self {
        let mut memory = Self {
            ram: [0; RAM_SIZE],
            registers: [0; REGISTER_COUNT],
            index: 0,
            program_counter: PROGRAM_START,
            stack: [0; STACK_SIZE],
            stack_pointer: 0,
            delay_timer: Timer::new("delay"),
            sound_timer: Timer::new("sound"),
        };

        memory.write_fonts_to_memory();

        memory
    }
}

impl Memory {
    /// Copies a program image to 0x200. Fails before touching RAM if the image
    /// runs past the addressable program region.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), Error> {
        if program.len() > MAX_PROGRAM_SIZE {
            return Err(Error::ProgramTooLarge {
                size: program.len(),
                max: MAX_PROGRAM_SIZE,
            });
        }

        let start = PROGRAM_START as usize;
        self.ram[start..start + program.len()].copy_from_slice(program);
        Ok(())
    }

    // V registers

    pub fn read_register(&self, register: usize) -> Result<u8, Fault> {
        self.registers
            .get(register)
            .copied()
            .ok_or(Fault::InvalidRegister(register))
    }

    pub fn write_register(&mut self, register: usize, val: u8) -> Result<(), Fault> {
        let slot = self
            .registers
            .get_mut(register)
            .ok_or(Fault::InvalidRegister(register))?;
        *slot = val;
        Ok(())
    }

    /// Sets VF, the implicit flag output of arithmetic and draw instructions
    pub fn write_flag(&mut self, val: u8) {
        self.registers[0xF] = val;
    }

    // I and PC

    pub fn read_index(&self) -> u16 {
        self.index
    }

    pub fn write_index(&mut self, address: u16) {
        self.index = address;
    }

    pub fn read_pc(&self) -> u16 {
        self.program_counter
    }

    pub fn write_pc(&mut self, address: u16) {
        self.program_counter = address;
    }

    pub fn advance_pc(&mut self) {
        self.program_counter = self.program_counter.wrapping_add(2);
    }

    // Stack

    /// Saves the current PC and jumps to `address`
    pub fn push_return(&mut self, address: u16) -> Result<(), Fault> {
        if self.stack_pointer >= STACK_SIZE {
            return Err(Fault::StackOverflow(address));
        }

        self.stack[self.stack_pointer] = self.program_counter;
        self.stack_pointer += 1;
        self.program_counter = address;
        Ok(())
    }

    /// Restores the PC saved by the last call. With an empty stack this does
    /// nothing at all.
    pub fn pop_return(&mut self) {
        if self.stack_pointer == 0 {
            return;
        }

        self.stack_pointer -= 1;
        self.program_counter = self.stack[self.stack_pointer];
    }

    pub fn stack_depth(&self) -> usize {
        self.stack_pointer
    }

    // Timers

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer.get()
    }

    pub fn set_delay_timer(&mut self, val: u8) {
        self.delay_timer.set(val);
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer.get()
    }

    pub fn set_sound_timer(&mut self, val: u8) {
        self.sound_timer.set(val);
    }

    // RAM

    /// Whether an instruction may touch `address`: the program region below
    /// the reserved top of RAM, or the font table.
    pub fn is_addressable(address: usize) -> bool {
        (PROGRAM_START as usize..PROGRAM_END).contains(&address)
            || (FONT_START as usize..FONT_END as usize).contains(&address)
    }

    /// Reads `len` bytes at `start`, every one of which must be addressable
    pub fn read_range(&self, start: usize, len: usize) -> Result<&[u8], Fault> {
        if len == 0 {
            return Ok(&[]);
        }
        Self::check_range(start, len)?;
        Ok(&self.ram[start..start + len])
    }

    /// Writes `data` at `start`, every byte of which must be addressable
    pub fn write_range(&mut self, start: usize, data: &[u8]) -> Result<(), Fault> {
        if data.is_empty() {
            return Ok(());
        }
        Self::check_range(start, data.len())?;
        self.ram[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Fetches the big-endian instruction word at `address`
    pub fn read_word(&self, address: u16) -> Result<u16, Fault> {
        let addr = address as usize;
        if addr + 1 >= RAM_SIZE {
            return Err(Fault::MemoryProtectionViolation {
                start: addr,
                end: addr + 1,
            });
        }

        let high_byte = self.ram[addr] as u16;
        let low_byte = self.ram[addr + 1] as u16;
        Ok(high_byte << 8 | low_byte)
    }

    /// Points I at the glyph for hex digit `digit`
    pub fn set_index_to_font(&mut self, digit: u8) -> Result<(), Fault> {
        if digit > 0xF {
            return Err(Fault::InvalidDigit(digit));
        }

        self.index = FONT_START + digit as u16 * GLYPH_SIZE;
        Ok(())
    }

    fn check_range(start: usize, len: usize) -> Result<(), Fault> {
        let end = start + len.saturating_sub(1);
        if (start..start + len).all(Self::is_addressable) {
            Ok(())
        } else {
            Err(Fault::MemoryProtectionViolation { start, end })
        }
    }

    fn write_fonts_to_memory(&mut self) {
        let start = FONT_START as usize;
        let end = start + FONT_DATA.len();
        self.ram[start..end].copy_from_slice(&FONT_DATA);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_program_region() {
        let memory = Memory::default();
        assert_eq!(memory.read_pc(), 0x200);
        assert_eq!(memory.read_index(), 0);
        assert_eq!(memory.stack_depth(), 0);
    }

    #[test]
    fn font_data_written_correctly() {
        let memory = Memory::default();
        let start = FONT_START as usize;
        let end = start + FONT_DATA.len();
        assert_eq!(&memory.ram[start..end], &FONT_DATA);
        assert_eq!(end, FONT_END as usize);
    }

    #[test]
    fn registers_round_trip() -> Result<(), Fault> {
        let mut memory = Memory::default();
        for register in 0..REGISTER_COUNT {
            memory.write_register(register, register as u8 * 3 + 1)?;
        }
        for register in 0..REGISTER_COUNT {
            assert_eq!(memory.read_register(register)?, register as u8 * 3 + 1);
        }
        Ok(())
    }

    #[test]
    fn invalid_register_is_rejected() {
        let mut memory = Memory::default();
        for register in [16, 17, 255, usize::MAX] {
            assert_eq!(
                memory.read_register(register),
                Err(Fault::InvalidRegister(register))
            );
            assert_eq!(
                memory.write_register(register, 1),
                Err(Fault::InvalidRegister(register))
            );
        }
    }

    #[test]
    fn addressable_regions() {
        assert!(!Memory::is_addressable(0x000));
        assert!(!Memory::is_addressable(0x04F));
        assert!(Memory::is_addressable(0x050));
        assert!(Memory::is_addressable(0x09F));
        assert!(!Memory::is_addressable(0x0A0));
        assert!(!Memory::is_addressable(0x1FF));
        assert!(Memory::is_addressable(0x200));
        assert!(Memory::is_addressable(0xE9F));
        assert!(!Memory::is_addressable(0xEA0));
        assert!(!Memory::is_addressable(0xFFF));
    }

    #[test]
    fn ranges_must_be_fully_addressable() -> Result<(), Fault> {
        let mut memory = Memory::default();
        memory.write_range(0x300, &[1, 2, 3])?;
        assert_eq!(memory.read_range(0x300, 3)?, &[1, 2, 3]);

        assert_eq!(
            memory.write_range(0xE9E, &[1, 2, 3]),
            Err(Fault::MemoryProtectionViolation {
                start: 0xE9E,
                end: 0xEA0
            })
        );
        assert!(memory.read_range(0x1FE, 4).is_err());
        Ok(())
    }

    #[test]
    fn empty_range_is_always_fine() -> Result<(), Fault> {
        let memory = Memory::default();
        assert!(memory.read_range(0xFFFF, 0)?.is_empty());
        Ok(())
    }

    #[test]
    fn stack_is_lifo_and_bounded() -> Result<(), Fault> {
        let mut memory = Memory::default();
        let mut expected = Vec::new();
        for depth in 0..STACK_SIZE as u16 {
            expected.push(memory.read_pc());
            memory.push_return(0x300 + depth * 0x10)?;
        }
        assert_eq!(memory.push_return(0x400), Err(Fault::StackOverflow(0x400)));
        assert_eq!(memory.stack_depth(), STACK_SIZE);

        while let Some(pc) = expected.pop() {
            memory.pop_return();
            assert_eq!(memory.read_pc(), pc);
        }

        // underflow leaves the PC alone
        memory.write_pc(0x222);
        memory.pop_return();
        assert_eq!(memory.read_pc(), 0x222);
        assert_eq!(memory.stack_depth(), 0);
        Ok(())
    }

    #[test]
    fn font_lookup() -> Result<(), Fault> {
        let mut memory = Memory::default();
        memory.set_index_to_font(0)?;
        assert_eq!(memory.read_index(), 0x050);
        memory.set_index_to_font(0xF)?;
        assert_eq!(memory.read_index(), 0x09B);
        assert_eq!(memory.set_index_to_font(0x10), Err(Fault::InvalidDigit(0x10)));
        Ok(())
    }

    #[test]
    fn program_load() -> Result<(), Error> {
        let mut memory = Memory::default();
        memory.load_program(&[0x00, 0xE0])?;
        assert_eq!(memory.read_word(0x200).ok(), Some(0x00E0));

        memory.load_program(&[0xAB; MAX_PROGRAM_SIZE])?;
        assert_eq!(memory.ram[PROGRAM_END - 1], 0xAB);
        Ok(())
    }

    #[test]
    fn program_too_large() {
        let mut memory = Memory::default();
        let err = memory.load_program(&[0; MAX_PROGRAM_SIZE + 1]).unwrap_err();
        assert!(matches!(
            err,
            Error::ProgramTooLarge { size, max } if size == 3233 && max == 3232
        ));
        assert_eq!(memory.ram[0x200], 0);
    }

    #[test]
    fn word_fetch_past_ram_faults() {
        let memory = Memory::default();
        assert!(memory.read_word(0xFFE).is_ok());
        assert!(memory.read_word(0xFFF).is_err());
    }
}
