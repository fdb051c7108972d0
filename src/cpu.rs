use std::sync::Arc;

use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::display::{Display, Frame};
use crate::error::{Error, Fault};
use crate::keyboard::Keyboard;
use crate::memory::Memory;

/// What the instruction clock should do after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The instruction completed, carry on with the next tick.
    Executed,
    /// `FX0A` found no key held. The clock must wait for a key press and hand
    /// it back through [`Cpu::resume_with_key`] before stepping again.
    AwaitingKey(usize),
}

pub struct Cpu {
    memory: Memory,
    display: Display,
    pub keyboard: Arc<Keyboard>,
    rng: StdRng,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new(Arc::new(Keyboard::new()), StdRng::from_entropy())
    }
}

impl Cpu {
    pub fn new(keyboard: Arc<Keyboard>, rng: StdRng) -> Self {
        Self {
            memory: Memory::default(),
            display: Display::default(),
            keyboard,
            rng,
        }
    }

    /// A CPU whose `CXKK` random stream is reproducible
    pub fn with_seed(seed: u64) -> Self {
        Self::new(Arc::new(Keyboard::new()), StdRng::seed_from_u64(seed))
    }

    pub fn load_program(&mut self, program: &[u8]) -> Result<(), Error> {
        self.memory.load_program(program)
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// A copy of the framebuffer, taken in one go
    pub fn read_display(&self) -> Frame {
        self.display.render()
    }

    /// Fetches, decodes and executes one instruction.
    pub fn step(&mut self) -> Result<Step, Error> {
        let pc = self.memory.read_pc();
        let opcode = self
            .memory
            .read_word(pc)
            .map_err(|fault| Error::Cpu { opcode: 0, pc, fault })?;
        // Jumps and skips are relative to the following instruction
        self.memory.advance_pc();

        trace!("{:#05X}: {:04X}", pc, opcode);
        self.execute(opcode)
            .map_err(|fault| Error::Cpu { opcode, pc, fault })
    }

    /// Finishes an `FX0A` that returned [`Step::AwaitingKey`]
    pub fn resume_with_key(&mut self, register: usize, key: u8) -> Result<(), Error> {
        self.memory
            .write_register(register, key)
            .map_err(|fault| Error::Cpu {
                opcode: 0xF00A | (register as u16 & 0xF) << 8,
                pc: self.memory.read_pc().wrapping_sub(2),
                fault,
            })
    }

    fn execute(&mut self, opcode: u16) -> Result<Step, Fault> {
        // Var, Bit-length, Location,                  Description,
        // n    4           low byte, low nibble       Number of bytes
        // x    4           high byte, low nibble      CPU register
        // y    4           low byte, high nibble      CPU register
        // c    4           high byte, high nibble     Opcode group
        // d    4           low byte, low nibble       Opcode subgroup
        // kk   8           low byte, both nibbles     Integer
        // nnn  12          high byte, low nibble      Memory address
        //                and low byte, both nibbles

        let c = ((opcode & 0xF000) >> 12) as u8;
        let x = ((opcode & 0x0F00) >> 8) as usize;
        let y = ((opcode & 0x00F0) >> 4) as usize;
        let d = (opcode & 0x000F) as u8;
        let kk = (opcode & 0x00FF) as u8;
        let nnn = opcode & 0x0FFF;

        match (c, x, y, d) {
            (0x0, 0x0, 0xE, 0x0) => self.cls(),
            (0x0, 0x0, 0xE, 0xE) => self.ret(),
            (0x1, _, _, _) => self.jmp(nnn),
            (0x2, _, _, _) => self.call(nnn)?,
            (0x3, _, _, _) => self.se(x, kk)?,
            (0x4, _, _, _) => self.sne(x, kk)?,
            (0x5, _, _, 0x0) => self.se_xy(x, y)?,
            (0x6, _, _, _) => self.ld(x, kk)?,
            (0x7, _, _, _) => self.add(x, kk)?,
            (0x8, _, _, 0x0) => self.ld_xy(x, y)?,
            (0x8, _, _, 0x1) => self.or_xy(x, y)?,
            (0x8, _, _, 0x2) => self.and_xy(x, y)?,
            (0x8, _, _, 0x3) => self.xor_xy(x, y)?,
            (0x8, _, _, 0x4) => self.add_xy(x, y)?,
            (0x8, _, _, 0x5) => self.sub_xy(x, y)?,
            (0x8, _, _, 0x6) => self.shr(x, y)?,
            (0x8, _, _, 0x7) => self.subn_xy(x, y)?,
            (0x8, _, _, 0xE) => self.shl(x, y)?,
            (0x9, _, _, 0x0) => self.sne_xy(x, y)?,
            (0xA, _, _, _) => self.memory.write_index(nnn),
            (0xB, _, _, _) => self.jmp_v0(nnn)?,
            (0xC, _, _, _) => self.rnd(x, kk)?,
            (0xD, _, _, _) => self.drw(x, y, d as usize)?,
            (0xE, _, _, _) => match kk {
                0x9E => self.skp(x)?,
                0xA1 => self.sknp(x)?,
                _ => return Err(Fault::UnknownInstruction),
            },
            (0xF, _, _, _) => match kk {
                0x07 => self.ld(x, self.memory.delay_timer())?,
                0x0A => return self.ld_key(x),
                0x15 => {
                    let val = self.memory.read_register(x)?;
                    self.memory.set_delay_timer(val);
                }
                0x18 => {
                    let val = self.memory.read_register(x)?;
                    self.memory.set_sound_timer(val);
                }
                0x1E => self.add_i(x)?,
                0x29 => {
                    let digit = self.memory.read_register(x)?;
                    self.memory.set_index_to_font(digit)?;
                }
                0x33 => self.bcd(x)?,
                0x55 => self.store(x)?,
                0x65 => self.load(x)?,
                _ => return Err(Fault::UnknownInstruction),
            },
            _ => return Err(Fault::UnknownInstruction),
        }

        Ok(Step::Executed)
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.memory.advance_pc();
        }
    }

    /// (00e0) CLS clears the screen
    fn cls(&mut self) {
        self.display.clear();
    }

    /// (00ee) RET return from the current sub-routine, a no-op on an empty
    /// stack
    fn ret(&mut self) {
        self.memory.pop_return();
    }

    /// (1nnn) JUMP to `addr`
    fn jmp(&mut self, addr: u16) {
        self.memory.write_pc(addr);
    }

    /// (2nnn) CALL sub-routine at `addr`
    fn call(&mut self, addr: u16) -> Result<(), Fault> {
        self.memory.push_return(addr)
    }

    /// (3xkk) SE **s**kip if **e**qual
    fn se(&mut self, x: usize, kk: u8) -> Result<(), Fault> {
        let vx = self.memory.read_register(x)?;
        self.skip_if(vx == kk);
        Ok(())
    }

    /// (4xkk) SNE **s**kip if **n**ot **e**qual
    fn sne(&mut self, x: usize, kk: u8) -> Result<(), Fault> {
        let vx = self.memory.read_register(x)?;
        self.skip_if(vx != kk);
        Ok(())
    }

    /// (5xy0) skip if `vx` equals `vy`
    fn se_xy(&mut self, x: usize, y: usize) -> Result<(), Fault> {
        let (vx, vy) = self.pair(x, y)?;
        self.skip_if(vx == vy);
        Ok(())
    }

    /// (9xy0) skip if `vx` differs from `vy`
    fn sne_xy(&mut self, x: usize, y: usize) -> Result<(), Fault> {
        let (vx, vy) = self.pair(x, y)?;
        self.skip_if(vx != vy);
        Ok(())
    }

    /// (6xkk) LD sets the value `kk` into register `vx`
    fn ld(&mut self, x: usize, kk: u8) -> Result<(), Fault> {
        self.memory.write_register(x, kk)
    }

    /// (7xkk) ADD `kk` to `vx`, wrapping, VF untouched
    fn add(&mut self, x: usize, kk: u8) -> Result<(), Fault> {
        let vx = self.memory.read_register(x)?;
        self.memory.write_register(x, vx.wrapping_add(kk))
    }

    fn ld_xy(&mut self, x: usize, y: usize) -> Result<(), Fault> {
        let vy = self.memory.read_register(y)?;
        self.memory.write_register(x, vy)
    }

    fn or_xy(&mut self, x: usize, y: usize) -> Result<(), Fault> {
        let (vx, vy) = self.pair(x, y)?;
        self.memory.write_register(x, vx | vy)
    }

    fn and_xy(&mut self, x: usize, y: usize) -> Result<(), Fault> {
        let (vx, vy) = self.pair(x, y)?;
        self.memory.write_register(x, vx & vy)
    }

    fn xor_xy(&mut self, x: usize, y: usize) -> Result<(), Fault> {
        let (vx, vy) = self.pair(x, y)?;
        self.memory.write_register(x, vx ^ vy)
    }

    // The flag is written before the result for 8xy4, 8xy5 and 8xy7 and after
    // it for the shifts, so VF as a destination keeps the result or the flag
    // accordingly.

    /// (8xy4) Add one registers contents to another registers contents
    fn add_xy(&mut self, x: usize, y: usize) -> Result<(), Fault> {
        let (vx, vy) = self.pair(x, y)?;
        let (val, overflow) = vx.overflowing_add(vy);
        self.memory.write_flag(overflow as u8);
        self.memory.write_register(x, val)
    }

    /// (8xy5) `vx -= vy`, VF set when no borrow happened
    fn sub_xy(&mut self, x: usize, y: usize) -> Result<(), Fault> {
        let (vx, vy) = self.pair(x, y)?;
        self.memory.write_flag((vx > vy) as u8);
        self.memory.write_register(x, vx.wrapping_sub(vy))
    }

    /// (8xy6) `vx = vy >> 1`, VF gets the bit shifted out
    fn shr(&mut self, x: usize, y: usize) -> Result<(), Fault> {
        let vy = self.memory.read_register(y)?;
        self.memory.write_register(x, vy >> 1)?;
        self.memory.write_flag(vy & 0x01);
        Ok(())
    }

    /// (8xy7) `vx = vy - vx`, VF set when no borrow happened
    fn subn_xy(&mut self, x: usize, y: usize) -> Result<(), Fault> {
        let (vx, vy) = self.pair(x, y)?;
        self.memory.write_flag((vy > vx) as u8);
        self.memory.write_register(x, vy.wrapping_sub(vx))
    }

    /// (8xye) `vx = vy << 1`, VF gets the shifted out bit unnormalised, 0x00
    /// or 0x80
    fn shl(&mut self, x: usize, y: usize) -> Result<(), Fault> {
        let vy = self.memory.read_register(y)?;
        self.memory.write_register(x, vy << 1)?;
        self.memory.write_flag(vy & 0x80);
        Ok(())
    }

    /// (bnnn) JUMP to `addr + v0`
    fn jmp_v0(&mut self, addr: u16) -> Result<(), Fault> {
        let v0 = self.memory.read_register(0)?;
        self.memory.write_pc(addr + v0 as u16);
        Ok(())
    }

    /// (cxkk) RND `vx = random & kk`
    fn rnd(&mut self, x: usize, kk: u8) -> Result<(), Fault> {
        let random: u8 = self.rng.gen();
        self.memory.write_register(x, random & kk)
    }

    /// (dxyn) DRW `n` rows of sprite data from I at (`vx`, `vy`), VF flags a
    /// collision
    fn drw(&mut self, x: usize, y: usize, n: usize) -> Result<(), Fault> {
        let (vx, vy) = self.pair(x, y)?;
        let rows = self.memory.read_range(self.memory.read_index() as usize, n)?;
        let collided = self.display.draw_sprite(rows, vx as usize, vy as usize);
        self.memory.write_flag(collided as u8);
        Ok(())
    }

    /// (ex9e) skip if the key in `vx` is held
    fn skp(&mut self, x: usize) -> Result<(), Fault> {
        let key = self.memory.read_register(x)?;
        self.skip_if(self.keyboard.is_key_down(key));
        Ok(())
    }

    /// (exa1) skip if the key in `vx` is not held
    fn sknp(&mut self, x: usize) -> Result<(), Fault> {
        let key = self.memory.read_register(x)?;
        self.skip_if(!self.keyboard.is_key_down(key));
        Ok(())
    }

    /// (fx0a) wait for a key press and store it in `vx`
    fn ld_key(&mut self, x: usize) -> Result<Step, Fault> {
        match self.keyboard.first_key_down() {
            Some(key) => {
                self.memory.write_register(x, key)?;
                Ok(Step::Executed)
            }
            None => {
                // validate now so the resumed write cannot fail
                self.memory.read_register(x)?;
                Ok(Step::AwaitingKey(x))
            }
        }
    }

    /// (fx1e) `i += vx`
    fn add_i(&mut self, x: usize) -> Result<(), Fault> {
        let vx = self.memory.read_register(x)?;
        let i = self.memory.read_index();
        self.memory.write_index(i.wrapping_add(vx as u16));
        Ok(())
    }

    /// (fx33) store the decimal digits of `vx` at I, I+1 and I+2
    fn bcd(&mut self, x: usize) -> Result<(), Fault> {
        let vx = self.memory.read_register(x)?;
        let digits = [vx / 100, (vx / 10) % 10, vx % 10];
        self.memory
            .write_range(self.memory.read_index() as usize, &digits)
    }

    /// (fx55) store `v0..=vx` starting at I
    fn store(&mut self, x: usize) -> Result<(), Fault> {
        let values = (0..=x)
            .map(|register| self.memory.read_register(register))
            .collect::<Result<Vec<_>, _>>()?;
        self.memory
            .write_range(self.memory.read_index() as usize, &values)
    }

    /// (fx65) load `v0..=vx` from memory starting at I
    fn load(&mut self, x: usize) -> Result<(), Fault> {
        let values = self
            .memory
            .read_range(self.memory.read_index() as usize, x + 1)?
            .to_vec();
        for (register, val) in values.into_iter().enumerate() {
            self.memory.write_register(register, val)?;
        }
        Ok(())
    }

    fn pair(&self, x: usize, y: usize) -> Result<(u8, u8), Fault> {
        Ok((self.memory.read_register(x)?, self.memory.read_register(y)?))
    }
}
