use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info};

use crate::cpu::{Cpu, Step};
use crate::error::Error;
use crate::keyboard::Keyboard;

pub const DEFAULT_CLOCK_HZ: u32 = 500;

/// Drives the CPU one instruction per tick. The CPU is only locked for the
/// duration of a single step, so the renderer can take frames in between.
pub struct Clock {
    cpu: Arc<Mutex<Cpu>>,
    keyboard: Arc<Keyboard>,
    period: Duration,
    shutdown: Arc<AtomicBool>,
}

impl Clock {
    pub fn new(
        cpu: Arc<Mutex<Cpu>>,
        rate_hz: u32,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self, Error> {
        let keyboard = Arc::clone(&cpu.lock()?.keyboard);
        Ok(Self {
            cpu,
            keyboard,
            period: Duration::from_nanos(1_000_000_000 / rate_hz.max(1) as u64),
            shutdown,
        })
    }

    /// Runs the clock on its own thread
    pub fn spawn(self) -> JoinHandle<Result<(), Error>> {
        thread::spawn(move || self.run())
    }

    /// Ticks until shutdown is requested or the CPU faults. A fault raises the
    /// shutdown flag so the rest of the emulator stops too.
    pub fn run(&self) -> Result<(), Error> {
        info!("instruction clock running at {:?} per tick", self.period);
        let result = self.tick_until_shutdown();
        if let Err(err) = &result {
            error!("{}", err);
            self.shutdown.store(true, Ordering::Release);
        }
        info!("instruction clock stopped");
        result
    }

    fn tick_until_shutdown(&self) -> Result<(), Error> {
        let mut next_tick = Instant::now();

        while !self.shutdown.load(Ordering::Acquire) {
            let step = self.cpu.lock()?.step()?;

            if let Step::AwaitingKey(register) = step {
                debug!("waiting for a key press for V{:X}", register);
                match self.keyboard.wait_for_key(&self.shutdown) {
                    Some(key) => self.cpu.lock()?.resume_with_key(register, key)?,
                    None => break,
                }
                // the wait stands in for however many ticks it took
                next_tick = Instant::now();
            }

            next_tick += self.period;
            let now = Instant::now();
            if next_tick > now {
                thread::sleep(next_tick - now);
            } else {
                // fell behind, don't try to catch up in a burst
                next_tick = now;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Fault;

    fn machine(program: &[u16]) -> Result<(Arc<Mutex<Cpu>>, Arc<AtomicBool>), Error> {
        let bytes: Vec<u8> = program.iter().flat_map(|word| word.to_be_bytes()).collect();
        let mut cpu = Cpu::with_seed(1);
        cpu.load_program(&bytes)?;
        Ok((Arc::new(Mutex::new(cpu)), Arc::new(AtomicBool::new(false))))
    }

    fn register(cpu: &Arc<Mutex<Cpu>>, register: usize) -> u8 {
        cpu.lock().unwrap().memory().read_register(register).unwrap()
    }

    #[test]
    fn runs_program_until_shutdown() -> Result<(), Error> {
        // the last instruction jumps to itself
        let (cpu, shutdown) = machine(&[0x6005, 0x6103, 0x8014, 0x1206])?;
        let handle = Clock::new(Arc::clone(&cpu), 1000, Arc::clone(&shutdown))?.spawn();

        thread::sleep(Duration::from_millis(100));
        shutdown.store(true, Ordering::Release);
        handle.join().unwrap()?;

        assert_eq!(register(&cpu, 0), 8);
        assert_eq!(register(&cpu, 0xF), 0);
        Ok(())
    }

    #[test]
    fn fault_stops_the_run() -> Result<(), Error> {
        let (cpu, shutdown) = machine(&[0x6001, 0x5121])?;
        let handle = Clock::new(Arc::clone(&cpu), 1000, Arc::clone(&shutdown))?.spawn();

        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(
            err,
            Error::Cpu {
                opcode: 0x5121,
                pc: 0x202,
                fault: Fault::UnknownInstruction
            }
        ));
        assert!(shutdown.load(Ordering::Acquire));
        Ok(())
    }

    #[test]
    fn key_wait_blocks_only_the_clock() -> Result<(), Error> {
        let (cpu, shutdown) = machine(&[0x6A3C, 0xFA15, 0xF30A, 0x7401, 0x1208])?;
        let keyboard = Arc::clone(&cpu.lock()?.keyboard);
        let handle = Clock::new(Arc::clone(&cpu), 1000, Arc::clone(&shutdown))?.spawn();

        thread::sleep(Duration::from_millis(150));
        {
            let cpu = cpu.lock()?;
            // parked on FX0A, nothing after it has run
            assert_eq!(cpu.memory().read_pc(), 0x206);
            assert_eq!(cpu.memory().read_register(4).ok(), Some(0));
            // while the delay timer kept counting
            assert!(cpu.memory().delay_timer() < 0x3C);
            // and the screen is still readable
            assert!(cpu.read_display().is_blank());
        }

        keyboard.key_down(0xB);
        thread::sleep(Duration::from_millis(100));
        shutdown.store(true, Ordering::Release);
        handle.join().unwrap()?;

        assert_eq!(register(&cpu, 3), 0xB);
        assert_eq!(register(&cpu, 4), 1);
        Ok(())
    }

    #[test]
    fn shutdown_interrupts_a_key_wait() -> Result<(), Error> {
        let (cpu, shutdown) = machine(&[0xF00A])?;
        let handle = Clock::new(Arc::clone(&cpu), 500, Arc::clone(&shutdown))?.spawn();

        thread::sleep(Duration::from_millis(50));
        shutdown.store(true, Ordering::Release);
        handle.join().unwrap()?;
        Ok(())
    }
}
