use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;

/// Timers count down at 60Hz.
pub const TIMER_HZ: u64 = 60;

/// A CHIP-8 countdown timer. The value lives in an atomic shared with at most
/// one decrement driver thread, which runs while the value is non-zero and
/// stops itself once it reaches zero.
pub struct Timer {
    name: &'static str,
    value: Arc<AtomicU8>,
    driver: Option<Driver>,
}

struct Driver {
    // Dropping the sender wakes the driver and tells it to stop.
    cancel: Sender<()>,
    handle: JoinHandle<()>,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            value: Arc::new(AtomicU8::new(0)),
            driver: None,
        }
    }

    pub fn get(&self) -> u8 {
        self.value.load(Ordering::Acquire)
    }

    /// Sets the timer, replacing any running driver. A non-zero value starts
    /// a fresh 60Hz driver.
    pub fn set(&mut self, value: u8) {
        self.stop();
        self.value.store(value, Ordering::Release);
        if value != 0 {
            self.driver = Some(self.spawn_driver());
        }
    }

    /// Whether a decrement driver is still counting this timer down
    pub fn is_running(&self) -> bool {
        self.driver
            .as_ref()
            .map_or(false, |driver| !driver.handle.is_finished())
    }

    fn spawn_driver(&self) -> Driver {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let value = Arc::clone(&self.value);
        let name = self.name;
        let period = Duration::from_nanos(1_000_000_000 / TIMER_HZ);

        debug!("{} timer driver started at {}", name, value.load(Ordering::Acquire));
        let handle = thread::spawn(move || loop {
            match cancelled.recv_timeout(period) {
                Err(RecvTimeoutError::Timeout) => {
                    let remaining = value.fetch_sub(1, Ordering::AcqRel).wrapping_sub(1);
                    if remaining == 0 {
                        debug!("{} timer reached zero", name);
                        break;
                    }
                }
                // cancelled by a newer set()
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        Driver { cancel, handle }
    }

    fn stop(&mut self) {
        if let Some(Driver { cancel, handle }) = self.driver.take() {
            drop(cancel);
            // the driver never panics, a join error only means it is gone
            let _ = handle.join();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(1000 / TIMER_HZ);

    #[test]
    fn counts_down_to_zero_and_stops() {
        let mut timer = Timer::new("delay");
        timer.set(5);
        assert!(timer.get() > 0);

        // five ticks is ~83ms, leave plenty of room for a busy machine
        thread::sleep(TICK * 5 + Duration::from_millis(200));
        assert_eq!(timer.get(), 0);
        assert!(!timer.is_running());

        thread::sleep(TICK * 3);
        assert_eq!(timer.get(), 0);
    }

    #[test]
    fn setting_zero_does_not_start_a_driver() {
        let mut timer = Timer::new("sound");
        timer.set(0);
        assert_eq!(timer.get(), 0);
        assert!(!timer.is_running());
    }

    #[test]
    fn reset_replaces_the_running_driver() {
        let mut timer = Timer::new("delay");
        timer.set(200);
        timer.set(200);
        timer.set(150);

        // the timer itself plus exactly one driver hold the value
        assert_eq!(Arc::strong_count(&timer.value), 2);
        assert!(timer.is_running());
        assert!(timer.get() <= 150);
    }

    #[test]
    fn setting_zero_cancels_the_driver() {
        let mut timer = Timer::new("delay");
        timer.set(100);
        timer.set(0);
        assert!(!timer.is_running());
        assert_eq!(Arc::strong_count(&timer.value), 1);

        thread::sleep(TICK * 2);
        assert_eq!(timer.get(), 0);
    }
}
