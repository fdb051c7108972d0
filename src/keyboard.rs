use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// The CHIP-8 hex keypad has sixteen keys, 0x0 through 0xF.
pub const KEY_COUNT: u8 = 16;

/// How often a blocked key wait re-checks the shutdown flag
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Shared keypad state. The host writes key presses into it, the CPU reads
/// them, and `FX0A` parks on the condition variable until a key goes down.
#[derive(Default)]
pub struct Keyboard {
    // one bit per key, bit n set while key n is held
    keys: Mutex<u16>,
    pressed: Condvar,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_down(&self, key: u8) {
        if key < KEY_COUNT {
            *self.state() |= 1 << key;
            self.pressed.notify_all();
        }
    }

    pub fn key_up(&self, key: u8) {
        if key < KEY_COUNT {
            *self.state() &= !(1 << key);
        }
    }

    /// Replaces the whole keypad state at once
    pub fn set_keys(&self, keys: &[u8]) {
        let mask = keys
            .iter()
            .filter(|&&key| key < KEY_COUNT)
            .fold(0u16, |mask, &key| mask | 1 << key);
        *self.state() = mask;
        if mask != 0 {
            self.pressed.notify_all();
        }
    }

    pub fn clear(&self) {
        *self.state() = 0;
    }

    /// Keys outside 0x0..=0xF are never down
    pub fn is_key_down(&self, key: u8) -> bool {
        key < KEY_COUNT && *self.state() & (1 << key) != 0
    }

    /// The lowest-numbered key currently held
    pub fn first_key_down(&self) -> Option<u8> {
        first_key(*self.state())
    }

    /// Blocks until some key is held and returns it, or returns `None` once
    /// `shutdown` is raised.
    pub fn wait_for_key(&self, shutdown: &AtomicBool) -> Option<u8> {
        let mut keys = self.state();
        loop {
            if let Some(key) = first_key(*keys) {
                return Some(key);
            }
            if shutdown.load(Ordering::Acquire) {
                return None;
            }
            keys = self
                .pressed
                .wait_timeout(keys, WAIT_POLL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    // The state is a plain bitmask, so a poisoned lock still holds valid data.
    fn state(&self) -> MutexGuard<'_, u16> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn first_key(keys: u16) -> Option<u8> {
    (keys != 0).then(|| keys.trailing_zeros() as u8)
}
