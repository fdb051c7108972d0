//! A CHIP-8 virtual machine.
//!
//! The [`cpu::Cpu`] owns RAM, registers and the framebuffer and executes one
//! instruction per [`cpu::Cpu::step`]. A [`clock::Clock`] drives it from its
//! own thread while the host reads frames and feeds key presses through the
//! shared [`keyboard::Keyboard`]. The delay and sound timers count down on
//! their own 60Hz threads.

pub mod clock;
pub mod config;
pub mod cpu;
pub mod display;
pub mod error;
pub mod helper;
pub mod keyboard;
pub mod memory;
pub mod rom;
pub mod timer;
