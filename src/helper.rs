use crate::display::{Frame, HEIGHT, WIDTH};
use crate::error::Error;
use crate::keyboard::Keyboard;
use minifb::{Key, Scale, Window};
use std::sync::{Arc, Mutex};
use tinyaudio::prelude::*;

pub const PIXEL_ON: u32 = 0xFF00FF00;
pub const PIXEL_OFF: u32 = 0xFF000000;

/// Volume of the tone while the sound timer is running
pub const TONE_VOLUME: f32 = 0.2;

pub fn frame_to_rgb(frame: &Frame) -> Vec<u32> {
    let mut pixels = Vec::with_capacity(WIDTH * HEIGHT);
    // Each byte in the buffer contains 8 pixels (bits)
    for &byte in frame.as_bytes() {
        // Process bits from most-significant to least-significant
        for bit in (0..8).rev() {
            let pixel_on = (byte >> bit) & 1;
            let color = if pixel_on == 1 { PIXEL_ON } else { PIXEL_OFF };
            pixels.push(color);
        }
    }
    pixels
}

/// Maps the left-hand block of a QWERTY keyboard onto the hex keypad
///
/// ```text
/// 1 2 3 4      1 2 3 C
/// Q W E R  ->  4 5 6 D
/// A S D F      7 8 9 E
/// Z X C V      A 0 B F
/// ```
pub fn chip8_key(key: Key) -> Option<u8> {
    match key {
        Key::Key1 => Some(0x1),
        Key::Key2 => Some(0x2),
        Key::Key3 => Some(0x3),
        Key::Key4 => Some(0xC),
        Key::Q => Some(0x4),
        Key::W => Some(0x5),
        Key::E => Some(0x6),
        Key::R => Some(0xD),
        Key::A => Some(0x7),
        Key::S => Some(0x8),
        Key::D => Some(0x9),
        Key::F => Some(0xE),
        Key::Z => Some(0xA),
        Key::X => Some(0x0),
        Key::C => Some(0xB),
        Key::V => Some(0xF),
        _ => None,
    }
}

pub fn update_keyboard(keyboard: &Keyboard, window: &Window) {
    let keys: Vec<u8> = window.get_keys().into_iter().filter_map(chip8_key).collect();
    keyboard.set_keys(&keys);
}

pub fn window_scale(scale: usize) -> Scale {
    match scale {
        1 => Scale::X1,
        2 => Scale::X2,
        4 => Scale::X4,
        16 => Scale::X16,
        32 => Scale::X32,
        _ => Scale::X8,
    }
}

pub fn prepare_audio(volume: Arc<Mutex<f32>>) -> Result<OutputDevice, Error> {
    let params = OutputDeviceParameters {
        channels_count: 2,
        sample_rate: 44100,
        channel_sample_count: 4410,
    };

    let device = run_output_device(params, {
        let vol_clone = Arc::clone(&volume);
        let mut clock = 0f32;
        move |data| {
            // stay silent rather than panic on the audio thread
            let vol = vol_clone.lock().map(|vol| *vol).unwrap_or(0.0);
            for samples in data.chunks_mut(params.channels_count) {
                clock = (clock + 1.0) % params.sample_rate as f32;
                let value =
                    (clock * 440.0 * 2.0 * std::f32::consts::PI / params.sample_rate as f32).sin();
                for sample in samples {
                    *sample = value * vol;
                }
            }
        }
    })
    .map_err(|e| Error::Audio(format!("Audio error: {}", e)))?;

    Ok(device)
}
