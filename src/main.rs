use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chip8_vm::clock::Clock;
use chip8_vm::config::Config;
use chip8_vm::cpu::Cpu;
use chip8_vm::display::{HEIGHT, WIDTH};
use chip8_vm::error::Error;
use chip8_vm::helper::{
    frame_to_rgb, prepare_audio, update_keyboard, window_scale, TONE_VOLUME,
};
use chip8_vm::rom::Rom;
use log::{info, warn};
use minifb::{Key, ScaleMode, Window, WindowOptions};

fn main() -> Result<(), Error> {
    env_logger::init();
    let config = Config::from_args();

    let rom = Rom::open_file(&config.rom)?;
    let mut cpu = match config.seed {
        Some(seed) => Cpu::with_seed(seed),
        None => Cpu::default(),
    };
    // rejects oversized programs before anything starts running
    cpu.load_program(&rom.instructions)?;

    let keyboard = Arc::clone(&cpu.keyboard);
    // Wrap CPU in an Arc<Mutex<>> to share it between threads.
    let cpu = Arc::new(Mutex::new(cpu));
    let shutdown = Arc::new(AtomicBool::new(false));

    let volume = Arc::new(Mutex::new(0f32));
    let _audio = if config.muted {
        None
    } else {
        prepare_audio(Arc::clone(&volume))
            .map_err(|err| warn!("continuing without sound: {}", err))
            .ok()
    };

    let mut window = Window::new(
        "CHIP-8",
        WIDTH,
        HEIGHT,
        WindowOptions {
            resize: true,
            scale: window_scale(config.scale),
            scale_mode: ScaleMode::AspectRatioStretch,
            ..WindowOptions::default()
        },
    )?;

    // Limit to max ~60 fps update rate.
    window.set_target_fps(60);

    info!("running {}", config.rom.display());
    let clock = Clock::new(Arc::clone(&cpu), config.clock_rate, Arc::clone(&shutdown))?.spawn();

    while window.is_open()
        && !window.is_key_down(Key::Escape)
        && !shutdown.load(Ordering::Acquire)
    {
        update_keyboard(&keyboard, &window);

        // Copy the frame out so the clock isn't held up by the window.
        let (frame, sound_timer) = {
            let cpu_lock = cpu.lock()?;
            (cpu_lock.read_display(), cpu_lock.memory().sound_timer())
        };
        *volume.lock()? = if sound_timer > 0 { TONE_VOLUME } else { 0.0 };

        window.update_with_buffer(&frame_to_rgb(&frame), WIDTH, HEIGHT)?;
    }

    shutdown.store(true, Ordering::Release);
    match clock.join() {
        Ok(result) => result,
        Err(_) => Err(Error::Poison("instruction clock panicked".to_string())),
    }
}
