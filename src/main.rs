extern crate sdl2;

mod chip8;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use sdl2::audio::{AudioCallback, AudioSpecDesired};
use sdl2::event::{Event, WindowEvent};
use sdl2::gfx::primitives::DrawRenderer;
use sdl2::keyboard::Keycode;
use sdl2::pixels;
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "chip8")]
#[command(about = "CHIP-8 interpreter", long_about = None)]
struct Args {
    /// Raw CHIP-8 program, loaded at 0x200
    rom: PathBuf,

    /// Size of one CHIP-8 pixel on screen
    #[arg(long, default_value_t = 16)]
    scale: u32,

    /// Pause between cycles; timers tick once per cycle
    #[arg(long, default_value_t = 2)]
    cycle_delay_ms: u64,

    /// Seed for CXNN, random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Never open the beeper
    #[arg(long)]
    mute: bool,

    /// Default log level, RUST_LOG takes precedence
    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

// conventional COSMAC VIP layout on the left side of a qwerty keyboard
const KEYMAP: [(Keycode, usize); 16] = [
    (Keycode::Num1, 0x1),
    (Keycode::Num2, 0x2),
    (Keycode::Num3, 0x3),
    (Keycode::Num4, 0xC),
    (Keycode::Q, 0x4),
    (Keycode::W, 0x5),
    (Keycode::E, 0x6),
    (Keycode::R, 0xD),
    (Keycode::A, 0x7),
    (Keycode::S, 0x8),
    (Keycode::D, 0x9),
    (Keycode::F, 0xE),
    (Keycode::Z, 0xA),
    (Keycode::X, 0x0),
    (Keycode::C, 0xB),
    (Keycode::V, 0xF),
];

fn keypad_index(keycode: Keycode) -> Option<usize> {
    KEYMAP
        .iter()
        .find(|(k, _)| *k == keycode)
        .map(|&(_, index)| index)
}

struct SquareWave {
    phase_inc: f32,
    phase: f32,
    volume: f32,
}

impl AudioCallback for SquareWave {
    type Channel = f32;

    fn callback(&mut self, out: &mut [f32]) {
        for x in out.iter_mut() {
            *x = if self.phase <= 0.5 {
                self.volume
            } else {
                -self.volume
            };
            self.phase = (self.phase + self.phase_inc) % 1.0;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    SimpleLogger::new()
        .with_level(args.log_level)
        .env()
        .init()
        .context("failed to initialise logging")?;

    let mut emu = match args.seed {
        Some(seed) => chip8::Chip8::with_seed(seed),
        None => chip8::Chip8::new(),
    };
    emu.load_game(&args.rom)
        .with_context(|| format!("failed to load {}", args.rom.display()))?;

    let sdl_ctx = sdl2::init().map_err(anyhow::Error::msg)?;
    let video = sdl_ctx.video().map_err(anyhow::Error::msg)?;

    let scale = args.scale.max(1);
    let window = video
        .window(
            "CHIP-8",
            chip8::WIDTH as u32 * scale,
            chip8::HEIGHT as u32 * scale,
        )
        .position_centered()
        .build()
        .context("failed to create window")?;
    let mut canvas = window
        .into_canvas()
        .build()
        .context("failed to create renderer")?;

    let black = pixels::Color::RGB(0, 0, 0);
    let white = pixels::Color::RGB(255, 255, 255);
    canvas.set_draw_color(black);
    canvas.clear();
    canvas.present();

    let beeper = if args.mute {
        None
    } else {
        let audio = sdl_ctx.audio().map_err(anyhow::Error::msg)?;
        let desired = AudioSpecDesired {
            freq: Some(44_100),
            channels: Some(1),
            samples: None,
        };
        let device = audio
            .open_playback(None, &desired, |spec| SquareWave {
                phase_inc: 440.0 / spec.freq as f32,
                phase: 0.0,
                volume: 0.25,
            })
            .map_err(anyhow::Error::msg)?;
        Some(device)
    };

    let mut event_pump = sdl_ctx.event_pump().map_err(anyhow::Error::msg)?;
    let sleep = Duration::from_millis(args.cycle_delay_ms);
    info!("running {} at pc {:#05X}", args.rom.display(), emu.pc());

    'main: loop {
        emu.emulate_cycle()
            .with_context(|| format!("machine stopped at pc {:#05X}", emu.pc()))?;

        for e in event_pump.poll_iter() {
            match e {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'main,
                Event::KeyDown {
                    keycode: Some(keycode),
                    ..
                } => {
                    if let Some(k) = keypad_index(keycode) {
                        emu.press_key(k);
                    }
                }
                Event::KeyUp {
                    keycode: Some(keycode),
                    ..
                } => {
                    if let Some(k) = keypad_index(keycode) {
                        emu.release_key(k);
                    }
                }
                Event::Window {
                    win_event: WindowEvent::FocusLost,
                    ..
                } => emu.clear_keys(),
                _ => {}
            }
        }

        if emu.draw_flag() {
            canvas.set_draw_color(black);
            canvas.clear();
            let cell = scale as i16;
            for (i, p) in emu.gfx().iter().enumerate() {
                if *p == 0 {
                    continue;
                }
                let x = (i % chip8::WIDTH) as i16 * cell;
                let y = (i / chip8::WIDTH) as i16 * cell;
                canvas
                    .box_(x, y, x + cell - 1, y + cell - 1, white)
                    .map_err(anyhow::Error::msg)?;
            }
            canvas.present();
            emu.clear_draw_flag();
        }

        if let Some(device) = &beeper {
            if emu.sound_flag() {
                device.resume();
            } else {
                device.pause();
            }
        }

        std::thread::sleep(sleep);
    }

    info!("halted: {}", emu.is_halted());
    Ok(())
}
