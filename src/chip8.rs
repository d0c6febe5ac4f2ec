use log::{debug, error, info, log_enabled, trace, Level};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

mod error;
mod font;
mod ops;

pub use error::{Error, Result};

pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;
pub const MEMORY_SIZE: usize = 4096;
pub const PROGRAM_START: u16 = 0x200; // programs start at 0x200
pub const PROGRAM_CAPACITY: usize = MEMORY_SIZE - PROGRAM_START as usize;
const STACK_DEPTH: usize = 16;

/// What the program counter does after a handler returns.
enum Flow {
    Next,
    Skip,
    Jump(u16),
    /// Leave pc alone so the same instruction is fetched next cycle.
    Wait,
}

impl Flow {
    fn skip_if(cond: bool) -> Self {
        if cond {
            Flow::Skip
        } else {
            Flow::Next
        }
    }
}

type OpcodeFn = fn(&mut Chip8) -> Result<Flow>;

pub struct Chip8 {
    // CHIP-8 VM
    opcode: u16,                  // current opcode
    memory: [u8; MEMORY_SIZE],    // system memory
    v: [u8; 16],                  // registers V0-VE (VF is flag for some instructions)
    i: u16,                       // address register
    pc: u16,                      // program counter
    gfx: [u8; WIDTH * HEIGHT],    // pixels state
    delay_timer: u8,
    sound_timer: u8,
    stack: [u16; STACK_DEPTH],
    sp: usize,      // next free stack slot
    key: [bool; 16], // hex keypad state

    // emulator resources
    draw_flag: bool,
    halted: bool,
    rng: StdRng,
}

impl Chip8 {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Machine whose CXNN results are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let mut chip8 = Self {
            opcode: 0,
            memory: [0; MEMORY_SIZE],
            v: [0; 16],
            i: 0,
            pc: PROGRAM_START,
            gfx: [0; WIDTH * HEIGHT],
            delay_timer: 0,
            sound_timer: 0,
            stack: [0; STACK_DEPTH],
            sp: 0,
            key: [false; 16],

            draw_flag: false,
            halted: false,
            rng,
        };
        chip8.reset();
        chip8
    }

    /// Puts the machine back into its power-on state. Memory is wiped, so any
    /// program has to be loaded again.
    pub fn reset(&mut self) {
        self.opcode = 0;
        self.memory = [0; MEMORY_SIZE];
        // CHIP-8 systems had the interpreter in the first 512 bytes of memory
        // since we're emulating that we can just store the fontset there
        self.memory[..font::FONTSET.len()].copy_from_slice(&font::FONTSET);
        self.v = [0; 16];
        self.i = 0;
        self.pc = PROGRAM_START;
        self.gfx = [0; WIDTH * HEIGHT];
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.stack = [0; STACK_DEPTH];
        self.sp = 0;
        self.key = [false; 16];
        self.draw_flag = false;
        self.halted = false;
    }

    /// Copies raw program bytes to 0x200.
    pub fn load_program(&mut self, program: &[u8]) -> Result<()> {
        if program.len() > PROGRAM_CAPACITY {
            return Err(Error::RomTooLarge {
                size: program.len(),
                capacity: PROGRAM_CAPACITY,
            });
        }
        let start = PROGRAM_START as usize;
        self.memory[start..start + program.len()].copy_from_slice(program);
        info!("loaded {} byte program", program.len());
        Ok(())
    }

    pub fn load_game<P: AsRef<Path>>(&mut self, filename: P) -> Result<()> {
        let program = std::fs::read(filename)?;
        self.load_program(&program)
    }

    pub fn draw_flag(&self) -> bool {
        self.draw_flag
    }

    /// Called by the renderer once it has consumed the frame.
    pub fn clear_draw_flag(&mut self) {
        self.draw_flag = false;
    }

    /// Row-major `WIDTH * HEIGHT` cells, each 0 or 1.
    pub fn gfx(&self) -> &[u8] {
        &self.gfx
    }

    pub fn sound_flag(&self) -> bool {
        self.sound_timer > 0
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn clear_keys(&mut self) {
        self.key = [false; 16];
    }

    pub fn press_key(&mut self, key: usize) {
        if let Some(k) = self.key.get_mut(key) {
            *k = true;
        }
    }

    pub fn release_key(&mut self, key: usize) {
        if let Some(k) = self.key.get_mut(key) {
            *k = false;
        }
    }

    /// Runs one fetch/decode/execute step followed by one timer tick.
    ///
    /// A returned error is fatal: the machine halts and every later call
    /// fails with [`Error::Halted`] until [`Chip8::reset`].
    pub fn emulate_cycle(&mut self) -> Result<()> {
        if self.halted {
            return Err(Error::Halted);
        }

        if let Err(e) = self.step() {
            error!("halting: {}", e);
            self.halted = true;
            return Err(e);
        }

        self.tick_timers();
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        self.opcode = self.fetch()?;
        trace!("{:03X}: {:04X}", self.pc, self.opcode);

        let f = ops::OPCODE_FNS[(self.opcode >> 12) as usize];
        match f(self)? {
            Flow::Next => self.pc = self.pc.wrapping_add(2),
            Flow::Skip => self.pc = self.pc.wrapping_add(4),
            Flow::Jump(addr) => self.pc = addr,
            Flow::Wait => {}
        }

        if log_enabled!(Level::Trace) {
            self.trace_state();
        }
        Ok(())
    }

    fn fetch(&self) -> Result<u16> {
        // two-byte big-endian opcodes
        let pc = self.pc as usize;
        Ok((self.read_byte(pc)? as u16) << 8 | self.read_byte(pc + 1)? as u16)
    }

    fn tick_timers(&mut self) {
        if self.delay_timer > 0 {
            self.delay_timer -= 1;
        }
        if self.sound_timer > 0 {
            self.sound_timer -= 1;
            if self.sound_timer == 0 {
                debug!("sound off");
            }
        }
    }

    fn read_byte(&self, addr: usize) -> Result<u8> {
        self.memory
            .get(addr)
            .copied()
            .ok_or(Error::MemoryOutOfBounds { addr, pc: self.pc })
    }

    fn write_byte(&mut self, addr: usize, value: u8) -> Result<()> {
        let pc = self.pc;
        let byte = self
            .memory
            .get_mut(addr)
            .ok_or(Error::MemoryOutOfBounds { addr, pc })?;
        *byte = value;
        Ok(())
    }

    fn x(&self) -> usize {
        ((self.opcode & 0x0F00) >> 8) as usize
    }

    fn y(&self) -> usize {
        ((self.opcode & 0x00F0) >> 4) as usize
    }

    fn n(&self) -> usize {
        (self.opcode & 0x000F) as usize
    }

    fn nn(&self) -> u8 {
        (self.opcode & 0x00FF) as u8
    }

    fn nnn(&self) -> u16 {
        self.opcode & 0x0FFF
    }

    fn unknown_opcode(&self) -> Error {
        Error::UnknownOpcode {
            opcode: self.opcode,
            family: (self.opcode >> 12) as u8,
            pc: self.pc,
        }
    }

    fn trace_state(&self) {
        let hex = |bytes: &mut dyn Iterator<Item = u16>| {
            bytes
                .map(|b| format!("{:0>2X}", b))
                .collect::<Vec<_>>()
                .join(" ")
        };
        trace!("V: [ {} ]", hex(&mut self.v.iter().map(|&b| b as u16)));
        trace!("stack: [ {} ] sp: {}", hex(&mut self.stack.iter().copied()), self.sp);
        trace!(
            "I: {:X} PC: {:X} DT: {} ST: {}",
            self.i,
            self.pc,
            self.delay_timer,
            self.sound_timer
        );
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}
