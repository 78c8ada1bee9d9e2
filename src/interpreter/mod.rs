mod error;
mod execute;
mod font;
mod opcode;
mod video;

pub use error::ChipError;
pub use font::{FONT, FONT_START, GLYPH_SIZE};
pub use opcode::{Instruction, Opcode};
pub use video::{Video, PIXEL_OFF, PIXEL_ON};

use chip8_base::{Display, Interpreter, Keys};
use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const MEMORY_SIZE: usize = 4096;
pub const PROGRAM_START: u16 = 0x200;
pub const STACK_SIZE: usize = 16;
pub const KEY_COUNT: usize = 16;

/// When the delay timer counts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// Once per call to [`ChipState::cycle`].
    PerCycle,
    /// Once every `clock_hz / 60` cycles.
    SixtyHz,
    /// Never from `cycle`; the caller drives [`ChipState::tick_timers`].
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub clock_hz: u32,
    pub timer: TimerMode,
    pub width: usize,
    pub height: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            clock_hz: 700,
            timer: TimerMode::PerCycle,
            width: video::DEFAULT_WIDTH,
            height: video::DEFAULT_HEIGHT,
        }
    }
}

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Executed,
    /// The video buffer changed.
    Redraw,
    /// Fx0A found no key down and will run again next cycle.
    WaitingForKey,
    UnknownOpcode(u16),
}

pub struct ChipState {
    memory: [u8; MEMORY_SIZE],
    program_counter: u16,
    stack_pointer: usize,
    stack: [u16; STACK_SIZE],
    registers: [u8; 16],
    index_register: u16,
    delay_timer: u8,
    keypad: [bool; KEY_COUNT],
    video: Video,
    opcode: Opcode,
    rng: StdRng,
    timer: TimerMode,
    ticker: u32,
    max_ticks: u32,
    clock_speed: Duration,
}

impl Interpreter for ChipState {
    fn step(&mut self, keys: &Keys) -> Option<Display> {
        self.keypad.copy_from_slice(keys);
        match self.cycle() {
            Step::Redraw => Some(self.video.to_display()),
            _ => None,
        }
    }

    fn speed(&self) -> Duration {
        self.clock_speed
    }

    // No sound timer, so nothing ever beeps
    fn buzzer_active(&self) -> bool {
        false
    }
}

impl ChipState {
    /// Boot a machine whose random generator is seeded from the clock.
    pub fn new(config: Config) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self::with_seed(config, seed)
    }

    /// Boot a machine with a fixed random seed.
    pub fn with_seed(config: Config, seed: u64) -> Self {
        let clock_hz = config.clock_hz.max(1);
        let mut chip = ChipState {
            memory: [0; MEMORY_SIZE],
            program_counter: PROGRAM_START,
            stack_pointer: 0,
            stack: [0; STACK_SIZE],
            registers: [0; 16],
            index_register: 0,
            delay_timer: 0,
            keypad: [false; KEY_COUNT],
            video: Video::new(config.width, config.height),
            opcode: Opcode(0),
            rng: StdRng::seed_from_u64(seed),
            timer: config.timer,
            ticker: 0,
            max_ticks: ((clock_hz as f64 / 60_f64).round() as u32).max(1),
            clock_speed: Duration::from_secs_f64(1_f64 / clock_hz as f64),
        };
        chip.reset();
        debug!("booted with {:?}, seed {}", config, seed);
        chip
    }

    /// Put every piece of machine state back to its power-on value and
    /// reload the font. The ROM is gone afterwards.
    pub fn reset(&mut self) {
        self.memory = [0; MEMORY_SIZE];
        let font_start = FONT_START as usize;
        self.memory[font_start..font_start + FONT.len()].copy_from_slice(&FONT);
        self.program_counter = PROGRAM_START;
        self.stack_pointer = 0;
        self.stack = [0; STACK_SIZE];
        self.registers = [0; 16];
        self.index_register = 0;
        self.delay_timer = 0;
        self.keypad = [false; KEY_COUNT];
        self.video.clear();
        self.opcode = Opcode(0);
        self.ticker = 0;
    }

    /// Copy a program into memory at 0x200.
    pub fn load_rom(&mut self, program: &[u8]) -> Result<&mut Self, ChipError> {
        let start = PROGRAM_START as usize;
        let max = MEMORY_SIZE - start;
        if program.len() > max {
            return Err(ChipError::RomTooLarge {
                size: program.len(),
                max,
            });
        }
        self.memory[start..start + program.len()].copy_from_slice(program);
        debug!("loaded {} byte ROM", program.len());
        Ok(self)
    }

    /// Run one fetch/decode/execute step, then count the delay timer down
    /// according to the configured [`TimerMode`].
    pub fn cycle(&mut self) -> Step {
        self.opcode = self.fetch();
        trace!("{:04x}: {:04x}", self.program_counter.wrapping_sub(2), self.opcode.0);

        let step = match Instruction::decode(self.opcode) {
            Some(inst) => self.execute(inst),
            None => {
                warn!("Unknown opcode: {:04x}", self.opcode.0);
                Step::UnknownOpcode(self.opcode.0)
            }
        };

        match self.timer {
            TimerMode::PerCycle => self.tick_timers(),
            TimerMode::SixtyHz => {
                self.ticker += 1;
                if self.ticker >= self.max_ticks {
                    self.ticker = 0;
                    self.tick_timers();
                }
            }
            TimerMode::External => (),
        }
        step
    }

    /// Count the delay timer down by one unless it is already zero.
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
    }

    fn fetch(&mut self) -> Opcode {
        let high = self.read(self.program_counter);
        let low = self.read(self.program_counter.wrapping_add(1));
        self.program_counter = self.program_counter.wrapping_add(2);
        Opcode::from_bytes(high, low)
    }

    // Every address is taken modulo memory size
    fn read(&self, addr: u16) -> u8 {
        self.memory[addr as usize % MEMORY_SIZE]
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.memory[addr as usize % MEMORY_SIZE] = value;
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.memory
    }

    pub fn registers(&self) -> &[u8; 16] {
        &self.registers
    }

    pub fn register(&self, index: usize) -> u8 {
        self.registers[index & 0xF]
    }

    pub fn set_register(&mut self, index: usize, value: u8) {
        self.registers[index & 0xF] = value;
    }

    pub fn program_counter(&self) -> u16 {
        self.program_counter
    }

    pub fn set_program_counter(&mut self, pc: u16) {
        self.program_counter = pc;
    }

    pub fn index_register(&self) -> u16 {
        self.index_register
    }

    pub fn set_index_register(&mut self, i: u16) {
        self.index_register = i;
    }

    pub fn stack_pointer(&self) -> usize {
        self.stack_pointer
    }

    pub fn stack(&self) -> &[u16; STACK_SIZE] {
        &self.stack
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn set_delay_timer(&mut self, value: u8) {
        self.delay_timer = value;
    }

    /// The most recently fetched instruction word.
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn video(&self) -> &Video {
        &self.video
    }

    /// Logical keys 0x0..=0xF, written by the input layer.
    pub fn keypad_mut(&mut self) -> &mut [bool; KEY_COUNT] {
        &mut self.keypad
    }

    pub fn set_key(&mut self, key: usize, pressed: bool) {
        if let Some(slot) = self.keypad.get_mut(key) {
            *slot = pressed;
        }
    }

    fn key_pressed(&self, key: u8) -> bool {
        self.keypad.get(key as usize).copied().unwrap_or(false)
    }
}
