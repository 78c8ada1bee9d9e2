use std::path::PathBuf;

use anyhow::Context;
use chip8_vm::interpreter::{ChipState, Config, TimerMode};
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Timer {
    /// Count down once per instruction
    PerCycle,
    /// Count down at 60 Hz of emulated time
    SixtyHz,
}

#[derive(Parser, Debug)]
#[command(version, about = "Run a CHIP-8 ROM", long_about = None)]
struct Args {
    /// Path to the ROM file to run
    rom: PathBuf,

    #[arg(long, default_value_t = 700, help = "Instructions per second")]
    clock_hz: u32,

    #[arg(long, value_enum, default_value_t = Timer::SixtyHz, help = "Delay timer rate")]
    timer: Timer,
}

// chip8_base::run owns the process from here on
#[allow(unreachable_code)]
fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let program = std::fs::read(&args.rom)
        .with_context(|| format!("failed to read ROM {}", args.rom.display()))?;

    let config = Config {
        clock_hz: args.clock_hz,
        timer: match args.timer {
            Timer::PerCycle => TimerMode::PerCycle,
            Timer::SixtyHz => TimerMode::SixtyHz,
        },
        ..Config::default()
    };
    let mut chip8_vm = ChipState::new(config);
    chip8_vm.load_rom(&program)?;
    chip8_base::run(chip8_vm);
    Ok(())
}
