//! A CHIP-8 virtual machine core.
//!
//! The core owns memory, registers, the video buffer and the logical keypad.
//! Loading ROM files, rendering, physical input and frame pacing belong to the
//! caller; `chip8_base::run` is one such caller (see `main.rs`).

pub mod interpreter;
