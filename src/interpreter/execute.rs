use super::{ChipState, Instruction, Step, FONT_START, GLYPH_SIZE, STACK_SIZE};
use log::{error, trace};
use rand::Rng;

impl ChipState {
    /// Apply one decoded instruction. The program counter already points at
    /// the following instruction.
    pub(super) fn execute(&mut self, inst: Instruction) -> Step {
        match inst {
            // 0nnn SYS addr: jump to a machine code routine, not emulated
            Instruction::Sys(addr) => {
                trace!("ignoring SYS {:03x}", addr);
            }
            // 00E0 CLS: clear display
            Instruction::Cls => {
                self.video.clear();
                return Step::Redraw;
            }
            // 00EE RET: return from subroutine
            Instruction::Ret => {
                if self.stack_pointer == 0 {
                    error!("RET with empty stack at {:03x}", self.pc_of_current());
                } else {
                    self.stack_pointer -= 1;
                    self.program_counter = self.stack[self.stack_pointer];
                }
            }
            // 1nnn JP addr: jump to location nnn
            Instruction::Jp(addr) => {
                self.program_counter = addr;
            }
            // 2nnn CALL addr: call subroutine at nnn
            Instruction::Call(addr) => {
                if self.stack_pointer >= STACK_SIZE {
                    error!("CALL with full stack at {:03x}", self.pc_of_current());
                } else {
                    self.stack[self.stack_pointer] = self.program_counter;
                    self.stack_pointer += 1;
                    self.program_counter = addr;
                }
            }
            // 3xkk SE Vx, byte: skip next instruction if Vx = kk
            Instruction::SeImm(x, kk) => self.skip_if(self.registers[x] == kk),
            // 4xkk SNE Vx, byte: skip next instruction if Vx != kk
            Instruction::SneImm(x, kk) => self.skip_if(self.registers[x] != kk),
            // 5xy0 SE Vx, Vy: skip next instruction if Vx = Vy
            Instruction::SeReg(x, y) => self.skip_if(self.registers[x] == self.registers[y]),
            // 6xkk LD Vx, byte: set Vx = kk
            Instruction::LdImm(x, kk) => {
                self.registers[x] = kk;
            }
            // 7xkk ADD Vx, byte: set Vx = Vx + kk, VF untouched
            Instruction::AddImm(x, kk) => {
                self.registers[x] = self.registers[x].wrapping_add(kk);
            }
            // 8xy0 LD Vx, Vy: set Vx = Vy
            Instruction::LdReg(x, y) => {
                self.registers[x] = self.registers[y];
            }
            // 8xy1 OR Vx, Vy: set Vx = Vx OR Vy
            Instruction::Or(x, y) => {
                self.registers[x] |= self.registers[y];
            }
            // 8xy2 AND Vx, Vy: set Vx = Vx AND Vy
            Instruction::And(x, y) => {
                self.registers[x] &= self.registers[y];
            }
            // 8xy3 XOR Vx, Vy: set Vx = Vx XOR Vy
            Instruction::Xor(x, y) => {
                self.registers[x] ^= self.registers[y];
            }
            // 8xy4 ADD Vx, Vy: set Vx = Vx + Vy, set VF = carry
            Instruction::AddReg(x, y) => {
                let sum = self.registers[x] as u16 + self.registers[y] as u16;
                self.registers[0xF] = (sum > 0xFF) as u8;
                self.registers[x] = sum as u8;
            }
            // 8xy5 SUB Vx, Vy: set Vx = Vx - Vy, set VF = NOT borrow
            Instruction::Sub(x, y) => {
                let (vx, vy) = (self.registers[x], self.registers[y]);
                self.registers[0xF] = (vx > vy) as u8;
                self.registers[x] = vx.wrapping_sub(vy);
            }
            // 8xy6 SHR Vx: VF = lsb of Vx, then Vx = Vx / 2
            Instruction::Shr(x) => {
                let vx = self.registers[x];
                self.registers[0xF] = vx & 0x1;
                self.registers[x] = vx >> 1;
            }
            // 8xy7 SUBN Vx, Vy: set Vx = Vy - Vx, set VF = NOT borrow
            Instruction::Subn(x, y) => {
                let (vx, vy) = (self.registers[x], self.registers[y]);
                self.registers[0xF] = (vy > vx) as u8;
                self.registers[x] = vy.wrapping_sub(vx);
            }
            // 8xyE SHL Vx: VF = msb of Vx, then Vx = Vx * 2
            Instruction::Shl(x) => {
                let vx = self.registers[x];
                self.registers[0xF] = vx >> 7;
                self.registers[x] = vx << 1;
            }
            // 9xy0 SNE Vx, Vy: skip next instruction if Vx != Vy
            Instruction::SneReg(x, y) => self.skip_if(self.registers[x] != self.registers[y]),
            // Annn LD I, addr: set I = nnn
            Instruction::LdI(addr) => {
                self.index_register = addr;
            }
            // Bnnn JP V0, addr: jump to location nnn + V0
            Instruction::JpV0(addr) => {
                self.program_counter = addr + self.registers[0] as u16;
            }
            // Cxkk RND Vx, byte: set Vx = random byte AND kk
            Instruction::Rnd(x, kk) => {
                let rand: u8 = self.rng.gen();
                self.registers[x] = rand & kk;
            }
            // Dxyn DRW Vx, Vy, nibble: display n-byte sprite starting at memory location I at (Vx, Vy), set VF = collision
            Instruction::Drw(x, y, n) => {
                let (vx, vy) = (self.registers[x], self.registers[y]);
                let sprite: Vec<u8> = (0..n as u16)
                    .map(|row| self.read(self.index_register.wrapping_add(row)))
                    .collect();
                self.registers[0xF] = 0;
                if self.video.draw_sprite(vx, vy, &sprite) {
                    self.registers[0xF] = 1;
                }
                return Step::Redraw;
            }
            // Ex9E SKP Vx: skip next instruction if key with the value of Vx is pressed
            Instruction::Skp(x) => self.skip_if(self.key_pressed(self.registers[x])),
            // ExA1 SKNP Vx: skip next instruction if key with the value of Vx is not pressed
            Instruction::Sknp(x) => self.skip_if(!self.key_pressed(self.registers[x])),
            // Fx07 LD Vx, DT: set Vx = delay timer value
            Instruction::LdFromDelay(x) => {
                self.registers[x] = self.delay_timer;
            }
            // Fx0A LD Vx, K: wait for a key press, store the value of the key in Vx
            Instruction::WaitKey(x) => match self.keypad.iter().position(|&key| key) {
                Some(key) => self.registers[x] = key as u8,
                None => {
                    self.program_counter = self.program_counter.wrapping_sub(2);
                    return Step::WaitingForKey;
                }
            },
            // Fx15 LD DT, Vx: set delay timer = Vx
            Instruction::LdDelay(x) => {
                self.delay_timer = self.registers[x];
            }
            // Fx18 LD ST, Vx: no sound hardware, nothing to do
            Instruction::LdSound(_) => (),
            // Fx1E ADD I, Vx: set I = I + Vx
            Instruction::AddI(x) => {
                self.index_register = self
                    .index_register
                    .wrapping_add(self.registers[x] as u16);
            }
            // Fx29 LD F, Vx: set I = location of sprite for digit Vx
            Instruction::LdFont(x) => {
                self.index_register = FONT_START + GLYPH_SIZE * self.registers[x] as u16;
            }
            // Fx33 LD B, Vx: store BCD representation of Vx in memory locations I, I+1, and I+2
            Instruction::Bcd(x) => {
                let val = self.registers[x];
                let i = self.index_register;
                self.write(i, val / 100);
                self.write(i.wrapping_add(1), (val / 10) % 10);
                self.write(i.wrapping_add(2), val % 10);
            }
            // Fx55 LD [I], Vx: store registers V0 through Vx in memory starting at location I
            Instruction::Store(x) => {
                for reg_i in 0..=x {
                    let addr = self.index_register.wrapping_add(reg_i as u16);
                    self.write(addr, self.registers[reg_i]);
                }
            }
            // Fx65 LD Vx, [I]: read registers V0 through Vx from memory starting at location I
            Instruction::Load(x) => {
                for reg_i in 0..=x {
                    let addr = self.index_register.wrapping_add(reg_i as u16);
                    self.registers[reg_i] = self.read(addr);
                }
            }
        };
        Step::Executed
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.program_counter = self.program_counter.wrapping_add(2);
        }
    }

    fn pc_of_current(&self) -> u16 {
        self.program_counter.wrapping_sub(2)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Config, Opcode, FONT, PIXEL_ON};
    use super::*;

    fn chip_with(program: &[u8]) -> ChipState {
        let mut chip = ChipState::with_seed(Config::default(), 42);
        chip.load_rom(program).unwrap();
        chip
    }

    /// Load `setup` into V0.. then run `op` once.
    fn run_op(setup: &[u8], op: u16) -> ChipState {
        let mut chip = chip_with(&op.to_be_bytes());
        for (i, &v) in setup.iter().enumerate() {
            chip.set_register(i, v);
        }
        chip.cycle();
        chip
    }

    #[test]
    fn load_immediate_round_trip() {
        for reg in 0..16_u16 {
            for value in [0x00, 0x01, 0x7F, 0x80, 0xFF] {
                let chip = run_op(&[], 0x6000 | reg << 8 | value);
                assert_eq!(chip.register(reg as usize), value as u8);
            }
        }
    }

    #[test]
    fn add_immediate_wraps_without_flag() {
        let chip = run_op(&[0xFF], 0x7002);
        assert_eq!(chip.register(0), 0x01);
        assert_eq!(chip.register(0xF), 0);
    }

    #[test]
    fn add_with_carry() {
        let chip = run_op(&[0xFF, 0x01], 0x8014);
        assert_eq!(chip.register(0), 0x00);
        assert_eq!(chip.register(0xF), 1);

        let chip = run_op(&[0x01, 0x01], 0x8014);
        assert_eq!(chip.register(0), 0x02);
        assert_eq!(chip.register(0xF), 0);
    }

    #[test]
    fn add_same_register_sets_flag() {
        let mut setup = [0; 16];
        setup[0xF] = 1;
        setup[3] = 0x10;
        let chip = run_op(&setup, 0x8334);
        assert_eq!(chip.register(3), 0x20);
        assert_eq!(chip.register(0xF), 0);
    }

    #[test]
    fn subtract_not_borrow() {
        let chip = run_op(&[0x05, 0x03], 0x8015);
        assert_eq!(chip.register(0), 0x02);
        assert_eq!(chip.register(0xF), 1);

        let chip = run_op(&[0x03, 0x05], 0x8015);
        assert_eq!(chip.register(0), 0xFE);
        assert_eq!(chip.register(0xF), 0);

        let chip = run_op(&[0x04, 0x04], 0x8015);
        assert_eq!(chip.register(0), 0x00);
        assert_eq!(chip.register(0xF), 0);
    }

    #[test]
    fn reverse_subtract() {
        let chip = run_op(&[0x03, 0x05], 0x8017);
        assert_eq!(chip.register(0), 0x02);
        assert_eq!(chip.register(0xF), 1);

        let chip = run_op(&[0x05, 0x03], 0x8017);
        assert_eq!(chip.register(0), 0xFE);
        assert_eq!(chip.register(0xF), 0);
    }

    #[test]
    fn shifts() {
        let chip = run_op(&[0x05], 0x8006);
        assert_eq!(chip.register(0), 0x02);
        assert_eq!(chip.register(0xF), 1);

        let chip = run_op(&[0x04], 0x8006);
        assert_eq!(chip.register(0), 0x02);
        assert_eq!(chip.register(0xF), 0);

        let chip = run_op(&[0x81], 0x800E);
        assert_eq!(chip.register(0), 0x02);
        assert_eq!(chip.register(0xF), 1);

        let chip = run_op(&[0x41], 0x800E);
        assert_eq!(chip.register(0), 0x82);
        assert_eq!(chip.register(0xF), 0);
    }

    #[test]
    fn bitwise_leave_flag_alone() {
        let mut setup = [0; 16];
        setup[0] = 0b1100;
        setup[1] = 0b1010;
        setup[0xF] = 0x77;

        let chip = run_op(&setup, 0x8011);
        assert_eq!(chip.register(0), 0b1110);
        let chip = run_op(&setup, 0x8012);
        assert_eq!(chip.register(0), 0b1000);
        let chip = run_op(&setup, 0x8013);
        assert_eq!(chip.register(0), 0b0110);
        let chip = run_op(&setup, 0x8010);
        assert_eq!(chip.register(0), 0b1010);
        assert_eq!(chip.register(0xF), 0x77);
    }

    #[test]
    fn skip_conventions() {
        assert_eq!(run_op(&[0x42], 0x3042).program_counter(), 0x204);
        assert_eq!(run_op(&[0x41], 0x3042).program_counter(), 0x202);
        assert_eq!(run_op(&[0x41], 0x4042).program_counter(), 0x204);
        assert_eq!(run_op(&[0x42], 0x4042).program_counter(), 0x202);
        assert_eq!(run_op(&[7, 7], 0x5010).program_counter(), 0x204);
        assert_eq!(run_op(&[7, 8], 0x5010).program_counter(), 0x202);
        assert_eq!(run_op(&[7, 8], 0x9010).program_counter(), 0x204);
        assert_eq!(run_op(&[7, 7], 0x9010).program_counter(), 0x202);
    }

    #[test]
    fn jumps() {
        assert_eq!(run_op(&[], 0x1ABC).program_counter(), 0xABC);
        assert_eq!(run_op(&[0x10], 0xB300).program_counter(), 0x310);
    }

    #[test]
    fn call_and_return() {
        // 0x200: CALL 0x300
        // 0x202: LD V1, 1
        // 0x300: LD V0, 5; RET
        let mut rom = vec![0; 0x104];
        rom[..4].copy_from_slice(&[0x23, 0x00, 0x61, 0x01]);
        rom[0x100..0x104].copy_from_slice(&[0x60, 0x05, 0x00, 0xEE]);
        let mut chip = chip_with(&rom);

        chip.cycle();
        assert_eq!(chip.program_counter(), 0x300);
        assert_eq!(chip.stack_pointer(), 1);
        assert_eq!(chip.stack()[0], 0x202);

        chip.cycle();
        chip.cycle();
        assert_eq!(chip.program_counter(), 0x202);
        assert_eq!(chip.stack_pointer(), 0);

        chip.cycle();
        assert_eq!(chip.registers()[..2], [5, 1]);
    }

    #[test]
    fn return_on_empty_stack_is_ignored() {
        let chip = run_op(&[], 0x00EE);
        assert_eq!(chip.program_counter(), 0x202);
        assert_eq!(chip.stack_pointer(), 0);
    }

    #[test]
    fn call_on_full_stack_is_ignored() {
        // CALL 0x200 forever
        let mut chip = chip_with(&[0x22, 0x00]);
        for _ in 0..16 {
            chip.cycle();
        }
        assert_eq!(chip.stack_pointer(), 16);
        chip.cycle();
        assert_eq!(chip.stack_pointer(), 16);
        assert_eq!(chip.program_counter(), 0x202);
    }

    #[test]
    fn index_ops() {
        assert_eq!(run_op(&[], 0xA123).index_register(), 0x123);

        let mut chip = chip_with(&[0xF0, 0x1E]);
        chip.set_index_register(0x0FFF);
        chip.set_register(0, 0x02);
        chip.cycle();
        assert_eq!(chip.index_register(), 0x1001);
        assert_eq!(chip.register(0xF), 0);
    }

    #[test]
    fn random_is_masked() {
        for _ in 0..32 {
            let chip = run_op(&[], 0xC00F);
            assert_eq!(chip.register(0) & 0xF0, 0);
        }
        assert_eq!(run_op(&[], 0xC000).register(0), 0);
    }

    #[test]
    fn random_is_reproducible_from_seed() {
        let a = run_op(&[], 0xC0FF).register(0);
        let b = run_op(&[], 0xC0FF).register(0);
        assert_eq!(a, b);
    }

    #[test]
    fn draw_font_glyph() {
        // V0 = 0 (x), V1 = 0 (y); I = glyph "0"; DRW V0, V1, 5
        let mut chip = chip_with(&[0xA0, 0x50, 0xD0, 0x15]);
        chip.cycle();
        assert_eq!(chip.cycle(), Step::Redraw);
        assert_eq!(chip.register(0xF), 0);
        let video = chip.video();
        // 0xF0, 0x90, 0x90, 0x90, 0xF0
        for x in 0..4 {
            assert!(video.is_lit(x, 0));
            assert!(video.is_lit(x, 4));
        }
        assert!(video.is_lit(0, 2));
        assert!(!video.is_lit(1, 2));
        assert!(video.is_lit(3, 2));
        assert!(!video.is_lit(4, 0));
    }

    #[test]
    fn draw_twice_restores_and_collides() {
        // LD I, 0x208; DRW V0, V1, 2; DRW V0, V1, 2; JP 0x206; sprite data
        let mut chip = chip_with(&[0xA2, 0x08, 0xD0, 0x12, 0xD0, 0x12, 0x12, 0x06, 0xC3, 0x3C]);
        chip.set_register(0, 20);
        chip.set_register(1, 10);
        chip.cycle();
        chip.cycle();
        assert_eq!(chip.register(0xF), 0);
        assert_eq!(chip.video().get(20, 10), Some(PIXEL_ON));
        assert!(chip.video().is_lit(22, 11));

        chip.cycle();
        assert_eq!(chip.register(0xF), 1);
        assert!(chip.video().cells().iter().all(|&c| c == 0));
    }

    #[test]
    fn collision_is_sticky_across_rows() {
        let mut chip = chip_with(&[0xD0, 0x12, 0xD0, 0x12, 0x80, 0x80]);
        chip.set_index_register(0x204);
        chip.cycle();
        // row 0 turns (0,0) off, row 1 lands on the dark (1,1)
        chip.set_index_register(0x205);
        chip.memory[0x206] = 0x40;
        chip.cycle();
        assert_eq!(chip.register(0xF), 1);
        assert!(!chip.video().is_lit(0, 0));
        assert!(chip.video().is_lit(1, 1));
    }

    #[test]
    fn draw_clips_at_edges() {
        let mut chip = chip_with(&[0xD0, 0x12, 0xFF, 0xFF]);
        chip.set_index_register(0x202);
        chip.set_register(0, 62);
        chip.set_register(1, 31);
        chip.cycle();
        let lit = chip.video().cells().iter().filter(|&&c| c == PIXEL_ON).count();
        assert_eq!(lit, 2);
        assert!(chip.video().is_lit(62, 31));
        assert!(chip.video().is_lit(63, 31));
        assert!(!chip.video().is_lit(0, 31));
        assert!(!chip.video().is_lit(62, 0));
    }

    #[test]
    fn draw_reads_sprite_with_wrapping_index() {
        let mut chip = chip_with(&[0xD0, 0x02]);
        chip.set_index_register(0x0FFF);
        chip.memory[0xFFF] = 0x80;
        chip.memory[0x000] = 0x80;
        chip.cycle();
        assert!(chip.video().is_lit(0, 0));
        assert!(chip.video().is_lit(0, 1));
    }

    #[test]
    fn clear_screen() {
        let mut chip = chip_with(&[0xD0, 0x05, 0x00, 0xE0]);
        chip.set_index_register(0x50);
        chip.cycle();
        assert!(chip.video().is_lit(0, 0));
        assert_eq!(chip.cycle(), Step::Redraw);
        assert!(chip.video().cells().iter().all(|&c| c == 0));
    }

    #[test]
    fn key_skips() {
        let mut chip = chip_with(&[0xE0, 0x9E]);
        chip.set_register(0, 0xA);
        chip.set_key(0xA, true);
        chip.cycle();
        assert_eq!(chip.program_counter(), 0x204);

        let mut chip = chip_with(&[0xE0, 0x9E]);
        chip.set_register(0, 0xA);
        chip.cycle();
        assert_eq!(chip.program_counter(), 0x202);

        let mut chip = chip_with(&[0xE0, 0xA1]);
        chip.set_register(0, 0xA);
        chip.cycle();
        assert_eq!(chip.program_counter(), 0x204);

        let mut chip = chip_with(&[0xE0, 0xA1]);
        chip.set_register(0, 0xA);
        chip.keypad_mut()[0xA] = true;
        chip.cycle();
        assert_eq!(chip.program_counter(), 0x202);
    }

    #[test]
    fn key_index_out_of_range_reads_released() {
        let mut chip = chip_with(&[0xE0, 0xA1]);
        chip.set_register(0, 0x20);
        chip.cycle();
        assert_eq!(chip.program_counter(), 0x204);
    }

    #[test]
    fn wait_for_key_blocks() {
        let mut chip = chip_with(&[0xF3, 0x0A]);
        assert_eq!(chip.cycle(), Step::WaitingForKey);
        assert_eq!(chip.program_counter(), 0x200);
        assert_eq!(chip.cycle(), Step::WaitingForKey);
        assert_eq!(chip.program_counter(), 0x200);

        chip.set_key(5, true);
        assert_eq!(chip.cycle(), Step::Executed);
        assert_eq!(chip.register(3), 5);
        assert_eq!(chip.program_counter(), 0x202);
    }

    #[test]
    fn wait_for_key_lowest_wins() {
        let mut chip = chip_with(&[0xF3, 0x0A]);
        chip.set_key(0xE, true);
        chip.set_key(0x9, true);
        chip.cycle();
        assert_eq!(chip.register(3), 0x9);
    }

    #[test]
    fn delay_timer_transfer() {
        // LD V0, 0x20; LD DT, V0; LD V1, DT
        let mut chip = chip_with(&[0x60, 0x20, 0xF0, 0x15, 0xF1, 0x07]);
        chip.cycle();
        chip.cycle();
        chip.cycle();
        // one decrement after LD DT, one after LD V1, DT
        assert_eq!(chip.register(1), 0x1F);
        assert_eq!(chip.delay_timer(), 0x1E);
    }

    #[test]
    fn sound_timer_is_a_no_op() {
        let before = chip_with(&[0xF0, 0x18]);
        let mut after = chip_with(&[0xF0, 0x18]);
        after.set_register(0, 9);
        after.cycle();
        assert_eq!(after.program_counter(), 0x202);
        assert_eq!(after.memory()[..], before.memory()[..]);
        assert_eq!(after.opcode(), Opcode(0xF018));
    }

    #[test]
    fn font_address() {
        assert_eq!(run_op(&[0x0], 0xF029).index_register(), 0x50);
        assert_eq!(run_op(&[0xA], 0xF029).index_register(), 0x50 + 50);
        let chip = run_op(&[0xF], 0xF029);
        let i = chip.index_register() as usize;
        assert_eq!(&chip.memory()[i..i + 5], &FONT[75..80]);
    }

    #[test]
    fn bcd() {
        for (value, digits) in [(234, [2, 3, 4]), (0, [0, 0, 0]), (255, [2, 5, 5]), (7, [0, 0, 7])] {
            let mut chip = chip_with(&[0xF0, 0x33]);
            chip.set_register(0, value);
            chip.set_index_register(0x300);
            chip.cycle();
            assert_eq!(chip.memory()[0x300..0x303], digits, "value {}", value);
        }
    }

    #[test]
    fn store_and_load_inclusive() {
        let mut chip = chip_with(&[0xF3, 0x55]);
        for i in 0..16 {
            chip.set_register(i, i as u8 + 1);
        }
        chip.set_index_register(0x400);
        chip.cycle();
        assert_eq!(chip.memory()[0x400..0x405], [1, 2, 3, 4, 0]);
        assert_eq!(chip.index_register(), 0x400);

        let mut chip = chip_with(&[0xF2, 0x65]);
        chip.memory[0x400..0x404].copy_from_slice(&[9, 8, 7, 6]);
        chip.set_index_register(0x400);
        chip.cycle();
        assert_eq!(chip.registers()[..4], [9, 8, 7, 0]);
    }

    #[test]
    fn draw_reads_coordinates_before_clearing_flag() {
        let mut chip = chip_with(&[0xDF, 0x01, 0x80]);
        chip.set_index_register(0x202);
        chip.set_register(0xF, 5);
        chip.cycle();
        assert!(chip.video().is_lit(5, 0));
        assert_eq!(chip.register(0xF), 0);
    }

    #[test]
    fn sys_is_ignored() {
        let chip = run_op(&[1, 2, 3], 0x0123);
        assert_eq!(chip.registers()[..3], [1, 2, 3]);
        assert_eq!(chip.program_counter(), 0x202);
    }
}
