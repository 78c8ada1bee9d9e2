/// A raw 16-bit instruction word.
///
/// Field names follow the usual CHIP-8 notation: `nnn` is the low 12 bits,
/// `n` the low nibble, `x` and `y` the two middle nibbles and `kk` the low byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode(pub u16);

impl Opcode {
    pub fn from_bytes(high: u8, low: u8) -> Self {
        Opcode(u16::from_be_bytes([high, low]))
    }

    // Break the word into 4 nibbles, most significant first
    pub fn nibbles(self) -> (u8, u8, u8, u8) {
        let n3 = (self.0 >> 12) as u8;
        let n2 = ((self.0 >> 8) & 0xF) as u8;
        let n1 = ((self.0 >> 4) & 0xF) as u8;
        let n0 = (self.0 & 0xF) as u8;
        (n3, n2, n1, n0)
    }

    pub fn nnn(self) -> u16 {
        self.0 & 0x0FFF
    }

    pub fn n(self) -> u8 {
        (self.0 & 0x000F) as u8
    }

    pub fn x(self) -> usize {
        ((self.0 >> 8) & 0xF) as usize
    }

    pub fn y(self) -> usize {
        ((self.0 >> 4) & 0xF) as usize
    }

    pub fn kk(self) -> u8 {
        (self.0 & 0x00FF) as u8
    }
}

/// Every instruction the machine understands, with its operands already
/// pulled out of the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// 0nnn SYS addr: machine code routine, ignored
    Sys(u16),
    /// 00E0 CLS
    Cls,
    /// 00EE RET
    Ret,
    /// 1nnn JP addr
    Jp(u16),
    /// 2nnn CALL addr
    Call(u16),
    /// 3xkk SE Vx, byte
    SeImm(usize, u8),
    /// 4xkk SNE Vx, byte
    SneImm(usize, u8),
    /// 5xy0 SE Vx, Vy
    SeReg(usize, usize),
    /// 6xkk LD Vx, byte
    LdImm(usize, u8),
    /// 7xkk ADD Vx, byte
    AddImm(usize, u8),
    /// 8xy0 LD Vx, Vy
    LdReg(usize, usize),
    /// 8xy1 OR Vx, Vy
    Or(usize, usize),
    /// 8xy2 AND Vx, Vy
    And(usize, usize),
    /// 8xy3 XOR Vx, Vy
    Xor(usize, usize),
    /// 8xy4 ADD Vx, Vy
    AddReg(usize, usize),
    /// 8xy5 SUB Vx, Vy
    Sub(usize, usize),
    /// 8xy6 SHR Vx
    Shr(usize),
    /// 8xy7 SUBN Vx, Vy
    Subn(usize, usize),
    /// 8xyE SHL Vx
    Shl(usize),
    /// 9xy0 SNE Vx, Vy
    SneReg(usize, usize),
    /// Annn LD I, addr
    LdI(u16),
    /// Bnnn JP V0, addr
    JpV0(u16),
    /// Cxkk RND Vx, byte
    Rnd(usize, u8),
    /// Dxyn DRW Vx, Vy, nibble
    Drw(usize, usize, u8),
    /// Ex9E SKP Vx
    Skp(usize),
    /// ExA1 SKNP Vx
    Sknp(usize),
    /// Fx07 LD Vx, DT
    LdFromDelay(usize),
    /// Fx0A LD Vx, K
    WaitKey(usize),
    /// Fx15 LD DT, Vx
    LdDelay(usize),
    /// Fx18 LD ST, Vx
    LdSound(usize),
    /// Fx1E ADD I, Vx
    AddI(usize),
    /// Fx29 LD F, Vx
    LdFont(usize),
    /// Fx33 LD B, Vx
    Bcd(usize),
    /// Fx55 LD [I], Vx
    Store(usize),
    /// Fx65 LD Vx, [I]
    Load(usize),
}

impl Instruction {
    /// Map an opcode onto its instruction. `None` means the opcode is not
    /// part of the instruction set.
    pub fn decode(op: Opcode) -> Option<Instruction> {
        let (x, y, nnn, kk) = (op.x(), op.y(), op.nnn(), op.kk());
        let inst = match op.nibbles() {
            (0x0, 0x0, 0xE, 0x0) => Instruction::Cls,
            (0x0, 0x0, 0xE, 0xE) => Instruction::Ret,
            (0x0, _, _, _) => Instruction::Sys(nnn),
            (0x1, _, _, _) => Instruction::Jp(nnn),
            (0x2, _, _, _) => Instruction::Call(nnn),
            (0x3, _, _, _) => Instruction::SeImm(x, kk),
            (0x4, _, _, _) => Instruction::SneImm(x, kk),
            (0x5, _, _, _) => Instruction::SeReg(x, y),
            (0x6, _, _, _) => Instruction::LdImm(x, kk),
            (0x7, _, _, _) => Instruction::AddImm(x, kk),
            (0x8, _, _, sub) => match sub {
                0x0 => Instruction::LdReg(x, y),
                0x1 => Instruction::Or(x, y),
                0x2 => Instruction::And(x, y),
                0x3 => Instruction::Xor(x, y),
                0x4 => Instruction::AddReg(x, y),
                0x5 => Instruction::Sub(x, y),
                0x6 => Instruction::Shr(x),
                0x7 => Instruction::Subn(x, y),
                0xE => Instruction::Shl(x),
                _ => return None,
            },
            (0x9, _, _, _) => Instruction::SneReg(x, y),
            (0xA, _, _, _) => Instruction::LdI(nnn),
            (0xB, _, _, _) => Instruction::JpV0(nnn),
            (0xC, _, _, _) => Instruction::Rnd(x, kk),
            (0xD, _, _, n) => Instruction::Drw(x, y, n),
            (0xE, _, _, _) => match kk {
                0x9E => Instruction::Skp(x),
                0xA1 => Instruction::Sknp(x),
                _ => return None,
            },
            (0xF, _, _, _) => match kk {
                0x07 => Instruction::LdFromDelay(x),
                0x0A => Instruction::WaitKey(x),
                0x15 => Instruction::LdDelay(x),
                0x18 => Instruction::LdSound(x),
                0x1E => Instruction::AddI(x),
                0x29 => Instruction::LdFont(x),
                0x33 => Instruction::Bcd(x),
                0x55 => Instruction::Store(x),
                0x65 => Instruction::Load(x),
                _ => return None,
            },
            _ => return None,
        };
        Some(inst)
    }
}
