use super::{font, Chip8, Error, Flow, OpcodeFn, Result, HEIGHT, STACK_DEPTH, WIDTH};
use log::{debug, trace};
use rand::Rng;

/// Family handlers indexed by the top nibble of the opcode.
pub(super) const OPCODE_FNS: [OpcodeFn; 16] = [
    Chip8::cls_ret, // 00**
    Chip8::jmp,     // 1NNN
    Chip8::call,    // 2NNN
    Chip8::eb,      // 3XNN
    Chip8::neb,     // 4XNN
    Chip8::er,      // 5XY0
    Chip8::ld,      // 6XNN
    Chip8::addb,    // 7XNN
    Chip8::alu,     // 8XY*
    Chip8::ner,     // 9XY0
    Chip8::si,      // ANNN
    Chip8::jmpo,    // BNNN
    Chip8::rng,     // CXNN
    Chip8::draw,    // DXYN
    Chip8::key,     // EX**
    Chip8::ex,      // FX**
];

impl Chip8 {
    fn cls_ret(&mut self) -> Result<Flow> {
        match self.nn() {
            0xE0 => {
                // 00E0
                // clear screen
                self.gfx = [0; WIDTH * HEIGHT];
                self.draw_flag = true;
            }
            0xEE => {
                // 00EE
                // return from subroutine; the popped call site is stepped over below
                if self.sp == 0 {
                    return Err(Error::StackUnderflow { pc: self.pc });
                }
                self.sp -= 1;
                self.pc = self.stack[self.sp];
                self.stack[self.sp] = 0;
            }
            _ => return Err(self.unknown_opcode()),
        }
        Ok(Flow::Next)
    }

    fn jmp(&mut self) -> Result<Flow> {
        // 1NNN
        // jump to NNN
        Ok(Flow::Jump(self.nnn()))
    }

    fn call(&mut self) -> Result<Flow> {
        // 2NNN
        // call subroutine at NNN
        if self.sp == STACK_DEPTH {
            return Err(Error::StackOverflow { pc: self.pc });
        }
        self.stack[self.sp] = self.pc;
        self.sp += 1;
        Ok(Flow::Jump(self.nnn()))
    }

    fn eb(&mut self) -> Result<Flow> {
        // 3XNN
        // skip if VX == NN
        Ok(Flow::skip_if(self.v[self.x()] == self.nn()))
    }

    fn neb(&mut self) -> Result<Flow> {
        // 4XNN
        // skip if VX != NN
        Ok(Flow::skip_if(self.v[self.x()] != self.nn()))
    }

    fn er(&mut self) -> Result<Flow> {
        // 5XY0
        // skip if VX == VY
        if self.n() != 0 {
            return Err(self.unknown_opcode());
        }
        Ok(Flow::skip_if(self.v[self.x()] == self.v[self.y()]))
    }

    fn ld(&mut self) -> Result<Flow> {
        // 6XNN
        // set VX to NN
        let x = self.x();
        self.v[x] = self.nn();
        Ok(Flow::Next)
    }

    fn addb(&mut self) -> Result<Flow> {
        // 7XNN
        // add NN to VX (no carry)
        let x = self.x();
        self.v[x] = self.v[x].wrapping_add(self.nn());
        Ok(Flow::Next)
    }

    /// Both operands are read up front and VF is written before VX, so with
    /// X = F the result of the operation is what remains in VF.
    fn alu(&mut self) -> Result<Flow> {
        let x = self.x();
        let y = self.y();
        let (vx, vy) = (self.v[x], self.v[y]);
        match self.n() {
            0x0 => {
                // 8XY0
                // set VX to VY
                self.v[x] = vy;
            }
            0x1 => {
                // 8XY1
                // set VX to VX OR VY
                self.v[x] = vx | vy;
            }
            0x2 => {
                // 8XY2
                // set VX to VX AND VY
                self.v[x] = vx & vy;
            }
            0x3 => {
                // 8XY3
                // set VX to VX XOR VY
                self.v[x] = vx ^ vy;
            }
            0x4 => {
                // 8XY4
                // add VY to VX (set VF = 1 if there's a carry)
                let (sum, carry) = vx.overflowing_add(vy);
                self.v[0xF] = carry as u8;
                self.v[x] = sum;
            }
            0x5 => {
                // 8XY5
                // sub VY from VX (set VF = 0 if there's a borrow and 1 if not)
                self.v[0xF] = if vx >= vy { 1 } else { 0 };
                self.v[x] = vx.wrapping_sub(vy);
            }
            0x6 => {
                // 8XY6
                // store the LSB of VX in VF and shift VX one to the right, VY is ignored
                self.v[0xF] = vx & 0x1;
                self.v[x] = vx >> 1;
            }
            0x7 => {
                // 8XY7
                // set VX to VY - VX (set VF = 0 if there's a borrow and 1 if not)
                self.v[0xF] = if vy >= vx { 1 } else { 0 };
                self.v[x] = vy.wrapping_sub(vx);
            }
            0xE => {
                // 8XYE
                // store the MSB of VX in VF and shift VX one to the left, VY is ignored
                self.v[0xF] = vx >> 7;
                self.v[x] = vx << 1;
            }
            _ => return Err(self.unknown_opcode()),
        }
        Ok(Flow::Next)
    }

    fn ner(&mut self) -> Result<Flow> {
        // 9XY0
        // skip if VX != VY
        if self.n() != 0 {
            return Err(self.unknown_opcode());
        }
        Ok(Flow::skip_if(self.v[self.x()] != self.v[self.y()]))
    }

    fn si(&mut self) -> Result<Flow> {
        // ANNN
        // set I to NNN
        self.i = self.nnn();
        Ok(Flow::Next)
    }

    fn jmpo(&mut self) -> Result<Flow> {
        // BNNN
        // jump to NNN + V0
        Ok(Flow::Jump(self.nnn() + self.v[0] as u16))
    }

    fn rng(&mut self) -> Result<Flow> {
        // CXNN
        // Set VX = RNG[0, 256) & NN
        let x = self.x();
        self.v[x] = self.rng.gen::<u8>() & self.nn();
        Ok(Flow::Next)
    }

    fn draw(&mut self) -> Result<Flow> {
        // DXYN
        // draw a sprite at VX,VY with a width of 8 pixels and a height of N pixels
        // each row of 8 pixels is bit-coded in memory starting at I
        // currently drawn pixels are XORd with pixels in memory, wrapping at the edges
        // VF is set to 1 if any currently drawn pixels are unset during this
        let vx = self.v[self.x()] as usize;
        let vy = self.v[self.y()] as usize;
        let height = self.n();
        let i = self.i as usize;

        // fetch every row before touching the screen so a bad I leaves it intact
        let mut sprite = [0u8; 15];
        for (row, bits) in sprite.iter_mut().take(height).enumerate() {
            *bits = self.read_byte(i + row)?;
        }

        let mut collision = 0;
        for (row, &bits) in sprite[..height].iter().enumerate() {
            for p in 0..8 {
                if bits & (0x80 >> p) != 0 {
                    let gfx_offset = WIDTH * ((vy + row) % HEIGHT) + (vx + p) % WIDTH;
                    if self.gfx[gfx_offset] == 1 {
                        // screen pixel is set and being unset
                        collision = 1;
                    }
                    self.gfx[gfx_offset] ^= 1;
                }
            }
        }

        self.v[0xF] = collision;
        self.draw_flag = true;
        Ok(Flow::Next)
    }

    fn key(&mut self) -> Result<Flow> {
        // keys past 0xF don't exist on the keypad, so they are never pressed
        let vx = self.v[self.x()] as usize;
        let pressed = self.key.get(vx).copied().unwrap_or(false);
        match self.nn() {
            0x9E => {
                // EX9E
                // skip if key stored in VX is pressed
                Ok(Flow::skip_if(pressed))
            }
            0xA1 => {
                // EXA1
                // skip if key stored in VX isn't pressed
                Ok(Flow::skip_if(!pressed))
            }
            _ => Err(self.unknown_opcode()),
        }
    }

    fn ex(&mut self) -> Result<Flow> {
        let x = self.x();
        let vx = self.v[x];
        match self.nn() {
            0x07 => {
                // FX07
                // set VX to delay timer
                self.v[x] = self.delay_timer;
            }
            0x0A => {
                // FX0A
                // store next key press in VX, blocking instruction
                match self.key.iter().position(|&pressed| pressed) {
                    Some(k) => self.v[x] = k as u8,
                    None => {
                        trace!("waiting for key press into V{:X}", x);
                        return Ok(Flow::Wait);
                    }
                }
            }
            0x15 => {
                // FX15
                // set delay timer to VX
                self.delay_timer = vx;
            }
            0x18 => {
                // FX18
                // set sound timer to VX
                if self.sound_timer == 0 && vx > 0 {
                    debug!("sound on");
                }
                self.sound_timer = vx;
            }
            0x1E => {
                // FX1E
                // add VX to I, VF flags a result past the end of memory
                let sum = self.i as u32 + vx as u32;
                self.v[0xF] = if sum > 0xFFF { 1 } else { 0 };
                self.i = self.i.wrapping_add(vx as u16);
            }
            0x29 => {
                // FX29
                // set I to location in memory of sprite for character in VX
                self.i = vx as u16 * font::GLYPH_SIZE as u16;
            }
            0x33 => {
                // FX33
                // store the BCD representation of VX at I
                // so 193 becomes [1, 9, 3] in memory at I
                let i = self.i as usize;
                self.write_byte(i, vx / 100)?;
                self.write_byte(i + 1, (vx / 10) % 10)?;
                self.write_byte(i + 2, vx % 10)?;
            }
            0x55 => {
                // FX55
                // store V0 to VX (inclusive) in memory at I, then step I past them
                let i = self.i as usize;
                for offset in 0..=x {
                    let value = self.v[offset];
                    self.write_byte(i + offset, value)?;
                }
                self.i = self.i.wrapping_add(x as u16 + 1);
            }
            0x65 => {
                // FX65
                // fill V0 to VX (inclusive) from memory at I, then step I past them
                let i = self.i as usize;
                for offset in 0..=x {
                    self.v[offset] = self.read_byte(i + offset)?;
                }
                self.i = self.i.wrapping_add(x as u16 + 1);
            }
            _ => return Err(self.unknown_opcode()),
        }
        Ok(Flow::Next)
    }
}
