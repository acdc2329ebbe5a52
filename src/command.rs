pub trait OpCode {
    fn op_code(&self) -> u8;
}

/// ROM commands understood by every device on the wire
#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum Command {
    SkipRom = 0xCC,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}
