use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::Command;

/// Bus capabilities the driver needs: send bytes, request a number of bytes
/// and drain them one at a time, and block for a while.
///
/// Implementations must deliver each call to completion before returning.
pub trait Transport {
    type Error: core::fmt::Debug;

    fn transmit(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Reads up to `count` bytes from the peripheral and returns how many are
    /// available to [`Transport::receive_byte`].
    fn request_bytes(&mut self, address: u8, count: usize) -> usize;

    /// Next byte from the last request.
    fn receive_byte(&mut self) -> u8;

    fn delay_ms(&mut self, ms: u32);

    fn send_command(&mut self, address: u8, command: Command) -> Result<(), Self::Error> {
        trace!("-> {:?} ({=u16:#x})", command, command.raw());
        self.transmit(address, &command.to_be_bytes())
    }
}

const RX_BUFFER_LEN: usize = 32;

/// [`Transport`] over an `embedded-hal` I2C bus and delay.
///
/// Received bytes are buffered, at most 32 per request. A failed bus read
/// counts as zero bytes available.
pub struct I2cTransport<I, D> {
    i2c: I,
    delay: D,
    rx: [u8; RX_BUFFER_LEN],
    rx_len: usize,
    rx_pos: usize,
}

impl<I: I2c, D: DelayNs> I2cTransport<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            rx: [0; RX_BUFFER_LEN],
            rx_len: 0,
            rx_pos: 0,
        }
    }

    /// Gives back the bus and the delay.
    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }
}

impl<I: I2c, D: DelayNs> Transport for I2cTransport<I, D> {
    type Error = I::Error;

    fn transmit(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.i2c.write(address, bytes)
    }

    fn request_bytes(&mut self, address: u8, count: usize) -> usize {
        let count = count.min(RX_BUFFER_LEN);
        self.rx_pos = 0;
        self.rx_len = match self.i2c.read(address, &mut self.rx[..count]) {
            Ok(()) => count,
            Err(_) => 0,
        };
        self.rx_len
    }

    fn receive_byte(&mut self) -> u8 {
        if self.rx_pos >= self.rx_len {
            return 0;
        }
        let byte = self.rx[self.rx_pos];
        self.rx_pos += 1;
        byte
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
