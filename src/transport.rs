//! Register transports that carry TMS and TDI/TDO traffic to the bridge
//! hardware.  Concrete bridges implement the `Transport` trait; the I2C GPIO
//! expander bridge lives in [`i2c`].

pub mod i2c;

use crate::error::Result;

/// Byte-oriented register access to the bridge.  Each logical channel has a
/// byte port for full bytes and a tail variant for the final 1-7 bits of a
/// frame; a width of 0 addresses a full-byte tail.
pub trait Transport {
    /// Write a single byte to `port`.
    fn write_byte(&mut self, port: u8, value: u8) -> Result<()>;

    /// Read a single byte from `port`.
    fn read_byte(&mut self, port: u8) -> Result<u8>;

    /// Write an ordered run of bytes to `port`.  Implementations may split
    /// the run into bus-sized blocks as long as byte order is preserved.
    fn write_block(&mut self, port: u8, data: &[u8]) -> Result<()>;

    /// Deliver a frame tail: the low `width` bits of `value`, or all eight
    /// when `width` is 0.
    fn write_tail(&mut self, port: u8, width: u8, value: u8) -> Result<()>;

    /// Retrieve a frame tail of `width` valid bits (0 meaning a full byte).
    fn read_tail(&mut self, port: u8, width: u8) -> Result<u8>;
}

/// Switches the JTAG lines on and off around a session.  Enabling or
/// disabling the pins has no effect on TAP state tracking.
pub trait PinController {
    /// Drive the JTAG lines, taking control of the target.
    fn enable(&mut self) -> Result<()>;

    /// Tristate the JTAG lines, releasing the target.
    fn disable(&mut self) -> Result<()>;
}
