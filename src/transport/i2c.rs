//! SMBus-style bridge on an I2C GPIO expander.  The expander exposes one
//! I2C address per shift-register port; writing bytes to a port clocks them
//! out, reading clocks them in.  The tail variant of each port sits one
//! address above it and takes the valid-bit count as a leading command byte.

use embedded_hal::i2c::I2c;

use crate::error::{Error, Result};
use crate::transport::{PinController, Transport};

/// Largest run the expander accepts in one bus transaction.
const MAX_BLOCK: usize = 16;

/// Direction register for the JTAG port pins (1 = input).
const TRIS_PORT: u8 = 0x38;
/// Output latch for the JTAG port pins.
const LATCH_PORT: u8 = 0x39;
/// Pull-up enable register for the JTAG port pins.
const PULLUP_PORT: u8 = 0x3a;
/// The pins of the port occupied by the JTAG lines.
const JTAG_PINS: u8 = 0x4f;
/// TDO, the one line the target drives.
const TDO_PIN: u8 = 0x01;
/// MCLR, held high while the session is active.
const MCLR_PIN: u8 = 0x40;

fn bus_error<E: core::fmt::Debug>(err: E) -> Error {
    Error::Transport(format!("{err:?}"))
}

/// [`Transport`] implementation over any [`embedded_hal::i2c::I2c`] bus.
pub struct I2cBridge<I> {
    bus: I,
}

impl<I: I2c> I2cBridge<I> {
    pub fn new(bus: I) -> Self {
        Self { bus }
    }

    /// Give the bus back, e.g. to hand it to a [`I2cPins`] afterwards.
    pub fn release(self) -> I {
        self.bus
    }
}

impl<I: I2c> Transport for I2cBridge<I> {
    fn write_byte(&mut self, port: u8, value: u8) -> Result<()> {
        self.bus.write(port, &[value]).map_err(bus_error)
    }

    fn read_byte(&mut self, port: u8) -> Result<u8> {
        let mut buf = [0u8];
        self.bus.read(port, &mut buf).map_err(bus_error)?;
        Ok(buf[0])
    }

    fn write_block(&mut self, port: u8, data: &[u8]) -> Result<()> {
        for chunk in data.chunks(MAX_BLOCK) {
            self.bus.write(port, chunk).map_err(bus_error)?;
        }
        Ok(())
    }

    fn write_tail(&mut self, port: u8, width: u8, value: u8) -> Result<()> {
        if width > 0 {
            self.bus.write(port + 1, &[width, value]).map_err(bus_error)
        } else {
            self.bus.write(port, &[value]).map_err(bus_error)
        }
    }

    fn read_tail(&mut self, port: u8, width: u8) -> Result<u8> {
        let mut buf = [0u8];
        if width > 0 {
            self.bus
                .write_read(port + 1, &[width], &mut buf)
                .map_err(bus_error)?;
        } else {
            self.bus.read(port, &mut buf).map_err(bus_error)?;
        }
        Ok(buf[0])
    }
}

/// Pin mux for the JTAG lines, driven through the expander's direction,
/// latch and pull-up registers.
pub struct I2cPins<I> {
    bus: I,
}

impl<I: I2c> I2cPins<I> {
    pub fn new(bus: I) -> Self {
        Self { bus }
    }

    pub fn release(self) -> I {
        self.bus
    }

    /// Read-modify-write of the JTAG pins in one expander register, leaving
    /// the other pins of the port untouched.
    fn update(&mut self, port: u8, set: u8) -> Result<()> {
        let mut buf = [0u8];
        self.bus.read(port, &mut buf).map_err(bus_error)?;
        let value = (buf[0] & !JTAG_PINS) | set;
        self.bus.write(port, &[value]).map_err(bus_error)
    }
}

impl<I: I2c> PinController for I2cPins<I> {
    /// TCK/TDI/TMS become outputs, TDO stays an input with its pull-up, and
    /// MCLR is latched high.
    fn enable(&mut self) -> Result<()> {
        self.update(TRIS_PORT, TDO_PIN)?;
        self.update(LATCH_PORT, MCLR_PIN)?;
        self.update(PULLUP_PORT, TDO_PIN)
    }

    /// All JTAG lines tristated with pull-ups, MCLR released.
    fn disable(&mut self) -> Result<()> {
        self.update(TRIS_PORT, JTAG_PINS)?;
        self.update(LATCH_PORT, 0)?;
        self.update(PULLUP_PORT, JTAG_PINS)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    #[derive(Debug)]
    struct BusError;

    impl embedded_hal::i2c::Error for BusError {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    /// Records every write and answers reads with a fixed byte.
    #[derive(Default)]
    struct FakeBus {
        writes: Vec<(u8, Vec<u8>)>,
        read_value: u8,
    }

    impl ErrorType for FakeBus {
        type Error = BusError;
    }

    impl I2c for FakeBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> core::result::Result<(), BusError> {
            for op in operations {
                match op {
                    Operation::Write(data) => self.writes.push((address, data.to_vec())),
                    Operation::Read(buf) => buf.fill(self.read_value),
                }
            }
            Ok(())
        }
    }

    #[test]
    fn block_writes_are_chunked() {
        let mut bridge = I2cBridge::new(FakeBus::default());
        let data: Vec<u8> = (0..40).collect();
        bridge.write_block(0x1a, &data).unwrap();
        let bus = bridge.release();
        assert_eq!(bus.writes.len(), 3);
        assert_eq!(bus.writes[0], (0x1a, (0..16).collect()));
        assert_eq!(bus.writes[1], (0x1a, (16..32).collect()));
        assert_eq!(bus.writes[2], (0x1a, (32..40).collect()));
    }

    #[test]
    fn single_byte_ops() {
        let mut bridge = I2cBridge::new(FakeBus {
            read_value: 0x42,
            ..FakeBus::default()
        });
        bridge.write_byte(0x12, 0x55).unwrap();
        assert_eq!(bridge.read_byte(0x1a).unwrap(), 0x42);
        assert_eq!(bridge.release().writes, vec![(0x12, vec![0x55])]);
    }

    #[test]
    fn tail_uses_width_tagged_port() {
        let mut bridge = I2cBridge::new(FakeBus::default());
        bridge.write_tail(0x16, 3, 0b101).unwrap();
        bridge.write_tail(0x16, 0, 0xa5).unwrap();
        let bus = bridge.release();
        assert_eq!(bus.writes[0], (0x17, vec![3, 0b101]));
        assert_eq!(bus.writes[1], (0x16, vec![0xa5]));
    }

    #[test]
    fn tail_read_sends_width_first() {
        let mut bridge = I2cBridge::new(FakeBus {
            read_value: 0x1f,
            ..FakeBus::default()
        });
        assert_eq!(bridge.read_tail(0x16, 5).unwrap(), 0x1f);
        assert_eq!(bridge.read_tail(0x16, 0).unwrap(), 0x1f);
        let bus = bridge.release();
        // Width-tagged read addresses port + 1; the full-byte read is a
        // plain read with no command byte.
        assert_eq!(bus.writes, vec![(0x17, vec![5])]);
    }

    #[test]
    fn pin_enable_leaves_other_pins_alone() {
        let mut pins = I2cPins::new(FakeBus {
            read_value: 0xff,
            ..FakeBus::default()
        });
        pins.enable().unwrap();
        let bus = pins.release();
        assert_eq!(
            bus.writes,
            vec![
                (TRIS_PORT, vec![0xb0 | TDO_PIN]),
                (LATCH_PORT, vec![0xb0 | MCLR_PIN]),
                (PULLUP_PORT, vec![0xb0 | TDO_PIN]),
            ]
        );
    }

    #[test]
    fn pin_disable_tristates_the_lines() {
        let mut pins = I2cPins::new(FakeBus::default());
        pins.disable().unwrap();
        let bus = pins.release();
        assert_eq!(
            bus.writes,
            vec![
                (TRIS_PORT, vec![JTAG_PINS]),
                (LATCH_PORT, vec![0]),
                (PULLUP_PORT, vec![JTAG_PINS]),
            ]
        );
    }
}
