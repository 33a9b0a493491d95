//! This crate drives a JTAG Test Access Port through a byte-oriented
//! register bridge, such as an I2C GPIO expander with shift registers on the
//! JTAG lines.  At the lowest level, the `Transport` trait covers the
//! bridge's register protocol: full bytes, block writes, and a width-tagged
//! tail for the final partial byte of a sequence.  `I2cBridge` implements it
//! over any `embedded-hal` I2C bus, and `I2cPins` switches the JTAG lines on
//! and off around a session.
//!
//! The next level is the `bits` codec, which packs arbitrary-length bit
//! sequences into that wire format and back, and the `statemachine` module,
//! which knows the 16-state TAP automaton and synthesizes the shortest TMS
//! sequence between any two states, memoizing everything it computes.
//!
//! On top sits the `TapController`.  You tell it which state you want and it
//! gets there with the fewest TMS clocks, tracking the state as it goes; if
//! the controller has never talked to the hardware (or a transport error
//! left the true state uncertain) it resynchronizes with the five-ones reset
//! sequence first.  Shift operations and a few composite register scans are
//! built on the same plumbing.
//!
//! # Example
//! ```
//! use jtag_bridge::controller::TapController;
//! use jtag_bridge::statemachine::TapState;
//! use bitvec::prelude::*;
//! # use jtag_bridge::transport::Transport;
//! # use jtag_bridge::Result;
//! # struct NullBridge;
//! # impl Transport for NullBridge {
//! #     fn write_byte(&mut self, _: u8, _: u8) -> Result<()> { Ok(()) }
//! #     fn read_byte(&mut self, _: u8) -> Result<u8> { Ok(0) }
//! #     fn write_block(&mut self, _: u8, _: &[u8]) -> Result<()> { Ok(()) }
//! #     fn write_tail(&mut self, _: u8, _: u8, _: u8) -> Result<()> { Ok(()) }
//! #     fn read_tail(&mut self, _: u8, _: u8) -> Result<u8> { Ok(0) }
//! # }
//! # fn main() -> Result<()> {
//! let mut tap = TapController::new(Box::new(NullBridge));
//! tap.advance(TapState::Idle)?;
//! assert_eq!(tap.state(), TapState::Idle);
//!
//! // Load an instruction, then read 32 bits of its data register.
//! let ir = bitvec![u8, Lsb0; 0, 1, 1, 0];
//! tap.select_instruction(&ir)?;
//! let id = tap.read_data(32)?;
//! assert_eq!(id.len(), 32);
//! # Ok(())
//! # }
//! ```

pub mod bits;
pub mod controller;
pub mod error;
pub mod statemachine;
pub mod transport;

pub use error::{Error, Result};
