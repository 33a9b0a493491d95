//! The high-level TAP driver.  `TapController` tracks the state of the JTAG
//! state machine and gets to any requested state by the minimal TMS path,
//! framing every sequence through the wire codec and a `Transport`.

use core::ops::DerefMut;

use bitvec::prelude::*;
use log::{debug, trace};

use crate::bits::{decode, encode, BitFrame, BitString};
use crate::error::{Error, Result};
use crate::statemachine::{TapState, TmsSequencer};
use crate::transport::Transport;

/// Byte port for TMS sequences; its tail variant shares the address.
const TMS_PORT: u8 = 0x12;
/// Byte port for TDI/TDO data, staying in the Shift state.
const DATA_PORT: u8 = 0x1a;
/// Data port variant that raises TMS on the last clocked bit.
const DATA_EXIT_PORT: u8 = 0x16;

/// Transmission bit order applied at the shift boundary.  The codec itself
/// always treats index 0 as the first bit on the wire; this only controls
/// whether payloads are reversed on their way in and out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BitOrder {
    /// Bit 0 of the payload is clocked first.
    #[default]
    LsbFirst,
    /// The payload is reversed, so its highest bit is clocked first.
    MsbFirst,
}

pub struct TapController<T> {
    pub transport: T,
    state: TapState,
    sequencer: TmsSequencer,
    bit_order: BitOrder,
}

impl<T, U> TapController<T>
where
    T: DerefMut<Target = U>,
    U: Transport + ?Sized,
{
    /// Create a controller over an existing `Transport`.  The tracked state
    /// starts out `Unknown`; the first `advance` resynchronizes through the
    /// reset sequence.
    pub fn new(transport: T) -> Self {
        Self::with_sequencer(transport, TmsSequencer::new())
    }

    /// Create a controller sharing an existing sequencer, and with it the
    /// path cache, with other controllers on the same topology.
    pub fn with_sequencer(transport: T, sequencer: TmsSequencer) -> Self {
        Self {
            transport,
            state: TapState::Unknown,
            sequencer,
            bit_order: BitOrder::default(),
        }
    }

    pub fn set_bit_order(&mut self, order: BitOrder) {
        self.bit_order = order;
    }

    /// The TAP state the controller believes the hardware is in.
    pub fn state(&self) -> TapState {
        self.state
    }

    /// Forget the tracked state, e.g. after the transport was reattached.
    /// The next `advance` resynchronizes through the reset sequence.
    pub fn invalidate(&mut self) {
        self.state = TapState::Unknown;
    }

    /// Drive TMS to put the TAP into `target` by the minimal path.  From
    /// `Unknown` this prepends five TMS=1 clocks to force the hardware into
    /// Reset first.  A transport failure invalidates the tracked state.
    pub fn advance(&mut self, target: TapState) -> Result<()> {
        let (start, seq) = if self.state == TapState::Unknown {
            let mut seq = TmsSequencer::reset_sequence();
            seq.extend_from_bitslice(&self.sequencer.path_to(TapState::Reset, target)?);
            (TapState::Reset, seq)
        } else {
            (self.state, self.sequencer.path_to(self.state, target)?)
        };
        if seq.is_empty() {
            return Ok(());
        }
        debug!("{:?} -[{}]-> {:?}", self.state, tms_string(&seq), target);
        self.send_tms(&seq)?;
        self.replay(start, &seq)
    }

    /// Force the TAP into Reset.
    pub fn reset(&mut self) -> Result<()> {
        self.advance(TapState::Reset)
    }

    /// Park in Run-Test/Idle and clock `cycles` extra TCK cycles there.
    pub fn run_idle(&mut self, cycles: usize) -> Result<()> {
        self.advance(TapState::Idle)?;
        if cycles > 0 {
            self.send_tms(&BitString::repeat(false, cycles))?;
        }
        Ok(())
    }

    /// Clock `bits` out on TDI.  Only valid in ShiftDR or ShiftIR; when
    /// `exit` is set the final bit is clocked with TMS high, leaving the
    /// TAP in Exit1.
    pub fn shift_in(&mut self, bits: &BitSlice<u8, Lsb0>, exit: bool) -> Result<()> {
        if !self.state.is_shift() {
            return Err(Error::InvalidState);
        }
        let payload = self.apply_order(bits);
        let frame = encode(&payload)?;
        let last = if exit { DATA_EXIT_PORT } else { DATA_PORT };
        if let Err(err) = self.send_frame(DATA_PORT, last, &frame) {
            self.state = TapState::Unknown;
            return Err(err);
        }
        if exit {
            self.state = self.state.apply(true)?;
        }
        Ok(())
    }

    /// Clock `count` bits in from TDO, with the same exit handling as
    /// [`shift_in`](TapController::shift_in).
    pub fn shift_out(&mut self, count: usize, exit: bool) -> Result<BitString> {
        if !self.state.is_shift() {
            return Err(Error::InvalidState);
        }
        if count == 0 {
            return Err(Error::EmptyPayload);
        }
        let last = if exit { DATA_EXIT_PORT } else { DATA_PORT };
        let frame = match self.recv_frame(DATA_PORT, last, count) {
            Ok(frame) => frame,
            Err(err) => {
                self.state = TapState::Unknown;
                return Err(err);
            }
        };
        if exit {
            self.state = self.state.apply(true)?;
        }
        Ok(self.apply_order(&decode(&frame)))
    }

    /// Shift `ir` into the instruction register and return to Idle.
    pub fn select_instruction(&mut self, ir: &BitSlice<u8, Lsb0>) -> Result<()> {
        self.advance(TapState::ShiftIR)?;
        self.shift_in(ir, true)?;
        self.advance(TapState::Idle)
    }

    /// Shift `data` into the data register and return to Idle.
    pub fn write_data(&mut self, data: &BitSlice<u8, Lsb0>) -> Result<()> {
        self.advance(TapState::ShiftDR)?;
        self.shift_in(data, true)?;
        self.advance(TapState::Idle)
    }

    /// Capture `count` bits from the data register and return to Idle.
    pub fn read_data(&mut self, count: usize) -> Result<BitString> {
        self.advance(TapState::ShiftDR)?;
        let out = self.shift_out(count, true)?;
        self.advance(TapState::Idle)?;
        Ok(out)
    }

    /// One data register scan writing `data`, then a second scan capturing
    /// `count` bits, returning to Idle.
    pub fn write_then_read(
        &mut self,
        data: &BitSlice<u8, Lsb0>,
        count: usize,
    ) -> Result<BitString> {
        self.advance(TapState::ShiftDR)?;
        self.shift_in(data, true)?;
        self.advance(TapState::ShiftDR)?;
        let out = self.shift_out(count, true)?;
        self.advance(TapState::Idle)?;
        Ok(out)
    }

    fn apply_order(&self, bits: &BitSlice<u8, Lsb0>) -> BitString {
        let mut out = BitString::from_bitslice(bits);
        if self.bit_order == BitOrder::MsbFirst {
            out.reverse();
        }
        out
    }

    /// Update the tracked state by replaying `seq` through the automaton.
    fn replay(&mut self, from: TapState, seq: &BitSlice<u8, Lsb0>) -> Result<()> {
        let mut state = from;
        for tms in seq.iter().by_vals() {
            state = state.apply(tms)?;
        }
        self.state = state;
        Ok(())
    }

    fn send_tms(&mut self, seq: &BitSlice<u8, Lsb0>) -> Result<()> {
        let frame = encode(seq)?;
        if let Err(err) = self.send_frame(TMS_PORT, TMS_PORT, &frame) {
            self.state = TapState::Unknown;
            return Err(err);
        }
        Ok(())
    }

    fn send_frame(&mut self, normal: u8, last: u8, frame: &BitFrame) -> Result<()> {
        trace!(
            "frame out: {} bits via {normal:#04x}/{last:#04x}",
            frame.total_bits()
        );
        if !frame.bytes.is_empty() {
            self.transport.write_block(normal, &frame.bytes)?;
        }
        self.transport.write_tail(last, frame.tail_width, frame.tail)
    }

    fn recv_frame(&mut self, normal: u8, last: u8, count: usize) -> Result<BitFrame> {
        trace!("frame in: {count} bits via {normal:#04x}/{last:#04x}");
        let tail_width = (count % 8) as u8;
        let full = if tail_width == 0 {
            count / 8 - 1
        } else {
            count / 8
        };
        let mut bytes = Vec::with_capacity(full);
        for _ in 0..full {
            bytes.push(self.transport.read_byte(normal)?);
        }
        let tail = self.transport.read_tail(last, tail_width)?;
        Ok(BitFrame {
            bytes,
            tail_width,
            tail,
        })
    }
}

fn tms_string(seq: &BitSlice<u8, Lsb0>) -> String {
    seq.iter()
        .by_vals()
        .map(|b| if b { '1' } else { '0' })
        .collect()
}
