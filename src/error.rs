//! The error type shared by every fallible operation in this crate.

use thiserror::Error;

use crate::statemachine::TapState;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// An operation was attempted in a TAP state that does not permit it,
    /// either `Unknown` where a real state is required or a non-Shift state
    /// for a shift operation.
    #[error("operation not valid in the current TAP state")]
    InvalidState,

    /// No TMS path exists between two real states.  The 16-state TAP graph
    /// is strongly connected, so this only fires if the transition table is
    /// corrupted.
    #[error("no TMS path from {0:?} to {1:?}")]
    Unreachable(TapState, TapState),

    /// A zero-length bit sequence was passed to the codec.
    #[error("bit sequence must contain at least one bit")]
    EmptyPayload,

    /// The register transport reported a bus failure.  The controller's
    /// tracked state is invalidated before this propagates.
    #[error("transport failure: {0}")]
    Transport(String),
}
