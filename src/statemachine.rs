//! The JTAG TAP state machine and TMS sequence synthesis.  [`TapState`]
//! carries the standard 16-state automaton as its transition function, and
//! [`TmsSequencer`] computes the shortest TMS bit sequence between any two
//! states, memoizing every path it discovers so repeated transitions cost a
//! single map lookup.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use bitvec::prelude::*;
use log::trace;

use crate::bits::BitString;
use crate::error::{Error, Result};

/// The 16 IEEE 1149.1 TAP states, plus `Unknown` for a controller that has
/// not yet synchronized with the hardware.  `Unknown` has no successors and
/// is never re-entered once left, except by explicit invalidation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TapState {
    Reset = 0,
    Idle = 1,
    SelectDR = 2,
    CaptureDR = 3,
    ShiftDR = 4,
    Exit1DR = 5,
    PauseDR = 6,
    Exit2DR = 7,
    UpdateDR = 8,
    SelectIR = 9,
    CaptureIR = 10,
    ShiftIR = 11,
    Exit1IR = 12,
    PauseIR = 13,
    Exit2IR = 14,
    UpdateIR = 15,
    Unknown = 16,
}

impl TapState {
    /// Apply one TMS bit and return the successor state.  Fails with
    /// [`Error::InvalidState`] for `Unknown`, which has no outgoing edges.
    pub fn apply(self, tms: bool) -> Result<Self> {
        use TapState::*;
        let (low, high) = match self {
            Reset => (Idle, Reset),
            Idle => (Idle, SelectDR),
            SelectDR => (CaptureDR, SelectIR),
            CaptureDR => (ShiftDR, Exit1DR),
            ShiftDR => (ShiftDR, Exit1DR),
            Exit1DR => (PauseDR, UpdateDR),
            PauseDR => (PauseDR, Exit2DR),
            Exit2DR => (ShiftDR, UpdateDR),
            UpdateDR => (Idle, SelectDR),
            SelectIR => (CaptureIR, Reset),
            CaptureIR => (ShiftIR, Exit1IR),
            ShiftIR => (ShiftIR, Exit1IR),
            Exit1IR => (PauseIR, UpdateIR),
            PauseIR => (PauseIR, Exit2IR),
            Exit2IR => (ShiftIR, UpdateIR),
            UpdateIR => (Idle, SelectIR),
            Unknown => return Err(Error::InvalidState),
        };
        Ok(if tms { high } else { low })
    }

    /// True in the two states that clock data through a scan register.
    pub fn is_shift(self) -> bool {
        matches!(self, TapState::ShiftDR | TapState::ShiftIR)
    }

    pub(crate) const REAL: [TapState; 16] = [
        TapState::Reset,
        TapState::Idle,
        TapState::SelectDR,
        TapState::CaptureDR,
        TapState::ShiftDR,
        TapState::Exit1DR,
        TapState::PauseDR,
        TapState::Exit2DR,
        TapState::UpdateDR,
        TapState::SelectIR,
        TapState::CaptureIR,
        TapState::ShiftIR,
        TapState::Exit1IR,
        TapState::PauseIR,
        TapState::Exit2IR,
        TapState::UpdateIR,
    ];
}

/// Memoized minimal TMS paths between pairs of real states.  An entry is
/// only replaced by a strictly shorter path, so once a minimal path is
/// stored it is final.
#[derive(Debug, Default)]
pub struct PathCache {
    paths: HashMap<(TapState, TapState), BitString>,
}

impl PathCache {
    pub fn get(&self, from: TapState, to: TapState) -> Option<&BitString> {
        self.paths.get(&(from, to))
    }

    pub fn insert_if_shorter(&mut self, from: TapState, to: TapState, path: BitString) {
        match self.paths.entry((from, to)) {
            Entry::Occupied(mut e) => {
                if path.len() < e.get().len() {
                    e.insert(path);
                }
            }
            Entry::Vacant(e) => {
                e.insert(path);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Computes minimal TMS sequences over the TAP graph.  The cache is behind
/// an `Arc`, so cloning a sequencer (or building one with
/// [`TmsSequencer::with_cache`]) shares the memo between all controllers on
/// the same topology.
#[derive(Clone, Debug, Default)]
pub struct TmsSequencer {
    cache: Arc<Mutex<PathCache>>,
}

impl TmsSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(cache: Arc<Mutex<PathCache>>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> Arc<Mutex<PathCache>> {
        Arc::clone(&self.cache)
    }

    /// Five TMS=1 clocks force any TAP into Reset, whatever state the
    /// hardware was actually in.
    pub fn reset_sequence() -> BitString {
        bitvec![u8, Lsb0; 1; 5]
    }

    /// The shortest TMS sequence from `from` to `to`; among equal-length
    /// candidates, the one that clocks TMS low earliest.  `from == to`
    /// yields the empty sequence.
    pub fn path_to(&self, from: TapState, to: TapState) -> Result<BitString> {
        if from == TapState::Unknown || to == TapState::Unknown {
            return Err(Error::InvalidState);
        }

        let mut cache = self.cache.lock().unwrap();
        if let Some(path) = cache.get(from, to) {
            return Ok(path.clone());
        }

        // Breadth-first search, 0-edge before 1-edge, so the first path
        // found to each state is both shortest and lexicographically
        // smallest.  One search reaches every state, so memoize all of them.
        let mut seen: HashMap<TapState, BitString> = HashMap::new();
        let mut queue = VecDeque::new();
        seen.insert(from, BitString::new());
        queue.push_back(from);
        while let Some(state) = queue.pop_front() {
            let path = seen[&state].clone();
            for tms in [false, true] {
                let next = state.apply(tms)?;
                if let Entry::Vacant(e) = seen.entry(next) {
                    let mut p = path.clone();
                    p.push(tms);
                    e.insert(p);
                    queue.push_back(next);
                }
            }
        }
        trace!("memoized {} TMS paths from {:?}", seen.len(), from);

        for (reached, path) in &seen {
            cache.insert_if_shorter(from, *reached, path.clone());
        }
        cache
            .get(from, to)
            .cloned()
            .ok_or(Error::Unreachable(from, to))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn from_str(s: &str) -> BitString {
        s.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn transition_function_is_total() {
        for &state in TapState::REAL.iter() {
            for tms in [false, true] {
                let next = state.apply(tms).unwrap();
                assert_ne!(next, TapState::Unknown);
            }
        }
    }

    #[test]
    fn unknown_has_no_successors() {
        assert!(matches!(
            TapState::Unknown.apply(false),
            Err(Error::InvalidState)
        ));
        assert!(matches!(
            TapState::Unknown.apply(true),
            Err(Error::InvalidState)
        ));
    }

    #[test]
    fn literal_paths() {
        let seq = TmsSequencer::new();
        assert_eq!(
            seq.path_to(TapState::Idle, TapState::ShiftIR).unwrap(),
            from_str("1100")
        );
        assert_eq!(
            seq.path_to(TapState::Reset, TapState::Idle).unwrap(),
            from_str("0")
        );
        assert!(seq
            .path_to(TapState::ShiftDR, TapState::ShiftDR)
            .unwrap()
            .is_empty());
    }

    // Frontier expansion computing distances only, independent of the
    // sequencer's search.
    fn distance(from: TapState, to: TapState) -> usize {
        if from == to {
            return 0;
        }
        let mut dist = HashMap::new();
        dist.insert(from, 0);
        let mut frontier = vec![from];
        let mut steps = 0;
        while !frontier.is_empty() {
            steps += 1;
            let mut next_frontier = Vec::new();
            for state in frontier {
                for tms in [false, true] {
                    let next = state.apply(tms).unwrap();
                    if let Entry::Vacant(e) = dist.entry(next) {
                        e.insert(steps);
                        next_frontier.push(next);
                    }
                }
            }
            frontier = next_frontier;
        }
        dist[&to]
    }

    #[test]
    fn paths_are_minimal_and_land_on_target() {
        let seq = TmsSequencer::new();
        for &from in TapState::REAL.iter() {
            for &to in TapState::REAL.iter() {
                let path = seq.path_to(from, to).unwrap();
                assert_eq!(
                    path.len(),
                    distance(from, to),
                    "path {from:?} -> {to:?} is not minimal"
                );
                let mut state = from;
                for tms in path.iter().by_vals() {
                    state = state.apply(tms).unwrap();
                }
                assert_eq!(state, to);
            }
        }
    }

    #[test]
    fn memoization_is_idempotent() {
        let seq = TmsSequencer::new();
        let first = seq.path_to(TapState::Idle, TapState::ShiftIR).unwrap();
        let populated = seq.cache().lock().unwrap().len();
        // One search memoizes the path to every state from that source.
        assert_eq!(populated, 16);
        let second = seq.path_to(TapState::Idle, TapState::ShiftIR).unwrap();
        assert_eq!(first, second);
        assert_eq!(seq.cache().lock().unwrap().len(), populated);
    }

    #[test]
    fn cache_is_shared_between_clones() {
        let seq = TmsSequencer::new();
        seq.path_to(TapState::Reset, TapState::ShiftDR).unwrap();
        let clone = seq.clone();
        assert!(!clone.cache().lock().unwrap().is_empty());
    }

    #[test]
    fn cache_keeps_shorter_entry() {
        let mut cache = PathCache::default();
        cache.insert_if_shorter(TapState::Idle, TapState::SelectDR, from_str("1"));
        cache.insert_if_shorter(TapState::Idle, TapState::SelectDR, from_str("111"));
        assert_eq!(
            cache.get(TapState::Idle, TapState::SelectDR).unwrap(),
            &from_str("1")
        );
    }

    #[test]
    fn unknown_endpoints_are_rejected() {
        let seq = TmsSequencer::new();
        assert!(matches!(
            seq.path_to(TapState::Unknown, TapState::Idle),
            Err(Error::InvalidState)
        ));
        assert!(matches!(
            seq.path_to(TapState::Idle, TapState::Unknown),
            Err(Error::InvalidState)
        ));
    }

    #[test]
    fn reset_sequence_reaches_reset_from_anywhere() {
        let seq = TmsSequencer::reset_sequence();
        assert_eq!(seq, from_str("11111"));
        for &state in TapState::REAL.iter() {
            let mut s = state;
            for tms in seq.iter().by_vals() {
                s = s.apply(tms).unwrap();
            }
            assert_eq!(s, TapState::Reset);
        }
    }
}
