//! Send-path fault injection — deliberate corruption and loss for
//! exercising the recovery path.
//!
//! Two modes: deterministic one-shot faults keyed by sequence number
//! (tests), and percentage-based random faults (demo runs against a live
//! server). Faults apply only to the initial send pass, never to
//! retransmissions, so recovery always converges.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use rand::Rng;

/// What to do with one outgoing chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultAction {
    Deliver,
    /// Send the frame with flipped payload bytes but the original digest,
    /// so the receiver detects the mismatch.
    Corrupt,
    /// Do not send the frame at all.
    Drop,
}

/// A plan of faults to inject on the send path.
#[derive(Debug, Default)]
pub struct FaultPlan {
    one_shot: HashMap<u32, FaultAction>,
    corrupt_percent: u8,
    drop_percent: u8,
}

impl FaultPlan {
    /// No faults. The normal operating mode.
    pub fn none() -> Self {
        Self::default()
    }

    /// Random faults at the given percentages (0-100 each).
    pub fn random(corrupt_percent: u8, drop_percent: u8) -> Self {
        Self {
            one_shot: HashMap::new(),
            corrupt_percent,
            drop_percent,
        }
    }

    /// Corrupt the named sequence number exactly once.
    pub fn with_corrupt_once(mut self, seq_num: u32) -> Self {
        self.one_shot.insert(seq_num, FaultAction::Corrupt);
        self
    }

    /// Drop the named sequence number exactly once.
    pub fn with_drop_once(mut self, seq_num: u32) -> Self {
        self.one_shot.insert(seq_num, FaultAction::Drop);
        self
    }

    pub fn is_active(&self) -> bool {
        !self.one_shot.is_empty() || self.corrupt_percent > 0 || self.drop_percent > 0
    }

    /// Decide the fate of one outgoing chunk. One-shot entries fire once.
    pub fn decide(&mut self, seq_num: u32) -> FaultAction {
        if let Some(action) = self.one_shot.remove(&seq_num) {
            return action;
        }
        if self.corrupt_percent == 0 && self.drop_percent == 0 {
            return FaultAction::Deliver;
        }
        let roll: u8 = rand::thread_rng().gen_range(0..100);
        if roll < self.corrupt_percent {
            FaultAction::Corrupt
        } else if roll < self.corrupt_percent.saturating_add(self.drop_percent) {
            FaultAction::Drop
        } else {
            FaultAction::Deliver
        }
    }

    /// Flip the leading bytes of a payload (up to ten of them).
    pub fn corrupt(payload: &Bytes) -> Bytes {
        let mut out = BytesMut::from(payload.as_ref());
        for byte in out.iter_mut().take(10) {
            *byte ^= 0xFF;
        }
        out.freeze()
    }
}
