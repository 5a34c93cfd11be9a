//! Per-update context and state hashing.

use crate::location::LocationName;
use std::collections::BTreeSet;

/// Host game ticks.
pub type Ticks = u64;

/// What the host tells the engine about the current update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimContext {
    pub tick: Ticks,
    /// Locations to process. `None` processes every location with networks.
    pub active_locations: Option<BTreeSet<LocationName>>,
}

impl SimContext {
    /// Process every location.
    pub fn all(tick: Ticks) -> Self {
        Self {
            tick,
            active_locations: None,
        }
    }

    /// Process only the named locations.
    pub fn only<I, L>(tick: Ticks, locations: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<LocationName>,
    {
        Self {
            tick,
            active_locations: Some(locations.into_iter().map(Into::into).collect()),
        }
    }

    pub fn is_active(&self, location: &LocationName) -> bool {
        self.active_locations
            .as_ref()
            .is_none_or(|active| active.contains(location))
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of engine state for comparing runs.
///
/// Uses FNV-1a (64-bit). Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write(s.as_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
