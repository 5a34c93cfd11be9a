use crate::event::TopologyEvent;
use crate::location::LocationName;
use std::collections::BTreeSet;

/// Tracks which locations need their networks rebuilt or dropped.
///
/// Fed from queued [`TopologyEvent`]s at the start of an update and drained
/// by the network cache right after.
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    stale: BTreeSet<LocationName>,
    unloaded: BTreeSet<LocationName>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a location's networks as needing a rebuild.
    pub fn mark_stale(&mut self, location: LocationName) {
        self.unloaded.remove(&location);
        self.stale.insert(location);
    }

    /// Mark a location's networks for removal without rebuild.
    pub fn mark_unloaded(&mut self, location: LocationName) {
        self.stale.remove(&location);
        self.unloaded.insert(location);
    }

    pub fn record(&mut self, event: &TopologyEvent) {
        match event {
            TopologyEvent::LocationUnloaded { location } => self.mark_unloaded(location.clone()),
            other => self.mark_stale(other.location().clone()),
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.stale.is_empty() || !self.unloaded.is_empty()
    }

    pub fn is_stale(&self, location: &LocationName) -> bool {
        self.stale.contains(location)
    }

    pub fn stale(&self) -> &BTreeSet<LocationName> {
        &self.stale
    }

    pub fn unloaded(&self) -> &BTreeSet<LocationName> {
        &self.unloaded
    }

    /// Take both sets, leaving the tracker clean.
    pub fn take(&mut self) -> (BTreeSet<LocationName>, BTreeSet<LocationName>) {
        (
            std::mem::take(&mut self.stale),
            std::mem::take(&mut self.unloaded),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::TileArea;

    fn added(location: &str) -> TopologyEvent {
        TopologyEvent::EntityAdded {
            location: location.into(),
            area: TileArea::new(0, 0, 1, 1),
        }
    }

    #[test]
    fn new_tracker_is_clean() {
        assert!(!DirtyTracker::new().is_dirty());
    }

    #[test]
    fn entity_events_mark_location_stale() {
        let mut tracker = DirtyTracker::new();
        tracker.record(&added("Farm"));
        tracker.record(&added("Farm"));
        tracker.record(&added("Shed"));

        assert!(tracker.is_stale(&"Farm".into()));
        assert_eq!(tracker.stale().len(), 2);
    }

    #[test]
    fn latest_event_wins_between_stale_and_unloaded() {
        let mut tracker = DirtyTracker::new();
        tracker.record(&added("Farm"));
        tracker.record(&TopologyEvent::LocationUnloaded {
            location: "Farm".into(),
        });
        assert!(!tracker.is_stale(&"Farm".into()));
        assert!(tracker.unloaded().contains(&"Farm".into()));

        tracker.record(&added("Farm"));
        assert!(tracker.is_stale(&"Farm".into()));
        assert!(tracker.unloaded().is_empty());
    }

    #[test]
    fn take_leaves_tracker_clean() {
        let mut tracker = DirtyTracker::new();
        tracker.record(&added("Farm"));
        let (stale, unloaded) = tracker.take();
        assert_eq!(stale.len(), 1);
        assert!(unloaded.is_empty());
        assert!(!tracker.is_dirty());
    }
}
