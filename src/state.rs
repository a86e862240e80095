// MIT License - Copyright (c) 2026 Peter Wright
// Panel state and partition state resolution

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::constants::AlarmState;

/// Last known state of the panel as seen by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelStatus {
    /// Whether the TCP connection is up
    pub connected: bool,
    /// Zones currently in each state tag
    pub partition_states: HashMap<AlarmState, BTreeSet<u32>>,
    /// Violated inputs
    pub violated_zones: BTreeSet<u32>,
    /// Active outputs
    pub violated_outputs: BTreeSet<u32>,
}

impl PanelStatus {
    /// Violated/active flag for each of `numbers`, as reported to listeners.
    pub fn flags_for(active: &BTreeSet<u32>, numbers: &[u32]) -> BTreeMap<u32, bool> {
        numbers.iter().map(|n| (*n, active.contains(n))).collect()
    }
}

/// State of an alarm control entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionState {
    Triggered,
    Pending,
    ArmedHome,
    ArmedAway,
    Disarmed,
}

impl PartitionState {
    /// State string understood by Home Assistant's alarm control panel.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Triggered => "triggered",
            Self::Pending => "pending",
            Self::ArmedHome => "armed_home",
            Self::ArmedAway => "armed_away",
            Self::Disarmed => "disarmed",
        }
    }
}

impl fmt::Display for PartitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tags checked by [`resolve_partition_state`], highest priority first.
const STATE_PRIORITY: [(PartitionState, &[AlarmState]); 4] = [
    (
        PartitionState::Triggered,
        &[AlarmState::Triggered, AlarmState::TriggeredFire],
    ),
    (
        PartitionState::Pending,
        &[
            AlarmState::EntryTime,
            AlarmState::ExitCountdownOver10,
            AlarmState::ExitCountdownUnder10,
        ],
    ),
    (
        PartitionState::ArmedHome,
        &[
            AlarmState::ArmedMode1,
            AlarmState::ArmedMode2,
            AlarmState::ArmedMode3,
        ],
    ),
    (PartitionState::ArmedAway, &[AlarmState::ArmedMode0]),
];

/// Derive the state of a partition made of `zones` from the panel's
/// per-tag zone sets.
///
/// The first state in priority order (triggered, pending, armed home,
/// armed away) with a tag containing any of the zones wins; otherwise the
/// partition is disarmed.
pub fn resolve_partition_state(
    partition_states: &HashMap<AlarmState, BTreeSet<u32>>,
    zones: &[u32],
) -> PartitionState {
    let in_tag = |tag: &AlarmState| {
        partition_states
            .get(tag)
            .is_some_and(|set| zones.iter().any(|z| set.contains(z)))
    };
    STATE_PRIORITY
        .iter()
        .find(|(_, tags)| tags.iter().any(&in_tag))
        .map_or(PartitionState::Disarmed, |(state, _)| *state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(entries: &[(AlarmState, &[u32])]) -> HashMap<AlarmState, BTreeSet<u32>> {
        entries
            .iter()
            .map(|(tag, zones)| (*tag, zones.iter().copied().collect()))
            .collect()
    }

    #[test]
    fn test_empty_states_is_disarmed() {
        assert_eq!(
            resolve_partition_state(&HashMap::new(), &[1, 2]),
            PartitionState::Disarmed
        );
    }

    #[test]
    fn test_armed_away() {
        let s = states(&[(AlarmState::ArmedMode0, &[2])]);
        assert_eq!(resolve_partition_state(&s, &[1, 2]), PartitionState::ArmedAway);
    }

    #[test]
    fn test_armed_home_modes() {
        for tag in [AlarmState::ArmedMode1, AlarmState::ArmedMode2, AlarmState::ArmedMode3] {
            let s = states(&[(tag, &[1])]);
            assert_eq!(resolve_partition_state(&s, &[1]), PartitionState::ArmedHome);
        }
    }

    #[test]
    fn test_pending_beats_armed() {
        let s = states(&[
            (AlarmState::ArmedMode0, &[1]),
            (AlarmState::ExitCountdownUnder10, &[1]),
        ]);
        assert_eq!(resolve_partition_state(&s, &[1]), PartitionState::Pending);
    }

    #[test]
    fn test_triggered_beats_everything() {
        let s = states(&[
            (AlarmState::ArmedMode0, &[1]),
            (AlarmState::ArmedMode1, &[1]),
            (AlarmState::EntryTime, &[1]),
            (AlarmState::TriggeredFire, &[1]),
        ]);
        assert_eq!(resolve_partition_state(&s, &[1]), PartitionState::Triggered);
    }

    #[test]
    fn test_armed_home_beats_armed_away() {
        let s = states(&[(AlarmState::ArmedMode0, &[1]), (AlarmState::ArmedMode2, &[2])]);
        assert_eq!(resolve_partition_state(&s, &[1, 2]), PartitionState::ArmedHome);
    }

    #[test]
    fn test_other_zones_are_ignored() {
        let s = states(&[(AlarmState::Triggered, &[3]), (AlarmState::ArmedMode0, &[1])]);
        assert_eq!(resolve_partition_state(&s, &[1]), PartitionState::ArmedAway);
        assert_eq!(resolve_partition_state(&s, &[4]), PartitionState::Disarmed);
    }

    #[test]
    fn test_suppressed_arming_is_not_reported() {
        let s = states(&[(AlarmState::ArmedSuppressed, &[1])]);
        assert_eq!(resolve_partition_state(&s, &[1]), PartitionState::Disarmed);
    }

    #[test]
    fn test_flags_for() {
        let active: BTreeSet<u32> = [1, 5].into_iter().collect();
        let flags = PanelStatus::flags_for(&active, &[1, 2, 5]);
        assert_eq!(flags.get(&1), Some(&true));
        assert_eq!(flags.get(&2), Some(&false));
        assert_eq!(flags.get(&5), Some(&true));
        assert_eq!(flags.len(), 3);
    }
}
