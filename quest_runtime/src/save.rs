use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// The state an external save subsystem persists for this core: the
/// occurrence ledger's key-to-count map and the names of clickables
/// currently disabled by script, both verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSnapshot {
    pub occurrences: BTreeMap<String, u32>,
    pub disabled_clickables: BTreeSet<String>,
}

impl SaveSnapshot {
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }
}

#[cfg(test)]
mod tests {
    use super::SaveSnapshot;

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut snapshot = SaveSnapshot::default();
        snapshot.occurrences.insert("door_opened".to_string(), 3);
        snapshot
            .disabled_clickables
            .insert("hotspot.door".to_string());

        let json = snapshot.to_json_string().expect("serialize snapshot");
        let restored = SaveSnapshot::from_json_str(&json).expect("parse snapshot");
        assert_eq!(restored, snapshot);
    }
}
