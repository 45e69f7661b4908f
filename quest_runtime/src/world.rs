use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Owner id of the game-global script in the callback registry.
pub const GLOBAL_SCRIPT: &str = "global";

/// Frames a walk takes when the host does not supply its own pathing cost.
pub(crate) const DEFAULT_WALK_TICKS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickableKind {
    Hotspot,
    Prop,
    Character,
    Inventory,
}

impl ClickableKind {
    /// Capitalised form used inside type-qualified handler names.
    pub fn type_label(self) -> &'static str {
        match self {
            ClickableKind::Hotspot => "Hotspot",
            ClickableKind::Prop => "Prop",
            ClickableKind::Character => "Character",
            ClickableKind::Inventory => "Inventory",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            ClickableKind::Hotspot => "hotspot",
            ClickableKind::Prop => "prop",
            ClickableKind::Character => "character",
            ClickableKind::Inventory => "inventory",
        }
    }
}

/// Identity of anything the player can click: hotspots, props, characters,
/// and carried inventory items.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClickableId {
    pub kind: ClickableKind,
    pub name: String,
}

impl ClickableId {
    pub fn new(kind: ClickableKind, name: impl Into<String>) -> Self {
        ClickableId {
            kind,
            name: name.into(),
        }
    }

    pub fn hotspot(name: impl Into<String>) -> Self {
        Self::new(ClickableKind::Hotspot, name)
    }

    pub fn prop(name: impl Into<String>) -> Self {
        Self::new(ClickableKind::Prop, name)
    }

    pub fn character(name: impl Into<String>) -> Self {
        Self::new(ClickableKind::Character, name)
    }

    pub fn inventory(name: impl Into<String>) -> Self {
        Self::new(ClickableKind::Inventory, name)
    }

    /// Registry owner id of the clickable's own script ("hotspot.door").
    pub fn script_owner(&self) -> String {
        format!("{}.{}", self.kind.slug(), self.name)
    }

    /// Suffix appended to a verb stem for type-qualified handler names, e.g.
    /// "HotspotFrontDoor" for the hotspot named "front_door".
    pub fn handler_suffix(&self) -> String {
        format!("{}{}", self.kind.type_label(), pascal_case(&self.name))
    }
}

impl fmt::Display for ClickableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind.slug(), self.name)
    }
}

/// Player-intent category driving handler dispatch. `Inventory` is a click
/// made while a carried item is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    Use,
    Look,
    Inventory,
}

impl Verb {
    pub fn handler_stem(self) -> &'static str {
        match self {
            Verb::Use => "OnInteract",
            Verb::Look => "OnLookAt",
            Verb::Inventory => "OnUseInv",
        }
    }

    pub fn unhandled_name(self) -> &'static str {
        match self {
            Verb::Use => "UnhandledInteract",
            Verb::Look => "UnhandledLookAt",
            Verb::Inventory => "UnhandledUseInv",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Verb::Use => "use",
            Verb::Look => "look",
            Verb::Inventory => "use_inv",
        }
    }
}

/// Registry owner id of a room's script ("room.office").
pub fn room_script(room: &str) -> String {
    format!("room.{room}")
}

/// Converts an underscore/dash/space separated name into the PascalCase form
/// handler names use ("front_door" -> "FrontDoor").
pub(crate) fn pascal_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for ch in name.chars() {
        if matches!(ch, '_' | '-' | ' ' | '.') {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct ClickableRecord {
    pub id: ClickableId,
    pub room: Option<String>,
    pub enabled: bool,
    use_count: u32,
    look_count: u32,
}

impl ClickableRecord {
    pub fn new(id: ClickableId, room: Option<String>) -> Self {
        ClickableRecord {
            id,
            room,
            enabled: true,
            use_count: 0,
            look_count: 0,
        }
    }

    /// Called when dispatch of `verb` on this clickable starts.
    pub fn on_interaction(&mut self, verb: Verb) {
        match verb {
            Verb::Use | Verb::Inventory => self.use_count = self.use_count.saturating_add(1),
            Verb::Look => self.look_count = self.look_count.saturating_add(1),
        }
    }

    /// Called when a started dispatch is rolled back or canceled.
    pub fn on_cancel_interaction(&mut self, verb: Verb) {
        match verb {
            Verb::Use | Verb::Inventory => self.use_count = self.use_count.saturating_sub(1),
            Verb::Look => self.look_count = self.look_count.saturating_sub(1),
        }
    }

    pub fn use_count(&self) -> u32 {
        self.use_count
    }

    pub fn look_count(&self) -> u32 {
        self.look_count
    }

    pub fn first_use(&self) -> bool {
        self.use_count <= 1
    }

    pub fn first_look(&self) -> bool {
        self.look_count <= 1
    }
}

#[derive(Debug, Clone)]
pub struct WalkRecord {
    pub destination: String,
    pub remaining: u32,
}

#[derive(Debug, Clone)]
pub struct ActorRecord {
    pub name: String,
    pub room: Option<String>,
    pub regions: BTreeSet<String>,
    pub walk: Option<WalkRecord>,
}

impl ActorRecord {
    pub fn new(name: impl Into<String>, room: Option<String>) -> Self {
        ActorRecord {
            name: name.into(),
            room,
            regions: BTreeSet::new(),
            walk: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegionRecord {
    pub name: String,
    pub room: String,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct RoomRecord {
    pub name: String,
}

/// The minimum world model the scheduler needs: rooms, clickables with
/// interaction counters, actors with host-supplied region membership, and
/// the carried-item selection. Geometry stays with the host engine.
#[derive(Debug, Default)]
pub struct World {
    rooms: BTreeMap<String, RoomRecord>,
    clickables: BTreeMap<ClickableId, ClickableRecord>,
    actors: BTreeMap<String, ActorRecord>,
    regions: BTreeMap<String, RegionRecord>,
    current_room: Option<String>,
    selected_item: Option<ClickableId>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_room(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.rooms.insert(name.clone(), RoomRecord { name });
    }

    pub fn set_current_room(&mut self, name: &str) -> bool {
        if self.rooms.contains_key(name) {
            self.current_room = Some(name.to_string());
            true
        } else {
            false
        }
    }

    pub fn current_room(&self) -> Option<&str> {
        self.current_room.as_deref()
    }

    pub fn add_clickable(&mut self, id: ClickableId, room: Option<String>) {
        self.clickables
            .insert(id.clone(), ClickableRecord::new(id, room));
    }

    pub fn clickable(&self, id: &ClickableId) -> Option<&ClickableRecord> {
        self.clickables.get(id)
    }

    pub fn clickable_mut(&mut self, id: &ClickableId) -> Option<&mut ClickableRecord> {
        self.clickables.get_mut(id)
    }

    pub fn add_actor(&mut self, name: impl Into<String>, room: Option<String>) {
        let name = name.into();
        self.actors.insert(name.clone(), ActorRecord::new(name, room));
    }

    pub fn actor(&self, name: &str) -> Option<&ActorRecord> {
        self.actors.get(name)
    }

    pub fn actor_mut(&mut self, name: &str) -> Option<&mut ActorRecord> {
        self.actors.get_mut(name)
    }

    pub fn actor_names(&self) -> Vec<String> {
        self.actors.keys().cloned().collect()
    }

    pub fn add_region(&mut self, name: impl Into<String>, room: impl Into<String>) {
        let name = name.into();
        self.regions.insert(
            name.clone(),
            RegionRecord {
                name,
                room: room.into(),
                enabled: true,
            },
        );
    }

    pub fn region(&self, name: &str) -> Option<&RegionRecord> {
        self.regions.get(name)
    }

    pub fn region_mut(&mut self, name: &str) -> Option<&mut RegionRecord> {
        self.regions.get_mut(name)
    }

    /// Replaces an actor's region membership; the host pushes these in as its
    /// physics layer sees actors cross trigger volumes.
    pub fn place_actor(&mut self, actor: &str, regions: BTreeSet<String>) -> bool {
        match self.actors.get_mut(actor) {
            Some(record) => {
                record.regions = regions;
                true
            }
            None => false,
        }
    }

    pub fn select_item(&mut self, item: ClickableId) {
        self.selected_item = Some(item);
    }

    pub fn clear_selected_item(&mut self) {
        self.selected_item = None;
    }

    pub fn selected_item(&self) -> Option<&ClickableId> {
        self.selected_item.as_ref()
    }

    pub(crate) fn begin_walk(&mut self, actor: &str, destination: &str) -> bool {
        match self.actors.get_mut(actor) {
            Some(record) => {
                record.walk = Some(WalkRecord {
                    destination: destination.to_string(),
                    remaining: DEFAULT_WALK_TICKS,
                });
                true
            }
            None => false,
        }
    }

    pub fn walk_finished(&self, actor: &str) -> bool {
        self.actors
            .get(actor)
            .map(|record| record.walk.is_none())
            .unwrap_or(true)
    }

    /// Advances every in-flight walk by one frame; with the skip flag set all
    /// walks complete immediately. Returns (actor, destination) arrivals.
    pub(crate) fn tick_walks(&mut self, skipping: bool) -> Vec<(String, String)> {
        let mut arrivals = Vec::new();
        for (name, record) in self.actors.iter_mut() {
            let done = match record.walk.as_mut() {
                Some(walk) if skipping || walk.remaining <= 1 => true,
                Some(walk) => {
                    walk.remaining -= 1;
                    false
                }
                None => false,
            };
            if done {
                if let Some(walk) = record.walk.take() {
                    arrivals.push((name.clone(), walk.destination));
                }
            }
        }
        arrivals
    }

    /// Names of clickables currently disabled by script, serialized verbatim
    /// into the save snapshot.
    pub fn disabled_clickables(&self) -> BTreeSet<String> {
        self.clickables
            .values()
            .filter(|record| !record.enabled)
            .map(|record| record.id.to_string())
            .collect()
    }

    pub(crate) fn restore_disabled(&mut self, disabled: &BTreeSet<String>) {
        for record in self.clickables.values_mut() {
            record.enabled = !disabled.contains(&record.id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_suffix_pascal_cases_names() {
        let id = ClickableId::hotspot("front_door");
        assert_eq!(id.handler_suffix(), "HotspotFrontDoor");
        assert_eq!(id.script_owner(), "hotspot.front_door");
        assert_eq!(id.to_string(), "hotspot.front_door");
    }

    #[test]
    fn interaction_counters_round_trip() {
        let mut record = ClickableRecord::new(ClickableId::prop("note"), None);
        record.on_interaction(Verb::Use);
        record.on_interaction(Verb::Inventory);
        record.on_interaction(Verb::Look);
        assert_eq!(record.use_count(), 2);
        assert_eq!(record.look_count(), 1);
        assert!(record.first_look());
        assert!(!record.first_use());

        record.on_cancel_interaction(Verb::Use);
        record.on_cancel_interaction(Verb::Look);
        assert_eq!(record.use_count(), 1);
        assert_eq!(record.look_count(), 0);
    }

    #[test]
    fn walks_complete_after_their_tick_budget() {
        let mut world = World::new();
        world.add_actor("player", None);
        world.begin_walk("player", "door");
        assert!(!world.walk_finished("player"));

        let mut arrivals = Vec::new();
        for _ in 0..DEFAULT_WALK_TICKS {
            arrivals.extend(world.tick_walks(false));
        }
        assert_eq!(arrivals, vec![("player".to_string(), "door".to_string())]);
        assert!(world.walk_finished("player"));
    }

    #[test]
    fn skipping_completes_walks_immediately() {
        let mut world = World::new();
        world.add_actor("player", None);
        world.begin_walk("player", "door");
        let arrivals = world.tick_walks(true);
        assert_eq!(arrivals.len(), 1);
        assert!(world.walk_finished("player"));
    }

    #[test]
    fn disabled_clickables_serialize_by_display_name() {
        let mut world = World::new();
        world.add_clickable(ClickableId::hotspot("door"), Some("office".to_string()));
        world.add_clickable(ClickableId::prop("note"), Some("office".to_string()));
        world
            .clickable_mut(&ClickableId::hotspot("door"))
            .expect("door registered")
            .enabled = false;

        let disabled = world.disabled_clickables();
        assert!(disabled.contains("hotspot.door"));
        assert_eq!(disabled.len(), 1);

        let mut restored = World::new();
        restored.add_clickable(ClickableId::hotspot("door"), None);
        restored.add_clickable(ClickableId::prop("note"), None);
        restored.restore_disabled(&disabled);
        assert!(!restored.clickable(&ClickableId::hotspot("door")).unwrap().enabled);
        assert!(restored.clickable(&ClickableId::prop("note")).unwrap().enabled);
    }
}
