use serde::Serialize;

use crate::occurrence::OccurrenceLedger;
use crate::save::SaveSnapshot;
use crate::scope::InteractionRecord;
use crate::world::{ClickableId, ClickableKind, Verb, World};

const SAY_BASE_TICKS: u32 = 2;
const SAY_CHARS_PER_TICK: usize = 8;

/// One entry of the runtime event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub frame: u32,
    pub label: String,
}

/// Per-frame flags sampled once per tick and read by every suspension
/// primitive. `skipping` is the monotonic fast-forward switch; it only
/// clears on the end-of-cutscene event.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameFlags {
    pub skipping: bool,
    pub paused: bool,
    pub cutscene_active: bool,
}

/// Operations a running step may request from the scheduler. The driver
/// drains these after each advance so the queue and scope are never mutated
/// re-entrantly.
#[derive(Debug, Clone)]
pub(crate) enum ScriptRequest {
    EnableCancel,
    DisableCancel,
    CancelInteraction,
    QueueInteraction {
        verb: Verb,
        target: ClickableId,
        item: Option<ClickableId>,
    },
}

/// The explicit context object handed to every step closure: world model,
/// occurrence ledger, event log, frame flags, and the request buffer for
/// scheduler operations. Replaces the "get the one instance" pattern of the
/// original domain.
#[derive(Debug)]
pub struct GameContext {
    world: World,
    ledger: OccurrenceLedger,
    events: Vec<EventRecord>,
    requests: Vec<ScriptRequest>,
    in_progress: Vec<InteractionRecord>,
    flags: FrameFlags,
    frame: u32,
    cancel_recording: bool,
}

impl GameContext {
    pub fn new(world: World) -> Self {
        GameContext {
            world,
            ledger: OccurrenceLedger::new(),
            events: Vec::new(),
            requests: Vec::new(),
            in_progress: Vec::new(),
            flags: FrameFlags::default(),
            frame: 0,
            cancel_recording: false,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn flags(&self) -> &FrameFlags {
        &self.flags
    }

    pub(crate) fn flags_mut(&mut self) -> &mut FrameFlags {
        &mut self.flags
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub(crate) fn set_frame(&mut self, frame: u32) {
        self.frame = frame;
    }

    // ------------------------------------------------------------------
    // Event log
    // ------------------------------------------------------------------

    pub fn log_event(&mut self, label: impl Into<String>) {
        self.events.push(EventRecord {
            frame: self.frame,
            label: label.into(),
        });
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn event_labels(&self) -> Vec<&str> {
        self.events.iter().map(|event| event.label.as_str()).collect()
    }

    // ------------------------------------------------------------------
    // Occurrence ledger
    // ------------------------------------------------------------------

    /// Increments the story counter for `key`. While a cancelable interaction
    /// is in progress the increment is also recorded for rollback.
    pub fn occurrence_add(&mut self, key: &str) -> u32 {
        let count = self.ledger.add(key);
        if self.cancel_recording {
            self.ledger.record_for_rollback(key);
        }
        self.log_event(format!("occurrence.add {key} -> {count}"));
        count
    }

    /// Increments and reports whether this was the first visit.
    pub fn first_occurrence(&mut self, key: &str) -> bool {
        self.occurrence_add(key) <= 1
    }

    pub fn occurrence_count(&self, key: &str) -> u32 {
        self.ledger.count(key)
    }

    pub fn ledger(&self) -> &OccurrenceLedger {
        &self.ledger
    }

    pub(crate) fn set_cancel_recording(&mut self, recording: bool) {
        self.cancel_recording = recording;
    }

    pub(crate) fn commit_occurrences(&mut self) {
        self.ledger.commit();
    }

    pub(crate) fn rollback_occurrences(&mut self) -> usize {
        let undone = self.ledger.rollback();
        if undone > 0 {
            self.log_event(format!("occurrence.rollback {undone}"));
        }
        undone
    }

    // ------------------------------------------------------------------
    // Engine collaborators (dialog, movement)
    // ------------------------------------------------------------------

    /// Speaks a line; returns the tick duration the dialog occupies.
    pub fn say(&mut self, actor: &str, line: &str) -> u32 {
        self.log_event(format!("dialog.say {actor} {line}"));
        SAY_BASE_TICKS + (line.len() / SAY_CHARS_PER_TICK) as u32
    }

    pub fn begin_walk(&mut self, actor: &str, destination: &str) {
        if self.world.begin_walk(actor, destination) {
            self.log_event(format!("walk.begin {actor} -> {destination}"));
        } else {
            self.log_event(format!("walk.unknown_actor {actor}"));
        }
    }

    pub fn walk_finished(&self, actor: &str) -> bool {
        self.world.walk_finished(actor)
    }

    /// Advances in-flight walks one frame (instantly while skipping) and
    /// logs arrivals.
    pub(crate) fn tick_walks(&mut self) {
        let arrivals = self.world.tick_walks(self.flags.skipping);
        for (actor, destination) in arrivals {
            self.log_event(format!("walk.arrive {actor} {destination}"));
        }
    }

    // ------------------------------------------------------------------
    // Cutscenes and the skip flag
    // ------------------------------------------------------------------

    pub fn begin_cutscene(&mut self) {
        if !self.flags.cutscene_active {
            self.flags.cutscene_active = true;
            self.log_event("cutscene.start");
        }
    }

    /// The explicit end-of-cutscene event; the only place the skip flag
    /// clears.
    pub fn end_cutscene(&mut self) {
        if self.flags.cutscene_active {
            self.flags.cutscene_active = false;
            self.log_event("cutscene.end");
            if self.flags.skipping {
                self.flags.skipping = false;
                self.log_event("skip.end");
            }
        }
    }

    pub(crate) fn request_skip(&mut self) {
        if self.flags.cutscene_active && !self.flags.skipping {
            self.flags.skipping = true;
            self.log_event("skip.begin");
        }
    }

    // ------------------------------------------------------------------
    // World mutation helpers for handlers
    // ------------------------------------------------------------------

    pub fn set_clickable_enabled(&mut self, id: &ClickableId, enabled: bool) -> bool {
        let Some(record) = self.world.clickable_mut(id) else {
            return false;
        };
        if record.enabled == enabled {
            return true;
        }
        record.enabled = enabled;
        let verbed = if enabled { "enable" } else { "disable" };
        self.log_event(format!("clickable.{verbed} {id}"));
        true
    }

    pub fn select_item(&mut self, id: ClickableId) -> bool {
        if id.kind != ClickableKind::Inventory || self.world.clickable(&id).is_none() {
            return false;
        }
        self.log_event(format!("inventory.select {id}"));
        self.world.select_item(id);
        true
    }

    pub fn clear_selected_item(&mut self) {
        if self.world.selected_item().is_some() {
            self.log_event("inventory.deselect");
            self.world.clear_selected_item();
        }
    }

    // ------------------------------------------------------------------
    // Scheduler requests issued from running steps
    // ------------------------------------------------------------------

    /// Asks the scheduler to promote the current sequence into a cancelable
    /// background one. Honored only if the interaction's latch permits.
    pub fn enable_cancel(&mut self) {
        self.requests.push(ScriptRequest::EnableCancel);
    }

    /// Asks the scheduler to restore the promoted sequence to the
    /// foreground. A no-op when nothing is promoted.
    pub fn disable_cancel(&mut self) {
        self.requests.push(ScriptRequest::DisableCancel);
    }

    /// Asks the scheduler to cancel the promoted background interaction.
    pub fn cancel_current_interaction(&mut self) {
        self.requests.push(ScriptRequest::CancelInteraction);
    }

    /// Queues a follow-up interaction behind the current one.
    pub fn queue_interaction(&mut self, verb: Verb, target: ClickableId, item: Option<ClickableId>) {
        self.requests
            .push(ScriptRequest::QueueInteraction { verb, target, item });
    }

    pub(crate) fn take_requests(&mut self) -> Vec<ScriptRequest> {
        std::mem::take(&mut self.requests)
    }

    // ------------------------------------------------------------------
    // In-progress interaction records
    // ------------------------------------------------------------------

    /// True while `verb` on `target` has a dispatched sequence that has not
    /// completed or been canceled. UI layers use this to suppress duplicate
    /// counting.
    pub fn interaction_in_progress(&self, target: &ClickableId, verb: Verb) -> bool {
        self.in_progress
            .iter()
            .any(|record| &record.target == target && record.verb == verb)
    }

    pub fn in_progress(&self) -> &[InteractionRecord] {
        &self.in_progress
    }

    pub(crate) fn push_in_progress(&mut self, record: InteractionRecord) {
        self.in_progress.push(record);
    }

    pub(crate) fn remove_in_progress(&mut self, record: &InteractionRecord) -> bool {
        match self.in_progress.iter().position(|entry| entry == record) {
            Some(index) => {
                self.in_progress.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn drain_in_progress(&mut self) -> Vec<InteractionRecord> {
        std::mem::take(&mut self.in_progress)
    }

    // ------------------------------------------------------------------
    // Save snapshot
    // ------------------------------------------------------------------

    pub fn save_snapshot(&self) -> SaveSnapshot {
        SaveSnapshot {
            occurrences: self.ledger.counts().clone(),
            disabled_clickables: self.world.disabled_clickables(),
        }
    }

    pub fn restore_snapshot(&mut self, snapshot: &SaveSnapshot) {
        self.ledger.restore_counts(snapshot.occurrences.clone());
        self.world.restore_disabled(&snapshot.disabled_clickables);
        self.log_event("save.restore");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::World;

    fn context_with_door() -> GameContext {
        let mut world = World::new();
        world.add_room("office");
        world.set_current_room("office");
        world.add_clickable(ClickableId::hotspot("door"), Some("office".to_string()));
        world.add_clickable(ClickableId::inventory("key"), None);
        GameContext::new(world)
    }

    #[test]
    fn occurrence_add_records_rollback_only_while_cancelable() {
        let mut cx = context_with_door();
        cx.occurrence_add("ambient");
        cx.set_cancel_recording(true);
        cx.occurrence_add("clicked");
        cx.set_cancel_recording(false);

        assert_eq!(cx.rollback_occurrences(), 1);
        assert_eq!(cx.occurrence_count("ambient"), 1);
        assert_eq!(cx.occurrence_count("clicked"), 0);
    }

    #[test]
    fn skip_request_requires_active_cutscene() {
        let mut cx = context_with_door();
        cx.request_skip();
        assert!(!cx.flags().skipping);

        cx.begin_cutscene();
        cx.request_skip();
        assert!(cx.flags().skipping);

        cx.end_cutscene();
        assert!(!cx.flags().skipping);
        let labels = cx.event_labels();
        assert_eq!(
            labels,
            vec!["cutscene.start", "skip.begin", "cutscene.end", "skip.end"]
        );
    }

    #[test]
    fn selecting_requires_a_known_inventory_item() {
        let mut cx = context_with_door();
        assert!(!cx.select_item(ClickableId::hotspot("door")));
        assert!(!cx.select_item(ClickableId::inventory("crowbar")));
        assert!(cx.select_item(ClickableId::inventory("key")));
        assert_eq!(
            cx.world().selected_item(),
            Some(&ClickableId::inventory("key"))
        );
    }

    #[test]
    fn snapshot_round_trips_ledger_and_disabled_set() {
        let mut cx = context_with_door();
        cx.occurrence_add("door_opened");
        cx.occurrence_add("door_opened");
        cx.set_clickable_enabled(&ClickableId::hotspot("door"), false);

        let snapshot = cx.save_snapshot();
        let mut fresh = context_with_door();
        fresh.restore_snapshot(&snapshot);

        assert_eq!(fresh.occurrence_count("door_opened"), 2);
        assert!(
            !fresh
                .world()
                .clickable(&ClickableId::hotspot("door"))
                .expect("door registered")
                .enabled
        );
    }
}
