use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::context::{GameContext, ScriptRequest};
use crate::dispatch::{dispatch_interaction, InteractionRequest};
use crate::registry::{CallbackRegistry, InvokeOutcome, ScriptArg};
use crate::scope::InteractionScope;
use crate::sequence::{Sequence, SequenceId, SequenceStatus};
use crate::world::{pascal_case, room_script, ClickableId, Verb};

/// A click the host forwards into the scheduler.
#[derive(Debug, Clone)]
pub struct ClickInput {
    pub verb: Verb,
    pub target: ClickableId,
}

/// Input sampled once per frame tick.
#[derive(Debug, Clone, Default)]
pub struct FrameInput {
    pub click: Option<ClickInput>,
    pub skip: bool,
}

impl FrameInput {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn click(verb: Verb, target: ClickableId) -> Self {
        FrameInput {
            click: Some(ClickInput { verb, target }),
            skip: false,
        }
    }

    pub fn skip() -> Self {
        FrameInput {
            click: None,
            skip: true,
        }
    }
}

/// The per-frame state machine. Owns the foreground slot, the pending
/// queue, ambient region sequences, and the cancellation scope; everything
/// is advanced cooperatively from `tick`, never concurrently.
pub struct FrameDriver {
    context: GameContext,
    registry: CallbackRegistry,
    foreground: Option<Sequence>,
    queue: VecDeque<Sequence>,
    ambient: Vec<Sequence>,
    scope: InteractionScope,
    next_sequence: u32,
    previous_regions: BTreeMap<String, BTreeSet<String>>,
}

impl FrameDriver {
    pub fn new(context: GameContext, registry: CallbackRegistry) -> Self {
        FrameDriver {
            context,
            registry,
            foreground: None,
            queue: VecDeque::new(),
            ambient: Vec::new(),
            scope: InteractionScope::new(),
            next_sequence: 1,
            previous_regions: BTreeMap::new(),
        }
    }

    pub fn context(&self) -> &GameContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut GameContext {
        &mut self.context
    }

    pub fn scope(&self) -> &InteractionScope {
        &self.scope
    }

    pub fn foreground(&self) -> Option<&Sequence> {
        self.foreground.as_ref()
    }

    pub fn pending(&self) -> impl ExactSizeIterator<Item = &Sequence> {
        self.queue.iter()
    }

    pub fn ambient(&self) -> &[Sequence] {
        &self.ambient
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.context.flags().paused != paused {
            self.context.flags_mut().paused = paused;
            let label = if paused { "game.pause" } else { "game.resume" };
            self.context.log_event(label);
        }
    }

    /// Cancels the promoted background interaction, if any, on behalf of the
    /// host (e.g. a dedicated cancel key).
    pub fn cancel_current_interaction(&mut self) {
        self.cancel_background("host");
    }

    /// Advances the scheduler one frame: foreground sequence, pending queue,
    /// click, region triggers, then background and ambient sequences.
    pub fn tick(&mut self, input: &FrameInput) {
        if self.context.flags().paused {
            return;
        }
        let frame = self.context.frame() + 1;
        self.context.set_frame(frame);
        if input.skip {
            self.context.request_skip();
        }
        self.context.tick_walks();

        self.step_foreground();
        self.drain_queue();

        if let Some(click) = input.click.as_ref() {
            self.handle_click(click);
        }

        self.evaluate_regions();
        self.step_background();
        self.step_ambient();
        self.finish_idle_interaction();
    }

    /// Tears every running and queued sequence down, rolling back the
    /// current interaction's bookkeeping like a cancellation would.
    pub fn reset(&mut self) {
        self.context.log_event("driver.reset");
        if self.scope.is_background() {
            self.cancel_background("reset");
        }
        let dropped: Vec<Sequence> = self
            .foreground
            .take()
            .into_iter()
            .chain(self.queue.drain(..))
            .chain(self.ambient.drain(..))
            .collect();
        for sequence in dropped {
            self.context
                .log_event(format!("sequence.cancel {} ({})", sequence.label(), sequence.id()));
        }
        self.context.rollback_occurrences();
        for record in self.context.drain_in_progress() {
            if let Some(clickable) = self.context.world_mut().clickable_mut(&record.target) {
                clickable.on_cancel_interaction(record.verb);
            }
            self.context
                .log_event(format!("interaction.cancel {} {}", record.verb.label(), record.target));
        }
        self.scope.reset();
        self.context.set_cancel_recording(false);
        self.previous_regions.clear();
    }

    // ------------------------------------------------------------------
    // Foreground slot and pending queue
    // ------------------------------------------------------------------

    fn allocate_id(&mut self) -> SequenceId {
        let id = SequenceId(self.next_sequence);
        self.next_sequence = self.next_sequence.wrapping_add(1);
        id
    }

    fn advance_sequence(&mut self, sequence: &mut Sequence) -> SequenceStatus {
        self.context.set_cancel_recording(sequence.is_undoable());
        let status = sequence.advance(&mut self.context);
        self.context.set_cancel_recording(false);
        status
    }

    fn step_foreground(&mut self) {
        let Some(mut sequence) = self.foreground.take() else {
            return;
        };
        let status = self.advance_sequence(&mut sequence);
        let requests = self.context.take_requests();
        let mut holder = Some(sequence);
        for request in requests {
            self.apply_request(request, &mut holder, status);
        }
        if let Some(sequence) = holder {
            match status {
                SequenceStatus::Suspended => self.foreground = Some(sequence),
                SequenceStatus::Finished => self.complete_sequence(sequence),
                SequenceStatus::Faulted => self.retire_faulted(sequence),
            }
        }
    }

    fn drain_queue(&mut self) {
        while self.foreground.is_none() {
            let Some(sequence) = self.queue.pop_front() else {
                break;
            };
            self.context
                .log_event(format!("sequence.dequeue {} ({})", sequence.label(), sequence.id()));
            self.foreground = Some(sequence);
            self.step_foreground();
        }
    }

    /// Assigns an id and logs the start; empty sequences are consumed on the
    /// spot and never occupy a slot.
    fn prepare(&mut self, mut sequence: Sequence) -> Option<Sequence> {
        let id = self.allocate_id();
        sequence.assign_id(id);
        if !sequence.has_steps() {
            sequence.mark_consumed();
            self.context
                .log_event(format!("sequence.consumed {} ({})", sequence.label(), id));
            if let Some(record) = sequence.take_interaction() {
                self.context.remove_in_progress(&record);
            }
            return None;
        }
        self.context
            .log_event(format!("sequence.start {} ({})", sequence.label(), id));
        Some(sequence)
    }

    fn complete_sequence(&mut self, mut sequence: Sequence) {
        self.context
            .log_event(format!("sequence.complete {} ({})", sequence.label(), sequence.id()));
        if let Some(record) = sequence.take_interaction() {
            self.context.remove_in_progress(&record);
        }
    }

    fn retire_faulted(&mut self, mut sequence: Sequence) {
        if let Some(record) = sequence.take_interaction() {
            self.context.remove_in_progress(&record);
        }
    }

    // ------------------------------------------------------------------
    // Clicks
    // ------------------------------------------------------------------

    fn handle_click(&mut self, click: &ClickInput) {
        if self.foreground.is_some() || !self.queue.is_empty() {
            self.context.log_event(format!(
                "input.ignored {} {}",
                click.verb.label(),
                click.target
            ));
            return;
        }
        if self.scope.is_background() {
            self.cancel_background("superseded");
        }
        self.finish_idle_interaction();

        let request = self.click_request(click);
        self.context
            .log_event(format!("input.click {}", request.describe()));
        self.scope.begin_interaction(true);
        self.context.set_cancel_recording(true);
        let dispatched = dispatch_interaction(&self.registry, &mut self.context, &request);
        self.context.set_cancel_recording(false);
        match dispatched {
            Some(mut sequence) => {
                sequence.set_undoable(true);
                if let Some(sequence) = self.prepare(sequence) {
                    self.foreground = Some(sequence);
                    self.step_foreground();
                    self.drain_queue();
                }
            }
            None => {
                self.context.commit_occurrences();
                self.scope.end_interaction();
            }
        }
    }

    fn click_request(&self, click: &ClickInput) -> InteractionRequest {
        let item = self
            .context
            .world()
            .selected_item()
            .cloned()
            .filter(|item| item != &click.target);
        match click.verb {
            Verb::Look => InteractionRequest {
                verb: Verb::Look,
                target: click.target.clone(),
                item: None,
            },
            Verb::Use | Verb::Inventory => match item {
                Some(item) => InteractionRequest {
                    verb: Verb::Inventory,
                    target: click.target.clone(),
                    item: Some(item),
                },
                None => InteractionRequest {
                    verb: Verb::Use,
                    target: click.target.clone(),
                    item: None,
                },
            },
        }
    }

    fn enqueue_interaction(&mut self, verb: Verb, target: ClickableId, item: Option<ClickableId>) {
        let request = InteractionRequest { verb, target, item };
        let undoable = self.scope.allows_cancel();
        self.context.set_cancel_recording(undoable);
        let dispatched = dispatch_interaction(&self.registry, &mut self.context, &request);
        self.context.set_cancel_recording(false);
        if let Some(mut sequence) = dispatched {
            sequence.set_undoable(undoable);
            if let Some(sequence) = self.prepare(sequence) {
                self.context
                    .log_event(format!("sequence.queue {} ({})", sequence.label(), sequence.id()));
                self.queue.push_back(sequence);
            }
        }
    }

    // ------------------------------------------------------------------
    // Script requests (drained after every advance)
    // ------------------------------------------------------------------

    fn apply_request(
        &mut self,
        request: ScriptRequest,
        holder: &mut Option<Sequence>,
        status: SequenceStatus,
    ) {
        match request {
            ScriptRequest::EnableCancel => {
                let eligible = self.scope.can_enable_cancel()
                    && status == SequenceStatus::Suspended
                    && holder.is_some();
                if eligible {
                    if let Some(mut sequence) = holder.take() {
                        sequence.mark_background();
                        self.context.log_event("scope.enable_cancel");
                        self.context.log_event(format!(
                            "sequence.background {} ({})",
                            sequence.label(),
                            sequence.id()
                        ));
                        let queue = std::mem::take(&mut self.queue);
                        self.scope.promote(sequence, queue);
                    }
                } else {
                    self.context.log_event("scope.enable_cancel.ignored");
                }
            }
            ScriptRequest::DisableCancel => self.restore_background(),
            ScriptRequest::CancelInteraction => self.cancel_background("script"),
            ScriptRequest::QueueInteraction { verb, target, item } => {
                self.enqueue_interaction(verb, target, item)
            }
        }
    }

    // ------------------------------------------------------------------
    // Background promotion / demotion / cancellation
    // ------------------------------------------------------------------

    fn restore_background(&mut self) {
        let Some((saved, saved_queue)) = self.scope.demote() else {
            self.context.log_event("scope.disable_cancel.ignored");
            return;
        };
        self.context.log_event("scope.disable_cancel");
        let mut merged = saved_queue;
        merged.extend(self.queue.drain(..));
        self.queue = merged;
        if let Some(mut sequence) = saved {
            sequence.clear_background();
            self.context.log_event(format!(
                "sequence.foreground {} ({})",
                sequence.label(),
                sequence.id()
            ));
            if self.foreground.is_none() {
                self.foreground = Some(sequence);
            } else {
                self.queue.push_front(sequence);
            }
        }
        self.context.commit_occurrences();
    }

    fn cancel_background(&mut self, reason: &str) {
        if !self.scope.is_background() {
            self.context.log_event("scope.cancel.ignored");
            return;
        }
        self.context.log_event(format!("scope.cancel {reason}"));
        if let Some((saved, saved_queue)) = self.scope.demote() {
            let dropped: Vec<Sequence> = saved
                .into_iter()
                .chain(saved_queue)
                .chain(self.queue.drain(..))
                .collect();
            for sequence in dropped {
                self.context.log_event(format!(
                    "sequence.cancel {} ({})",
                    sequence.label(),
                    sequence.id()
                ));
            }
        }
        self.context.rollback_occurrences();
        for record in self.context.drain_in_progress() {
            if let Some(clickable) = self.context.world_mut().clickable_mut(&record.target) {
                clickable.on_cancel_interaction(record.verb);
            }
            self.context.log_event(format!(
                "interaction.cancel {} {}",
                record.verb.label(),
                record.target
            ));
        }
        self.scope.end_interaction();
        self.context.set_cancel_recording(false);
    }

    fn step_background(&mut self) {
        if !self.scope.is_background() {
            return;
        }
        let Some(mut sequence) = self.scope.take_background() else {
            return;
        };
        let status = self.advance_sequence(&mut sequence);
        match status {
            SequenceStatus::Suspended => self.scope.put_background(sequence),
            SequenceStatus::Finished | SequenceStatus::Faulted => {
                if status == SequenceStatus::Finished {
                    self.context.log_event(format!(
                        "sequence.complete {} ({})",
                        sequence.label(),
                        sequence.id()
                    ));
                }
                if let Some(record) = sequence.take_interaction() {
                    self.context.remove_in_progress(&record);
                }
                if let Some((_, saved_queue)) = self.scope.demote() {
                    let mut merged = saved_queue;
                    merged.extend(self.queue.drain(..));
                    self.queue = merged;
                }
                self.context.log_event("scope.background_complete");
                self.context.commit_occurrences();
            }
        }
        let requests = self.context.take_requests();
        for request in requests {
            self.apply_request(request, &mut None, SequenceStatus::Suspended);
        }
    }

    fn step_ambient(&mut self) {
        let mut remaining = Vec::new();
        for mut sequence in std::mem::take(&mut self.ambient) {
            let status = self.advance_sequence(&mut sequence);
            let requests = self.context.take_requests();
            for request in requests {
                self.apply_request(request, &mut None, SequenceStatus::Suspended);
            }
            match status {
                SequenceStatus::Suspended => remaining.push(sequence),
                SequenceStatus::Finished => self.complete_sequence(sequence),
                SequenceStatus::Faulted => self.retire_faulted(sequence),
            }
        }
        self.ambient.extend(remaining);
    }

    // ------------------------------------------------------------------
    // Region triggers
    // ------------------------------------------------------------------

    fn evaluate_regions(&mut self) {
        for actor in self.context.world().actor_names() {
            let current: BTreeSet<String> = self
                .context
                .world()
                .actor(&actor)
                .map(|record| record.regions.clone())
                .unwrap_or_default();
            let previous = self
                .previous_regions
                .get(&actor)
                .cloned()
                .unwrap_or_default();
            for region in previous.difference(&current) {
                self.fire_region_event(&actor, region, false);
            }
            for region in current.difference(&previous) {
                self.fire_region_event(&actor, region, true);
            }
            self.previous_regions.insert(actor, current);
        }
    }

    fn fire_region_event(&mut self, actor: &str, region: &str, entered: bool) {
        let Some(record) = self.context.world().region(region) else {
            return;
        };
        if !record.enabled {
            return;
        }
        let owner = room_script(&record.room);
        let suffix = pascal_case(region);
        let stem = if entered { "OnEnterRegion" } else { "OnExitRegion" };
        let transition = if entered { "enter" } else { "exit" };
        self.context
            .log_event(format!("region.{transition} {region} {actor}"));

        let args = vec![
            ScriptArg::Region(region.to_string()),
            ScriptArg::Actor(actor.to_string()),
        ];

        match self.registry.invoke(&owner, &format!("{stem}BG{suffix}"), &args) {
            InvokeOutcome::Missing => {}
            InvokeOutcome::Fault(fault) => {
                self.context
                    .log_event(format!("handler.fault {owner}.{stem}BG{suffix}: {fault}"));
            }
            InvokeOutcome::Ran(sequence) => {
                if let Some(sequence) = self.prepare(sequence) {
                    self.ambient.push(sequence);
                }
            }
        }

        match self.registry.invoke(&owner, &format!("{stem}{suffix}"), &args) {
            InvokeOutcome::Missing => {}
            InvokeOutcome::Fault(fault) => {
                self.context
                    .log_event(format!("handler.fault {owner}.{stem}{suffix}: {fault}"));
            }
            InvokeOutcome::Ran(sequence) => {
                if !self.scope.interaction_active() {
                    self.scope.begin_interaction(false);
                }
                if let Some(sequence) = self.prepare(sequence) {
                    if self.foreground.is_none() {
                        self.foreground = Some(sequence);
                        self.step_foreground();
                        self.drain_queue();
                    } else {
                        self.context.log_event(format!(
                            "sequence.queue {} ({})",
                            sequence.label(),
                            sequence.id()
                        ));
                        self.queue.push_back(sequence);
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Interaction lifecycle
    // ------------------------------------------------------------------

    fn finish_idle_interaction(&mut self) {
        if self.scope.interaction_active()
            && !self.scope.is_background()
            && self.foreground.is_none()
            && self.queue.is_empty()
        {
            self.scope.end_interaction();
            self.context.set_cancel_recording(false);
            self.context.commit_occurrences();
            self.context.drain_in_progress();
            self.context.log_event("interaction.complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::Sequence;
    use crate::world::World;

    fn driver_with(registry: CallbackRegistry) -> FrameDriver {
        let mut world = World::new();
        world.add_room("office");
        world.set_current_room("office");
        world.add_clickable(ClickableId::hotspot("door"), Some("office".to_string()));
        FrameDriver::new(GameContext::new(world), registry)
    }

    fn door() -> ClickableId {
        ClickableId::hotspot("door")
    }

    #[test]
    fn click_dispatches_and_runs_to_completion() {
        let mut registry = CallbackRegistry::new();
        registry.register("hotspot.door", "OnInteract", 1, |_| {
            Ok(Sequence::build("door.use")
                .run(|cx| {
                    cx.occurrence_add("door_used");
                })
                .finish())
        });

        let mut driver = driver_with(registry);
        driver.tick(&FrameInput::click(Verb::Use, door()));
        assert_eq!(driver.context().occurrence_count("door_used"), 1);
        assert!(driver.foreground().is_none());
        let labels = driver.context().event_labels();
        assert!(labels.contains(&"interaction.complete"));
    }

    #[test]
    fn clicks_are_ignored_while_foreground_work_runs() {
        let mut registry = CallbackRegistry::new();
        registry.register("hotspot.door", "OnInteract", 1, |_| {
            Ok(Sequence::build("door.slow").wait_ticks(10).finish())
        });

        let mut driver = driver_with(registry);
        driver.tick(&FrameInput::click(Verb::Use, door()));
        assert!(driver.foreground().is_some());

        driver.tick(&FrameInput::click(Verb::Use, door()));
        let labels = driver.context().event_labels();
        assert!(labels.contains(&"input.ignored use hotspot.door"));
        assert_eq!(
            driver
                .context()
                .world()
                .clickable(&door())
                .unwrap()
                .use_count(),
            1
        );
    }

    #[test]
    fn empty_handler_sequences_are_consumed_not_installed() {
        let mut registry = CallbackRegistry::new();
        registry.register("hotspot.door", "OnInteract", 1, |_| {
            Ok(Sequence::empty("door.noop"))
        });

        let mut driver = driver_with(registry);
        driver.tick(&FrameInput::click(Verb::Use, door()));
        assert!(driver.foreground().is_none());
        assert!(!driver.context().interaction_in_progress(&door(), Verb::Use));
        let labels = driver.context().event_labels();
        assert!(labels.iter().any(|label| label.starts_with("sequence.consumed")));
    }

    #[test]
    fn handler_queued_interactions_run_in_causal_order() {
        let mut registry = CallbackRegistry::new();
        registry.register("hotspot.door", "OnInteract", 1, |_| {
            Ok(Sequence::build("door.first")
                .run(|cx| {
                    cx.occurrence_add("first");
                    cx.queue_interaction(Verb::Look, ClickableId::hotspot("door"), None);
                })
                .finish())
        });
        registry.register("hotspot.door", "OnLookAt", 1, |_| {
            Ok(Sequence::build("door.second")
                .run(|cx| {
                    cx.occurrence_add("second");
                })
                .finish())
        });

        let mut driver = driver_with(registry);
        driver.tick(&FrameInput::click(Verb::Use, door()));
        assert_eq!(driver.context().occurrence_count("first"), 1);
        assert_eq!(driver.context().occurrence_count("second"), 1);

        let labels = driver.context().event_labels();
        let first = labels
            .iter()
            .position(|label| label.starts_with("sequence.complete door.first"))
            .expect("first sequence completed");
        let second = labels
            .iter()
            .position(|label| label.starts_with("sequence.complete door.second"))
            .expect("second sequence completed");
        assert!(first < second);
    }

    #[test]
    fn paused_driver_does_not_advance() {
        let mut registry = CallbackRegistry::new();
        registry.register("hotspot.door", "OnInteract", 1, |_| {
            Ok(Sequence::build("door.slow").wait_ticks(1).finish())
        });

        let mut driver = driver_with(registry);
        driver.tick(&FrameInput::click(Verb::Use, door()));
        driver.set_paused(true);
        let frame = driver.context().frame();
        driver.tick(&FrameInput::idle());
        driver.tick(&FrameInput::idle());
        assert_eq!(driver.context().frame(), frame);
        assert!(driver.foreground().is_some());

        driver.set_paused(false);
        driver.tick(&FrameInput::idle());
        assert!(driver.foreground().is_none());
    }
}
