use std::collections::VecDeque;

use crate::sequence::Sequence;
use crate::world::{ClickableId, Verb};

/// A (target, verb) pair currently being handled by a dispatched sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionRecord {
    pub target: ClickableId,
    pub verb: Verb,
}

impl InteractionRecord {
    pub fn new(target: ClickableId, verb: Verb) -> Self {
        InteractionRecord { target, verb }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Foreground,
    Background,
}

/// Tracks whether the running interaction may be interrupted and performs
/// the foreground/background promotion bookkeeping. At most one promoted
/// sequence exists at a time; unbalanced enable/disable calls are no-ops.
#[derive(Debug)]
pub struct InteractionScope {
    state: ScopeState,
    interaction_active: bool,
    allow_enable_cancel: bool,
    background: Option<Sequence>,
    background_queue: VecDeque<Sequence>,
}

impl Default for InteractionScope {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionScope {
    pub fn new() -> Self {
        InteractionScope {
            state: ScopeState::Foreground,
            interaction_active: false,
            allow_enable_cancel: false,
            background: None,
            background_queue: VecDeque::new(),
        }
    }

    pub fn state(&self) -> ScopeState {
        self.state
    }

    pub fn is_background(&self) -> bool {
        self.state == ScopeState::Background
    }

    pub fn interaction_active(&self) -> bool {
        self.interaction_active
    }

    /// Arms the scope for a new top-level interaction. The latch decides
    /// whether handlers may call enable-cancel during this interaction.
    pub(crate) fn begin_interaction(&mut self, allow_enable_cancel: bool) {
        self.interaction_active = true;
        self.allow_enable_cancel = allow_enable_cancel;
    }

    pub(crate) fn end_interaction(&mut self) {
        self.interaction_active = false;
        self.allow_enable_cancel = false;
    }

    /// Whether the current interaction is cancel-eligible at all (the latch
    /// is set), independent of promotion state. Sequences dispatched under
    /// such an interaction record their occurrence increments for rollback.
    pub(crate) fn allows_cancel(&self) -> bool {
        self.interaction_active && self.allow_enable_cancel
    }

    pub(crate) fn can_enable_cancel(&self) -> bool {
        self.interaction_active
            && self.allow_enable_cancel
            && self.state == ScopeState::Foreground
    }

    /// Saves the promoted sequence and the queue snapshot; the driver
    /// installs the empty foreground that takes over.
    pub(crate) fn promote(&mut self, sequence: Sequence, queue: VecDeque<Sequence>) {
        self.background = Some(sequence);
        self.background_queue = queue;
        self.state = ScopeState::Background;
    }

    /// Takes the snapshot back for restoration (disable-cancel) or teardown
    /// (cancellation). Returns `None` when nothing is promoted.
    pub(crate) fn demote(&mut self) -> Option<(Option<Sequence>, VecDeque<Sequence>)> {
        if self.state != ScopeState::Background {
            return None;
        }
        self.state = ScopeState::Foreground;
        Some((
            self.background.take(),
            std::mem::take(&mut self.background_queue),
        ))
    }

    pub(crate) fn take_background(&mut self) -> Option<Sequence> {
        self.background.take()
    }

    pub(crate) fn put_background(&mut self, sequence: Sequence) {
        self.background = Some(sequence);
    }

    pub fn background(&self) -> Option<&Sequence> {
        self.background.as_ref()
    }

    pub(crate) fn reset(&mut self) {
        self.state = ScopeState::Foreground;
        self.interaction_active = false;
        self.allow_enable_cancel = false;
        self.background = None;
        self.background_queue.clear();
    }
}
