use std::collections::VecDeque;
use std::fmt;

use thiserror::Error;

use crate::context::GameContext;
use crate::scope::InteractionRecord;

/// A script handler failed while building or running its sequence. Faults
/// never reach the frame loop; the dispatcher treats them as "handler did
/// not run" and the driver retires a faulting sequence in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct HandlerFault {
    reason: String,
}

impl HandlerFault {
    pub fn new(reason: impl Into<String>) -> Self {
        HandlerFault {
            reason: reason.into(),
        }
    }
}

/// Control flow returned by an immediate step: keep going, or splice a
/// continuation (decided against live state) in front of the remaining
/// steps.
pub enum StepFlow {
    Continue,
    Splice(Vec<Step>),
}

/// One unit of a sequence. `Run` executes synchronously; the wait variants
/// are the only suspension points and both resolve on their first poll once
/// the global skip flag is set.
pub enum Step {
    Run(Box<dyn FnOnce(&mut GameContext) -> Result<StepFlow, HandlerFault>>),
    WaitTicks(u32),
    WaitUntil {
        label: String,
        check: Box<dyn FnMut(&GameContext) -> bool>,
    },
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Run(_) => f.write_str("Run"),
            Step::WaitTicks(ticks) => write!(f, "WaitTicks({ticks})"),
            Step::WaitUntil { label, .. } => write!(f, "WaitUntil({label})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceId(pub u32);

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStatus {
    Suspended,
    Finished,
    Faulted,
}

/// A cancelable unit of suspended, resumable script execution: the runtime
/// form of one running handler. Owned by the frame driver while active and
/// destroyed on completion or cancellation.
pub struct Sequence {
    id: SequenceId,
    label: String,
    steps: VecDeque<Step>,
    cancelable: bool,
    background: bool,
    consumed: bool,
    undoable: bool,
    interaction: Option<InteractionRecord>,
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("steps", &self.steps)
            .field("cancelable", &self.cancelable)
            .field("background", &self.background)
            .field("consumed", &self.consumed)
            .finish()
    }
}

impl Sequence {
    pub fn build(label: impl Into<String>) -> SequenceBuilder {
        SequenceBuilder {
            label: label.into(),
            steps: VecDeque::new(),
        }
    }

    /// An empty sequence: the handler ran but yielded nothing.
    pub fn empty(label: impl Into<String>) -> Sequence {
        Sequence::build(label).finish()
    }

    pub fn id(&self) -> SequenceId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_cancelable(&self) -> bool {
        self.cancelable
    }

    pub fn is_background(&self) -> bool {
        self.background
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    pub fn has_steps(&self) -> bool {
        !self.steps.is_empty()
    }

    pub(crate) fn assign_id(&mut self, id: SequenceId) {
        self.id = id;
    }

    pub(crate) fn mark_background(&mut self) {
        self.background = true;
        self.cancelable = true;
    }

    pub(crate) fn clear_background(&mut self) {
        self.background = false;
        self.cancelable = false;
    }

    pub(crate) fn mark_consumed(&mut self) {
        self.consumed = true;
    }

    /// Whether occurrence increments made by this sequence's steps join the
    /// interaction's undo list. Only sequences dispatched under a cancelable
    /// interaction record.
    pub(crate) fn is_undoable(&self) -> bool {
        self.undoable
    }

    pub(crate) fn set_undoable(&mut self, undoable: bool) {
        self.undoable = undoable;
    }

    pub(crate) fn set_interaction(&mut self, record: InteractionRecord) {
        self.interaction = Some(record);
    }

    pub(crate) fn take_interaction(&mut self) -> Option<InteractionRecord> {
        self.interaction.take()
    }

    /// Runs steps until a suspension point fails to resolve this frame. Wait
    /// steps poll the context's skip flag and resolve immediately while it is
    /// set; a resolved wait is popped and can never re-suspend.
    pub(crate) fn advance(&mut self, cx: &mut GameContext) -> SequenceStatus {
        loop {
            let skipping = cx.flags().skipping;
            match self.steps.front_mut() {
                None => return SequenceStatus::Finished,
                Some(Step::WaitTicks(remaining)) => {
                    if skipping || *remaining == 0 {
                        self.steps.pop_front();
                        continue;
                    }
                    *remaining -= 1;
                    return SequenceStatus::Suspended;
                }
                Some(Step::WaitUntil { check, .. }) => {
                    if skipping || check(cx) {
                        self.steps.pop_front();
                        continue;
                    }
                    return SequenceStatus::Suspended;
                }
                Some(Step::Run(_)) => {
                    let step = self.steps.pop_front();
                    let Some(Step::Run(run)) = step else {
                        unreachable!("front step changed during advance");
                    };
                    match run(cx) {
                        Ok(StepFlow::Continue) => continue,
                        Ok(StepFlow::Splice(steps)) => {
                            for step in steps.into_iter().rev() {
                                self.steps.push_front(step);
                            }
                        }
                        Err(fault) => {
                            cx.log_event(format!(
                                "handler.fault {} ({}): {}",
                                self.label, self.id, fault
                            ));
                            self.steps.clear();
                            return SequenceStatus::Faulted;
                        }
                    }
                }
            }
        }
    }
}

/// Builds the step list of a handler's sequence.
pub struct SequenceBuilder {
    label: String,
    steps: VecDeque<Step>,
}

impl SequenceBuilder {
    pub fn run(mut self, step: impl FnOnce(&mut GameContext) + 'static) -> Self {
        self.steps.push_back(Step::Run(Box::new(move |cx| {
            step(cx);
            Ok(StepFlow::Continue)
        })));
        self
    }

    pub fn try_run(
        mut self,
        step: impl FnOnce(&mut GameContext) -> Result<(), HandlerFault> + 'static,
    ) -> Self {
        self.steps.push_back(Step::Run(Box::new(move |cx| {
            step(cx).map(|_| StepFlow::Continue)
        })));
        self
    }

    /// Decides a continuation against live state and splices it in front of
    /// the remaining steps.
    pub fn branch(mut self, step: impl FnOnce(&mut GameContext) -> Vec<Step> + 'static) -> Self {
        self.steps.push_back(Step::Run(Box::new(move |cx| {
            Ok(StepFlow::Splice(step(cx)))
        })));
        self
    }

    pub fn wait_ticks(mut self, ticks: u32) -> Self {
        self.steps.push_back(Step::WaitTicks(ticks));
        self
    }

    pub fn wait_until(
        mut self,
        label: impl Into<String>,
        check: impl FnMut(&GameContext) -> bool + 'static,
    ) -> Self {
        self.steps.push_back(Step::WaitUntil {
            label: label.into(),
            check: Box::new(check),
        });
        self
    }

    /// Speaks a line and waits out its duration (the context derives ticks
    /// from line length).
    pub fn say(self, actor: impl Into<String>, line: impl Into<String>) -> Self {
        let actor = actor.into();
        let line = line.into();
        self.branch(move |cx| {
            let ticks = cx.say(&actor, &line);
            vec![Step::WaitTicks(ticks)]
        })
    }

    /// Starts a walk and waits until the engine reports arrival.
    pub fn walk_to(self, actor: impl Into<String>, destination: impl Into<String>) -> Self {
        let actor = actor.into();
        let destination = destination.into();
        self.branch(move |cx| {
            cx.begin_walk(&actor, &destination);
            let wait_actor = actor.clone();
            vec![Step::WaitUntil {
                label: format!("walk.{actor}"),
                check: Box::new(move |cx| cx.walk_finished(&wait_actor)),
            }]
        })
    }

    pub fn finish(self) -> Sequence {
        Sequence {
            id: SequenceId(0),
            label: self.label,
            steps: self.steps,
            cancelable: false,
            background: false,
            consumed: false,
            undoable: false,
            interaction: None,
        }
    }
}
