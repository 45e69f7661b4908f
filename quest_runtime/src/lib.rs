//! Cooperative interaction scheduler for a point-and-click adventure
//! runtime.
//!
//! Each frame the driver decides which game-script callback runs in
//! response to a player action, advances it as a cancelable suspended
//! sequence, and manages promotion of long-running actions into a
//! cancelable background state so the player can interrupt them. Strictly
//! single-threaded and frame-stepped; rendering, pathfinding, audio and
//! persistence stay with the host engine behind narrow interfaces.

mod dispatch;

pub mod context;
pub mod driver;
pub mod occurrence;
pub mod registry;
pub mod save;
pub mod scope;
pub mod sequence;
pub mod world;

pub use context::{EventRecord, FrameFlags, GameContext};
pub use driver::{ClickInput, FrameDriver, FrameInput};
pub use occurrence::OccurrenceLedger;
pub use registry::{CallbackRegistry, HandlerResult, InvokeOutcome, ScriptArg};
pub use save::SaveSnapshot;
pub use scope::{InteractionRecord, InteractionScope, ScopeState};
pub use sequence::{
    HandlerFault, Sequence, SequenceBuilder, SequenceId, SequenceStatus, Step, StepFlow,
};
pub use world::{room_script, ClickableId, ClickableKind, Verb, World, GLOBAL_SCRIPT};
