use std::collections::BTreeMap;
use std::fmt;

use crate::sequence::{HandlerFault, Sequence};
use crate::world::ClickableId;

/// Argument passed positionally to a script handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptArg {
    Clickable(ClickableId),
    Region(String),
    Actor(String),
}

impl ScriptArg {
    pub fn as_clickable(&self) -> Option<&ClickableId> {
        match self {
            ScriptArg::Clickable(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_region(&self) -> Option<&str> {
        match self {
            ScriptArg::Region(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_actor(&self) -> Option<&str> {
        match self {
            ScriptArg::Actor(name) => Some(name),
            _ => None,
        }
    }
}

pub type HandlerResult = Result<Sequence, HandlerFault>;

type HandlerFn = Box<dyn Fn(&[ScriptArg]) -> HandlerResult>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct HandlerKey {
    owner: String,
    name: String,
    arity: usize,
}

/// What invoking a handler produced. A missing entry (unknown name or a
/// same-named entry with a different arity) is a soft miss so fallback
/// chains keep walking; a fault is reported but never propagated.
#[derive(Debug)]
pub enum InvokeOutcome {
    Missing,
    Fault(HandlerFault),
    Ran(Sequence),
}

/// Load-time mapping from (owner script, handler name, arity) to the typed
/// callable that builds the handler's sequence. Built once per script
/// object; lookup never errors.
#[derive(Default)]
pub struct CallbackRegistry {
    handlers: BTreeMap<HandlerKey, HandlerFn>,
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler; a later registration for the same key replaces
    /// the earlier one. Returns whether an entry was replaced.
    pub fn register(
        &mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        arity: usize,
        handler: impl Fn(&[ScriptArg]) -> HandlerResult + 'static,
    ) -> bool {
        self.handlers
            .insert(
                HandlerKey {
                    owner: owner.into(),
                    name: name.into(),
                    arity,
                },
                Box::new(handler),
            )
            .is_some()
    }

    pub fn contains(&self, owner: &str, name: &str, arity: usize) -> bool {
        self.handlers.contains_key(&HandlerKey {
            owner: owner.to_string(),
            name: name.to_string(),
            arity,
        })
    }

    /// Invokes the handler registered for (owner, name, args.len()). The
    /// invocation boundary turns a builder failure into `Fault`, which the
    /// dispatcher treats as "handler did not run".
    pub fn invoke(&self, owner: &str, name: &str, args: &[ScriptArg]) -> InvokeOutcome {
        let key = HandlerKey {
            owner: owner.to_string(),
            name: name.to_string(),
            arity: args.len(),
        };
        let Some(handler) = self.handlers.get(&key) else {
            return InvokeOutcome::Missing;
        };
        match handler(args) {
            Ok(sequence) => InvokeOutcome::Ran(sequence),
            Err(fault) => InvokeOutcome::Fault(fault),
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::ClickableId;

    fn door_arg() -> Vec<ScriptArg> {
        vec![ScriptArg::Clickable(ClickableId::hotspot("door"))]
    }

    #[test]
    fn lookup_misses_softly_on_unknown_names() {
        let registry = CallbackRegistry::new();
        assert!(matches!(
            registry.invoke("room.office", "OnInteract", &door_arg()),
            InvokeOutcome::Missing
        ));
    }

    #[test]
    fn arity_mismatch_is_a_miss_not_an_error() {
        let mut registry = CallbackRegistry::new();
        registry.register("room.office", "OnUseInv", 2, |_| {
            Ok(Sequence::empty("use_inv"))
        });

        assert!(matches!(
            registry.invoke("room.office", "OnUseInv", &door_arg()),
            InvokeOutcome::Missing
        ));
        let two = vec![
            ScriptArg::Clickable(ClickableId::hotspot("door")),
            ScriptArg::Clickable(ClickableId::inventory("key")),
        ];
        assert!(matches!(
            registry.invoke("room.office", "OnUseInv", &two),
            InvokeOutcome::Ran(_)
        ));
    }

    #[test]
    fn faults_are_reported_not_propagated() {
        let mut registry = CallbackRegistry::new();
        registry.register("hotspot.door", "OnInteract", 1, |_| {
            Err(HandlerFault::new("door script broke"))
        });

        match registry.invoke("hotspot.door", "OnInteract", &door_arg()) {
            InvokeOutcome::Fault(fault) => {
                assert_eq!(fault.to_string(), "door script broke");
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let mut registry = CallbackRegistry::new();
        assert!(!registry.register("global", "UnhandledInteract", 1, |_| {
            Ok(Sequence::empty("first"))
        }));
        assert!(registry.register("global", "UnhandledInteract", 1, |_| {
            Ok(Sequence::empty("second"))
        }));
        assert_eq!(registry.len(), 1);

        match registry.invoke("global", "UnhandledInteract", &door_arg()) {
            InvokeOutcome::Ran(sequence) => assert_eq!(sequence.label(), "second"),
            other => panic!("expected sequence, got {other:?}"),
        }
    }
}
