use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;

use crate::diagnostics::RuntimeError;
use crate::values::ValueId;

/// One lexical frame chain. Cloning an `Env` shares the frame; new frames
/// are pushed with [`Env::child`] for the dynamic extent of a block or call.
#[derive(Clone)]
pub struct Env {
    inner: Arc<EnvInner>,
}

struct EnvInner {
    parent: Option<Env>,
    bindings: RwLock<HashMap<String, Binding>>,
}

/// Current handle plus the committed write history, oldest first.
struct Binding {
    value: ValueId,
    history: Vec<(ValueId, SystemTime)>,
}

impl Env {
    pub fn new(parent: Option<Env>) -> Self {
        Self {
            inner: Arc::new(EnvInner {
                parent,
                bindings: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn child(&self) -> Env {
        Env::new(Some(self.clone()))
    }

    /// Binds `name` in this frame, shadowing any outer binding.
    pub fn define(&self, name: impl Into<String>, value: ValueId) {
        let name = name.into();
        self.inner.bindings.write().insert(
            name,
            Binding {
                value,
                history: vec![(value, SystemTime::now())],
            },
        );
    }

    /// Walks outward until the name is found.
    pub fn lookup(&self, name: &str) -> Option<ValueId> {
        if let Some(binding) = self.inner.bindings.read().get(name) {
            return Some(binding.value);
        }
        self.inner
            .parent
            .as_ref()
            .and_then(|parent| parent.lookup(name))
    }

    /// Writes to the frame that already defines `name`.
    pub fn assign(&self, name: &str, value: ValueId) -> Result<(), RuntimeError> {
        let Some(frame) = self.defining_frame(name) else {
            return Err(RuntimeError::UndefinedName(name.to_string()));
        };
        frame.install(name, value, SystemTime::now());
        Ok(())
    }

    /// The frame whose local bindings contain `name`, innermost first.
    pub fn defining_frame(&self, name: &str) -> Option<Env> {
        if self.inner.bindings.read().contains_key(name) {
            return Some(self.clone());
        }
        self.inner
            .parent
            .as_ref()
            .and_then(|parent| parent.defining_frame(name))
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.inner.bindings.read().contains_key(name)
    }

    /// Value bound in this frame only, ignoring the parent chain.
    pub(crate) fn local(&self, name: &str) -> Option<ValueId> {
        self.inner
            .bindings
            .read()
            .get(name)
            .map(|binding| binding.value)
    }

    /// Tentative-commit write into this frame: installs the value and pushes
    /// a history entry that [`Env::rollback`] can pop again.
    pub(crate) fn install(&self, name: &str, value: ValueId, asof: SystemTime) {
        let mut bindings = self.inner.bindings.write();
        match bindings.get_mut(name) {
            Some(binding) => {
                binding.value = value;
                binding.history.push((value, asof));
            }
            None => {
                bindings.insert(
                    name.to_string(),
                    Binding {
                        value,
                        history: vec![(value, asof)],
                    },
                );
            }
        }
    }

    /// Undoes the most recent [`Env::install`] for `name` in this frame,
    /// restoring `prior` or removing the binding when there was none.
    pub(crate) fn rollback(&self, name: &str, prior: Option<ValueId>) {
        let mut bindings = self.inner.bindings.write();
        match prior {
            Some(prior) => {
                if let Some(binding) = bindings.get_mut(name) {
                    binding.history.pop();
                    binding.value = prior;
                }
            }
            None => {
                bindings.remove(name);
            }
        }
    }

    /// Name/value pairs bound in this frame, unordered.
    pub(crate) fn local_bindings(&self) -> Vec<(String, ValueId)> {
        self.inner
            .bindings
            .read()
            .iter()
            .map(|(name, binding)| (name.clone(), binding.value))
            .collect()
    }

    /// Committed write history for `name`, newest first. Empty when the
    /// name is not bound anywhere on the chain.
    pub fn history(&self, name: &str) -> Vec<(ValueId, SystemTime)> {
        if let Some(binding) = self.inner.bindings.read().get(name) {
            let mut entries = binding.history.clone();
            entries.reverse();
            return entries;
        }
        self.inner
            .parent
            .as_ref()
            .map(|parent| parent.history(name))
            .unwrap_or_default()
    }
}
