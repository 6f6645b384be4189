//! The runtime owner. Evaluator, constraint engine, and moment scheduler
//! all need each other; they live as sibling fields behind [`Runtime`] and
//! every cross-reference flows through it.

pub mod environment;
pub mod events;

mod changelog;
mod constraints;
mod deps;
mod interpreter;
mod natives;
mod scheduler;
mod snapshot;

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::ast::{AstArena, AstProgram, NodeId};
use crate::diagnostics::RuntimeError;
use crate::store::ValueStore;
use crate::values::{Value, ValueId};

use changelog::ChangeLog;
use deps::{extract_watched_names, DependencyIndex, ReactiveKind};
use environment::Env;
use events::{EventHook, EventKind, RuntimeEvent};
use interpreter::Unwind;
use scheduler::MomentClock;

pub use scheduler::StopHandle;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Length of one moment in milliseconds.
    pub moment_duration_ms: u64,
    /// Scheduler polling interval; clamped to the moment duration.
    pub poll_interval_ms: u64,
    /// Currency applied to money literals and number-to-money conversion.
    pub default_currency: String,
    /// Maximum healing recursion depth before HealingOverflow.
    pub healing_depth: u32,
    /// Optional per-moment trigger budget; exceeding it defers the rest of
    /// the moment's triggers to the next moment.
    pub moment_budget_ms: Option<u64>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            moment_duration_ms: 333,
            poll_interval_ms: 20,
            default_currency: "USD".to_string(),
            healing_depth: 16,
            moment_budget_ms: None,
        }
    }
}

impl RuntimeOptions {
    pub fn moment_duration(&self) -> Duration {
        Duration::from_millis(self.moment_duration_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.min(self.moment_duration_ms.max(1)))
    }
}

pub struct Runtime {
    pub(crate) options: RuntimeOptions,
    pub(crate) store: ValueStore,
    pub(crate) asts: AstArena,
    pub(crate) globals: Env,
    pub(crate) deps: DependencyIndex,
    pub(crate) changes: ChangeLog,
    pub(crate) clock: MomentClock,
    pub(crate) stop: StopHandle,
    pub(crate) hook: Option<EventHook>,
    /// Current healing recursion depth; bounded by the options.
    pub(crate) healing_depth: u32,
}

impl Runtime {
    pub fn new(options: RuntimeOptions) -> Self {
        let clock = MomentClock::new(options.moment_duration());
        let mut runtime = Self {
            options,
            store: ValueStore::new(),
            asts: AstArena::new(),
            globals: Env::new(None),
            deps: DependencyIndex::default(),
            changes: ChangeLog::default(),
            clock,
            stop: StopHandle::default(),
            hook: None,
            healing_depth: 0,
        };
        natives::install(&mut runtime);
        runtime
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn store(&self) -> &ValueStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ValueStore {
        &mut self.store
    }

    pub fn arena(&self) -> &AstArena {
        &self.asts
    }

    pub fn arena_mut(&mut self) -> &mut AstArena {
        &mut self.asts
    }

    pub fn globals(&self) -> &Env {
        &self.globals
    }

    pub fn render(&self, id: ValueId) -> String {
        self.store.render(id)
    }

    pub fn on_event(&mut self, hook: EventHook) {
        self.hook = Some(hook);
    }

    pub(crate) fn emit(&self, kind: EventKind, subject_name: &str, payload: Option<String>) {
        if let Some(hook) = &self.hook {
            hook(&RuntimeEvent {
                moment_index: self.clock.counter,
                kind,
                subject_name: subject_name.to_string(),
                payload,
            });
        }
    }

    /// Registers a trigger value. Its watched names come from the condition
    /// and the action; it participates from the next moment on.
    pub fn register_trigger(&mut self, id: ValueId) -> Result<(), RuntimeError> {
        let Value::Trigger(trigger) = self.store.get(id) else {
            return Err(RuntimeError::InvalidValue(format!(
                "register_trigger needs a trigger, got {}",
                self.store.get(id).kind_name()
            )));
        };
        let trigger = trigger.clone();
        let mut watched = extract_watched_names(&self.asts, trigger.condition);
        watched.extend(extract_watched_names(&self.asts, trigger.action));
        self.deps.register(
            trigger.name.clone(),
            id,
            ReactiveKind::Trigger(trigger.event),
            watched,
        );
        Ok(())
    }

    pub fn unregister_trigger(&mut self, name: &str) -> bool {
        self.deps.unregister(
            name,
            ReactiveKind::Trigger(crate::values::TriggerEvent::DataChanged),
        )
    }

    /// Registers a constraint value. The constraint must already hold in the
    /// current state; a false condition fails with ConstraintViolation.
    pub fn register_constraint(&mut self, id: ValueId) -> Result<(), RuntimeError> {
        let Value::Constraint(constraint) = self.store.get(id) else {
            return Err(RuntimeError::InvalidValue(format!(
                "register_constraint needs a constraint, got {}",
                self.store.get(id).kind_name()
            )));
        };
        let constraint = constraint.clone();
        let globals = self.globals.clone();
        if !self.condition_holds(constraint.condition, &globals)? {
            return Err(RuntimeError::ConstraintViolation(format!(
                "constraint {} is not satisfied by the current state",
                constraint.name
            )));
        }
        let mut watched = extract_watched_names(&self.asts, constraint.condition);
        if let Some(healing) = constraint.healing {
            watched.extend(extract_watched_names(&self.asts, healing));
        }
        self.deps
            .register(constraint.name.clone(), id, ReactiveKind::Constraint, watched);
        Ok(())
    }

    pub fn unregister_constraint(&mut self, name: &str) -> bool {
        self.deps.unregister(name, ReactiveKind::Constraint)
    }

    /// Runs a tree already living in the runtime's arena.
    pub fn execute(&mut self, root: NodeId) -> Result<ValueId, RuntimeError> {
        let globals = self.globals.clone();
        match self.eval(root, &globals) {
            Ok(value) => Ok(value),
            Err(Unwind::Return(_)) => Err(RuntimeError::ReturnOutsideFunction(
                "return at the top level".to_string(),
            )),
            Err(Unwind::Err(err)) => Err(err),
        }
    }

    /// Takes ownership of a parsed program and runs it.
    pub fn execute_program(&mut self, program: AstProgram) -> Result<ValueId, RuntimeError> {
        let offset = self.asts.absorb(program.arena)?;
        self.execute(NodeId(program.root.0 + offset))
    }

    /// API-level write to an existing global. Unlike in-language `=`, an
    /// unbound name is an error here.
    pub fn assign(&mut self, name: &str, value: ValueId) -> Result<(), RuntimeError> {
        let globals = self.globals.clone();
        let Some(frame) = globals.defining_frame(name) else {
            return Err(RuntimeError::UndefinedName(name.to_string()));
        };
        match self.write_binding(&frame, name, Some(name.to_string()), value, &globals) {
            Ok(()) => Ok(()),
            Err(Unwind::Err(err)) => Err(err),
            Err(Unwind::Return(_)) => Err(RuntimeError::ReturnOutsideFunction(
                "return escaped a constraint body".to_string(),
            )),
        }
    }

    /// Defines a global binding without running the constraint protocol.
    /// Intended for wiring up initial state before constraints exist.
    pub fn define(&mut self, name: &str, value: ValueId) {
        self.globals.define(name, value);
    }

    pub fn lookup(&self, name: &str) -> Option<ValueId> {
        self.globals.lookup(name)
    }

    /// Committed write history of a binding, newest first.
    pub fn history(&self, name: &str) -> Vec<(ValueId, SystemTime)> {
        self.globals.history(name)
    }

    /// Re-parents a record. Fails when either handle is not a record or the
    /// new chain would contain a cycle.
    pub fn set_parent(&mut self, record: ValueId, parent: ValueId) -> Result<(), RuntimeError> {
        if !matches!(self.store.get(record), Value::Record(_)) {
            return Err(RuntimeError::InvalidValue(
                "set_parent target must be a record".to_string(),
            ));
        }
        if !matches!(self.store.get(parent), Value::Record(_)) {
            return Err(RuntimeError::InvalidValue(
                "set_parent parent must be a record".to_string(),
            ));
        }
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == record {
                return Err(RuntimeError::InvalidValue(
                    "set_parent would create a parent cycle".to_string(),
                ));
            }
            cursor = match self.store.get(id) {
                Value::Record(value) => value.parent,
                _ => None,
            };
        }
        let Value::Record(value) = self.store.get_mut(record) else {
            unreachable!("checked above");
        };
        value.parent = Some(parent);
        Ok(())
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeOptions::default())
    }
}
