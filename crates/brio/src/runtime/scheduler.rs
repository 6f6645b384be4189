//! The moment loop. Changes buffer in the change log; at each moment
//! boundary the scheduler fires every affected trigger exactly once, in
//! registration order, then advances the clock by exactly one moment so the
//! boundary does not drift.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::diagnostics::RuntimeError;
use crate::values::{TriggerEvent, TriggerValue, Value, ValueId};

use super::events::EventKind;
use super::interpreter::Unwind;
use super::Runtime;

/// Cooperative stop flag, checked between ticks. Stopping never aborts a
/// trigger or statement in progress.
#[derive(Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub(crate) fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub(crate) struct MomentClock {
    duration: Duration,
    last_moment: Instant,
    pub(crate) counter: u64,
    /// Whether the first moment (and with it the startup triggers) has run.
    started: bool,
    shut_down: bool,
    /// Trigger names pushed past a moment budget, owed to the next moment.
    deferred: Vec<String>,
}

impl MomentClock {
    pub(crate) fn new(duration: Duration) -> Self {
        Self {
            duration,
            last_moment: Instant::now(),
            counter: 0,
            started: false,
            shut_down: false,
            deferred: Vec::new(),
        }
    }
}

impl Runtime {
    /// Arms the moment clock. Startup triggers fire at the first boundary.
    pub fn start(&mut self) {
        self.stop.reset();
        self.clock.last_moment = Instant::now();
        self.clock.started = false;
        self.clock.shut_down = false;
        self.clock.counter = 0;
        self.clock.deferred.clear();
    }

    /// Flags the loop to stop between ticks.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Handle external code can use to stop a running loop.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn moment_index(&self) -> u64 {
        self.clock.counter
    }

    /// One scheduler poll. Fires a moment when a full moment duration has
    /// elapsed since the previous boundary; returns whether it did.
    pub fn tick_at(&mut self, now: Instant) -> bool {
        if now.duration_since(self.clock.last_moment) < self.clock.duration {
            return false;
        }
        self.fire_moment();
        // Advance by the moment length, not to `now`, to avoid drift.
        self.clock.last_moment += self.clock.duration;
        true
    }

    /// Runs the moment loop until stopped, or until `run_for` elapses.
    /// Arm the clock with [`Runtime::start`] first. Fires shutdown triggers
    /// on the way out.
    pub fn run(&mut self, run_for: Option<Duration>) {
        let deadline = run_for.map(|duration| Instant::now() + duration);
        let poll = self.options.poll_interval();
        loop {
            if self.stop.is_stopped() {
                break;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                break;
            }
            self.tick_at(Instant::now());
            std::thread::sleep(poll);
        }
        self.shutdown();
    }

    /// Fires shutdown triggers once. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if self.clock.shut_down {
            return;
        }
        self.clock.shut_down = true;
        for (name, id, event, _) in self.deps.triggers() {
            if event == TriggerEvent::Shutdown {
                self.fire_trigger(&name, id);
            }
        }
    }

    /// Fires a custom-event trigger by name. Returns whether the name was
    /// registered as a custom trigger.
    pub fn fire_custom(&mut self, name: &str) -> bool {
        let Some(id) = self.deps.trigger_handle(name) else {
            return false;
        };
        let Value::Trigger(trigger) = self.store.get(id) else {
            return false;
        };
        if trigger.event != TriggerEvent::Custom {
            return false;
        }
        self.fire_trigger(name, id);
        true
    }

    fn fire_moment(&mut self) {
        let changed = self.changes.drain();
        let deferred = std::mem::take(&mut self.clock.deferred);
        let first_moment = !self.clock.started;

        // Snapshot: triggers registered while firing join the next moment.
        // Triggers owed from a budget-cut moment go first so a tight budget
        // cannot starve them behind re-affected earlier registrations.
        let mut queue: Vec<(String, ValueId)> = Vec::new();
        for name in &deferred {
            if let Some(id) = self.deps.trigger_handle(name) {
                queue.push((name.clone(), id));
            }
        }
        for (name, id, event, watched) in self.deps.triggers() {
            if queue.iter().any(|(queued, _)| queued == &name) {
                continue;
            }
            let affected = match event {
                TriggerEvent::Startup => first_moment,
                TriggerEvent::Timer => true,
                TriggerEvent::DataChanged => {
                    (changed.pessimistic && !watched.is_empty())
                        || watched.iter().any(|name| changed.names.contains(name))
                }
                TriggerEvent::Shutdown | TriggerEvent::Custom => false,
            };
            if affected {
                queue.push((name, id));
            }
        }

        if !queue.is_empty() || !changed.is_empty() {
            debug!(
                moment = self.clock.counter,
                changed = changed.names.len(),
                affected = queue.len(),
                "moment boundary"
            );
        }

        let budget = self.options.moment_budget_ms.map(Duration::from_millis);
        let moment_start = Instant::now();
        for (position, (name, id)) in queue.iter().enumerate() {
            // At least one trigger always runs, so a tight budget cannot
            // starve the queue across moments.
            if let Some(budget) = budget {
                if position > 0 && moment_start.elapsed() > budget {
                    let remaining: Vec<String> =
                        queue[position..].iter().map(|(name, _)| name.clone()).collect();
                    self.emit(
                        EventKind::MomentBudgetExceeded,
                        name,
                        Some(format!("{} triggers deferred", remaining.len())),
                    );
                    self.clock.deferred = remaining;
                    break;
                }
            }
            self.fire_trigger(name, *id);
        }

        self.clock.started = true;
        self.clock.counter += 1;
    }

    /// Evaluates one trigger's condition and, when it holds, its action.
    /// Failures are reported through the hook and never abort the moment.
    fn fire_trigger(&mut self, name: &str, id: ValueId) {
        let Value::Trigger(trigger) = self.store.get(id).clone() else {
            return;
        };
        let globals = self.globals.clone();
        match self.condition_holds(trigger.condition, &globals) {
            Ok(true) => {
                self.emit(EventKind::TriggerFired, name, None);
                if let Err(err) = self.run_action(&trigger, &globals) {
                    self.emit(EventKind::TriggerError, name, Some(err.to_string()));
                }
            }
            Ok(false) => {}
            Err(err) => {
                self.emit(EventKind::TriggerError, name, Some(err.to_string()));
            }
        }
    }

    fn run_action(&mut self, trigger: &TriggerValue, env: &super::Env) -> Result<(), RuntimeError> {
        match self.eval(trigger.action, env) {
            Ok(_) => Ok(()),
            Err(Unwind::Return(_)) => Err(RuntimeError::ReturnOutsideFunction(
                "return escaped a trigger action".to_string(),
            )),
            Err(Unwind::Err(err)) => Err(err),
        }
    }
}
