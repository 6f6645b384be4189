//! Synchronous constraint enforcement. Runs inside the assignment protocol,
//! between the tentative commit and the change-log mark; the caller rolls
//! the write back when this module reports failure.

use tracing::{debug, warn};

use crate::ast::NodeId;
use crate::diagnostics::{ErrorKind, RuntimeError};
use crate::values::Value;

use super::environment::Env;
use super::events::EventKind;
use super::interpreter::Unwind;
use super::Runtime;

impl Runtime {
    /// Evaluates a reactive condition to a plain boolean. Anything other
    /// than boolean true means "does not hold".
    pub(crate) fn condition_holds(
        &mut self,
        condition: NodeId,
        env: &Env,
    ) -> Result<bool, RuntimeError> {
        match self.eval(condition, env) {
            Ok(value) => Ok(matches!(self.store.get(value), Value::Boolean(true))),
            Err(Unwind::Return(_)) => Err(RuntimeError::ReturnOutsideFunction(
                "return escaped a condition".to_string(),
            )),
            Err(Unwind::Err(err)) => Err(err),
        }
    }

    /// Re-checks every constraint watching `affected` (or all constraints
    /// for a pessimistic write) against the tentatively committed state.
    pub(crate) fn enforce_constraints(
        &mut self,
        affected: Option<&str>,
        env: &Env,
    ) -> Result<(), RuntimeError> {
        let ids = self.deps.constraints_watching(affected);
        for id in ids {
            let Value::Constraint(constraint) = self.store.get(id).clone() else {
                continue;
            };
            let mut detail = None;
            let holds = match self.condition_holds(constraint.condition, env) {
                Ok(holds) => holds,
                Err(err) => {
                    detail = Some(err.to_string());
                    false
                }
            };
            if holds {
                continue;
            }

            if let Some(healing) = constraint.healing {
                debug!(constraint = %constraint.name, "healing invoked");
                self.emit(EventKind::HealingInvoked, &constraint.name, None);
                match self.run_healing(healing, env, &constraint.name) {
                    Ok(()) => {
                        let healed = self
                            .condition_holds(constraint.condition, env)
                            .unwrap_or(false);
                        if healed {
                            continue;
                        }
                        self.emit(EventKind::HealingFailed, &constraint.name, None);
                    }
                    Err(err) if err.kind() == ErrorKind::HealingOverflow => return Err(err),
                    Err(err) => {
                        self.emit(
                            EventKind::HealingFailed,
                            &constraint.name,
                            Some(err.to_string()),
                        );
                    }
                }
            }

            warn!(constraint = %constraint.name, "write rejected");
            self.emit(EventKind::ConstraintViolation, &constraint.name, detail.clone());
            let mut message = format!("constraint {} rejected the write", constraint.name);
            if let Some(detail) = detail {
                message.push_str(&format!(" ({detail})"));
            }
            return Err(RuntimeError::ConstraintViolation(message));
        }
        Ok(())
    }

    /// Runs a healing action with the recursion bound applied. Assignments
    /// inside the action re-enter the constraint engine.
    fn run_healing(
        &mut self,
        healing: NodeId,
        env: &Env,
        constraint_name: &str,
    ) -> Result<(), RuntimeError> {
        if self.healing_depth >= self.options.healing_depth {
            return Err(RuntimeError::HealingOverflow(format!(
                "constraint {constraint_name} exceeded healing depth {}",
                self.options.healing_depth
            )));
        }
        self.healing_depth += 1;
        let result = self.eval(healing, env);
        self.healing_depth -= 1;
        match result {
            Ok(_) => Ok(()),
            Err(Unwind::Return(_)) => Err(RuntimeError::ReturnOutsideFunction(
                "return escaped a healing action".to_string(),
            )),
            Err(Unwind::Err(err)) => Err(err),
        }
    }
}
