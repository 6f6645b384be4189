//! Tree-walking evaluator. Operands and arguments evaluate left to right;
//! every write funnels through [`Runtime::write_binding`] or its member and
//! index counterparts, which validate constraints, heal, and either commit
//! into the change log or roll back.

use std::time::SystemTime;

use crate::algebra;
use crate::ast::{BinaryOp, NodeId, NodeKind, UnaryOp};
use crate::diagnostics::{Position, RuntimeError};
use crate::literal;
use crate::values::{FunctionBody, Value, ValueId};

use super::environment::Env;
use super::Runtime;

/// Non-local exits during evaluation: a runtime failure, or a `return`
/// travelling up to the enclosing call frame.
pub(crate) enum Unwind {
    Err(RuntimeError),
    Return(ValueId),
}

impl From<RuntimeError> for Unwind {
    fn from(err: RuntimeError) -> Self {
        Unwind::Err(err)
    }
}

pub(crate) type Eval<T> = Result<T, Unwind>;

impl Runtime {
    pub(crate) fn eval(&mut self, id: NodeId, env: &Env) -> Eval<ValueId> {
        let node = self.asts.get(id).clone();
        let pos = node.pos;
        match node.kind {
            NodeKind::LitNumber { text } => {
                let value: f64 = text.parse().map_err(|_| {
                    RuntimeError::InvalidValue(format!(
                        "\"{text}\" is not a number literal{}",
                        pos.describe()
                    ))
                })?;
                Ok(self.store.number(value)?)
            }
            NodeKind::LitText { text } => Ok(self.store.text(text)?),
            NodeKind::LitMoney { text } => {
                let money = literal::parse_money(&text, &self.options.default_currency)?;
                Ok(self.store.money(money.amount, &money.currency)?)
            }
            NodeKind::LitDate { text } => {
                let date = literal::parse_date(&text)?;
                Ok(self.store.date(date.year, date.month, date.day)?)
            }
            NodeKind::LitTime { text } => {
                let time = literal::parse_time(&text)?;
                Ok(self
                    .store
                    .time(time.hour, time.minute, time.second, time.millisecond)?)
            }
            NodeKind::LitDateTime { text } => {
                let value = literal::parse_date_time(&text)?;
                Ok(self.store.date_time(value.date, value.time)?)
            }
            NodeKind::LitPercentage { text } => {
                let value: f64 = text.parse().map_err(|_| {
                    RuntimeError::InvalidValue(format!(
                        "\"{text}\" is not a percentage literal{}",
                        pos.describe()
                    ))
                })?;
                Ok(self.store.percentage(value)?)
            }
            NodeKind::LitRatio {
                numerator,
                denominator,
            } => Ok(self.store.ratio(numerator, denominator)?),
            NodeKind::LitBoolean { value } => Ok(self.store.boolean(value)?),
            NodeKind::LitUnknown => Ok(self.store.unknown()?),
            NodeKind::LitNil => Ok(self.store.nil()?),
            NodeKind::Ident { name } => env.lookup(&name).ok_or_else(|| {
                Unwind::Err(RuntimeError::UndefinedName(format!(
                    "{name}{}",
                    pos.describe()
                )))
            }),
            NodeKind::Unary { op, expr } => {
                let operand = self.eval(expr, env)?;
                let result = match op {
                    UnaryOp::Neg => algebra::negate(&mut self.store, operand, pos)?,
                    UnaryOp::Not => algebra::not(&mut self.store, operand, pos)?,
                };
                Ok(result)
            }
            NodeKind::Binary { op, left, right } => self.eval_binary(op, left, right, env, pos),
            NodeKind::Member { object, field } => {
                let object = self.eval(object, env)?;
                match self.store.get(object) {
                    Value::Record(_) => {
                        self.store.record_lookup(object, &field).ok_or_else(|| {
                            Unwind::Err(RuntimeError::UndefinedName(format!(
                                "record has no field {field}{}",
                                pos.describe()
                            )))
                        })
                    }
                    other => Err(Unwind::Err(RuntimeError::TypeMismatch(format!(
                        "member access on {}{}",
                        other.kind_name(),
                        pos.describe()
                    )))),
                }
            }
            NodeKind::Index { base, index } => {
                let base = self.eval(base, env)?;
                let index = self.eval(index, env)?;
                self.eval_index(base, index, pos)
            }
            NodeKind::Call { callee, args } => self.eval_call(callee, &args, env, pos),
            NodeKind::Assign { target, value } => {
                let rhs = self.eval(value, env)?;
                self.assign_into(target, rhs, env, pos)?;
                Ok(rhs)
            }
            NodeKind::Block { items } => {
                let frame = env.child();
                let mut last = None;
                for item in items {
                    last = Some(self.eval(item, &frame)?);
                }
                match last {
                    Some(value) => Ok(value),
                    None => Ok(self.store.nil()?),
                }
            }
            NodeKind::ExprStmt { expr } => self.eval(expr, env),
            NodeKind::Let { name, init } => {
                // A declaration without an initializer binds "no value
                // observed yet", and the binding change runs the same
                // protocol as any other write.
                let value = match init {
                    Some(init) => self.eval(init, env)?,
                    None => self.store.unknown()?,
                };
                self.write_binding(env, &name, Some(name.clone()), value, env)?;
                Ok(value)
            }
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_condition(cond, env)? {
                    self.eval(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.eval(else_branch, env)
                } else {
                    Ok(self.store.nil()?)
                }
            }
            NodeKind::While { cond, body } => {
                while self.eval_condition(cond, env)? {
                    self.eval(body, env)?;
                }
                Ok(self.store.nil()?)
            }
            NodeKind::For {
                init,
                cond,
                update,
                body,
            } => {
                let frame = env.child();
                if let Some(init) = init {
                    self.eval(init, &frame)?;
                }
                loop {
                    let keep_going = match cond {
                        Some(cond) => self.eval_condition(cond, &frame)?,
                        None => true,
                    };
                    if !keep_going {
                        break;
                    }
                    self.eval(body, &frame)?;
                    if let Some(update) = update {
                        self.eval(update, &frame)?;
                    }
                }
                Ok(self.store.nil()?)
            }
            NodeKind::ForIn {
                name,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable, env)?;
                let items: Vec<ValueId> = match self.store.get(iterable) {
                    Value::List(items) => items.clone(),
                    Value::Text(text) => {
                        let bytes = text.as_bytes().to_vec();
                        let mut chars = Vec::with_capacity(bytes.len());
                        for byte in bytes {
                            let piece = String::from_utf8_lossy(&[byte]).into_owned();
                            chars.push(self.store.text(piece)?);
                        }
                        chars
                    }
                    other => {
                        return Err(Unwind::Err(RuntimeError::TypeMismatch(format!(
                            "cannot iterate {}{}",
                            other.kind_name(),
                            pos.describe()
                        ))))
                    }
                };
                for item in items {
                    let frame = env.child();
                    frame.define(&name, item);
                    self.eval(body, &frame)?;
                }
                Ok(self.store.nil()?)
            }
            NodeKind::Return { value } => {
                let value = match value {
                    Some(value) => self.eval(value, env)?,
                    None => self.store.nil()?,
                };
                Err(Unwind::Return(value))
            }
            NodeKind::Param { name } => Err(Unwind::Err(RuntimeError::InvalidValue(format!(
                "parameter {name} outside a function definition{}",
                pos.describe()
            )))),
            NodeKind::FunctionDef { name, params, body } => {
                let mut param_names = Vec::with_capacity(params.len());
                for param in &params {
                    let NodeKind::Param { name } = &self.asts.get(*param).kind else {
                        return Err(Unwind::Err(RuntimeError::InvalidValue(format!(
                            "function {name} has a malformed parameter list{}",
                            pos.describe()
                        ))));
                    };
                    param_names.push(name.clone());
                }
                let function =
                    self.store
                        .function(name.clone(), param_names, body, Some(env.clone()))?;
                env.define(&name, function);
                Ok(function)
            }
            NodeKind::ListLit { items } => {
                let mut elements = Vec::with_capacity(items.len());
                for item in items {
                    elements.push(self.eval(item, env)?);
                }
                Ok(self.store.list(elements)?)
            }
            NodeKind::RecordLit { fields } => {
                let mut map = std::collections::HashMap::with_capacity(fields.len());
                for field in fields {
                    let value = self.eval(field.value, env)?;
                    map.insert(field.name, value);
                }
                Ok(self.store.record(map, None)?)
            }
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
        env: &Env,
        pos: Position,
    ) -> Eval<ValueId> {
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let operand = self.eval(left, env)?;
            let lhs = self.expect_boolean(operand, pos)?;
            // Short-circuit; the right operand only runs when it decides.
            let decided = match op {
                BinaryOp::And => !lhs,
                _ => lhs,
            };
            if decided {
                return Ok(self.store.boolean(lhs)?);
            }
            let operand = self.eval(right, env)?;
            let rhs = self.expect_boolean(operand, pos)?;
            return Ok(self.store.boolean(rhs)?);
        }

        let lhs = self.eval(left, env)?;
        let rhs = self.eval(right, env)?;
        let result = match op {
            BinaryOp::Add => algebra::add(&mut self.store, lhs, rhs, pos)?,
            BinaryOp::Sub => algebra::subtract(&mut self.store, lhs, rhs, pos)?,
            BinaryOp::Mul => algebra::multiply(&mut self.store, lhs, rhs, pos)?,
            BinaryOp::Div => algebra::divide(&mut self.store, lhs, rhs, pos)?,
            BinaryOp::Eq => {
                let ordering = algebra::compare(&self.store, lhs, rhs)?;
                self.store.boolean(ordering == std::cmp::Ordering::Equal)?
            }
            BinaryOp::Ne => {
                let ordering = algebra::compare(&self.store, lhs, rhs)?;
                self.store.boolean(ordering != std::cmp::Ordering::Equal)?
            }
            BinaryOp::Lt => {
                let ordering = algebra::compare(&self.store, lhs, rhs)?;
                self.store.boolean(ordering == std::cmp::Ordering::Less)?
            }
            BinaryOp::Le => {
                let ordering = algebra::compare(&self.store, lhs, rhs)?;
                self.store.boolean(ordering != std::cmp::Ordering::Greater)?
            }
            BinaryOp::Gt => {
                let ordering = algebra::compare(&self.store, lhs, rhs)?;
                self.store.boolean(ordering == std::cmp::Ordering::Greater)?
            }
            BinaryOp::Ge => {
                let ordering = algebra::compare(&self.store, lhs, rhs)?;
                self.store.boolean(ordering != std::cmp::Ordering::Less)?
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        };
        Ok(result)
    }

    fn eval_index(&mut self, base: ValueId, index: ValueId, pos: Position) -> Eval<ValueId> {
        let offset = match self.store.get(index) {
            Value::Number(value) if value.fract() == 0.0 => *value as i64,
            other => {
                return Err(Unwind::Err(RuntimeError::TypeMismatch(format!(
                    "index must be an integer number, got {}{}",
                    other.kind_name(),
                    pos.describe()
                ))))
            }
        };
        match self.store.get(base) {
            Value::List(items) => {
                if offset < 0 || offset as usize >= items.len() {
                    return Err(Unwind::Err(RuntimeError::IndexOutOfRange(format!(
                        "index {offset} of list with {} elements{}",
                        items.len(),
                        pos.describe()
                    ))));
                }
                Ok(items[offset as usize])
            }
            Value::Text(text) => {
                if offset < 0 || offset as usize >= text.len() {
                    return Err(Unwind::Err(RuntimeError::IndexOutOfRange(format!(
                        "index {offset} of text with {} bytes{}",
                        text.len(),
                        pos.describe()
                    ))));
                }
                let byte = text.as_bytes()[offset as usize];
                let piece = String::from_utf8_lossy(&[byte]).into_owned();
                Ok(self.store.text(piece)?)
            }
            other => Err(Unwind::Err(RuntimeError::TypeMismatch(format!(
                "cannot index {}{}",
                other.kind_name(),
                pos.describe()
            )))),
        }
    }

    fn eval_call(
        &mut self,
        callee: NodeId,
        args: &[NodeId],
        env: &Env,
        pos: Position,
    ) -> Eval<ValueId> {
        let callee = self.eval(callee, env)?;
        let Value::Function(function) = self.store.get(callee).clone() else {
            return Err(Unwind::Err(RuntimeError::InvalidCallTarget(format!(
                "cannot call {}{}",
                self.store.get(callee).kind_name(),
                pos.describe()
            ))));
        };
        let mut arguments = Vec::with_capacity(args.len());
        for arg in args {
            arguments.push(self.eval(*arg, env)?);
        }
        if arguments.len() != function.params.len() {
            return Err(Unwind::Err(RuntimeError::ArgumentMismatch(format!(
                "function {} expects {} arguments, got {}{}",
                function.name,
                function.params.len(),
                arguments.len(),
                pos.describe()
            ))));
        }
        match function.body {
            FunctionBody::Native(native) => Ok(native(&mut self.store, &arguments, pos)?),
            FunctionBody::Ast(body) => {
                let parent = function.env.clone().unwrap_or_else(|| self.globals.clone());
                let frame = Env::new(Some(parent));
                for (param, argument) in function.params.iter().zip(&arguments) {
                    frame.define(param, *argument);
                }
                match self.eval(body, &frame) {
                    Ok(value) => Ok(value),
                    Err(Unwind::Return(value)) => Ok(value),
                    Err(err) => Err(err),
                }
            }
        }
    }

    fn expect_boolean(&self, id: ValueId, pos: Position) -> Eval<bool> {
        match self.store.get(id) {
            Value::Boolean(value) => Ok(*value),
            other => Err(Unwind::Err(RuntimeError::TypeMismatch(format!(
                "logical operand must be boolean, got {}{}",
                other.kind_name(),
                pos.describe()
            )))),
        }
    }

    fn eval_condition(&mut self, cond: NodeId, env: &Env) -> Eval<bool> {
        let pos = self.asts.get(cond).pos;
        let value = self.eval(cond, env)?;
        match self.store.get(value) {
            Value::Boolean(value) => Ok(*value),
            other => Err(Unwind::Err(RuntimeError::TypeMismatch(format!(
                "condition must be boolean, got {}{}",
                other.kind_name(),
                pos.describe()
            )))),
        }
    }

    /// The assignment protocol for `=` on identifier, member, and index
    /// targets. The right-hand side has already been evaluated.
    fn assign_into(
        &mut self,
        target: NodeId,
        rhs: ValueId,
        env: &Env,
        pos: Position,
    ) -> Eval<()> {
        let target_node = self.asts.get(target).clone();
        match target_node.kind {
            NodeKind::Ident { name } => {
                // An unbound identifier target creates the binding in the
                // innermost frame, matching the original interpreter.
                let frame = env.defining_frame(&name).unwrap_or_else(|| env.clone());
                self.write_binding(&frame, &name, Some(name.clone()), rhs, env)
            }
            NodeKind::Member { object, field } => {
                let affected = self.member_path(target);
                let record = self.eval(object, env)?;
                if !matches!(self.store.get(record), Value::Record(_)) {
                    return Err(Unwind::Err(RuntimeError::TypeMismatch(format!(
                        "member assignment on {}{}",
                        self.store.get(record).kind_name(),
                        pos.describe()
                    ))));
                }
                self.write_record_field(record, &field, affected, rhs, env)
            }
            NodeKind::Index { base, index } => {
                let affected = match (
                    &self.asts.get(base).kind,
                    super::deps::constant_index(&self.asts, index),
                ) {
                    (NodeKind::Ident { name }, Some(offset)) => Some(format!("{name}[{offset}]")),
                    _ => None,
                };
                let list = self.eval(base, env)?;
                let index = self.eval(index, env)?;
                let offset = match self.store.get(index) {
                    Value::Number(value) if value.fract() == 0.0 => *value as i64,
                    other => {
                        return Err(Unwind::Err(RuntimeError::TypeMismatch(format!(
                            "index must be an integer number, got {}{}",
                            other.kind_name(),
                            pos.describe()
                        ))))
                    }
                };
                let Value::List(items) = self.store.get(list) else {
                    return Err(Unwind::Err(RuntimeError::TypeMismatch(format!(
                        "index assignment on {}{}",
                        self.store.get(list).kind_name(),
                        pos.describe()
                    ))));
                };
                if offset < 0 || offset as usize >= items.len() {
                    return Err(Unwind::Err(RuntimeError::IndexOutOfRange(format!(
                        "index {offset} of list with {} elements{}",
                        items.len(),
                        pos.describe()
                    ))));
                }
                self.write_list_element(list, offset as usize, affected, rhs, env)
            }
            _ => Err(Unwind::Err(RuntimeError::InvalidAssignmentTarget(format!(
                "cannot assign to this expression{}",
                pos.describe()
            )))),
        }
    }

    /// Commits a named binding write: skip when nothing changes, install
    /// tentatively, enforce constraints, then log or roll back.
    pub(crate) fn write_binding(
        &mut self,
        frame: &Env,
        name: &str,
        affected: Option<String>,
        value: ValueId,
        env: &Env,
    ) -> Eval<()> {
        let prior = frame.local(name);
        if let Some(prior) = prior {
            if algebra::structurally_equal(&self.store, prior, value) {
                return Ok(());
            }
        }
        frame.install(name, value, SystemTime::now());
        match self.enforce_constraints(affected.as_deref(), env) {
            Ok(()) => {
                self.log_change(affected);
                Ok(())
            }
            Err(err) => {
                frame.rollback(name, prior);
                Err(Unwind::Err(err))
            }
        }
    }

    fn write_record_field(
        &mut self,
        record: ValueId,
        field: &str,
        affected: Option<String>,
        value: ValueId,
        env: &Env,
    ) -> Eval<()> {
        // Writes stay local to the record; only reads walk the parent chain.
        let prior = match self.store.get(record) {
            Value::Record(existing) => existing.fields.get(field).copied(),
            _ => None,
        };
        if let Some(prior) = prior {
            if algebra::structurally_equal(&self.store, prior, value) {
                return Ok(());
            }
        }
        if let Value::Record(existing) = self.store.get_mut(record) {
            existing.fields.insert(field.to_string(), value);
        }
        match self.enforce_constraints(affected.as_deref(), env) {
            Ok(()) => {
                self.log_change(affected);
                Ok(())
            }
            Err(err) => {
                if let Value::Record(existing) = self.store.get_mut(record) {
                    match prior {
                        Some(prior) => existing.fields.insert(field.to_string(), prior),
                        None => existing.fields.remove(field),
                    };
                }
                Err(Unwind::Err(err))
            }
        }
    }

    fn write_list_element(
        &mut self,
        list: ValueId,
        offset: usize,
        affected: Option<String>,
        value: ValueId,
        env: &Env,
    ) -> Eval<()> {
        let prior = match self.store.get(list) {
            Value::List(items) => items[offset],
            _ => return Ok(()),
        };
        if algebra::structurally_equal(&self.store, prior, value) {
            return Ok(());
        }
        if let Value::List(items) = self.store.get_mut(list) {
            items[offset] = value;
        }
        match self.enforce_constraints(affected.as_deref(), env) {
            Ok(()) => {
                self.log_change(affected);
                Ok(())
            }
            Err(err) => {
                if let Value::List(items) = self.store.get_mut(list) {
                    items[offset] = prior;
                }
                Err(Unwind::Err(err))
            }
        }
    }

    fn log_change(&mut self, affected: Option<String>) {
        match affected {
            Some(name) => self.changes.mark(name),
            None => self.changes.mark_all(),
        }
    }

    /// Dotted affected-name of a member target, rooted at an identifier.
    /// `None` when the root is not a plain identifier.
    fn member_path(&self, target: NodeId) -> Option<String> {
        match &self.asts.get(target).kind {
            NodeKind::Ident { name } => Some(name.clone()),
            NodeKind::Member { object, field } => {
                let base = self.member_path(*object)?;
                Some(format!("{base}.{field}"))
            }
            _ => None,
        }
    }
}
