use std::collections::HashMap;

use crate::ast::NodeId;
use crate::diagnostics::RuntimeError;
use crate::literal;
use crate::runtime::environment::Env;
use crate::values::{
    ConstraintValue, DateTimeValue, DateValue, FunctionBody, FunctionValue, MoneyValue, NativeFn,
    RatioValue, RecordValue, TimeValue, TriggerEvent, TriggerValue, Value, ValueId,
};

const MAX_VALUES: usize = (u32::MAX / 2) as usize;

/// Arena owning every live value. Handles stay valid for the runtime's
/// lifetime; nothing is reclaimed during a program run.
#[derive(Debug, Default)]
pub struct ValueStore {
    slots: Vec<Value>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, value: Value) -> Result<ValueId, RuntimeError> {
        if self.slots.len() >= MAX_VALUES {
            return Err(RuntimeError::ResourceExhausted(
                "value store is full".to_string(),
            ));
        }
        let id = ValueId(self.slots.len() as u32);
        self.slots.push(value);
        Ok(id)
    }

    pub fn get(&self, id: ValueId) -> &Value {
        &self.slots[id.index()]
    }

    pub fn get_mut(&mut self, id: ValueId) -> &mut Value {
        &mut self.slots[id.index()]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    // Typed constructors. None of these can leave a partially built value
    // behind: validation happens before the slot is allocated.

    pub fn number(&mut self, value: f64) -> Result<ValueId, RuntimeError> {
        self.alloc(Value::Number(value))
    }

    pub fn text(&mut self, value: impl Into<String>) -> Result<ValueId, RuntimeError> {
        self.alloc(Value::Text(value.into()))
    }

    pub fn money(&mut self, amount: i64, currency: &str) -> Result<ValueId, RuntimeError> {
        if currency.is_empty() || !currency.chars().all(|ch| ch.is_ascii_alphabetic()) {
            return Err(RuntimeError::InvalidValue(format!(
                "\"{currency}\" is not a currency code"
            )));
        }
        self.alloc(Value::Money(MoneyValue {
            amount,
            currency: currency.to_ascii_uppercase(),
        }))
    }

    pub fn time(
        &mut self,
        hour: u32,
        minute: u32,
        second: u32,
        millisecond: u32,
    ) -> Result<ValueId, RuntimeError> {
        let time = TimeValue::new(hour, minute, second, millisecond)?;
        self.alloc(Value::Time(time))
    }

    pub fn date(&mut self, year: i32, month: u32, day: u32) -> Result<ValueId, RuntimeError> {
        let date = DateValue::new(year, month, day)?;
        self.alloc(Value::Date(date))
    }

    pub fn date_time(&mut self, date: DateValue, time: TimeValue) -> Result<ValueId, RuntimeError> {
        DateValue::new(date.year, date.month, date.day)?;
        TimeValue::new(time.hour, time.minute, time.second, time.millisecond)?;
        self.alloc(Value::DateTime(DateTimeValue { date, time }))
    }

    pub fn percentage(&mut self, value: f64) -> Result<ValueId, RuntimeError> {
        self.alloc(Value::Percentage(value))
    }

    pub fn ratio(&mut self, numerator: f64, denominator: f64) -> Result<ValueId, RuntimeError> {
        let ratio = RatioValue::new(numerator, denominator)?;
        self.alloc(Value::Ratio(ratio))
    }

    pub fn boolean(&mut self, value: bool) -> Result<ValueId, RuntimeError> {
        self.alloc(Value::Boolean(value))
    }

    pub fn unknown(&mut self) -> Result<ValueId, RuntimeError> {
        self.alloc(Value::Unknown)
    }

    pub fn nil(&mut self) -> Result<ValueId, RuntimeError> {
        self.alloc(Value::Nil)
    }

    pub fn list(&mut self, items: Vec<ValueId>) -> Result<ValueId, RuntimeError> {
        self.alloc(Value::List(items))
    }

    pub fn record(
        &mut self,
        fields: HashMap<String, ValueId>,
        parent: Option<ValueId>,
    ) -> Result<ValueId, RuntimeError> {
        if let Some(parent) = parent {
            if !matches!(self.get(parent), Value::Record(_)) {
                return Err(RuntimeError::InvalidValue(
                    "record parent must be a record".to_string(),
                ));
            }
        }
        self.alloc(Value::Record(RecordValue { fields, parent }))
    }

    pub fn function(
        &mut self,
        name: impl Into<String>,
        params: Vec<String>,
        body: NodeId,
        env: Option<Env>,
    ) -> Result<ValueId, RuntimeError> {
        let name = name.into();
        for (index, param) in params.iter().enumerate() {
            if params[..index].contains(param) {
                return Err(RuntimeError::InvalidValue(format!(
                    "function {name} repeats parameter {param}"
                )));
            }
        }
        self.alloc(Value::Function(FunctionValue {
            name,
            params,
            body: FunctionBody::Ast(body),
            env,
        }))
    }

    pub fn native_function(
        &mut self,
        name: impl Into<String>,
        params: &[&str],
        body: NativeFn,
    ) -> Result<ValueId, RuntimeError> {
        self.alloc(Value::Function(FunctionValue {
            name: name.into(),
            params: params.iter().map(|param| param.to_string()).collect(),
            body: FunctionBody::Native(body),
            env: None,
        }))
    }

    pub fn trigger(
        &mut self,
        name: impl Into<String>,
        event: TriggerEvent,
        condition: NodeId,
        action: NodeId,
    ) -> Result<ValueId, RuntimeError> {
        self.alloc(Value::Trigger(TriggerValue {
            name: name.into(),
            event,
            condition,
            action,
        }))
    }

    pub fn constraint(
        &mut self,
        name: impl Into<String>,
        condition: NodeId,
        healing: Option<NodeId>,
    ) -> Result<ValueId, RuntimeError> {
        self.alloc(Value::Constraint(ConstraintValue {
            name: name.into(),
            condition,
            healing,
        }))
    }

    /// Recursive structural copy. The copy of a record owns a deep copy of
    /// its whole parent chain, so later mutation of the original chain does
    /// not show through.
    pub fn deep_copy(&mut self, id: ValueId) -> Result<ValueId, RuntimeError> {
        let value = self.get(id).clone();
        match value {
            Value::List(items) => {
                let mut copied = Vec::with_capacity(items.len());
                for item in items {
                    copied.push(self.deep_copy(item)?);
                }
                self.alloc(Value::List(copied))
            }
            Value::Record(record) => {
                let mut fields = HashMap::with_capacity(record.fields.len());
                for (name, field) in record.fields {
                    fields.insert(name, self.deep_copy(field)?);
                }
                let parent = match record.parent {
                    Some(parent) => Some(self.deep_copy(parent)?),
                    None => None,
                };
                self.alloc(Value::Record(RecordValue { fields, parent }))
            }
            other => self.alloc(other),
        }
    }

    /// Record field lookup following the parent chain. Writes never walk the
    /// chain; this is the read path only.
    pub fn record_lookup(&self, record: ValueId, field: &str) -> Option<ValueId> {
        let mut cursor = Some(record);
        while let Some(id) = cursor {
            let Value::Record(record) = self.get(id) else {
                return None;
            };
            if let Some(value) = record.fields.get(field) {
                return Some(*value);
            }
            cursor = record.parent;
        }
        None
    }

    /// Literal printing of a value, lists and records included.
    pub fn render(&self, id: ValueId) -> String {
        match self.get(id) {
            Value::Number(value) => format_number(*value),
            Value::Text(value) => value.clone(),
            Value::Money(value) => literal::format_money(value),
            Value::Time(value) => literal::format_time(*value),
            Value::Date(value) => literal::format_date(*value),
            Value::DateTime(value) => literal::format_date_time(*value),
            Value::Percentage(value) => format!("{}%", format_number(*value)),
            Value::Ratio(value) => {
                format!(
                    "{}/{}",
                    format_number(value.numerator),
                    format_number(value.denominator)
                )
            }
            Value::Boolean(value) => value.to_string(),
            Value::Unknown => "unknown".to_string(),
            Value::Nil => "nil".to_string(),
            Value::List(items) => {
                let rendered: Vec<String> =
                    items.iter().map(|item| self.render_nested(*item)).collect();
                format!("[{}]", rendered.join(", "))
            }
            Value::Record(_) => {
                let mut fields: Vec<(String, ValueId)> = self.effective_fields(id);
                fields.sort_by(|a, b| a.0.cmp(&b.0));
                let rendered: Vec<String> = fields
                    .iter()
                    .map(|(name, value)| format!("{name}: {}", self.render_nested(*value)))
                    .collect();
                format!("{{{}}}", rendered.join(", "))
            }
            Value::Function(function) => {
                format!("<function {}/{}>", function.name, function.params.len())
            }
            Value::Trigger(trigger) => format!("<trigger {}>", trigger.name),
            Value::Constraint(constraint) => format!("<constraint {}>", constraint.name),
        }
    }

    fn render_nested(&self, id: ValueId) -> String {
        match self.get(id) {
            Value::Text(value) => format!("\"{value}\""),
            _ => self.render(id),
        }
    }

    /// Visible fields of a record: own fields shadow inherited ones.
    fn effective_fields(&self, record: ValueId) -> Vec<(String, ValueId)> {
        let mut seen = HashMap::new();
        let mut cursor = Some(record);
        while let Some(id) = cursor {
            let Value::Record(record) = self.get(id) else {
                break;
            };
            for (name, value) in &record.fields {
                seen.entry(name.clone()).or_insert(*value);
            }
            cursor = record.parent;
        }
        seen.into_iter().collect()
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_copy_detaches_record_parent_chain() {
        let mut store = ValueStore::new();
        let name = store.text("Generic Person").unwrap();
        let parent = store
            .record(HashMap::from([("name".to_string(), name)]), None)
            .unwrap();
        let job = store.text("Engineer").unwrap();
        let child = store
            .record(HashMap::from([("job".to_string(), job)]), Some(parent))
            .unwrap();

        let copy = store.deep_copy(child).unwrap();

        let changed = store.text("Changed").unwrap();
        let Value::Record(record) = store.get_mut(parent) else {
            panic!("expected record");
        };
        record.fields.insert("name".to_string(), changed);

        let original_name = store.record_lookup(child, "name").unwrap();
        assert!(matches!(store.get(original_name), Value::Text(t) if t == "Changed"));
        let copied_name = store.record_lookup(copy, "name").unwrap();
        assert!(matches!(store.get(copied_name), Value::Text(t) if t == "Generic Person"));
    }

    #[test]
    fn money_constructor_normalizes_currency() {
        let mut store = ValueStore::new();
        let id = store.money(1_234_500, "usd").unwrap();
        let Value::Money(money) = store.get(id) else {
            panic!("expected money");
        };
        assert_eq!(money.currency, "USD");
        assert!(store.money(1, "US1").is_err());
        assert!(store.money(1, "").is_err());
    }

    #[test]
    fn function_constructor_rejects_duplicate_params() {
        let mut store = ValueStore::new();
        let err = store.function(
            "f",
            vec!["a".to_string(), "a".to_string()],
            crate::ast::NodeId(0),
            None,
        );
        assert!(err.is_err());
    }

    #[test]
    fn render_prints_literals() {
        let mut store = ValueStore::new();
        let money = store.money(15_000, "USD").unwrap();
        assert_eq!(store.render(money), "$1.50 USD");
        let date = store.date(2024, 3, 30).unwrap();
        assert_eq!(store.render(date), "2024-03-30");
        let a = store.number(1.0).unwrap();
        let b = store.number(2.5).unwrap();
        let list = store.list(vec![a, b]).unwrap();
        assert_eq!(store.render(list), "[1, 2.5]");
    }
}
