//! State snapshots: runtime values rendered to JSON and back. Business
//! scalars use `$`-tagged objects so a plain JSON object stays a record.

use std::collections::HashMap;

use serde_json::{json, Value as JsonValue};

use crate::diagnostics::RuntimeError;
use crate::literal;
use crate::store::ValueStore;
use crate::values::{Value, ValueId};

use super::Runtime;

pub(crate) fn value_to_json(store: &ValueStore, id: ValueId) -> Result<JsonValue, RuntimeError> {
    Ok(match store.get(id) {
        Value::Number(value) => json!(value),
        Value::Text(value) => JsonValue::String(value.clone()),
        Value::Boolean(value) => JsonValue::Bool(*value),
        Value::Nil => JsonValue::Null,
        Value::Unknown => json!({ "$unknown": true }),
        Value::Money(money) => json!({
            "$money": { "amount": money.amount, "currency": money.currency }
        }),
        Value::Date(date) => json!({ "$date": literal::format_date(*date) }),
        Value::Time(time) => json!({ "$time": literal::format_time(*time) }),
        Value::DateTime(value) => json!({ "$datetime": literal::format_date_time(*value) }),
        Value::Percentage(value) => json!({ "$percent": value }),
        Value::Ratio(ratio) => json!({ "$ratio": [ratio.numerator, ratio.denominator] }),
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(value_to_json(store, *item)?);
            }
            JsonValue::Array(out)
        }
        Value::Record(record) => {
            let mut names: Vec<&String> = record.fields.keys().collect();
            names.sort();
            let mut fields = serde_json::Map::new();
            for name in names {
                fields.insert(name.clone(), value_to_json(store, record.fields[name])?);
            }
            match record.parent {
                Some(parent) => json!({
                    "$fields": JsonValue::Object(fields),
                    "$parent": value_to_json(store, parent)?
                }),
                None => JsonValue::Object(fields),
            }
        }
        // Code-bearing values have no data form; snapshot them opaquely.
        other @ (Value::Function(_) | Value::Trigger(_) | Value::Constraint(_)) => {
            json!({ "$opaque": format!("<{}>", other.kind_name()) })
        }
    })
}

pub(crate) fn json_to_value(
    store: &mut ValueStore,
    json: &JsonValue,
) -> Result<ValueId, RuntimeError> {
    match json {
        JsonValue::Null => store.nil(),
        JsonValue::Bool(value) => store.boolean(*value),
        JsonValue::Number(number) => {
            let value = number.as_f64().ok_or_else(|| {
                RuntimeError::InvalidValue(format!("snapshot number {number} overflows"))
            })?;
            store.number(value)
        }
        JsonValue::String(value) => store.text(value.clone()),
        JsonValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(json_to_value(store, item)?);
            }
            store.list(out)
        }
        JsonValue::Object(map) => {
            if map.get("$unknown").is_some() {
                return store.unknown();
            }
            if let Some(opaque) = map.get("$opaque") {
                return Err(RuntimeError::InvalidValue(format!(
                    "snapshot cannot restore {opaque}"
                )));
            }
            if let Some(money) = map.get("$money") {
                let amount = money
                    .get("amount")
                    .and_then(JsonValue::as_i64)
                    .ok_or_else(|| bad_snapshot("$money.amount"))?;
                let currency = money
                    .get("currency")
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| bad_snapshot("$money.currency"))?;
                return store.money(amount, currency);
            }
            if let Some(text) = map.get("$date").and_then(JsonValue::as_str) {
                let date = literal::parse_date(text)?;
                return store.date(date.year, date.month, date.day);
            }
            if let Some(text) = map.get("$time").and_then(JsonValue::as_str) {
                let time = literal::parse_time(text)?;
                return store.time(time.hour, time.minute, time.second, time.millisecond);
            }
            if let Some(text) = map.get("$datetime").and_then(JsonValue::as_str) {
                let value = literal::parse_date_time(text)?;
                return store.date_time(value.date, value.time);
            }
            if let Some(value) = map.get("$percent").and_then(JsonValue::as_f64) {
                return store.percentage(value);
            }
            if let Some(parts) = map.get("$ratio").and_then(JsonValue::as_array) {
                let [numerator, denominator] = parts.as_slice() else {
                    return Err(bad_snapshot("$ratio"));
                };
                let numerator = numerator.as_f64().ok_or_else(|| bad_snapshot("$ratio"))?;
                let denominator = denominator
                    .as_f64()
                    .ok_or_else(|| bad_snapshot("$ratio"))?;
                return store.ratio(numerator, denominator);
            }
            if let Some(fields) = map.get("$fields") {
                let JsonValue::Object(fields) = fields else {
                    return Err(bad_snapshot("$fields"));
                };
                let parent = match map.get("$parent") {
                    Some(parent) => Some(json_to_value(store, parent)?),
                    None => None,
                };
                let mut out = HashMap::with_capacity(fields.len());
                for (name, value) in fields {
                    out.insert(name.clone(), json_to_value(store, value)?);
                }
                return store.record(out, parent);
            }
            let mut out = HashMap::with_capacity(map.len());
            for (name, value) in map {
                out.insert(name.clone(), json_to_value(store, value)?);
            }
            store.record(out, None)
        }
    }
}

fn bad_snapshot(what: &str) -> RuntimeError {
    RuntimeError::InvalidValue(format!("malformed snapshot field {what}"))
}

impl Runtime {
    /// JSON snapshot of every global binding, name-sorted. Functions and
    /// reactive values appear as opaque markers.
    pub fn snapshot(&self) -> Result<JsonValue, RuntimeError> {
        let mut bindings = self.globals.local_bindings();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        let mut out = serde_json::Map::new();
        for (name, id) in bindings {
            out.insert(name, value_to_json(&self.store, id)?);
        }
        Ok(JsonValue::Object(out))
    }

    /// Defines one global per entry of a snapshot object. Bindings are
    /// installed directly, without the constraint protocol.
    pub fn restore(&mut self, snapshot: &JsonValue) -> Result<(), RuntimeError> {
        let JsonValue::Object(map) = snapshot else {
            return Err(RuntimeError::InvalidValue(
                "snapshot root must be an object".to_string(),
            ));
        };
        for (name, value) in map {
            let id = json_to_value(&mut self.store, value)?;
            self.globals.define(name, id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_round_trip_through_json() {
        let mut store = ValueStore::new();
        let date = crate::values::DateValue::new(2024, 2, 29).unwrap();
        let time = crate::values::TimeValue::new(9, 30, 0, 250).unwrap();
        let ids = vec![
            store.number(1.5).unwrap(),
            store.text("invoice").unwrap(),
            store.money(1_234_500, "USD").unwrap(),
            store.date(2024, 2, 29).unwrap(),
            store.time(9, 30, 0, 250).unwrap(),
            store.date_time(date, time).unwrap(),
            store.percentage(12.5).unwrap(),
            store.ratio(3.0, 4.0).unwrap(),
            store.boolean(true).unwrap(),
            store.unknown().unwrap(),
            store.nil().unwrap(),
        ];
        for id in ids {
            let json = value_to_json(&store, id).unwrap();
            let back = json_to_value(&mut store, &json).unwrap();
            assert!(
                crate::algebra::structurally_equal(&store, id, back),
                "round trip of {} through {json}",
                store.get(id).kind_name()
            );
        }
    }

    #[test]
    fn records_with_parents_keep_their_chain() {
        let mut store = ValueStore::new();
        let name = store.text("Generic Person").unwrap();
        let parent = store
            .record(HashMap::from([("name".to_string(), name)]), None)
            .unwrap();
        let job = store.text("Engineer").unwrap();
        let child = store
            .record(HashMap::from([("job".to_string(), job)]), Some(parent))
            .unwrap();

        let json = value_to_json(&store, child).unwrap();
        let back = json_to_value(&mut store, &json).unwrap();
        let inherited = store.record_lookup(back, "name").unwrap();
        assert!(matches!(store.get(inherited), Value::Text(t) if t == "Generic Person"));
    }

    #[test]
    fn runtime_snapshot_covers_globals() {
        let mut runtime = Runtime::default();
        let total = runtime.store_mut().money(500_000, "EUR").unwrap();
        runtime.define("total", total);

        let snapshot = runtime.snapshot().unwrap();
        assert_eq!(
            snapshot["total"]["$money"]["currency"],
            JsonValue::String("EUR".to_string())
        );
        // Installed natives snapshot opaquely instead of failing.
        assert!(snapshot["slice"]["$opaque"].is_string());

        let mut restored = Runtime::default();
        let mut state = snapshot.clone();
        let JsonValue::Object(map) = &mut state else {
            unreachable!();
        };
        map.retain(|_, value| value.get("$opaque").is_none());
        restored.restore(&state).unwrap();
        let total = restored.lookup("total").unwrap();
        assert!(matches!(
            restored.store().get(total),
            Value::Money(money) if money.amount == 500_000 && money.currency == "EUR"
        ));
    }
}
