//! Native functions installed in the global frame. They surface the value
//! algebra's conversions and calendar helpers to programs, alongside the
//! text slice/splice primitives.

use std::sync::Arc;

use crate::algebra;
use crate::diagnostics::{Position, RuntimeError};
use crate::store::ValueStore;
use crate::values::{DateValue, NativeFn, Value, ValueId};

use super::Runtime;

fn define(runtime: &mut Runtime, name: &str, params: &[&str], body: NativeFn) {
    let id = runtime
        .store
        .native_function(name, params, body)
        .expect("fresh store cannot be full");
    runtime.globals.define(name, id);
}

pub(crate) fn install(runtime: &mut Runtime) {
    let default_currency = runtime.options.default_currency.clone();

    define(
        runtime,
        "as_number",
        &["value"],
        Arc::new(|store: &mut ValueStore, args: &[ValueId], _pos: Position| {
            algebra::to_number(store, args[0])
        }),
    );
    define(
        runtime,
        "as_money",
        &["value"],
        Arc::new(move |store: &mut ValueStore, args: &[ValueId], _pos: Position| {
            algebra::to_money(store, args[0], &default_currency)
        }),
    );
    define(
        runtime,
        "as_percentage",
        &["value"],
        Arc::new(|store: &mut ValueStore, args: &[ValueId], _pos: Position| {
            algebra::to_percentage(store, args[0])
        }),
    );
    define(
        runtime,
        "to_date_time",
        &["value"],
        Arc::new(|store: &mut ValueStore, args: &[ValueId], _pos: Position| {
            algebra::date_to_date_time(store, args[0])
        }),
    );
    define(
        runtime,
        "to_date",
        &["value"],
        Arc::new(|store: &mut ValueStore, args: &[ValueId], _pos: Position| {
            algebra::date_time_to_date(store, args[0])
        }),
    );
    define(
        runtime,
        "to_time",
        &["value"],
        Arc::new(|store: &mut ValueStore, args: &[ValueId], _pos: Position| {
            algebra::date_time_to_time(store, args[0])
        }),
    );
    define(
        runtime,
        "add_days",
        &["date", "days"],
        Arc::new(|store: &mut ValueStore, args: &[ValueId], pos: Position| {
            let date = expect_date(store, args[0], pos)?;
            let days = expect_integer(store, args[1], pos)?;
            let shifted = algebra::date_add_days(date, days)?;
            store.date(shifted.year, shifted.month, shifted.day)
        }),
    );
    define(
        runtime,
        "next_day",
        &["date"],
        Arc::new(|store: &mut ValueStore, args: &[ValueId], pos: Position| {
            let date = expect_date(store, args[0], pos)?;
            let next = algebra::date_next(date)?;
            store.date(next.year, next.month, next.day)
        }),
    );
    define(
        runtime,
        "previous_day",
        &["date"],
        Arc::new(|store: &mut ValueStore, args: &[ValueId], pos: Position| {
            let date = expect_date(store, args[0], pos)?;
            let previous = algebra::date_previous(date)?;
            store.date(previous.year, previous.month, previous.day)
        }),
    );
    define(
        runtime,
        "days_in_month",
        &["year", "month"],
        Arc::new(|store: &mut ValueStore, args: &[ValueId], pos: Position| {
            let year = expect_integer(store, args[0], pos)?;
            let month = expect_integer(store, args[1], pos)?;
            if !(1..=12).contains(&month) {
                return Err(RuntimeError::InvalidValue(format!(
                    "{month} is not a month{}",
                    pos.describe()
                )));
            }
            let days = algebra::days_in_month(year as i32, month as u32);
            store.number(days as f64)
        }),
    );
    define(
        runtime,
        "length",
        &["value"],
        Arc::new(|store: &mut ValueStore, args: &[ValueId], pos: Position| {
            let length = match store.get(args[0]) {
                Value::List(items) => items.len(),
                Value::Text(text) => text.len(),
                other => {
                    return Err(RuntimeError::TypeMismatch(format!(
                        "length is not defined for {}{}",
                        other.kind_name(),
                        pos.describe()
                    )))
                }
            };
            store.number(length as f64)
        }),
    );
    define(
        runtime,
        "copy",
        &["value"],
        Arc::new(|store: &mut ValueStore, args: &[ValueId], _pos: Position| {
            store.deep_copy(args[0])
        }),
    );
    define(
        runtime,
        "slice",
        &["text", "start", "end"],
        Arc::new(|store: &mut ValueStore, args: &[ValueId], pos: Position| {
            let start = expect_integer(store, args[1], pos)?;
            let end = expect_integer(store, args[2], pos)?;
            algebra::text_slice(store, args[0], start, end, pos)
        }),
    );
    define(
        runtime,
        "splice",
        &["text", "index", "delete_count", "insert"],
        Arc::new(|store: &mut ValueStore, args: &[ValueId], pos: Position| {
            let index = expect_integer(store, args[1], pos)?;
            let delete_count = expect_integer(store, args[2], pos)?;
            let Value::Text(insert) = store.get(args[3]).clone() else {
                return Err(RuntimeError::TypeMismatch(format!(
                    "splice insert must be text, got {}{}",
                    store.get(args[3]).kind_name(),
                    pos.describe()
                )));
            };
            algebra::text_splice(store, args[0], index, delete_count, &insert, pos)
        }),
    );
}

fn expect_integer(store: &ValueStore, id: ValueId, pos: Position) -> Result<i64, RuntimeError> {
    match store.get(id) {
        Value::Number(value) if value.fract() == 0.0 => Ok(*value as i64),
        other => Err(RuntimeError::TypeMismatch(format!(
            "expected an integer number, got {}{}",
            other.kind_name(),
            pos.describe()
        ))),
    }
}

fn expect_date(store: &ValueStore, id: ValueId, pos: Position) -> Result<DateValue, RuntimeError> {
    match store.get(id) {
        Value::Date(date) => Ok(*date),
        other => Err(RuntimeError::TypeMismatch(format!(
            "expected a date, got {}{}",
            other.kind_name(),
            pos.describe()
        ))),
    }
}
