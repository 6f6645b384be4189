//! Pure operations over value handles: arithmetic, three-way comparison,
//! conversions, and the text slice/splice primitives. No state lives here;
//! results are allocated through the store the operands came from.

use std::cmp::Ordering;

use crate::diagnostics::{Position, RuntimeError};
use crate::store::ValueStore;
use crate::values::{DateValue, MoneyValue, RatioValue, TimeValue, Value, ValueId, MONEY_SCALE};

/// Scales a plain number onto the money sub-unit grid.
fn scaled(value: f64) -> i64 {
    (value * MONEY_SCALE as f64).round() as i64
}

fn mismatch(op: &str, left: &Value, right: &Value, pos: Position) -> RuntimeError {
    RuntimeError::TypeMismatch(format!(
        "cannot {op} {} and {}{}",
        left.kind_name(),
        right.kind_name(),
        pos.describe()
    ))
}

pub fn add(
    store: &mut ValueStore,
    left: ValueId,
    right: ValueId,
    pos: Position,
) -> Result<ValueId, RuntimeError> {
    let (lhs, rhs) = (store.get(left).clone(), store.get(right).clone());
    match (&lhs, &rhs) {
        (Value::Number(a), Value::Number(b)) => store.number(a + b),
        (Value::Money(money), Value::Number(n)) | (Value::Number(n), Value::Money(money)) => {
            store.money(money.amount + scaled(*n), &money.currency)
        }
        (Value::Money(a), Value::Money(b)) => {
            if a.currency != b.currency {
                return Err(currency_mismatch(a, b, pos));
            }
            store.money(a.amount + b.amount, &a.currency)
        }
        (Value::Percentage(a), Value::Percentage(b)) => store.percentage(a + b),
        _ => Err(mismatch("add", &lhs, &rhs, pos)),
    }
}

pub fn subtract(
    store: &mut ValueStore,
    left: ValueId,
    right: ValueId,
    pos: Position,
) -> Result<ValueId, RuntimeError> {
    let (lhs, rhs) = (store.get(left).clone(), store.get(right).clone());
    match (&lhs, &rhs) {
        (Value::Number(a), Value::Number(b)) => store.number(a - b),
        (Value::Money(money), Value::Number(n)) => {
            store.money(money.amount - scaled(*n), &money.currency)
        }
        (Value::Number(n), Value::Money(money)) => {
            store.money(scaled(*n) - money.amount, &money.currency)
        }
        (Value::Money(a), Value::Money(b)) => {
            if a.currency != b.currency {
                return Err(currency_mismatch(a, b, pos));
            }
            store.money(a.amount - b.amount, &a.currency)
        }
        (Value::Percentage(a), Value::Percentage(b)) => store.percentage(a - b),
        _ => Err(mismatch("subtract", &lhs, &rhs, pos)),
    }
}

pub fn multiply(
    store: &mut ValueStore,
    left: ValueId,
    right: ValueId,
    pos: Position,
) -> Result<ValueId, RuntimeError> {
    let (lhs, rhs) = (store.get(left).clone(), store.get(right).clone());
    match (&lhs, &rhs) {
        (Value::Number(a), Value::Number(b)) => store.number(a * b),
        (Value::Money(money), Value::Number(n)) | (Value::Number(n), Value::Money(money)) => {
            store.money((money.amount as f64 * n).round() as i64, &money.currency)
        }
        (Value::Money(money), Value::Percentage(p))
        | (Value::Percentage(p), Value::Money(money)) => {
            store.money(
                (money.amount as f64 * p / 100.0).round() as i64,
                &money.currency,
            )
        }
        (Value::Percentage(a), Value::Percentage(b)) => store.percentage(a * b / 100.0),
        (Value::Ratio(a), Value::Ratio(b)) => {
            let ratio = RatioValue::new(a.numerator * b.numerator, a.denominator * b.denominator)?;
            store.ratio(ratio.numerator, ratio.denominator)
        }
        _ => Err(mismatch("multiply", &lhs, &rhs, pos)),
    }
}

pub fn divide(
    store: &mut ValueStore,
    left: ValueId,
    right: ValueId,
    pos: Position,
) -> Result<ValueId, RuntimeError> {
    let (lhs, rhs) = (store.get(left).clone(), store.get(right).clone());
    match (&lhs, &rhs) {
        (Value::Number(a), Value::Number(b)) => {
            if *b == 0.0 {
                return Err(division_by_zero(pos));
            }
            store.number(a / b)
        }
        (Value::Money(money), Value::Number(n)) => {
            if *n == 0.0 {
                return Err(division_by_zero(pos));
            }
            store.money((money.amount as f64 / n).round() as i64, &money.currency)
        }
        (Value::Money(a), Value::Money(b)) => {
            if a.currency != b.currency {
                return Err(currency_mismatch(a, b, pos));
            }
            if b.amount == 0 {
                return Err(division_by_zero(pos));
            }
            store.number(a.amount as f64 / b.amount as f64)
        }
        (Value::Ratio(a), Value::Ratio(b)) => {
            // Dividing inverts the second operand; a zero numerator there
            // would land in the denominator.
            if b.numerator == 0.0 {
                return Err(division_by_zero(pos));
            }
            let ratio = RatioValue::new(a.numerator * b.denominator, a.denominator * b.numerator)?;
            store.ratio(ratio.numerator, ratio.denominator)
        }
        _ => Err(mismatch("divide", &lhs, &rhs, pos)),
    }
}

pub fn negate(
    store: &mut ValueStore,
    operand: ValueId,
    pos: Position,
) -> Result<ValueId, RuntimeError> {
    let value = store.get(operand).clone();
    match &value {
        Value::Number(n) => store.number(-n),
        Value::Money(money) => store.money(-money.amount, &money.currency),
        Value::Percentage(p) => store.percentage(-p),
        Value::Ratio(ratio) => store.ratio(-ratio.numerator, ratio.denominator),
        _ => Err(RuntimeError::InvalidOperator(format!(
            "negation is not defined for {}{}",
            value.kind_name(),
            pos.describe()
        ))),
    }
}

pub fn not(
    store: &mut ValueStore,
    operand: ValueId,
    pos: Position,
) -> Result<ValueId, RuntimeError> {
    match store.get(operand) {
        Value::Boolean(value) => {
            let flipped = !*value;
            store.boolean(flipped)
        }
        other => Err(RuntimeError::InvalidOperator(format!(
            "not is not defined for {}{}",
            other.kind_name(),
            pos.describe()
        ))),
    }
}

/// Strict three-way comparison. Currency mismatches and unlike kinds
/// propagate as errors; [`loosely_equal`] is the forgiving entry point.
pub fn compare(store: &ValueStore, left: ValueId, right: ValueId) -> Result<Ordering, RuntimeError> {
    let (lhs, rhs) = (store.get(left), store.get(right));
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(a.total_cmp(b)),
        (Value::Number(n), Value::Money(money)) => {
            Ok(n.total_cmp(&(money.amount as f64 / MONEY_SCALE as f64)))
        }
        (Value::Money(money), Value::Number(n)) => {
            Ok((money.amount as f64 / MONEY_SCALE as f64).total_cmp(n))
        }
        (Value::Number(a), Value::Percentage(b)) | (Value::Percentage(a), Value::Number(b)) => {
            Ok(a.total_cmp(b))
        }
        (Value::Percentage(a), Value::Percentage(b)) => Ok(a.total_cmp(b)),
        (Value::Money(a), Value::Money(b)) => {
            if a.currency != b.currency {
                return Err(currency_mismatch(a, b, Position::SYNTHETIC));
            }
            Ok(a.amount.cmp(&b.amount))
        }
        (Value::Date(a), Value::Date(b)) => Ok(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => Ok(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Ok(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Ok(a.as_bytes().cmp(b.as_bytes())),
        (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
        (Value::Unknown, Value::Unknown) | (Value::Nil, Value::Nil) => Ok(Ordering::Equal),
        _ => Err(RuntimeError::TypeMismatch(format!(
            "cannot compare {} with {}",
            lhs.kind_name(),
            rhs.kind_name()
        ))),
    }
}

/// Equality that treats comparison failures (unlike kinds, currency
/// mismatch) as "not equal" instead of an error.
pub fn loosely_equal(store: &ValueStore, left: ValueId, right: ValueId) -> bool {
    compare(store, left, right).is_ok_and(|ordering| ordering == Ordering::Equal)
}

/// Recursive structural equality across compound values. Functions compare
/// by body and parameters; reactive values by their full payload.
pub fn structurally_equal(store: &ValueStore, left: ValueId, right: ValueId) -> bool {
    if left == right {
        return true;
    }
    match (store.get(left), store.get(right)) {
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| structurally_equal(store, *x, *y))
        }
        (Value::Record(a), Value::Record(b)) => {
            if a.fields.len() != b.fields.len() {
                return false;
            }
            let fields_match = a.fields.iter().all(|(name, value)| {
                b.fields
                    .get(name)
                    .is_some_and(|other| structurally_equal(store, *value, *other))
            });
            let parents_match = match (a.parent, b.parent) {
                (None, None) => true,
                (Some(x), Some(y)) => structurally_equal(store, x, y),
                _ => false,
            };
            fields_match && parents_match
        }
        (Value::Function(a), Value::Function(b)) => a.params == b.params && a.body == b.body,
        (Value::Trigger(a), Value::Trigger(b)) => a == b,
        (Value::Constraint(a), Value::Constraint(b)) => a == b,
        _ => loosely_equal(store, left, right),
    }
}

// Conversions.

pub fn to_money(
    store: &mut ValueStore,
    operand: ValueId,
    default_currency: &str,
) -> Result<ValueId, RuntimeError> {
    let value = store.get(operand).clone();
    match &value {
        Value::Money(money) => store.money(money.amount, &money.currency),
        Value::Number(n) => store.money(scaled(*n), default_currency),
        _ => Err(RuntimeError::TypeMismatch(format!(
            "cannot convert {} to money",
            value.kind_name()
        ))),
    }
}

pub fn to_number(store: &mut ValueStore, operand: ValueId) -> Result<ValueId, RuntimeError> {
    let value = store.get(operand).clone();
    match &value {
        Value::Number(n) => store.number(*n),
        Value::Money(money) => store.number(money.amount as f64 / MONEY_SCALE as f64),
        Value::Percentage(p) => store.number(*p),
        Value::Ratio(ratio) => {
            if ratio.denominator == 0.0 {
                return Err(division_by_zero(Position::SYNTHETIC));
            }
            store.number(ratio.numerator / ratio.denominator)
        }
        _ => Err(RuntimeError::TypeMismatch(format!(
            "cannot convert {} to number",
            value.kind_name()
        ))),
    }
}

pub fn to_percentage(store: &mut ValueStore, operand: ValueId) -> Result<ValueId, RuntimeError> {
    let value = store.get(operand).clone();
    match &value {
        Value::Percentage(p) => store.percentage(*p),
        Value::Number(n) => store.percentage(*n),
        _ => Err(RuntimeError::TypeMismatch(format!(
            "cannot convert {} to percentage",
            value.kind_name()
        ))),
    }
}

pub fn date_to_date_time(store: &mut ValueStore, operand: ValueId) -> Result<ValueId, RuntimeError> {
    let value = store.get(operand).clone();
    match &value {
        Value::Date(date) => store.date_time(*date, TimeValue::MIDNIGHT),
        Value::DateTime(value) => store.date_time(value.date, value.time),
        _ => Err(RuntimeError::TypeMismatch(format!(
            "cannot convert {} to date_time",
            value.kind_name()
        ))),
    }
}

pub fn date_time_to_date(store: &mut ValueStore, operand: ValueId) -> Result<ValueId, RuntimeError> {
    let value = store.get(operand).clone();
    match &value {
        Value::DateTime(value) => store.date(value.date.year, value.date.month, value.date.day),
        Value::Date(date) => store.date(date.year, date.month, date.day),
        _ => Err(RuntimeError::TypeMismatch(format!(
            "cannot convert {} to date",
            value.kind_name()
        ))),
    }
}

pub fn date_time_to_time(store: &mut ValueStore, operand: ValueId) -> Result<ValueId, RuntimeError> {
    let value = store.get(operand).clone();
    match &value {
        Value::DateTime(value) => store.time(
            value.time.hour,
            value.time.minute,
            value.time.second,
            value.time.millisecond,
        ),
        _ => Err(RuntimeError::TypeMismatch(format!(
            "cannot convert {} to time",
            value.kind_name()
        ))),
    }
}

// Calendar arithmetic. The stored form stays component-based; chrono does
// the month-length and leap work at the edges.

pub fn date_add_days(date: DateValue, days: i64) -> Result<DateValue, RuntimeError> {
    let shifted = date
        .to_naive()
        .checked_add_signed(chrono::Duration::days(days))
        .ok_or_else(|| {
            RuntimeError::InvalidValue(format!(
                "date {} out of range after {days} days",
                crate::literal::format_date(date)
            ))
        })?;
    Ok(DateValue::from_naive(shifted))
}

pub fn date_next(date: DateValue) -> Result<DateValue, RuntimeError> {
    date_add_days(date, 1)
}

pub fn date_previous(date: DateValue) -> Result<DateValue, RuntimeError> {
    date_add_days(date, -1)
}

pub fn is_leap_year(year: i32) -> bool {
    chrono::NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        _ => 28,
    }
}

// Text slice/splice, byte-indexed.

/// Copies the inclusive byte range `start..=end` out of a text value.
pub fn text_slice(
    store: &mut ValueStore,
    operand: ValueId,
    start: i64,
    end: i64,
    pos: Position,
) -> Result<ValueId, RuntimeError> {
    let value = store.get(operand).clone();
    let Value::Text(text) = &value else {
        return Err(RuntimeError::TypeMismatch(format!(
            "cannot slice {}{}",
            value.kind_name(),
            pos.describe()
        )));
    };
    let len = text.len() as i64;
    if start < 0 || end < start || start >= len || end >= len {
        return Err(RuntimeError::IndexOutOfRange(format!(
            "slice {start}..={end} of text with {len} bytes{}",
            pos.describe()
        )));
    }
    let bytes = &text.as_bytes()[start as usize..=end as usize];
    store.text(String::from_utf8_lossy(bytes).into_owned())
}

/// Replaces `delete_count` bytes at `index` with `insert`.
pub fn text_splice(
    store: &mut ValueStore,
    operand: ValueId,
    index: i64,
    delete_count: i64,
    insert: &str,
    pos: Position,
) -> Result<ValueId, RuntimeError> {
    let value = store.get(operand).clone();
    let Value::Text(text) = &value else {
        return Err(RuntimeError::TypeMismatch(format!(
            "cannot splice {}{}",
            value.kind_name(),
            pos.describe()
        )));
    };
    let len = text.len() as i64;
    if index < 0 || delete_count < 0 || index > len || index + delete_count > len {
        return Err(RuntimeError::IndexOutOfRange(format!(
            "splice at {index} deleting {delete_count} of text with {len} bytes{}",
            pos.describe()
        )));
    }
    let mut bytes = text.as_bytes().to_vec();
    bytes.splice(
        index as usize..(index + delete_count) as usize,
        insert.bytes(),
    );
    store.text(String::from_utf8_lossy(&bytes).into_owned())
}

fn currency_mismatch(a: &MoneyValue, b: &MoneyValue, pos: Position) -> RuntimeError {
    RuntimeError::CurrencyMismatch(format!(
        "{} vs {}{}",
        a.currency,
        b.currency,
        pos.describe()
    ))
}

fn division_by_zero(pos: Position) -> RuntimeError {
    RuntimeError::DivisionByZero(format!("division by zero{}", pos.describe()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorKind;

    const POS: Position = Position::SYNTHETIC;

    #[test]
    fn money_plus_money_stays_on_subunit_grid() {
        let mut store = ValueStore::new();
        let a = store.money(1_234_500, "USD").unwrap();
        let b = store.money(100_000, "USD").unwrap();
        let sum = add(&mut store, a, b, POS).unwrap();
        let Value::Money(money) = store.get(sum) else {
            panic!("expected money");
        };
        assert_eq!(money.amount, 1_334_500);
        assert_eq!(money.currency, "USD");
    }

    #[test]
    fn number_plus_money_scales_by_ten_thousand() {
        let mut store = ValueStore::new();
        let money = store.money(1_334_500, "USD").unwrap();
        let n = store.number(1.5).unwrap();
        let sum = add(&mut store, money, n, POS).unwrap();
        let Value::Money(money) = store.get(sum) else {
            panic!("expected money");
        };
        assert_eq!(money.amount, 1_349_500);
    }

    #[test]
    fn mixed_currency_addition_is_an_error() {
        let mut store = ValueStore::new();
        let usd = store.money(100, "USD").unwrap();
        let eur = store.money(100, "EUR").unwrap();
        let err = add(&mut store, usd, eur, POS).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CurrencyMismatch);
    }

    #[test]
    fn percentage_scales_money() {
        let mut store = ValueStore::new();
        let money = store.money(2_000_000, "USD").unwrap();
        let p = store.percentage(25.0).unwrap();
        let scaled = multiply(&mut store, p, money, POS).unwrap();
        let Value::Money(money) = store.get(scaled) else {
            panic!("expected money");
        };
        assert_eq!(money.amount, 500_000);
    }

    #[test]
    fn percentage_product_divides_by_hundred() {
        let mut store = ValueStore::new();
        let a = store.percentage(50.0).unwrap();
        let b = store.percentage(50.0).unwrap();
        let product = multiply(&mut store, a, b, POS).unwrap();
        assert!(matches!(store.get(product), Value::Percentage(p) if *p == 25.0));
    }

    #[test]
    fn money_over_money_is_a_unitless_number() {
        let mut store = ValueStore::new();
        let a = store.money(300_000, "USD").unwrap();
        let b = store.money(100_000, "USD").unwrap();
        let ratio = divide(&mut store, a, b, POS).unwrap();
        assert!(matches!(store.get(ratio), Value::Number(n) if *n == 3.0));

        let eur = store.money(100_000, "EUR").unwrap();
        let err = divide(&mut store, a, eur, POS).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CurrencyMismatch);
    }

    #[test]
    fn ratio_division_inverts_and_guards_zero() {
        let mut store = ValueStore::new();
        let a = store.ratio(1.0, 2.0).unwrap();
        let b = store.ratio(3.0, 4.0).unwrap();
        let quotient = divide(&mut store, a, b, POS).unwrap();
        let Value::Ratio(ratio) = store.get(quotient) else {
            panic!("expected ratio");
        };
        assert_eq!((ratio.numerator, ratio.denominator), (4.0, 6.0));

        let zero = store.ratio(0.0, 5.0).unwrap();
        let err = divide(&mut store, a, zero, POS).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DivisionByZero);
    }

    #[test]
    fn comparison_lifts_number_money_percentage() {
        let mut store = ValueStore::new();
        let n = store.number(1.5).unwrap();
        let money = store.money(15_000, "USD").unwrap();
        assert_eq!(compare(&store, n, money).unwrap(), Ordering::Equal);

        let p = store.percentage(1.5).unwrap();
        assert_eq!(compare(&store, n, p).unwrap(), Ordering::Equal);

        let bigger = store.number(2.0).unwrap();
        assert_eq!(compare(&store, bigger, money).unwrap(), Ordering::Greater);
    }

    #[test]
    fn strict_equality_propagates_currency_mismatch() {
        let mut store = ValueStore::new();
        let usd = store.money(100, "USD").unwrap();
        let eur = store.money(100, "EUR").unwrap();
        assert!(compare(&store, usd, eur).is_err());
        assert!(!loosely_equal(&store, usd, eur));
    }

    #[test]
    fn dates_compare_lexicographically() {
        let mut store = ValueStore::new();
        let earlier = store.date(2024, 3, 30).unwrap();
        let later = store.date(2024, 4, 2).unwrap();
        assert_eq!(compare(&store, earlier, later).unwrap(), Ordering::Less);

        let t1 = store.time(9, 30, 0, 0).unwrap();
        let t2 = store.time(9, 30, 0, 1).unwrap();
        assert_eq!(compare(&store, t1, t2).unwrap(), Ordering::Less);
    }

    #[test]
    fn booleans_order_true_above_false() {
        let mut store = ValueStore::new();
        let t = store.boolean(true).unwrap();
        let f = store.boolean(false).unwrap();
        assert_eq!(compare(&store, t, f).unwrap(), Ordering::Greater);
    }

    #[test]
    fn conversions_round_trip_money_and_ratio() {
        let mut store = ValueStore::new();
        let n = store.number(12.5).unwrap();
        let money = to_money(&mut store, n, "USD").unwrap();
        assert!(matches!(store.get(money), Value::Money(m) if m.amount == 125_000));
        let back = to_number(&mut store, money).unwrap();
        assert!(matches!(store.get(back), Value::Number(v) if *v == 12.5));

        let ratio = store.ratio(3.0, 4.0).unwrap();
        let real = to_number(&mut store, ratio).unwrap();
        assert!(matches!(store.get(real), Value::Number(v) if *v == 0.75));
    }

    #[test]
    fn date_conversion_fills_midnight() {
        let mut store = ValueStore::new();
        let date = store.date(2024, 3, 30).unwrap();
        let dt = date_to_date_time(&mut store, date).unwrap();
        let Value::DateTime(value) = store.get(dt) else {
            panic!("expected date_time");
        };
        assert_eq!(value.time, TimeValue::MIDNIGHT);
        let projected = date_time_to_date(&mut store, dt).unwrap();
        assert!(loosely_equal(&store, projected, date));
    }

    #[test]
    fn add_days_crosses_month_and_leap_boundaries() {
        let date = DateValue::new(2024, 3, 30).unwrap();
        let shifted = date_add_days(date, 3).unwrap();
        assert_eq!((shifted.year, shifted.month, shifted.day), (2024, 4, 2));

        let leap = DateValue::new(2024, 2, 28).unwrap();
        let next = date_next(leap).unwrap();
        assert_eq!((next.month, next.day), (2, 29));
        let after = date_next(next).unwrap();
        assert_eq!((after.month, after.day), (3, 1));
        assert_eq!(date_previous(after).unwrap(), next);
    }

    #[test]
    fn month_lengths_respect_leap_years() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(2024, 4), 30);
        assert_eq!(days_in_month(2024, 12), 31);
    }

    #[test]
    fn slice_and_splice_follow_byte_bounds() {
        let mut store = ValueStore::new();
        let text = store.text("business").unwrap();
        let sliced = text_slice(&mut store, text, 0, 3, POS).unwrap();
        assert!(matches!(store.get(sliced), Value::Text(t) if t == "busi"));

        let err = text_slice(&mut store, text, 5, 99, POS).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);

        let spliced = text_splice(&mut store, text, 0, 4, "show", POS).unwrap();
        assert!(matches!(store.get(spliced), Value::Text(t) if t == "showness"));
    }

    #[test]
    fn undefined_unary_operators_are_invalid() {
        let mut store = ValueStore::new();
        let text = store.text("memo").unwrap();
        assert_eq!(
            negate(&mut store, text, POS).unwrap_err().kind(),
            ErrorKind::InvalidOperator
        );
        let n = store.number(1.0).unwrap();
        assert_eq!(
            not(&mut store, n, POS).unwrap_err().kind(),
            ErrorKind::InvalidOperator
        );

        let money = store.money(1_500, "USD").unwrap();
        let negated = negate(&mut store, money, POS).unwrap();
        assert!(matches!(store.get(negated), Value::Money(m) if m.amount == -1_500));
    }

    #[test]
    fn structural_equality_recurses_into_records() {
        let mut store = ValueStore::new();
        let a1 = store.number(1.0).unwrap();
        let a2 = store.number(1.0).unwrap();
        let r1 = store
            .record(std::collections::HashMap::from([("x".to_string(), a1)]), None)
            .unwrap();
        let r2 = store
            .record(std::collections::HashMap::from([("x".to_string(), a2)]), None)
            .unwrap();
        assert!(structurally_equal(&store, r1, r2));

        let b = store.number(2.0).unwrap();
        let r3 = store
            .record(std::collections::HashMap::from([("x".to_string(), b)]), None)
            .unwrap();
        assert!(!structurally_equal(&store, r1, r3));
    }
}
