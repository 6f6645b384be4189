//! Property-style checks over the value algebra: deep-copy fidelity, exact
//! money arithmetic, and calendar round trips.

use brio::algebra;
use brio::store::ValueStore;
use brio::values::{DateValue, TimeValue};

#[test]
fn deep_copy_compares_equal_for_every_scalar_kind() {
    let mut store = ValueStore::new();
    let date = DateValue::new(2024, 2, 29).unwrap();
    let time = TimeValue::new(23, 59, 59, 999).unwrap();
    let scalars = vec![
        store.number(42.5).unwrap(),
        store.text("net terms").unwrap(),
        store.money(-1_234_500, "EUR").unwrap(),
        store.date(2024, 2, 29).unwrap(),
        store.time(23, 59, 59, 999).unwrap(),
        store.date_time(date, time).unwrap(),
        store.percentage(12.5).unwrap(),
        store.ratio(3.0, 4.0).unwrap(),
        store.boolean(true).unwrap(),
        store.unknown().unwrap(),
        store.nil().unwrap(),
    ];
    for original in scalars {
        let copy = store.deep_copy(original).unwrap();
        assert_ne!(original, copy, "copy must be a fresh handle");
        assert!(
            algebra::structurally_equal(&store, original, copy),
            "copy of {} must compare equal",
            store.get(original).kind_name()
        );
    }
}

#[test]
fn money_addition_and_subtraction_cancel_exactly() {
    let mut store = ValueStore::new();
    let pos = brio::diagnostics::Position::SYNTHETIC;
    let amounts = [0i64, 1, -1, 99, 12_345, -7_000_001, i64::MAX / 4];
    let deltas = [0i64, 3, -3, 10_000, 123_456_789];
    for &a in &amounts {
        for &b in &deltas {
            let base = store.money(a, "USD").unwrap();
            let delta = store.money(b, "USD").unwrap();
            let sum = algebra::add(&mut store, base, delta, pos).unwrap();
            let back = algebra::subtract(&mut store, sum, delta, pos).unwrap();
            assert!(
                algebra::loosely_equal(&store, back, base),
                "money({a}) + money({b}) - money({b}) must equal money({a})"
            );
        }
    }
}

#[test]
fn date_next_previous_round_trips() {
    let samples = [
        (2024, 1, 1),
        (2024, 2, 28),
        (2024, 2, 29),
        (2024, 3, 1),
        (2024, 12, 31),
        (2023, 2, 28),
        (2000, 2, 29),
        (1999, 12, 31),
        (1900, 3, 1),
    ];
    for (year, month, day) in samples {
        let date = DateValue::new(year, month, day).unwrap();
        let round_trip = algebra::date_previous(algebra::date_next(date).unwrap()).unwrap();
        assert_eq!(round_trip, date);
    }
}

#[test]
fn add_days_is_invertible() {
    let date = DateValue::new(2024, 2, 29).unwrap();
    for n in [1i64, 2, 28, 30, 31, 365, 366, 1461, 10_000] {
        let there = algebra::date_add_days(date, n).unwrap();
        let back = algebra::date_add_days(there, -n).unwrap();
        assert_eq!(back, date, "add_days({n}) then add_days(-{n})");
    }
}

#[test]
fn month_arithmetic_matches_spec_examples() {
    let date = DateValue::new(2024, 3, 30).unwrap();
    let shifted = algebra::date_add_days(date, 3).unwrap();
    assert_eq!((shifted.year, shifted.month, shifted.day), (2024, 4, 2));

    let leap = DateValue::new(2024, 2, 28).unwrap();
    let next = algebra::date_add_days(leap, 1).unwrap();
    assert_eq!((next.month, next.day), (2, 29));
    let after = algebra::date_add_days(next, 1).unwrap();
    assert_eq!((after.month, after.day), (3, 1));
}
