//! Fuzz target: canonical literal parsing.
//!
//! Invariants checked:
//! - No literal parser may panic on garbage input.
//! - A successfully parsed literal re-renders into a form that parses back
//!   to the same value.

use brio::literal;

#[test]
fn literals() {
    bolero::check!().for_each(|data: &[u8]| {
        if data.len() > 4 * 1024 {
            return;
        }
        let src = String::from_utf8_lossy(data);

        if let Ok(date) = literal::parse_date(&src) {
            let rendered = literal::format_date(date);
            let reparsed = literal::parse_date(&rendered)
                .expect("rendered date must parse back");
            assert_eq!(reparsed, date);
        }

        if let Ok(time) = literal::parse_time(&src) {
            let rendered = literal::format_time(time);
            let reparsed = literal::parse_time(&rendered)
                .expect("rendered time must parse back");
            assert_eq!(reparsed, time);
        }

        if let Ok(value) = literal::parse_date_time(&src) {
            let rendered = literal::format_date_time(value);
            let reparsed = literal::parse_date_time(&rendered)
                .expect("rendered date-time must parse back");
            assert_eq!(reparsed, value);
        }

        // Money parsing must not panic; exact reparse is only guaranteed at
        // display precision, so just exercise the parser.
        let _ = literal::parse_money(&src, "USD");
    });
}
