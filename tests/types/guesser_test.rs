//! The progressive-widening guesser, driven through the translator so the
//! seed comes from a real engine spelling.

use omnisql::dialect::DatabaseType;
use omnisql::types::{DecimalSize, Guesser, TypeTranslator, ValueKind};

#[test]
fn test_guesser_seeded_from_column_spelling() {
    let translator = TypeTranslator::new(DatabaseType::MsSql);
    let mut guesser = translator.guesser_for("varchar(10)");
    guesser.feed("a value longer than ten");
    let request = guesser.current();
    assert_eq!(request.kind, ValueKind::Text);
    assert_eq!(request.width, Some(23));
}

#[test]
fn test_numbers_widen_without_losing_anything() {
    let mut guesser = Guesser::new();
    guesser.feed_all(["1", "100", "70000", "-12"]);
    assert_eq!(guesser.current().kind, ValueKind::Int32);

    guesser.feed("1.119");
    let request = guesser.current();
    assert_eq!(request.kind, ValueKind::Decimal);
    // five digits before the point were seen on 70000
    assert_eq!(request.decimal_size, Some(DecimalSize::new(5, 3)));
}

#[test]
fn test_datetime_seed_coerces_to_twenty_seven_wide_string() {
    let translator = TypeTranslator::new(DatabaseType::MsSql);
    let mut guesser = translator.guesser_for("datetime2");
    guesser.feed("2001-01-01 10:00:00");
    guesser.feed("not a date after all");
    let request = guesser.current();
    assert_eq!(request.kind, ValueKind::Text);
    assert!(
        request.width.unwrap() >= Guesser::MIN_DATE_STRING_WIDTH,
        "coercion width {:?} would truncate sub-second precision",
        request.width
    );
}

#[test]
fn test_time_seed_coerces_to_sixteen_wide_string() {
    let translator = TypeTranslator::new(DatabaseType::MySql);
    let mut guesser = translator.guesser_for("time");
    guesser.feed("banana");
    let request = guesser.current();
    assert_eq!(request.kind, ValueKind::Text);
    assert!(request.width.unwrap() >= Guesser::MIN_TIME_STRING_WIDTH);
}

#[test]
fn test_guessed_request_emits_on_every_dialect() {
    let mut guesser = Guesser::new();
    guesser.feed_all(["12.3", "100.25", ""]);
    let request = guesser.current();
    assert!(guesser.saw_null());

    for db in omnisql::dialect::DatabaseType::all() {
        let translator = TypeTranslator::new(db);
        let spelling = translator.sql_type_for(&request).unwrap();
        assert!(!spelling.is_empty(), "{}", db);
    }
}

#[test]
fn test_mixed_bool_and_int_is_text() {
    let mut guesser = Guesser::new();
    guesser.feed("5");
    guesser.feed("true");
    assert_eq!(guesser.current().kind, ValueKind::Text);
}
