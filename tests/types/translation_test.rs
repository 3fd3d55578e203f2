//! Round-trip laws for the type translators.
//!
//! For every logical request in the closed set and every dialect, parsing
//! the emitted spelling must give back an equivalent request, modulo the
//! engine-imposed coercions each dialect documents (Oracle's NUMBER family,
//! Sqlite's affinities).

use omnisql::dialect::DatabaseType;
use omnisql::types::{DecimalSize, TypeRequest, TypeTranslator, ValueKind, UNBOUNDED};

fn translator(db: DatabaseType) -> TypeTranslator {
    TypeTranslator::new(db)
}

/// The coercions an engine is allowed to apply on round trip.
fn coerced(db: DatabaseType, requested: ValueKind, got: ValueKind) -> bool {
    use DatabaseType::*;
    use ValueKind::*;
    match (db, requested, got) {
        // Sqlite stores everything in five affinities
        (Sqlite, Byte | Int16 | Int64, Int32) => true,
        (Sqlite, Int32, Int64) => true,
        (Sqlite, Float32, Float64) => true,
        (Sqlite, DateTime | Date | Time | Duration | Uuid, Text) => true,
        // Oracle has no time-only type; raw(16) is how GUIDs are stored
        (Oracle, Time | Duration, DateTime) => true,
        // MySql GUIDs are char(36)
        (MySql, Uuid, Text) => true,
        // MySql float maps back through the float family
        (MySql, Float64, Float32) | (MySql, Float32, Float64) => true,
        // durations live in time columns
        (_, Duration, Time) => true,
        _ => false,
    }
}

#[test]
fn test_round_trip_every_kind_on_every_dialect() {
    let kinds = [
        ValueKind::Bool,
        ValueKind::Byte,
        ValueKind::Int16,
        ValueKind::Int32,
        ValueKind::Int64,
        ValueKind::Float32,
        ValueKind::Float64,
        ValueKind::Decimal,
        ValueKind::Text,
        ValueKind::DateTime,
        ValueKind::Date,
        ValueKind::Time,
        ValueKind::Duration,
        ValueKind::Bytes,
        ValueKind::Uuid,
    ];
    for db in DatabaseType::all() {
        let t = translator(db);
        for kind in kinds {
            let request = TypeRequest::new(kind);
            let spelling = t.sql_type_for(&request).unwrap();
            let back = t
                .type_request_for(&spelling)
                .unwrap_or_else(|| panic!("{}: {:?} -> {:?} did not parse", db, kind, spelling));
            assert!(
                back.kind == kind || coerced(db, kind, back.kind),
                "{}: {:?} -> {:?} -> {:?}",
                db,
                kind,
                spelling,
                back.kind
            );
        }
    }
}

#[test]
fn test_bounded_string_round_trip_preserves_width() {
    for db in [
        DatabaseType::MsSql,
        DatabaseType::MySql,
        DatabaseType::PostgreSql,
        DatabaseType::Oracle,
    ] {
        let t = translator(db);
        let spelling = t.sql_type_for(&TypeRequest::text(200)).unwrap();
        let back = t.type_request_for(&spelling).unwrap();
        assert_eq!(back.kind, ValueKind::Text, "{}", db);
        assert_eq!(back.width, Some(200), "{}: {}", db, spelling);
    }
}

#[test]
fn test_decimal_round_trip_preserves_precision_and_scale() {
    for db in [
        DatabaseType::MsSql,
        DatabaseType::MySql,
        DatabaseType::PostgreSql,
        DatabaseType::Oracle,
    ] {
        let t = translator(db);
        let request = TypeRequest::decimal(DecimalSize::new(2, 3));
        let spelling = t.sql_type_for(&request).unwrap();
        let back = t.type_request_for(&spelling).unwrap();
        assert_eq!(back.kind, ValueKind::Decimal, "{}", db);
        assert_eq!(
            back.decimal_size,
            Some(DecimalSize::new(2, 3)),
            "{}: {}",
            db,
            spelling
        );
    }
}

#[test]
fn test_width_at_threshold_is_bounded_and_one_past_is_not() {
    let t = translator(DatabaseType::MsSql);

    let at = t.sql_type_for(&TypeRequest::text(8000)).unwrap();
    assert_eq!(at, "varchar(8000)");
    let past = t.sql_type_for(&TypeRequest::text(8001)).unwrap();
    assert_eq!(past, "varchar(max)");

    let at = t.sql_type_for(&TypeRequest::unicode_text(4000)).unwrap();
    assert_eq!(at, "nvarchar(4000)");
    let past = t.sql_type_for(&TypeRequest::unicode_text(4001)).unwrap();
    assert_eq!(past, "nvarchar(max)");
}

#[test]
fn test_unbounded_spellings_per_dialect() {
    let unbounded = TypeRequest::text(UNBOUNDED);
    assert_eq!(
        translator(DatabaseType::MySql).sql_type_for(&unbounded).unwrap(),
        "longtext"
    );
    assert_eq!(
        translator(DatabaseType::PostgreSql)
            .sql_type_for(&unbounded)
            .unwrap(),
        "text"
    );
    assert_eq!(
        translator(DatabaseType::Oracle).sql_type_for(&unbounded).unwrap(),
        "CLOB"
    );

    let unicode = TypeRequest::unicode_text(UNBOUNDED);
    assert_eq!(
        translator(DatabaseType::Oracle).sql_type_for(&unicode).unwrap(),
        "NCLOB"
    );
}

// Oracle decimal-to-int round trip: int comes back as number(10), and
// number(38) (the engine's rewrite of INT and DECIMAL) reads as decimal.
#[test]
fn test_oracle_number_round_trip() {
    let t = translator(DatabaseType::Oracle);

    let spelling = t.sql_type_for(&TypeRequest::new(ValueKind::Int32)).unwrap();
    assert_eq!(spelling, "number(10)");
    assert_eq!(
        t.type_request_for("number(10)").unwrap().kind,
        ValueKind::Int32
    );

    let wide = t.type_request_for("number(38)").unwrap();
    assert_eq!(wide.kind, ValueKind::Decimal);
    assert_eq!(wide.decimal_size, Some(DecimalSize::from_precision_scale(38, 0)));
}

#[test]
fn test_translate_there_and_back_again() {
    // translating A -> B -> A reproduces the original spelling modulo
    // engine coercion
    let mssql = translator(DatabaseType::MsSql);
    let mysql = translator(DatabaseType::MySql);

    for spelling in ["varchar(100)", "decimal(5,3)", "bigint", "date"] {
        let there = mssql.translate(spelling, &mysql).unwrap();
        let back = mysql.translate(&there, &mssql).unwrap();
        assert_eq!(back, spelling, "via {}", there);
    }

    // datetime2 narrows to datetime on MySql and stays datetime2 on return
    let there = mssql.translate("datetime2", &mysql).unwrap();
    assert_eq!(there, "datetime");
    assert_eq!(mysql.translate(&there, &mssql).unwrap(), "datetime2");
}

#[test]
fn test_unparseable_translation_is_a_typed_error() {
    let postgres = translator(DatabaseType::PostgreSql);
    let mysql = translator(DatabaseType::MySql);
    assert!(postgres.translate("tsvector", &mysql).is_err());
}

#[test]
fn test_text_and_max_parse_to_unbounded() {
    let t = translator(DatabaseType::MsSql);
    for spelling in ["text", "ntext", "varchar(max)", "nvarchar(MAX)"] {
        let request = t.type_request_for(spelling).unwrap();
        assert_eq!(request.width, Some(UNBOUNDED), "{}", spelling);
    }
}
