//! Identifier laws across every dialect: wrapping idempotence, runtime-name
//! extraction, full qualification, and scalar function spellings.

use omnisql::dialect::DatabaseType;
use omnisql::syntax::{ScalarFunction, SyntaxHelper};

#[test]
fn test_wrapping_is_idempotent_everywhere() {
    for db in DatabaseType::all() {
        let helper = SyntaxHelper::new(db);
        for name in ["MyCol", "odd name", "1weird", "has.dot"] {
            let once = helper.ensure_wrapped(name);
            let twice = helper.ensure_wrapped(&once);
            assert_eq!(once, twice, "{}: {:?}", db, name);
        }
    }
}

#[test]
fn test_runtime_name_inverts_wrap() {
    for db in DatabaseType::all() {
        let helper = SyntaxHelper::new(db);
        for name in ["MyCol", "odd name", "has.dot"] {
            let wrapped = helper.ensure_wrapped(name);
            let runtime = helper.runtime_name(&wrapped).unwrap();
            let expected = if db == DatabaseType::Oracle {
                name.to_uppercase()
            } else {
                name.to_string()
            };
            assert_eq!(runtime, expected, "{}", db);
        }
    }
}

#[test]
fn test_runtime_name_of_qualified_column_is_the_column() {
    for db in DatabaseType::all() {
        let helper = SyntaxHelper::new(db);
        let qualified = helper.ensure_fully_qualified("db", Some("s"), "tbl", Some("col"));
        let runtime = helper.runtime_name(&qualified).unwrap();
        let expected = if db == DatabaseType::Oracle { "COL" } else { "col" };
        assert_eq!(runtime, expected, "{}: {}", db, qualified);
    }
}

#[test]
fn test_sqlite_qualification_stops_at_the_table() {
    let helper = SyntaxHelper::new(DatabaseType::Sqlite);
    assert_eq!(
        helper.ensure_fully_qualified("ignored", Some("ignored_too"), "tbl", None),
        "\"tbl\""
    );
}

#[test]
fn test_mssql_and_postgres_default_their_schemas() {
    assert_eq!(
        SyntaxHelper::new(DatabaseType::MsSql).ensure_fully_qualified("db", None, "t", None),
        "[db].[dbo].[t]"
    );
    assert_eq!(
        SyntaxHelper::new(DatabaseType::PostgreSql).ensure_fully_qualified("db", None, "t", None),
        "\"db\".\"public\".\"t\""
    );
}

#[test]
fn test_mysql_backtick_doubling_round_trips() {
    let helper = SyntaxHelper::new(DatabaseType::MySql);
    let wrapped = helper.ensure_wrapped("odd`name");
    assert_eq!(wrapped, "`odd``name`");
    assert_eq!(helper.runtime_name(&wrapped).unwrap(), "odd`name");
}

#[test]
fn test_validate_name_length_per_engine() {
    // Oracle allows 30 characters, MySql 64
    let thirty_one = "x".repeat(31);
    assert!(SyntaxHelper::new(DatabaseType::Oracle)
        .validate_name(&thirty_one)
        .is_err());
    assert!(SyntaxHelper::new(DatabaseType::MySql)
        .validate_name(&thirty_one)
        .is_ok());

    for db in DatabaseType::all() {
        assert!(SyntaxHelper::new(db).validate_name("").is_err(), "{}", db);
    }
}

#[test]
fn test_split_line_respects_quoted_regions() {
    let helper = SyntaxHelper::new(DatabaseType::MsSql);

    let (sql, alias) = helper.split_line("count(*) AS MyCount");
    assert_eq!((sql, alias), ("count(*)", Some("MyCount")));

    let (sql, alias) = helper.split_line("CAST([x] AS int)");
    assert_eq!((sql, alias), ("CAST([x] AS int)", None));

    let (sql, alias) = helper.split_line("[odd AS name]");
    assert_eq!((sql, alias), ("[odd AS name]", None));

    let (_, alias) = helper.split_line("LOWER(c) as lowered");
    assert_eq!(alias, Some("lowered"));
}

#[test]
fn test_scalar_function_spellings() {
    let cases = [
        (DatabaseType::MsSql, ScalarFunction::Len, "LEN"),
        (DatabaseType::MySql, ScalarFunction::Len, "LENGTH"),
        (DatabaseType::PostgreSql, ScalarFunction::Len, "LENGTH"),
        (DatabaseType::MsSql, ScalarFunction::GetDate, "GETDATE()"),
        (DatabaseType::MySql, ScalarFunction::GetDate, "NOW()"),
        (
            DatabaseType::PostgreSql,
            ScalarFunction::GetDate,
            "CURRENT_TIMESTAMP",
        ),
        (DatabaseType::Oracle, ScalarFunction::GetDate, "SYSDATE"),
    ];
    for (db, function, expected) in cases {
        assert_eq!(
            SyntaxHelper::new(db).scalar_function_sql(function),
            expected,
            "{}",
            db
        );
    }
}

#[test]
fn test_md5_spellings_and_the_sqlite_refusal() {
    assert_eq!(
        SyntaxHelper::new(DatabaseType::MySql)
            .how_do_we_achieve_md5("'fish'")
            .unwrap(),
        "md5('fish')"
    );
    assert!(SyntaxHelper::new(DatabaseType::MsSql)
        .how_do_we_achieve_md5("'fish'")
        .unwrap()
        .contains("HASHBYTES"));

    let err = SyntaxHelper::new(DatabaseType::Sqlite)
        .how_do_we_achieve_md5("'fish'")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "SQLite does not have a built-in MD5 function"
    );
}
