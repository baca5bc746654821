mod common;

use common::{RecordingConnection, block_on, ids, unwrap_outcome};
use sqlbulk::prelude::*;
use sqlbulk::{FallbackSource, SemanticErrorKind};

fn person() -> EntityMapping {
    EntityMapping::new(
        "Person",
        EntityTable::new("person", &["id"]).columns(&["name", "age"]),
    )
    .with_table(
        EntityTable::new("person_details", &["person_id"])
            .columns(&["nickname", "bio"])
            .optional(),
    )
}

#[test]
fn optional_table_rows_are_filled_by_insert() {
    let statement = BulkUpdate::new(person())
        .set("age", Expr::col("age").add(1))
        .set("nickname", Expr::placeholder(1))
        .filter(Expr::col("name").like("B%"));
    let handler = UpdateHandler::new(&statement, Dialect::Postgres, &MutationConfig::default())
        .expect("compile update");
    let conn = RecordingConnection::new(Dialect::Postgres)
        .matching(ids(&[1, 2, 3]))
        .counts(&[3, 1, 2]);
    let params = [Value::Text("bob".into())];

    let report = block_on(async {
        let cx = Cx::for_testing();
        unwrap_outcome(handler.execute_with_report(&cx, &conn, &params).await)
    });

    let sql = conn.sql();
    assert_eq!(sql.len(), 4);
    assert_eq!(
        sql[1],
        "UPDATE \"person\" SET \"age\" = \"age\" + $1 WHERE \"id\" IN ($2, $3, $4)"
    );
    assert!(
        sql[3].starts_with("INSERT INTO \"person_details\" (\"person_id\", \"nickname\") SELECT")
    );

    let updated = report.rows_for("person_details", StatementKind::Update);
    let inserted = report.rows_for("person_details", StatementKind::Insert);
    assert_eq!(updated + inserted, report.matched);
    assert!(report.is_consistent());
}

#[test]
fn fallback_expectations_are_per_batch() {
    let statement = BulkUpdate::new(person()).set("bio", "n/a");
    let handler = UpdateHandler::new(
        &statement,
        Dialect::Sqlite,
        &MutationConfig::default().batch_size(2),
    )
    .expect("compile update");
    assert_eq!(handler.batch_size(), 2);
    assert_eq!(
        handler.table_updaters()[0].fallback().map(|f| f.source()),
        Some(FallbackSource::RootTable)
    );

    // batch 1: both rows updated; batch 2: the single row is missing
    let conn = RecordingConnection::new(Dialect::Sqlite)
        .matching(ids(&[1, 2, 3]))
        .counts(&[2, 0, 1]);

    let report = block_on(async {
        let cx = Cx::for_testing();
        unwrap_outcome(handler.execute_with_report(&cx, &conn, &[]).await)
    });

    let kinds: Vec<StatementKind> = report.statements.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![StatementKind::Update, StatementKind::Update, StatementKind::Insert]
    );
    assert!(report.is_consistent());
    assert_eq!(
        conn.sql()[3],
        "INSERT INTO \"person_details\" (\"person_id\", \"bio\") \
         SELECT \"person\".\"id\", ?1 FROM \"person\" \
         LEFT JOIN \"person_details\" ON \"person_details\".\"person_id\" = \"person\".\"id\" \
         WHERE \"person\".\"id\" IN (?2) AND \"person_details\".\"person_id\" IS NULL"
    );
}

#[test]
fn inconsistent_counts_are_reported() {
    let handler = UpdateHandler::new(
        &BulkUpdate::new(person()).set("nickname", "x"),
        Dialect::Postgres,
        &MutationConfig::default(),
    )
    .expect("compile update");
    let conn = RecordingConnection::new(Dialect::Postgres)
        .matching(ids(&[1, 2]))
        .counts(&[1, 0]);

    let report = block_on(async {
        let cx = Cx::for_testing();
        unwrap_outcome(handler.execute_with_report(&cx, &conn, &[]).await)
    });

    assert!(!report.is_consistent());
    assert_eq!(report.mismatches[0].expected, 2);
    assert_eq!(report.mismatches[0].updated, 1);
    assert_eq!(report.mismatches[0].inserted, 0);
}

#[test]
fn executor_uses_configured_strategy() {
    let config: MutationConfig =
        serde_json::from_str(r#"{ "restriction": "disjunction", "batch_size": 50 }"#)
            .expect("parse config");
    assert_eq!(config.handler_cache_size, 256);
    let executor = MutationExecutor::new(Dialect::Postgres, config);
    let statement = BulkUpdate::new(person()).set("name", Expr::placeholder(1));
    let conn = RecordingConnection::new(Dialect::Postgres)
        .matching(ids(&[5, 6]))
        .counts(&[2]);

    let matched = block_on(async {
        let cx = Cx::for_testing();
        unwrap_outcome(
            executor
                .execute_update(&cx, &conn, "Person.rename", &statement, &[Value::Text("z".into())])
                .await,
        )
    });

    assert_eq!(matched, 2);
    assert_eq!(
        conn.sql()[1],
        "UPDATE \"person\" SET \"name\" = $1 WHERE ((\"id\" = $2) OR (\"id\" = $3))"
    );
}

#[test]
fn unresolvable_statements_fail_at_construction() {
    let err = UpdateHandler::new(
        &BulkUpdate::new(person())
            .set_tuple(&["name", "bio"], vec![Expr::lit("a"), Expr::lit("b")]),
        Dialect::Postgres,
        &MutationConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::MultiTableAssignment));

    let err = DeleteHandler::new(
        &BulkDelete::new(person()).filter(Expr::col("salary").gt(1)),
        Dialect::Postgres,
        &MutationConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::UnknownColumn));
}
