//! Tests that run real statements. They need a PostgreSQL server and read its URL from
//! `PGDECK_TEST_DATABASE_URL`; without it every test returns early. Each test works in its own
//! throwaway schema.

use pgdeck::query::{GetRowsParams, RawRow};
use pgdeck::schema::SchemaRegistry;
use pgdeck::service::{
    resolve_relation, CrudService, RelationsConfig, RelationsService, SqlExecutionRequest, SqlExecutionService,
    UpdateRelatedRowsActions,
};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;

struct Scratch {
    pool: PgPool,
    schema: String,
    registry: SchemaRegistry,
}

impl Scratch {
    /// `ddl` refers to the scratch schema as `{s}`.
    async fn new(ddl: &str) -> Option<Scratch> {
        let Ok(url) = std::env::var("PGDECK_TEST_DATABASE_URL") else {
            eprintln!("PGDECK_TEST_DATABASE_URL not set; skipping");
            return None;
        };
        let pool = PgPoolOptions::new().max_connections(2).connect(&url).await.unwrap();
        let schema = format!("pgdeck_test_{}", uuid::Uuid::new_v4().simple());
        sqlx::raw_sql(&format!("CREATE SCHEMA {s}; {}", ddl.replace("{s}", &schema), s = schema))
            .execute(&pool)
            .await
            .unwrap();
        let registry = SchemaRegistry::load(&pool, &schema, &[]).await.unwrap();
        Some(Scratch { pool, schema, registry })
    }

    async fn cleanup(self) {
        sqlx::raw_sql(&format!("DROP SCHEMA {} CASCADE", self.schema))
            .execute(&self.pool)
            .await
            .unwrap();
    }

    async fn rows(&self, table: &str, pairs: &[(&str, &str)]) -> Vec<Value> {
        let q: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let table = self.registry.table(table).unwrap();
        CrudService::get_rows(&self.pool, &table, &GetRowsParams::from_query(&q, 1000))
            .await
            .unwrap()
    }
}

const PEOPLE: &str = "
    CREATE TABLE {s}.people (
        id serial PRIMARY KEY, name text, zip varchar(10), age integer, score numeric, active boolean
    );
    INSERT INTO {s}.people (name, zip, age, score, active) VALUES
        ('ann', '02139', 30, 12.50, true),
        ('bob', '10001', 17, 3, false);
";

fn names(rows: &[Value]) -> Vec<&str> {
    rows.iter().filter_map(|r| r["name"].as_str()).collect()
}

#[tokio::test]
async fn filter_args_take_the_type_of_what_they_compare_with() {
    let Some(db) = Scratch::new(PEOPLE).await else { return };

    let rows = db.rows("people", &[("filters", "zip = $1"), ("filtersArgs", "02139")]).await;
    assert_eq!(names(&rows), vec!["ann"]);

    let rows = db.rows("people", &[("filters", "age > $1"), ("filtersArgs", "18")]).await;
    assert_eq!(names(&rows), vec!["ann"]);

    let rows = db
        .rows("people", &[("filters", "active = $1 AND name <> $2"), ("filtersArgs", "false|ann")])
        .await;
    assert_eq!(names(&rows), vec!["bob"]);

    let rows = db.rows("people", &[("textFilters", "AN")]).await;
    assert_eq!(names(&rows), vec!["ann"]);

    db.cleanup().await;
}

#[tokio::test]
async fn no_matching_rows_is_an_empty_array() {
    let Some(db) = Scratch::new(PEOPLE).await else { return };
    let rows = db.rows("people", &[("filters", "zip = $1"), ("filtersArgs", "2139")]).await;
    assert!(rows.is_empty());
    db.cleanup().await;
}

#[tokio::test]
async fn default_sort_keeps_pages_stable() {
    let ddl = "
        CREATE TABLE {s}.items (id integer PRIMARY KEY, label text);
        INSERT INTO {s}.items VALUES (3, 'c'), (1, 'a'), (5, 'e'), (2, 'b'), (4, 'd');
    ";
    let Some(db) = Scratch::new(ddl).await else { return };
    let mut seen = Vec::new();
    for offset in ["0", "2", "4"] {
        for row in db.rows("items", &[("limit", "2"), ("offset", offset)]).await {
            seen.push(row["id"].as_i64().unwrap());
        }
    }
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    db.cleanup().await;
}

#[tokio::test]
async fn writes_keep_text_verbatim_and_fill_array_columns() {
    let ddl = "CREATE TABLE {s}.notes (id serial PRIMARY KEY, body text, nums integer[], tags text[], meta jsonb);";
    let Some(db) = Scratch::new(ddl).await else { return };
    let notes = db.registry.table("notes").unwrap();

    let braced = "{67E55044-10B1-426F-9247-BB680E5FE0C8}";
    let row: RawRow = serde_json::from_value(json!({
        "body": braced,
        "nums": [1, 2, 3],
        "tags": ["a b", "NULL"],
        "meta": {"k": [1]},
    }))
    .unwrap();
    let inserted = CrudService::insert_row(&db.pool, &notes, &row).await.unwrap();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0]["body"], braced);
    assert_eq!(inserted[0]["nums"], json!([1, 2, 3]));
    assert_eq!(inserted[0]["tags"], json!(["a b", "NULL"]));
    assert_eq!(inserted[0]["meta"], json!({"k": [1]}));

    let id = inserted[0]["id"].to_string();
    let q: HashMap<String, String> = [("filters", "id = $1"), ("filtersArgs", id.as_str())]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let params = GetRowsParams::from_query(&q, 1000);
    let patch: RawRow = serde_json::from_value(json!({"body": "007"})).unwrap();
    let updated = CrudService::update_rows(&db.pool, &notes, &params.filters, &patch).await.unwrap();
    assert_eq!(updated[0]["body"], "007");

    db.cleanup().await;
}

const CODES: &str = "
    CREATE TABLE {s}.codes (code text PRIMARY KEY);
    CREATE TABLE {s}.friends (
        a text REFERENCES {s}.codes (code),
        b text REFERENCES {s}.codes (code),
        PRIMARY KEY (a, b)
    );
    INSERT INTO {s}.codes VALUES ('007'), ('7'), ('8');
";

async fn links(db: &Scratch) -> Vec<(String, String)> {
    sqlx::query_as::<_, (String, String)>(&format!("SELECT a, b FROM {}.friends ORDER BY a, b", db.schema))
        .fetch_all(&db.pool)
        .await
        .unwrap()
}

fn codes_relation(bidirectional: bool) -> RelationsConfig {
    RelationsConfig {
        main_table: "codes".into(),
        relation_table: "codes".into(),
        join_table: "friends".into(),
        bidirectional,
        ..Default::default()
    }
}

#[tokio::test]
async fn text_keys_link_the_named_rows_and_adds_are_idempotent() {
    let Some(db) = Scratch::new(CODES).await else { return };
    let rd = resolve_relation(&db.registry.snapshot(), &codes_relation(false)).unwrap();
    let add = UpdateRelatedRowsActions {
        add_ids: vec![json!("7")],
        delete_ids: vec![],
    };

    RelationsService::update_related_rows(&db.pool, &rd, "007", &add).await.unwrap();
    RelationsService::update_related_rows(&db.pool, &rd, "007", &add).await.unwrap();
    assert_eq!(links(&db).await, vec![("007".to_string(), "7".to_string())]);

    let related = RelationsService::get_related_rows(&db.pool, &rd, "007").await.unwrap();
    assert_eq!(related, vec![json!({"code": "7"})]);
    assert!(RelationsService::get_related_rows(&db.pool, &rd, "7").await.unwrap().is_empty());

    db.cleanup().await;
}

#[tokio::test]
async fn bidirectional_links_are_added_and_removed_in_pairs() {
    let Some(db) = Scratch::new(CODES).await else { return };
    let rd = resolve_relation(&db.registry.snapshot(), &codes_relation(true)).unwrap();

    let add = UpdateRelatedRowsActions {
        add_ids: vec![json!("8")],
        delete_ids: vec![],
    };
    RelationsService::update_related_rows(&db.pool, &rd, "007", &add).await.unwrap();
    assert_eq!(
        links(&db).await,
        vec![("007".to_string(), "8".to_string()), ("8".to_string(), "007".to_string())]
    );

    let delete = UpdateRelatedRowsActions {
        add_ids: vec![],
        delete_ids: vec![json!("8")],
    };
    RelationsService::update_related_rows(&db.pool, &rd, "007", &delete).await.unwrap();
    assert!(links(&db).await.is_empty());

    db.cleanup().await;
}

#[tokio::test]
async fn failed_link_rolls_back_the_whole_batch() {
    let Some(db) = Scratch::new(CODES).await else { return };
    let rd = resolve_relation(&db.registry.snapshot(), &codes_relation(false)).unwrap();
    let add = UpdateRelatedRowsActions {
        add_ids: vec![json!("7"), json!("missing")],
        delete_ids: vec![],
    };
    assert!(RelationsService::update_related_rows(&db.pool, &rd, "007", &add).await.is_err());
    assert!(links(&db).await.is_empty());
    db.cleanup().await;
}

#[tokio::test]
async fn sql_execution_returns_numeric_values() {
    let Some(db) = Scratch::new(PEOPLE).await else { return };

    let req = SqlExecutionRequest {
        query: format!("SELECT score, avg(age) AS a, zip AS z FROM {}.people GROUP BY score, zip ORDER BY z", db.schema),
        args: vec![],
    };
    let out = SqlExecutionService::execute(&db.pool, &req).await.unwrap();
    assert_eq!(out.columns, vec!["score", "a", "z"]);
    assert_eq!(out.rows[0]["score"], json!(12.5));
    assert_eq!(out.rows[0]["a"], json!(30.0));
    assert_eq!(out.rows[0]["z"], json!("02139"));

    let req = SqlExecutionRequest {
        query: format!("SELECT avg(age) AS a, $2::numeric * 2 AS n FROM {}.people WHERE zip = $1", db.schema),
        args: vec![json!("02139"), json!("1.25")],
    };
    let out = SqlExecutionService::execute(&db.pool, &req).await.unwrap();
    assert_eq!(out.rows[0]["a"], json!(30.0));
    assert_eq!(out.rows[0]["n"], json!(2.5));

    db.cleanup().await;
}
