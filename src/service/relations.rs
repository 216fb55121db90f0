//! Many-to-many traversal and membership edits through a join table.

use crate::error::AppError;
use crate::schema::{Column, Table, TablesMap};
use crate::sql::{PgBindValue, QueryBuf};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use super::crud::fetch_json_rows;

/// A many-to-many edge: rows of `main_table` linked to rows of `relation_table` via `join_table`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationsConfig {
    pub main_table: String,
    pub relation_table: String,
    pub join_table: String,
    #[serde(default)]
    pub bidirectional: bool,
    /// Join-table column pointing at the main table. Discovered from foreign keys when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_join_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_join_column: Option<String>,
}

/// A `RelationsConfig` resolved against one schema snapshot.
#[derive(Clone, Debug)]
pub struct RelationData {
    pub config: RelationsConfig,
    pub main_table: Table,
    pub relation_table: Table,
    pub join_table: Table,
    pub main_join_column: Column,
    pub relation_join_column: Column,
    /// Column on the relation table that `relation_join_column` references.
    pub relation_table_column: Column,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRelatedRowsActions {
    #[serde(default)]
    pub add_ids: Vec<Value>,
    #[serde(default)]
    pub delete_ids: Vec<Value>,
}

fn lookup_table(tables: &TablesMap, role: &'static str, name: &str) -> Result<Table, AppError> {
    tables
        .get(name)
        .cloned()
        .ok_or_else(|| AppError::RelationTableNotFound {
            role,
            table: name.to_string(),
        })
}

/// Pick a join column among `candidates` (foreign keys to the expected table), honouring an
/// explicit name and never returning `exclude`.
fn pick_join_column(
    join: &Table,
    candidates: &[&Column],
    explicit: Option<&str>,
    exclude: Option<&str>,
    side: &'static str,
) -> Result<Column, AppError> {
    candidates
        .iter()
        .filter(|c| Some(c.name.as_str()) != exclude)
        .find(|c| explicit.map(|n| c.name == n).unwrap_or(true))
        .map(|c| (*c).clone())
        .ok_or_else(|| AppError::JoinColumnNotFound {
            side,
            join_table: join.name.clone(),
        })
}

/// Look up the three tables and discover the join columns. When main and relation are the
/// same table, the first two foreign keys to it (in column order) become main and relation
/// join columns, unless named explicitly.
pub fn resolve_relation(tables: &TablesMap, config: &RelationsConfig) -> Result<RelationData, AppError> {
    let main_table = lookup_table(tables, "main", &config.main_table)?;
    let relation_table = lookup_table(tables, "relation", &config.relation_table)?;
    let join_table = lookup_table(tables, "join", &config.join_table)?;

    let main_candidates = join_table.foreign_key_columns_to(&main_table.name);
    let main_join_column = pick_join_column(
        &join_table,
        &main_candidates,
        config.main_join_column.as_deref(),
        config.relation_join_column.as_deref(),
        "main join column",
    )?;
    let relation_candidates = join_table.foreign_key_columns_to(&relation_table.name);
    let relation_join_column = pick_join_column(
        &join_table,
        &relation_candidates,
        config.relation_join_column.as_deref(),
        Some(main_join_column.name.as_str()),
        "relation join column",
    )?;

    let relation_table_column = relation_join_column
        .foreign_key
        .as_ref()
        .and_then(|fk| relation_table.column(&fk.column_name))
        .cloned()
        .ok_or_else(|| AppError::JoinColumnNotFound {
            side: "referenced relation column",
            join_table: join_table.name.clone(),
        })?;

    Ok(RelationData {
        config: config.clone(),
        main_table,
        relation_table,
        join_table,
        main_join_column,
        relation_join_column,
        relation_table_column,
    })
}

impl RelationData {
    pub fn related_rows_query(&self, main_row_id: PgBindValue) -> QueryBuf {
        let rel = self.relation_table.safe_name();
        let join = self.join_table.safe_name();
        let cols: Vec<String> = self
            .relation_table
            .columns
            .iter()
            .map(|c| format!("{}.{}", rel, c.safe_name()))
            .collect();
        QueryBuf {
            sql: format!(
                "SELECT {} FROM {} JOIN {} ON {}.{} = {}.{} WHERE {}.{} = {}",
                cols.join(", "),
                rel,
                join,
                join,
                self.relation_join_column.safe_name(),
                rel,
                self.relation_table_column.safe_name(),
                join,
                self.main_join_column.safe_name(),
                self.main_join_column.cast_placeholder(1)
            ),
            params: vec![main_row_id],
            inferred_params: 0,
        }
    }

    /// `$1` is the main-side id, `$2` the relation-side id.
    pub fn delete_link_sql(&self) -> String {
        format!(
            "DELETE FROM {} WHERE {} = {} AND {} = {}",
            self.join_table.safe_name(),
            self.main_join_column.safe_name(),
            self.main_join_column.cast_placeholder(1),
            self.relation_join_column.safe_name(),
            self.relation_join_column.cast_placeholder(2)
        )
    }

    /// Re-adding an existing pair is a no-op.
    pub fn insert_link_sql(&self) -> String {
        let main = self.main_join_column.safe_name();
        let rel = self.relation_join_column.safe_name();
        format!(
            "INSERT INTO {} ({}, {}) VALUES ({}, {}) ON CONFLICT ({}, {}) DO NOTHING",
            self.join_table.safe_name(),
            main,
            rel,
            self.main_join_column.cast_placeholder(1),
            self.relation_join_column.cast_placeholder(2),
            main,
            rel
        )
    }

    /// Ordered `(main, relation)` id pairs for one action list, including reverse pairs when bidirectional.
    fn link_pairs(&self, main_row_id: &PgBindValue, ids: &[Value]) -> Vec<(PgBindValue, PgBindValue)> {
        let mut pairs = Vec::with_capacity(ids.len() * 2);
        for id in ids {
            let other = PgBindValue::from_json(id, &self.relation_join_column.reg_type);
            pairs.push((main_row_id.clone(), other.clone()));
            if self.config.bidirectional {
                pairs.push((other, main_row_id.clone()));
            }
        }
        pairs
    }
}

pub struct RelationsService;

impl RelationsService {
    pub async fn get_related_rows(
        pool: &PgPool,
        relation: &RelationData,
        main_row_id: &str,
    ) -> Result<Vec<Value>, AppError> {
        let q = relation.related_rows_query(PgBindValue::text(main_row_id));
        fetch_json_rows(pool, q).await
    }

    /// All deletes, then all adds, in one transaction. Any failure rolls the whole batch back.
    pub async fn update_related_rows(
        pool: &PgPool,
        relation: &RelationData,
        main_row_id: &str,
        actions: &UpdateRelatedRowsActions,
    ) -> Result<(), AppError> {
        let main_id = PgBindValue::text(main_row_id);
        let delete_sql = relation.delete_link_sql();
        let insert_sql = relation.insert_link_sql();

        let mut tx = pool.begin().await?;
        for (a, b) in relation.link_pairs(&main_id, &actions.delete_ids) {
            tracing::debug!(sql = %delete_sql, params = ?(&a, &b), "query (tx)");
            sqlx::query(&delete_sql).bind(a).bind(b).execute(&mut *tx).await?;
        }
        for (a, b) in relation.link_pairs(&main_id, &actions.add_ids) {
            tracing::debug!(sql = %insert_sql, params = ?(&a, &b), "query (tx)");
            sqlx::query(&insert_sql).bind(a).bind(b).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::*;

    fn config(main: &str, rel: &str, join: &str) -> RelationsConfig {
        RelationsConfig {
            main_table: main.into(),
            relation_table: rel.into(),
            join_table: join.into(),
            ..Default::default()
        }
    }

    fn schema() -> TablesMap {
        tables(vec![
            users(),
            table("tags", vec![pk("id", "integer"), col("label", "text")]),
            table(
                "user_tags",
                vec![
                    fk("user_id", "integer", "users", "id"),
                    fk("tag_id", "integer", "tags", "id"),
                ],
            ),
            table(
                "friends",
                vec![
                    fk("user_a", "integer", "users", "id"),
                    fk("user_b", "integer", "users", "id"),
                ],
            ),
        ])
    }

    #[test]
    fn resolves_distinct_tables() {
        let rd = resolve_relation(&schema(), &config("users", "tags", "user_tags")).unwrap();
        assert_eq!(rd.main_join_column.name, "user_id");
        assert_eq!(rd.relation_join_column.name, "tag_id");
        assert_eq!(rd.relation_table_column.name, "id");
    }

    #[test]
    fn unknown_tables_name_their_role() {
        let err = resolve_relation(&schema(), &config("users", "nope", "user_tags")).unwrap_err();
        assert!(matches!(err, AppError::RelationTableNotFound { role: "relation", .. }));
        let err = resolve_relation(&schema(), &config("users", "tags", "nope")).unwrap_err();
        assert!(matches!(err, AppError::RelationTableNotFound { role: "join", .. }));
        let err = resolve_relation(&schema(), &config("nope", "tags", "user_tags")).unwrap_err();
        assert!(matches!(err, AppError::RelationTableNotFound { role: "main", .. }));
    }

    #[test]
    fn missing_foreign_key_names_the_side() {
        // friends has no column pointing at tags
        let err = resolve_relation(&schema(), &config("users", "tags", "friends")).unwrap_err();
        assert!(matches!(err, AppError::JoinColumnNotFound { side: "relation join column", .. }));
        let err = resolve_relation(&schema(), &config("tags", "users", "friends")).unwrap_err();
        assert!(matches!(err, AppError::JoinColumnNotFound { side: "main join column", .. }));
    }

    #[test]
    fn self_reference_takes_first_two_in_column_order() {
        let rd = resolve_relation(&schema(), &config("users", "users", "friends")).unwrap();
        assert_eq!(rd.main_join_column.name, "user_a");
        assert_eq!(rd.relation_join_column.name, "user_b");
    }

    #[test]
    fn self_reference_honours_explicit_columns() {
        let mut cfg = config("users", "users", "friends");
        cfg.main_join_column = Some("user_b".into());
        let rd = resolve_relation(&schema(), &cfg).unwrap();
        assert_eq!(rd.main_join_column.name, "user_b");
        assert_eq!(rd.relation_join_column.name, "user_a");

        let mut cfg = config("users", "users", "friends");
        cfg.relation_join_column = Some("user_a".into());
        let rd = resolve_relation(&schema(), &cfg).unwrap();
        assert_eq!(rd.main_join_column.name, "user_b");
        assert_eq!(rd.relation_join_column.name, "user_a");
    }

    #[test]
    fn explicit_column_must_reference_expected_table() {
        let mut cfg = config("users", "tags", "user_tags");
        cfg.main_join_column = Some("tag_id".into());
        let err = resolve_relation(&schema(), &cfg).unwrap_err();
        assert!(matches!(err, AppError::JoinColumnNotFound { side: "main join column", .. }));
    }

    #[test]
    fn related_rows_sql() {
        let rd = resolve_relation(&schema(), &config("users", "tags", "user_tags")).unwrap();
        let q = rd.related_rows_query(PgBindValue::text("1"));
        assert_eq!(
            q.sql,
            "SELECT \"public\".\"tags\".\"id\", \"public\".\"tags\".\"label\" FROM \"public\".\"tags\" \
             JOIN \"public\".\"user_tags\" ON \"public\".\"user_tags\".\"tag_id\" = \"public\".\"tags\".\"id\" \
             WHERE \"public\".\"user_tags\".\"user_id\" = $1::text::integer"
        );
    }

    #[test]
    fn link_sql_is_idempotent_insert() {
        let rd = resolve_relation(&schema(), &config("users", "tags", "user_tags")).unwrap();
        assert_eq!(
            rd.insert_link_sql(),
            "INSERT INTO \"public\".\"user_tags\" (\"user_id\", \"tag_id\") VALUES ($1::text::integer, $2::text::integer) \
             ON CONFLICT (\"user_id\", \"tag_id\") DO NOTHING"
        );
        assert_eq!(
            rd.delete_link_sql(),
            "DELETE FROM \"public\".\"user_tags\" WHERE \"user_id\" = $1::text::integer AND \"tag_id\" = $2::text::integer"
        );
    }

    #[test]
    fn bidirectional_adds_reverse_pairs() {
        let mut cfg = config("users", "users", "friends");
        cfg.bidirectional = true;
        let rd = resolve_relation(&schema(), &cfg).unwrap();
        let pairs = rd.link_pairs(&PgBindValue::text("1"), &[serde_json::json!(2)]);
        assert_eq!(
            pairs,
            vec![
                (PgBindValue::text("1"), PgBindValue::text("2")),
                (PgBindValue::text("2"), PgBindValue::text("1")),
            ]
        );

        let rd = resolve_relation(&schema(), &config("users", "tags", "user_tags")).unwrap();
        assert_eq!(rd.link_pairs(&PgBindValue::text("1"), &[serde_json::json!(2)]).len(), 1);
    }

    #[test]
    fn text_keys_are_bound_verbatim() {
        let codes = tables(vec![
            table("codes", vec![pk("code", "text")]),
            table(
                "code_links",
                vec![fk("src", "text", "codes", "code"), fk("dst", "text", "codes", "code")],
            ),
        ]);
        let rd = resolve_relation(&codes, &config("codes", "codes", "code_links")).unwrap();
        let pairs = rd.link_pairs(&PgBindValue::text("007"), &[serde_json::json!("7")]);
        assert_eq!(pairs, vec![(PgBindValue::text("007"), PgBindValue::text("7"))]);
        assert_eq!(
            rd.insert_link_sql(),
            "INSERT INTO \"public\".\"code_links\" (\"src\", \"dst\") VALUES ($1::text, $2::text) \
             ON CONFLICT (\"src\", \"dst\") DO NOTHING"
        );
        let q = rd.related_rows_query(PgBindValue::text("007"));
        assert_eq!(q.params, vec![PgBindValue::text("007")]);
    }

    #[test]
    fn actions_deserialize_camel_case() {
        let a: UpdateRelatedRowsActions =
            serde_json::from_value(serde_json::json!({"addIds": [1, 2], "deleteIds": ["x"]})).unwrap();
        assert_eq!(a.add_ids.len(), 2);
        assert_eq!(a.delete_ids, vec![serde_json::json!("x")]);
        let empty: UpdateRelatedRowsActions = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(empty.add_ids.is_empty());
    }
}
