use super::SORT_QK;
use crate::schema::Table;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortingField {
    pub name: String,
    pub order: SortOrder,
}

#[derive(Clone, Debug, Default)]
pub struct Sorting {
    pub fields: Vec<SortingField>,
}

impl Sorting {
    /// `"-age|name"` sorts by age descending, then name ascending.
    pub fn parse(raw: &str) -> Self {
        let fields = raw
            .split(super::QUERY_ARGS_DELIMITER)
            .filter(|s| !s.is_empty())
            .filter_map(|s| match s.strip_prefix('-') {
                Some("") => None,
                Some(name) => Some(SortingField {
                    name: name.to_string(),
                    order: SortOrder::Desc,
                }),
                None => Some(SortingField {
                    name: s.to_string(),
                    order: SortOrder::Asc,
                }),
            })
            .collect();
        Sorting { fields }
    }

    pub fn from_query(q: &HashMap<String, String>) -> Self {
        q.get(SORT_QK).map(|s| Self::parse(s)).unwrap_or_default()
    }

    /// Primary key ascending, or nothing when the table has no primary key.
    pub fn default_for(table: &Table) -> Self {
        let fields = table
            .primary_key()
            .map(|c| {
                vec![SortingField {
                    name: c.name.clone(),
                    order: SortOrder::Asc,
                }]
            })
            .unwrap_or_default();
        Sorting { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `ORDER BY` over known columns only; empty string when nothing survives.
    pub fn render(&self, table: &Table) -> String {
        let parts: Vec<String> = self
            .fields
            .iter()
            .filter_map(|f| table.column(&f.name).map(|c| format!("{} {}", c.safe_name(), f.order.as_sql())))
            .collect();
        if parts.is_empty() {
            String::new()
        } else {
            format!("ORDER BY {}", parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::*;

    #[test]
    fn parses_direction_prefix() {
        let s = Sorting::parse("-age||name|-");
        assert_eq!(
            s.fields,
            vec![
                SortingField { name: "age".into(), order: SortOrder::Desc },
                SortingField { name: "name".into(), order: SortOrder::Asc },
            ]
        );
        assert!(Sorting::parse("").is_empty());
    }

    #[test]
    fn render_drops_unknown_columns() {
        let s = Sorting::parse("-age|\"; drop table users;--|name");
        assert_eq!(s.render(&users()), "ORDER BY \"age\" DESC, \"name\" ASC");
        assert_eq!(Sorting::parse("nope").render(&users()), "");
    }

    #[test]
    fn default_sort_is_primary_key() {
        assert_eq!(Sorting::default_for(&users()).render(&users()), "ORDER BY \"id\" ASC");
        let no_pk = table("logs", vec![col("msg", "text")]);
        assert!(Sorting::default_for(&no_pk).is_empty());
    }
}
