//! Memory match predicates.
//!
//! # Responsibility
//! - Represent record-store filters as a small expression tree.
//! - Compile the tree to a parameterized SQL `WHERE` clause over `memories`.
//!
//! # Invariants
//! - `Contains` needles are stored folded; columns are folded via `fold()`.
//! - An empty `And` matches everything, an empty `Or` matches nothing.

use crate::db::functions::fold_text;
use rusqlite::types::Value;

/// Searchable memory fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    TagLabel,
    ItemName,
    Notes,
    RecognizedText,
}

/// Every field free-text search looks at.
pub const SEARCHABLE_FIELDS: [SearchField; 4] = [
    SearchField::TagLabel,
    SearchField::ItemName,
    SearchField::Notes,
    SearchField::RecognizedText,
];

/// Filter over memory records.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every memory.
    All,
    /// Folded `needle` is a substring of at least one of `fields`.
    Contains {
        needle: String,
        fields: Vec<SearchField>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Substring match over all searchable fields. The needle is folded here.
    pub fn contains(needle: &str) -> Self {
        Self::Contains {
            needle: fold_text(needle),
            fields: SEARCHABLE_FIELDS.to_vec(),
        }
    }

    /// Compiles to a SQL boolean expression and its bind values, in order.
    ///
    /// The expression references the `memories` table by name.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut binds = Vec::new();
        self.write_sql(&mut sql, &mut binds);
        (sql, binds)
    }

    fn write_sql(&self, sql: &mut String, binds: &mut Vec<Value>) {
        match self {
            Self::All => sql.push_str("1 = 1"),
            Self::Contains { needle, fields } => {
                if fields.is_empty() {
                    sql.push_str("0 = 1");
                    return;
                }
                sql.push('(');
                for (index, field) in fields.iter().enumerate() {
                    if index > 0 {
                        sql.push_str(" OR ");
                    }
                    sql.push_str(field_sql(*field));
                    binds.push(Value::Text(needle.clone()));
                }
                sql.push(')');
            }
            Self::And(parts) => write_joined(parts, " AND ", "1 = 1", sql, binds),
            Self::Or(parts) => write_joined(parts, " OR ", "0 = 1", sql, binds),
        }
    }
}

fn write_joined(
    parts: &[Predicate],
    separator: &str,
    empty: &str,
    sql: &mut String,
    binds: &mut Vec<Value>,
) {
    if parts.is_empty() {
        sql.push_str(empty);
        return;
    }
    sql.push('(');
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            sql.push_str(separator);
        }
        part.write_sql(sql, binds);
    }
    sql.push(')');
}

fn field_sql(field: SearchField) -> &'static str {
    match field {
        SearchField::TagLabel => {
            "EXISTS (SELECT 1 FROM memory_tags mt
                     WHERE mt.memory_id = memories.id
                       AND instr(fold(mt.tag_label), ?) > 0)"
        }
        SearchField::ItemName => {
            "EXISTS (SELECT 1 FROM items it
                     WHERE it.memory_id = memories.id
                       AND instr(fold(it.name), ?) > 0)"
        }
        SearchField::Notes => "instr(fold(memories.notes), ?) > 0",
        SearchField::RecognizedText => {
            "EXISTS (SELECT 1 FROM recognized_texts rt
                     WHERE rt.memory_id = memories.id
                       AND instr(fold(rt.text), ?) > 0)"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Predicate, SearchField};

    #[test]
    fn empty_combinators_compile_to_constants() {
        assert_eq!(Predicate::And(Vec::new()).to_sql().0, "1 = 1");
        assert_eq!(Predicate::Or(Vec::new()).to_sql().0, "0 = 1");
    }

    #[test]
    fn contains_binds_folded_needle_once_per_field() {
        let (sql, binds) = Predicate::contains("Wället").to_sql();
        assert_eq!(binds.len(), 4);
        assert!(binds
            .iter()
            .all(|value| *value == rusqlite::types::Value::Text("wallet".to_string())));
        assert_eq!(sql.matches('?').count(), 4);
    }

    #[test]
    fn contains_without_fields_matches_nothing() {
        let fieldless = Predicate::Contains {
            needle: "passport".to_string(),
            fields: Vec::new(),
        };
        assert_eq!(fieldless.to_sql(), ("0 = 1".to_string(), Vec::new()));
        let notes = Predicate::Contains {
            needle: "passport".to_string(),
            fields: vec![SearchField::Notes],
        };
        assert_eq!(notes.to_sql().0, "(instr(fold(memories.notes), ?) > 0)");
    }
}
