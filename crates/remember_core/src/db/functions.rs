//! Custom SQLite scalar functions.
//!
//! # Responsibility
//! - Provide `fold(text)`: case- and diacritic-insensitive normal form used
//!   by search predicates on both the column and the needle side.
//!
//! # Invariants
//! - `fold` is deterministic and `NULL`-preserving.

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Folds text for containment matching: canonical decomposition, combining
/// marks stripped, lowercased.
pub fn fold_text(value: &str) -> String {
    value
        .nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Registers `fold(text)` on the connection.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "fold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|text| fold_text(&text)))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::{fold_text, register_functions};
    use rusqlite::Connection;

    #[test]
    fn fold_removes_case_and_diacritics() {
        assert_eq!(fold_text("Crème Brûlée"), "creme brulee");
        assert_eq!(fold_text("ÅNGSTRÖM"), "angstrom");
    }

    #[test]
    fn fold_is_available_in_sql() {
        let conn = Connection::open_in_memory().unwrap();
        register_functions(&conn).unwrap();
        let folded: String = conn
            .query_row("SELECT fold('Café');", [], |row| row.get(0))
            .unwrap();
        assert_eq!(folded, "cafe");

        let null: Option<String> = conn
            .query_row("SELECT fold(NULL);", [], |row| row.get(0))
            .unwrap();
        assert!(null.is_none());
    }
}
