//! Statement guard.

/// Whether `sql` is a SELECT statement.
///
/// Leading whitespace is ignored and the keyword is matched without regard
/// to case. Anything else is refused before reaching the database.
pub fn is_select(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .map(|prefix| prefix.eq_ignore_ascii_case("select"))
        .unwrap_or(false)
}
