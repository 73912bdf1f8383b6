//! Result row and scalar value types.

use std::fmt;

use crate::label::INVALID_LABEL_VALUE;

/// A scalar cell value read from a database row.
///
/// Drivers decode their native column types into this enum. It carries just
/// enough type information to emit a gauge value or render a label.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL or a column type the driver could not decode.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    Text(String),
}

impl Value {
    /// Convert to a gauge sample.
    ///
    /// Text is parsed as a float after trimming; booleans become 1 or 0.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Render as a label value. Null renders as the invalid-value sentinel.
    pub fn to_label(&self) -> String {
        match self {
            Value::Null => INVALID_LABEL_VALUE.to_string(),
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One database row: an ordered sequence of cells.
///
/// Cells are addressed 0-based here; configuration refers to columns 1-based
/// and the conversion happens when bindings are built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    cells: Vec<Value>,
}

impl ResultRow {
    /// Create a row from its cells.
    pub fn new(cells: Vec<Value>) -> Self {
        Self { cells }
    }

    /// A row with no columns, as produced after a failed execution.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of columns in this row.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Get the cell at a 0-based column index.
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.cells.get(idx)
    }
}

impl From<Vec<Value>> for ResultRow {
    fn from(cells: Vec<Value>) -> Self {
        Self::new(cells)
    }
}

impl FromIterator<Value> for ResultRow {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_conversion() {
        assert_eq!(Value::Int(10).as_f64(), Some(10.0));
        assert_eq!(Value::Float(2.5).as_f64(), Some(2.5));
        assert_eq!(Value::Bool(true).as_f64(), Some(1.0));
        assert_eq!(Value::Bool(false).as_f64(), Some(0.0));
        assert_eq!(Value::from(" 42.5 ").as_f64(), Some(42.5));
        assert_eq!(Value::from("n/a").as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }

    #[test]
    fn test_label_rendering() {
        assert_eq!(Value::from("USERS").to_label(), "USERS");
        assert_eq!(Value::Int(5432).to_label(), "5432");
        assert_eq!(Value::Bool(true).to_label(), "true");
        assert_eq!(Value::Null.to_label(), INVALID_LABEL_VALUE);
    }

    #[test]
    fn test_row_access() {
        let row = ResultRow::new(vec![Value::from("A"), Value::Int(10)]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get(0), Some(&Value::from("A")));
        assert_eq!(row.get(1), Some(&Value::Int(10)));
        assert_eq!(row.get(2), None);

        let empty = ResultRow::empty();
        assert!(empty.is_empty());
        assert_eq!(empty.get(0), None);
    }

    #[test]
    fn test_optional_into_value() {
        let missing: Option<i64> = None;
        assert_eq!(Value::from(missing), Value::Null);
        assert_eq!(Value::from(Some(3i64)), Value::Int(3));
    }
}
