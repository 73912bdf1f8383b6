//! Label value templates.
//!
//! A gauge's label map associates each label name with a template. The
//! template is either a literal string or a column placeholder of the form
//! `$N`, which takes the label value from column `N` (1-based) of the row
//! being mapped.

use std::sync::LazyLock;

use regex::Regex;

use crate::row::ResultRow;

/// Label value emitted when a placeholder cannot be resolved.
pub const INVALID_LABEL_VALUE: &str = "INVALID";

/// Anchored placeholder pattern: `$` followed by digits and nothing else.
static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$(\d+)$").expect("placeholder regex pattern is invalid - this is a bug")
});

/// A parsed label template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelTemplate {
    /// Emitted verbatim.
    Literal(String),
    /// 1-based column reference. `$0` parses to `Column(0)` and never resolves.
    Column(usize),
}

/// Resolves label templates against result rows.
pub struct LabelResolver;

impl LabelResolver {
    /// Parse a template string.
    ///
    /// Only an exact whole-string match of `$<digits>` is a placeholder;
    /// anything else, including `$1x` or ` $1`, is a literal.
    pub fn parse(template: &str) -> LabelTemplate {
        match PLACEHOLDER_REGEX.captures(template) {
            Some(caps) => {
                // Digit runs too long for usize can never index a row.
                let n = caps[1].parse::<usize>().unwrap_or(usize::MAX);
                LabelTemplate::Column(n)
            }
            None => LabelTemplate::Literal(template.to_string()),
        }
    }

    /// Whether the template is a column placeholder.
    pub fn is_placeholder(template: &str) -> bool {
        PLACEHOLDER_REGEX.is_match(template)
    }

    /// The 1-based column a placeholder refers to, if the template is one.
    pub fn placeholder_column(template: &str) -> Option<usize> {
        match Self::parse(template) {
            LabelTemplate::Column(n) => Some(n),
            LabelTemplate::Literal(_) => None,
        }
    }

    /// Resolve a template against a row.
    pub fn resolve(template: &str, row: &ResultRow) -> String {
        match Self::parse(template) {
            LabelTemplate::Literal(value) => value,
            LabelTemplate::Column(n) => Self::resolve_column(n, row),
        }
    }

    fn resolve_column(n: usize, row: &ResultRow) -> String {
        if n == 0 || row.len() < n {
            return INVALID_LABEL_VALUE.to_string();
        }
        row.get(n - 1)
            .map(|value| value.to_label())
            .unwrap_or_else(|| INVALID_LABEL_VALUE.to_string())
    }
}
