//! Rule and filter value types.
//!
//! A rule is stored fixed-width — `p_type` plus six value columns, unset
//! trailing fields padded with the empty string — and handed back to the
//! policy engine as a variable-width "short" tuple that stops at the first
//! empty field.

use serde::{Deserialize, Serialize};

/// Number of columns in the policy table (`p_type` + `v0..v5`).
pub(crate) const COLUMN_COUNT: usize = 7;

/// One row of the policy table, exactly as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRule {
    pub p_type: String,
    pub v0: String,
    pub v1: String,
    pub v2: String,
    pub v3: String,
    pub v4: String,
    pub v5: String,
}

impl StoredRule {
    /// Reconstruct the caller-visible short tuple: `p_type` followed by the
    /// value fields in order, stopping at the first empty field.
    ///
    /// This is the read-side inverse of the fixed-width writer and assumes
    /// rules have no holes. A row stored with an empty middle field is
    /// truncated at the hole and the later fields are not returned.
    pub fn short_tuple(&self) -> Vec<String> {
        let fields = [
            &self.p_type,
            &self.v0,
            &self.v1,
            &self.v2,
            &self.v3,
            &self.v4,
            &self.v5,
        ];

        let mut data = Vec::with_capacity(COLUMN_COUNT);
        for field in fields {
            if field.is_empty() {
                break;
            }
            data.push(field.clone());
        }

        data
    }
}

/// Column filter for a filtered policy load.
///
/// Each list holds the acceptable values for its column; an empty list
/// leaves the column unconstrained, and a filter with every list empty
/// selects all rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFilter {
    pub p_type: Vec<String>,
    pub v0: Vec<String>,
    pub v1: Vec<String>,
    pub v2: Vec<String>,
    pub v3: Vec<String>,
    pub v4: Vec<String>,
    pub v5: Vec<String>,
}

impl PolicyFilter {
    /// The `(column name, values)` pairs in fixed column order, the order
    /// the generated WHERE clause follows.
    pub(crate) fn column_values(&self) -> [(&'static str, &[String]); COLUMN_COUNT] {
        [
            ("p_type", &self.p_type),
            ("v0", &self.v0),
            ("v1", &self.v1),
            ("v2", &self.v2),
            ("v3", &self.v3),
            ("v4", &self.v4),
            ("v5", &self.v5),
        ]
    }

    /// True when no column is constrained.
    pub fn is_empty(&self) -> bool {
        self.column_values().iter().all(|(_, values)| values.is_empty())
    }
}

/// Produce the fixed-width argument list bound to INSERT / UPDATE /
/// DELETE-by-exact-match statements: `ptype` first, then each rule field in
/// order, trailing unset fields padded with the empty string.
pub(crate) fn rule_args(ptype: &str, fields: &[String]) -> Vec<String> {
    let mut args = Vec::with_capacity(COLUMN_COUNT);
    args.push(ptype.to_owned());

    for field in fields.iter().take(COLUMN_COUNT - 1) {
        args.push(field.clone());
    }
    while args.len() < COLUMN_COUNT {
        args.push(String::new());
    }

    args
}

/// Build the partial-match predicate for rules whose fields start at
/// `field_index`: ` AND v{i}=?` for every non-empty supplied value at its
/// correct column offset. The returned argument list starts with `ptype`,
/// matching the `WHERE p_type=?` prefix the condition is appended to.
pub(crate) fn filtered_condition(
    ptype: &str,
    field_index: usize,
    field_values: &[String],
) -> (String, Vec<String>) {
    let mut condition = String::with_capacity(64);
    let mut args = Vec::with_capacity(COLUMN_COUNT);
    args.push(ptype.to_owned());

    let end = field_index + field_values.len();
    for idx in 0..COLUMN_COUNT - 1 {
        if field_index <= idx && idx < end {
            let value = &field_values[idx - field_index];
            if !value.is_empty() {
                condition.push_str(" AND v");
                condition.push_str(&idx.to_string());
                condition.push_str("=?");
                args.push(value.clone());
            }
        }
    }

    (condition, args)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn rule(fields: &[&str]) -> StoredRule {
        let mut padded = fields.iter().map(|f| (*f).to_owned()).collect::<Vec<_>>();
        padded.resize(COLUMN_COUNT, String::new());
        StoredRule {
            p_type: padded[0].clone(),
            v0: padded[1].clone(),
            v1: padded[2].clone(),
            v2: padded[3].clone(),
            v3: padded[4].clone(),
            v4: padded[5].clone(),
            v5: padded[6].clone(),
        }
    }

    #[test]
    fn args_then_short_tuple_round_trips() {
        // 3..7 non-empty leading fields, remainder empty.
        let tuples: &[&[&str]] = &[
            &["p", "alice", "data1"],
            &["p", "alice", "data1", "read"],
            &["p", "alice", "data1", "read", "allow"],
            &["g", "alice", "admin", "domain1", "x", "y"],
            &["p", "a", "b", "c", "d", "e", "f"],
        ];

        for tuple in tuples {
            let (ptype, fields) = tuple.split_first().expect("non-empty tuple");
            let fields: Vec<String> = fields.iter().map(|f| (*f).to_owned()).collect();
            let args = rule_args(ptype, &fields);
            assert_eq!(args.len(), COLUMN_COUNT);

            let stored = rule(tuple);
            assert_eq!(stored.short_tuple(), *tuple);
        }
    }

    #[test]
    fn fixed_width_args_pad_with_empty_strings() {
        let args = rule_args("p", &["alice".to_owned(), "data1".to_owned(), "read".to_owned()]);
        assert_eq!(args, vec!["p", "alice", "data1", "read", "", "", ""]);
    }

    #[test]
    fn short_tuple_truncates_at_a_hole() {
        // v0 empty but v1 set: reconstruction stops at the hole and the
        // later fields are lost. Stored literally, read back truncated.
        let holed = StoredRule {
            p_type: "p".to_owned(),
            v0: String::new(),
            v1: "data1".to_owned(),
            ..StoredRule::default()
        };
        assert_eq!(holed.short_tuple(), vec!["p".to_owned()]);
    }

    #[test]
    fn empty_filter_is_empty() {
        assert!(PolicyFilter::default().is_empty());

        let filter = PolicyFilter {
            v0: vec!["alice".to_owned()],
            ..PolicyFilter::default()
        };
        assert!(!filter.is_empty());
    }

    #[test]
    fn filter_columns_are_in_table_order() {
        let filter = PolicyFilter::default();
        let names: Vec<&str> = filter.column_values().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["p_type", "v0", "v1", "v2", "v3", "v4", "v5"]);
    }

    #[test]
    fn filtered_condition_places_values_at_their_offset() {
        let (condition, args) =
            filtered_condition("p", 2, &["read".to_owned(), "allow".to_owned()]);
        assert_eq!(condition, " AND v2=? AND v3=?");
        assert_eq!(args, vec!["p", "read", "allow"]);
    }

    #[test]
    fn filtered_condition_skips_empty_values() {
        let (condition, args) = filtered_condition(
            "p",
            0,
            &["alice".to_owned(), String::new(), "read".to_owned()],
        );
        assert_eq!(condition, " AND v0=? AND v2=?");
        assert_eq!(args, vec!["p", "alice", "read"]);
    }

    #[test]
    fn filtered_condition_with_no_values_matches_ptype_only() {
        let (condition, args) = filtered_condition("g", 0, &[]);
        assert!(condition.is_empty());
        assert_eq!(args, vec!["g"]);
    }
}
