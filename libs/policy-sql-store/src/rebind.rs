//! Placeholder rewriting for dialect-specific parameter syntax.
//!
//! Statements are authored once in generic `?` form; before execution they
//! are rewritten into the placeholder style the target driver expects.
//! The `Any` driver hands SQL to the native backend verbatim, so PostgreSQL
//! needs `$1,$2,...` and SQL Server needs `@p1,@p2,...` where the generic
//! templates say `?`.

/// Parameter placeholder syntax of a SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` — SQLite, MySQL and the generic fallback. No rewriting needed.
    Question,
    /// `$1, $2, ...` — PostgreSQL.
    Dollar,
    /// `@p1, @p2, ...` — SQL Server.
    AtP,
    /// `:arg1, :arg2, ...` — Oracle. The style is part of the engine's
    /// contract even though Oracle driver names are rejected at construction.
    ColonArg,
}

impl PlaceholderStyle {
    fn prefix(self) -> &'static str {
        match self {
            Self::Question => "?",
            Self::Dollar => "$",
            Self::AtP => "@p",
            Self::ColonArg => ":arg",
        }
    }
}

/// Rewrite every generic `?` placeholder in `sql` into the target style,
/// numbering left to right starting at 1.
///
/// Non-placeholder text is preserved byte for byte. Numbering restarts at 1
/// on every call; callers must not rebind an already-rebound statement.
/// Table and column names never contain `?`, so every `?` in the input is a
/// placeholder.
pub fn rebind(sql: &str, style: PlaceholderStyle) -> String {
    if style == PlaceholderStyle::Question {
        return sql.to_owned();
    }

    let prefix = style.prefix();
    let mut out = String::with_capacity(sql.len() + 16);
    let mut rest = sql;
    let mut num = 0u32;

    while let Some(idx) = rest.find('?') {
        num += 1;
        out.push_str(&rest[..idx]);
        out.push_str(prefix);
        out.push_str(&num.to_string());
        rest = &rest[idx + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_style_is_a_no_op() {
        let sql = "INSERT INTO t (a,b) VALUES (?,?)";
        assert_eq!(rebind(sql, PlaceholderStyle::Question), sql);
    }

    #[test]
    fn dollar_numbers_left_to_right_from_one() {
        assert_eq!(
            rebind(
                "INSERT INTO t (a,b,c) VALUES (?,?,?)",
                PlaceholderStyle::Dollar
            ),
            "INSERT INTO t (a,b,c) VALUES ($1,$2,$3)"
        );
    }

    #[test]
    fn at_p_style() {
        assert_eq!(
            rebind("DELETE FROM t WHERE a=? AND b=?", PlaceholderStyle::AtP),
            "DELETE FROM t WHERE a=@p1 AND b=@p2"
        );
    }

    #[test]
    fn colon_arg_style() {
        assert_eq!(
            rebind("SELECT * FROM t WHERE a=?", PlaceholderStyle::ColonArg),
            "SELECT * FROM t WHERE a=:arg1"
        );
    }

    #[test]
    fn numbering_restarts_per_statement() {
        let first = rebind("a=?", PlaceholderStyle::Dollar);
        let second = rebind("b=? AND c=?", PlaceholderStyle::Dollar);
        assert_eq!(first, "a=$1");
        assert_eq!(second, "b=$1 AND c=$2");
    }

    #[test]
    fn preserves_surrounding_text_exactly() {
        let sql = "UPDATE t SET x=?, y=? WHERE z IN (?,?,?)";
        assert_eq!(
            rebind(sql, PlaceholderStyle::Dollar),
            "UPDATE t SET x=$1, y=$2 WHERE z IN ($3,$4,$5)"
        );
    }

    #[test]
    fn no_placeholders_returns_input() {
        let sql = "DELETE FROM casbin_rule";
        assert_eq!(rebind(sql, PlaceholderStyle::Dollar), sql);
    }

    #[test]
    fn two_digit_numbering() {
        let sql = "VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?)";
        let out = rebind(sql, PlaceholderStyle::AtP);
        assert!(out.ends_with("@p13,@p14)"));
    }
}
