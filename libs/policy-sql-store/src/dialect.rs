//! Driver-name resolution and per-dialect SQL text.
//!
//! Every recognized driver identifier maps to one of five families; each
//! family carries the DDL and statement templates for that dialect. The
//! templates are authored with generic `?` placeholders and a `{table}`
//! marker, and are rendered exactly once per adapter instance — there is no
//! process-wide mutable SQL state.

use crate::error::AdapterError;
use crate::rebind::{PlaceholderStyle, rebind};

/// Table used when the caller passes an empty table name.
pub const DEFAULT_TABLE_NAME: &str = "casbin_rule";

// Statements shared by every dialect. `{table}` is substituted at
// construction; the table name is trusted operator input, never end-user
// input, and argument values are always bound, never interpolated.
const TABLE_EXIST: &str = "SELECT 1 FROM {table} WHERE 1=0";
const INSERT_ROW: &str = "INSERT INTO {table} (p_type,v0,v1,v2,v3,v4,v5) VALUES (?,?,?,?,?,?,?)";
const UPDATE_ROW: &str = "UPDATE {table} SET p_type=?,v0=?,v1=?,v2=?,v3=?,v4=?,v5=? \
     WHERE p_type=? AND v0=? AND v1=? AND v2=? AND v3=? AND v4=? AND v5=?";
const DELETE_ALL: &str = "DELETE FROM {table}";
const DELETE_ROW: &str =
    "DELETE FROM {table} WHERE p_type=? AND v0=? AND v1=? AND v2=? AND v3=? AND v4=? AND v5=?";
const DELETE_BY_ARGS: &str = "DELETE FROM {table} WHERE p_type=?";
const SELECT_ALL: &str = "SELECT p_type,v0,v1,v2,v3,v4,v5 FROM {table}";
const SELECT_WHERE: &str = "SELECT p_type,v0,v1,v2,v3,v4,v5 FROM {table} WHERE ";

const CREATE_TABLE_GENERIC: &str = "CREATE TABLE {table}(
    p_type VARCHAR(32)  DEFAULT '' NOT NULL,
    v0     VARCHAR(255) DEFAULT '' NOT NULL,
    v1     VARCHAR(255) DEFAULT '' NOT NULL,
    v2     VARCHAR(255) DEFAULT '' NOT NULL,
    v3     VARCHAR(255) DEFAULT '' NOT NULL,
    v4     VARCHAR(255) DEFAULT '' NOT NULL,
    v5     VARCHAR(255) DEFAULT '' NOT NULL
)";
const CREATE_INDEX_GENERIC: &str = "CREATE INDEX idx_{table} ON {table} (p_type,v0,v1)";

const CREATE_TABLE_SQLITE: &str = "CREATE TABLE IF NOT EXISTS {table}(
    p_type VARCHAR(32)  DEFAULT '' NOT NULL,
    v0     VARCHAR(255) DEFAULT '' NOT NULL,
    v1     VARCHAR(255) DEFAULT '' NOT NULL,
    v2     VARCHAR(255) DEFAULT '' NOT NULL,
    v3     VARCHAR(255) DEFAULT '' NOT NULL,
    v4     VARCHAR(255) DEFAULT '' NOT NULL,
    v5     VARCHAR(255) DEFAULT '' NOT NULL,
    CHECK (TYPEOF(p_type) = 'text' AND LENGTH(p_type) <= 32),
    CHECK (TYPEOF(v0) = 'text' AND LENGTH(v0) <= 255),
    CHECK (TYPEOF(v1) = 'text' AND LENGTH(v1) <= 255),
    CHECK (TYPEOF(v2) = 'text' AND LENGTH(v2) <= 255),
    CHECK (TYPEOF(v3) = 'text' AND LENGTH(v3) <= 255),
    CHECK (TYPEOF(v4) = 'text' AND LENGTH(v4) <= 255),
    CHECK (TYPEOF(v5) = 'text' AND LENGTH(v5) <= 255)
)";
const CREATE_INDEX_SQLITE: &str =
    "CREATE INDEX IF NOT EXISTS idx_{table} ON {table} (p_type,v0,v1)";

// MySQL declares the secondary index inline, so creation is one statement.
const CREATE_TABLE_MYSQL: &str = "CREATE TABLE IF NOT EXISTS {table}(
    p_type VARCHAR(32)  DEFAULT '' NOT NULL,
    v0     VARCHAR(255) DEFAULT '' NOT NULL,
    v1     VARCHAR(255) DEFAULT '' NOT NULL,
    v2     VARCHAR(255) DEFAULT '' NOT NULL,
    v3     VARCHAR(255) DEFAULT '' NOT NULL,
    v4     VARCHAR(255) DEFAULT '' NOT NULL,
    v5     VARCHAR(255) DEFAULT '' NOT NULL,
    INDEX idx_{table} (p_type,v0,v1)
) ENGINE = InnoDB DEFAULT CHARSET = utf8mb4";

const CREATE_TABLE_POSTGRES: &str = "CREATE TABLE IF NOT EXISTS {table}(
    p_type VARCHAR(32)  DEFAULT '' NOT NULL,
    v0     VARCHAR(255) DEFAULT '' NOT NULL,
    v1     VARCHAR(255) DEFAULT '' NOT NULL,
    v2     VARCHAR(255) DEFAULT '' NOT NULL,
    v3     VARCHAR(255) DEFAULT '' NOT NULL,
    v4     VARCHAR(255) DEFAULT '' NOT NULL,
    v5     VARCHAR(255) DEFAULT '' NOT NULL
)";
const CREATE_INDEX_POSTGRES: &str =
    "CREATE INDEX IF NOT EXISTS idx_{table} ON {table} (p_type,v0,v1)";
const INSERT_ROW_POSTGRES: &str =
    "INSERT INTO {table} (p_type,v0,v1,v2,v3,v4,v5) VALUES (?,?,?,?,?,?,?) ON CONFLICT DO NOTHING";

const CREATE_TABLE_SQLSERVER: &str = "CREATE TABLE {table}(
    p_type NVARCHAR(32)  DEFAULT '' NOT NULL,
    v0     NVARCHAR(255) DEFAULT '' NOT NULL,
    v1     NVARCHAR(255) DEFAULT '' NOT NULL,
    v2     NVARCHAR(255) DEFAULT '' NOT NULL,
    v3     NVARCHAR(255) DEFAULT '' NOT NULL,
    v4     NVARCHAR(255) DEFAULT '' NOT NULL,
    v5     NVARCHAR(255) DEFAULT '' NOT NULL
)";
const CREATE_INDEX_SQLSERVER: &str = "CREATE INDEX idx_{table} ON {table} (p_type,v0,v1)";

/// Dialect family a driver identifier resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverFamily {
    Sqlite,
    Mysql,
    Postgres,
    SqlServer,
    /// Fallback for unrecognized but structurally compatible drivers:
    /// `?` placeholders and ANSI-ish DDL.
    Generic,
}

impl DriverFamily {
    /// Resolve a driver identifier to its dialect family.
    ///
    /// Empty names, `mssql` (use `sqlserver`) and the Oracle aliases are
    /// rejected outright; any other unrecognized name falls back to
    /// [`DriverFamily::Generic`].
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] naming the rejected
    /// identifier.
    pub fn resolve(driver_name: &str) -> Result<Self, AdapterError> {
        match driver_name {
            "" => Err(AdapterError::Configuration(
                "driver name must not be empty".to_owned(),
            )),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "mysql" => Ok(Self::Mysql),
            "postgres" | "pgx" | "pq-timeouts" | "cloudsql-postgres" | "cloudsqlpostgres" => {
                Ok(Self::Postgres)
            }
            "sqlserver" => Ok(Self::SqlServer),
            "mssql" => Err(AdapterError::Configuration(
                "driver name 'mssql' is not supported, use 'sqlserver'".to_owned(),
            )),
            "oci8" | "ora" | "goracle" | "oracle" => Err(AdapterError::Configuration(format!(
                "driver name '{driver_name}' is not supported, use the Oracle-specific adapter"
            ))),
            other => {
                tracing::debug!(driver = other, "unrecognized driver, using generic profile");
                Ok(Self::Generic)
            }
        }
    }

    /// Placeholder style of this family.
    pub fn placeholder(self) -> PlaceholderStyle {
        match self {
            Self::Sqlite | Self::Mysql | Self::Generic => PlaceholderStyle::Question,
            Self::Postgres => PlaceholderStyle::Dollar,
            Self::SqlServer => PlaceholderStyle::AtP,
        }
    }

    fn create_table_templates(self) -> &'static [&'static str] {
        match self {
            Self::Sqlite => &[CREATE_TABLE_SQLITE, CREATE_INDEX_SQLITE],
            Self::Mysql => &[CREATE_TABLE_MYSQL],
            Self::Postgres => &[CREATE_TABLE_POSTGRES, CREATE_INDEX_POSTGRES],
            Self::SqlServer => &[CREATE_TABLE_SQLSERVER, CREATE_INDEX_SQLSERVER],
            Self::Generic => &[CREATE_TABLE_GENERIC, CREATE_INDEX_GENERIC],
        }
    }

    fn insert_template(self) -> &'static str {
        match self {
            Self::Postgres => INSERT_ROW_POSTGRES,
            _ => INSERT_ROW,
        }
    }
}

fn render(template: &str, table: &str) -> String {
    template.replace("{table}", table)
}

/// Fully rendered statement text for one adapter instance: table name
/// substituted, fixed-width statements already rebound for the dialect.
/// Built once at construction and immutable afterwards.
#[derive(Debug, Clone)]
pub(crate) struct StatementSet {
    pub placeholder: PlaceholderStyle,
    /// DDL statements, executed in order.
    pub create_table: Vec<String>,
    pub table_exist: String,
    pub select_all: String,
    /// `SELECT ... WHERE ` prefix; the dynamic clause is appended and the
    /// whole statement rebound per call.
    pub select_where: String,
    pub insert_row: String,
    pub update_row: String,
    pub delete_all: String,
    pub delete_row: String,
    /// `DELETE ... WHERE p_type=?` prefix in generic form; rebound after the
    /// dynamic field predicates are appended.
    pub delete_by_args: String,
}

impl StatementSet {
    pub fn new(family: DriverFamily, table: &str) -> Self {
        let placeholder = family.placeholder();

        Self {
            placeholder,
            create_table: family
                .create_table_templates()
                .iter()
                .map(|t| render(t, table))
                .collect(),
            table_exist: render(TABLE_EXIST, table),
            select_all: render(SELECT_ALL, table),
            select_where: render(SELECT_WHERE, table),
            insert_row: rebind(&render(family.insert_template(), table), placeholder),
            update_row: rebind(&render(UPDATE_ROW, table), placeholder),
            delete_all: render(DELETE_ALL, table),
            delete_row: rebind(&render(DELETE_ROW, table), placeholder),
            delete_by_args: render(DELETE_BY_ARGS, table),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn resolves_family_aliases() {
        for name in ["sqlite", "sqlite3"] {
            assert_eq!(DriverFamily::resolve(name).ok(), Some(DriverFamily::Sqlite));
        }
        assert_eq!(
            DriverFamily::resolve("mysql").ok(),
            Some(DriverFamily::Mysql)
        );
        for name in [
            "postgres",
            "pgx",
            "pq-timeouts",
            "cloudsql-postgres",
            "cloudsqlpostgres",
        ] {
            assert_eq!(
                DriverFamily::resolve(name).ok(),
                Some(DriverFamily::Postgres)
            );
        }
        assert_eq!(
            DriverFamily::resolve("sqlserver").ok(),
            Some(DriverFamily::SqlServer)
        );
    }

    #[test]
    fn rejects_empty_name() {
        let err = DriverFamily::resolve("").expect_err("empty name must fail");
        assert!(matches!(err, AdapterError::Configuration(_)));
    }

    #[test]
    fn redirects_mssql_to_sqlserver() {
        let err = DriverFamily::resolve("mssql").expect_err("mssql must fail");
        assert!(err.to_string().contains("sqlserver"));
    }

    #[test]
    fn rejects_oracle_aliases_by_name() {
        for name in ["oci8", "ora", "goracle", "oracle"] {
            let err = DriverFamily::resolve(name).expect_err("oracle must fail");
            assert!(err.to_string().contains(name), "message must name {name}");
        }
    }

    #[test]
    fn unknown_names_fall_back_to_generic() {
        assert_eq!(
            DriverFamily::resolve("firebird").ok(),
            Some(DriverFamily::Generic)
        );
        assert_eq!(
            DriverFamily::Generic.placeholder(),
            PlaceholderStyle::Question
        );
    }

    #[test]
    fn statements_substitute_the_table_name() {
        let set = StatementSet::new(DriverFamily::Sqlite, "my_rules");
        assert!(set.select_all.contains("FROM my_rules"));
        assert!(set.insert_row.starts_with("INSERT INTO my_rules "));
        assert!(set.create_table[0].contains("CREATE TABLE IF NOT EXISTS my_rules("));
        assert!(set.create_table[1].contains("idx_my_rules"));
        assert!(!set.select_where.contains("{table}"));
    }

    #[test]
    fn postgres_fixed_statements_are_rebound() {
        let set = StatementSet::new(DriverFamily::Postgres, "casbin_rule");
        assert!(set.insert_row.contains("VALUES ($1,$2,$3,$4,$5,$6,$7)"));
        assert!(set.insert_row.ends_with("ON CONFLICT DO NOTHING"));
        assert!(set.update_row.contains("v5=$7 "));
        assert!(set.update_row.ends_with("v5=$14"));
        // Dynamic prefixes stay in generic form until the clause is complete.
        assert!(set.delete_by_args.ends_with("p_type=?"));
    }

    #[test]
    fn sqlserver_uses_at_p_placeholders_and_nvarchar() {
        let set = StatementSet::new(DriverFamily::SqlServer, "casbin_rule");
        assert!(set.insert_row.contains("@p7"));
        assert!(set.delete_row.ends_with("v5=@p7"));
        assert!(set.create_table[0].contains("NVARCHAR(255)"));
    }

    #[test]
    fn mysql_creates_table_in_one_statement() {
        let set = StatementSet::new(DriverFamily::Mysql, "casbin_rule");
        assert_eq!(set.create_table.len(), 1);
        assert!(set.create_table[0].contains("INDEX idx_casbin_rule"));
    }
}
