//! SQL persistence for authorization policy rules.
//!
//! This crate stores the rule set of an authorization engine in a single
//! relational table (`p_type, v0..v5`) and loads it back, across several SQL
//! dialects: SQLite, MySQL, PostgreSQL and SQL Server (Oracle driver names
//! are rejected). The caller owns the connection pool; the adapter resolves
//! the dialect from the driver identifier, renders its statement set once at
//! construction, and rewrites generic `?` placeholders into the dialect's
//! native syntax before execution.
//!
//! All statements are parameterized. Batch operations (bulk add/remove,
//! full-table replace, filtered replace) run inside a single transaction
//! with all-or-nothing semantics.
//!
//! # Example
//!
//! ```rust,no_run
//! use policy_sql_store::{MemoryPolicy, PolicyAdapter, SqlAdapter};
//! use sqlx::any::AnyPoolOptions;
//!
//! # async fn example() -> anyhow::Result<()> {
//! sqlx::any::install_default_drivers();
//! let pool = AnyPoolOptions::new()
//!     .max_connections(5)
//!     .connect("sqlite://policy.db?mode=rwc")
//!     .await?;
//!
//! // Creates the `casbin_rule` table if it is missing.
//! let adapter = SqlAdapter::new(pool, "sqlite", "").await?;
//!
//! let mut model = MemoryPolicy::new();
//! adapter.load_policy(&mut model).await?;
//! adapter
//!     .add_policy("p", &["alice".into(), "data1".into(), "read".into()])
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
mod dao;
pub mod dialect;
pub mod error;
pub mod model;
pub mod rebind;

pub use adapter::{MemoryPolicy, PolicyAdapter, PolicyModel, PolicySection, SqlAdapter};
pub use dialect::{DEFAULT_TABLE_NAME, DriverFamily};
pub use error::AdapterError;
pub use model::{PolicyFilter, StoredRule};
pub use rebind::{PlaceholderStyle, rebind};
