//! Policy-engine-facing adapter facade.
//!
//! The facade translates engine-level operations (load / save / add / remove
//! / update, plus filtered variants) into data-access calls, converting
//! between short rule tuples and fixed-width rows on the way. The engine
//! itself stays external; it talks to the adapter through [`PolicyAdapter`]
//! and hands over its in-memory model through [`PolicyModel`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sqlx::{AnyPool, Connection};
use tracing::debug;

use crate::dao::PolicyDao;
use crate::dialect::{DEFAULT_TABLE_NAME, DriverFamily};
use crate::error::AdapterError;
use crate::model::{PolicyFilter, StoredRule, filtered_condition, rule_args};

/// The two rule sections of a policy model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySection {
    /// "p" rules: permission policies.
    Policy,
    /// "g" rules: role-inheritance (grouping) policies.
    Grouping,
}

/// In-memory policy model seam, implemented by the external policy engine.
///
/// The adapter pushes loaded rows in one call per row (tuple-shaped, short
/// form) and reads the full rule set back out per section during a save.
pub trait PolicyModel: Send + Sync {
    /// Receive one loaded rule: `line[0]` is the ptype, the rest are the
    /// value fields with trailing empties already trimmed.
    fn add_policy_line(&mut self, line: &[String]);

    /// Every `(ptype, rules)` group of the given section.
    fn policy_rules(&self, section: PolicySection) -> Vec<(String, Vec<Vec<String>>)>;
}

/// Storage contract consumed by the policy engine.
#[async_trait]
pub trait PolicyAdapter: Send + Sync {
    /// Load the full rule set into `model`. Clears the filtered flag.
    async fn load_policy(&self, model: &mut dyn PolicyModel) -> Result<(), AdapterError>;

    /// Load the rules matching `filter` into `model` and mark the load as
    /// filtered. `None` behaves exactly like [`PolicyAdapter::load_policy`].
    async fn load_filtered_policy(
        &self,
        model: &mut dyn PolicyModel,
        filter: Option<&PolicyFilter>,
    ) -> Result<(), AdapterError>;

    /// Whether the most recent load was filtered.
    fn is_filtered(&self) -> bool;

    /// Replace the whole table with the model's rules in one transaction.
    /// Fails with [`AdapterError::FilteredStateConflict`] after a filtered
    /// load.
    async fn save_policy(&self, model: &dyn PolicyModel) -> Result<(), AdapterError>;

    async fn add_policy(&self, ptype: &str, rule: &[String]) -> Result<(), AdapterError>;

    async fn add_policies(&self, ptype: &str, rules: &[Vec<String>]) -> Result<(), AdapterError>;

    /// Remove rules matching the ptype and every non-empty field of `rule`.
    async fn remove_policy(&self, ptype: &str, rule: &[String]) -> Result<(), AdapterError>;

    /// Remove each rule by exact fixed-width match, all in one transaction.
    async fn remove_policies(&self, ptype: &str, rules: &[Vec<String>]) -> Result<(), AdapterError>;

    /// Remove rules matching the ptype and the supplied values placed
    /// starting at column `field_index`; unsupplied columns are
    /// unconstrained.
    async fn remove_filtered_policy(
        &self,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> Result<(), AdapterError>;

    /// Overwrite the row matching `old_rule` (fixed-width) with `new_rule`.
    async fn update_policy(
        &self,
        ptype: &str,
        old_rule: &[String],
        new_rule: &[String],
    ) -> Result<(), AdapterError>;

    /// Batched [`PolicyAdapter::update_policy`]; the lists must have equal
    /// length.
    async fn update_policies(
        &self,
        ptype: &str,
        old_rules: &[Vec<String>],
        new_rules: &[Vec<String>],
    ) -> Result<(), AdapterError>;

    /// Replace every rule matching the field filter with `new_rules`, in one
    /// transaction. Returns the replaced rules as short tuples.
    async fn update_filtered_policies(
        &self,
        ptype: &str,
        new_rules: &[Vec<String>],
        field_index: usize,
        field_values: &[String],
    ) -> Result<Vec<Vec<String>>, AdapterError>;
}

/// SQL-backed policy adapter.
///
/// Construction resolves the driver dialect, probes the connection and
/// creates the policy table (with its secondary index) if it is missing.
/// The adapter holds no locks and no background tasks; atomicity is
/// guaranteed only within one call's transaction, and concurrent top-level
/// calls may interleave as the pool permits.
pub struct SqlAdapter {
    dao: PolicyDao,
    filtered: AtomicBool,
}

impl SqlAdapter {
    /// Build an adapter over an already-connected pool.
    ///
    /// `driver_name` must resolve in the dialect table; an empty
    /// `table_name` defaults to [`DEFAULT_TABLE_NAME`].
    ///
    /// # Errors
    ///
    /// [`AdapterError::Configuration`] for a rejected driver name,
    /// [`AdapterError::Database`] when the reachability probe or the table
    /// creation fails.
    pub async fn new(
        pool: AnyPool,
        driver_name: &str,
        table_name: &str,
    ) -> Result<Self, AdapterError> {
        let family = DriverFamily::resolve(driver_name)?;

        // Reachability probe; a failure is surfaced verbatim.
        let mut conn = pool.acquire().await?;
        conn.ping().await?;
        drop(conn);

        let table = if table_name.is_empty() {
            DEFAULT_TABLE_NAME
        } else {
            table_name
        };
        debug!(driver = driver_name, table, "initializing sql policy adapter");

        let dao = PolicyDao::new(pool, family, table);
        if !dao.is_table_exist().await {
            dao.create_table().await?;
        }

        Ok(Self {
            dao,
            filtered: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl PolicyAdapter for SqlAdapter {
    async fn load_policy(&self, model: &mut dyn PolicyModel) -> Result<(), AdapterError> {
        let rules = self.dao.select_all().await?;
        debug!(rules = rules.len(), "loaded policy rules");

        for rule in &rules {
            let line = rule.short_tuple();
            if !line.is_empty() {
                model.add_policy_line(&line);
            }
        }

        self.filtered.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn load_filtered_policy(
        &self,
        model: &mut dyn PolicyModel,
        filter: Option<&PolicyFilter>,
    ) -> Result<(), AdapterError> {
        let Some(filter) = filter else {
            return self.load_policy(model).await;
        };

        let rules = self.dao.select_by_filter(filter).await?;
        debug!(rules = rules.len(), "loaded filtered policy rules");

        for rule in &rules {
            let line = rule.short_tuple();
            if !line.is_empty() {
                model.add_policy_line(&line);
            }
        }

        self.filtered.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_filtered(&self) -> bool {
        self.filtered.load(Ordering::SeqCst)
    }

    async fn save_policy(&self, model: &dyn PolicyModel) -> Result<(), AdapterError> {
        if self.is_filtered() {
            return Err(AdapterError::FilteredStateConflict);
        }

        let mut rows = Vec::with_capacity(32);
        for section in [PolicySection::Policy, PolicySection::Grouping] {
            for (ptype, rules) in model.policy_rules(section) {
                for rule in &rules {
                    rows.push(rule_args(&ptype, rule));
                }
            }
        }

        self.dao.delete_all_and_insert_rows(&rows).await
    }

    async fn add_policy(&self, ptype: &str, rule: &[String]) -> Result<(), AdapterError> {
        self.dao.insert_row(&rule_args(ptype, rule)).await
    }

    async fn add_policies(&self, ptype: &str, rules: &[Vec<String>]) -> Result<(), AdapterError> {
        let rows: Vec<Vec<String>> = rules.iter().map(|rule| rule_args(ptype, rule)).collect();
        self.dao.insert_rows(&rows).await
    }

    async fn remove_policy(&self, ptype: &str, rule: &[String]) -> Result<(), AdapterError> {
        self.dao.delete_by_args(ptype, rule).await
    }

    async fn remove_policies(&self, ptype: &str, rules: &[Vec<String>]) -> Result<(), AdapterError> {
        let rows: Vec<Vec<String>> = rules.iter().map(|rule| rule_args(ptype, rule)).collect();
        self.dao.delete_rows(&rows).await
    }

    async fn remove_filtered_policy(
        &self,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> Result<(), AdapterError> {
        let (condition, args) = filtered_condition(ptype, field_index, field_values);
        self.dao.delete_by_condition(&condition, &args).await
    }

    async fn update_policy(
        &self,
        ptype: &str,
        old_rule: &[String],
        new_rule: &[String],
    ) -> Result<(), AdapterError> {
        let mut args = rule_args(ptype, new_rule);
        args.extend(rule_args(ptype, old_rule));
        self.dao.update_row(&args).await
    }

    async fn update_policies(
        &self,
        ptype: &str,
        old_rules: &[Vec<String>],
        new_rules: &[Vec<String>],
    ) -> Result<(), AdapterError> {
        if old_rules.len() != new_rules.len() {
            return Err(AdapterError::InvalidArgument(format!(
                "old and new rule counts differ: {} != {}",
                old_rules.len(),
                new_rules.len()
            )));
        }

        let rows: Vec<Vec<String>> = old_rules
            .iter()
            .zip(new_rules)
            .map(|(old, new)| {
                let mut args = rule_args(ptype, new);
                args.extend(rule_args(ptype, old));
                args
            })
            .collect();

        self.dao.update_rows(&rows).await
    }

    async fn update_filtered_policies(
        &self,
        ptype: &str,
        new_rules: &[Vec<String>],
        field_index: usize,
        field_values: &[String],
    ) -> Result<Vec<Vec<String>>, AdapterError> {
        let (condition, delete_args) = filtered_condition(ptype, field_index, field_values);

        // Read the rows about to be replaced so the caller can audit or
        // undo the replacement.
        let old_rules = self.dao.select_by_condition(&condition, &delete_args).await?;

        let rows: Vec<Vec<String>> = new_rules.iter().map(|rule| rule_args(ptype, rule)).collect();
        self.dao
            .update_filtered_rows(&condition, delete_args, &rows)
            .await?;

        Ok(old_rules.iter().map(StoredRule::short_tuple).collect())
    }
}

/// Minimal in-memory [`PolicyModel`] for tests and standalone use.
///
/// Rules are grouped by ptype; ptypes starting with `g` belong to the
/// grouping section, everything else to the policy section.
#[derive(Debug, Clone, Default)]
pub struct MemoryPolicy {
    rules: BTreeMap<String, Vec<Vec<String>>>,
}

impl MemoryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule under `ptype`.
    pub fn add_rule<S: Into<String>>(&mut self, ptype: &str, rule: impl IntoIterator<Item = S>) {
        self.rules
            .entry(ptype.to_owned())
            .or_default()
            .push(rule.into_iter().map(Into::into).collect());
    }

    /// Rules stored under `ptype`, in insertion order.
    pub fn rules(&self, ptype: &str) -> &[Vec<String>] {
        self.rules.get(ptype).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of rules across every ptype.
    pub fn rule_count(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    fn section_of(ptype: &str) -> PolicySection {
        if ptype.starts_with('g') {
            PolicySection::Grouping
        } else {
            PolicySection::Policy
        }
    }
}

impl PolicyModel for MemoryPolicy {
    fn add_policy_line(&mut self, line: &[String]) {
        let Some((ptype, fields)) = line.split_first() else {
            return;
        };
        self.rules
            .entry(ptype.clone())
            .or_default()
            .push(fields.to_vec());
    }

    fn policy_rules(&self, section: PolicySection) -> Vec<(String, Vec<Vec<String>>)> {
        self.rules
            .iter()
            .filter(|(ptype, _)| Self::section_of(ptype) == section)
            .map(|(ptype, rules)| (ptype.clone(), rules.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| (*p).to_owned()).collect()
    }

    #[test]
    fn memory_policy_splits_sections_by_ptype_prefix() {
        let mut model = MemoryPolicy::new();
        model.add_policy_line(&line(&["p", "alice", "data1", "read"]));
        model.add_policy_line(&line(&["p2", "bob", "data2"]));
        model.add_policy_line(&line(&["g", "alice", "admin"]));
        model.add_policy_line(&line(&["g2", "bob", "ops"]));

        let policy = model.policy_rules(PolicySection::Policy);
        let grouping = model.policy_rules(PolicySection::Grouping);
        assert_eq!(policy.len(), 2);
        assert_eq!(grouping.len(), 2);
        assert_eq!(policy[0].0, "p");
        assert_eq!(policy[0].1, vec![line(&["alice", "data1", "read"])]);
    }

    #[test]
    fn memory_policy_ignores_empty_lines() {
        let mut model = MemoryPolicy::new();
        model.add_policy_line(&[]);
        assert_eq!(model.rule_count(), 0);
    }

    #[test]
    fn memory_policy_keeps_insertion_order_per_ptype() {
        let mut model = MemoryPolicy::new();
        model.add_rule("p", ["alice", "data1", "read"]);
        model.add_rule("p", ["bob", "data2", "write"]);

        assert_eq!(
            model.rules("p"),
            &[line(&["alice", "data1", "read"]), line(&["bob", "data2", "write"])]
        );
        assert!(model.rules("g").is_empty());
    }
}
