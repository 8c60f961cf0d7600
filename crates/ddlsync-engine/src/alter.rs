//! Table alteration planning
//!
//! Compares the desired definition of a table against its live shape and
//! produces the in-place changes that carry the live table over. Changes that
//! would discard data in a populated table are not planned; they are reported
//! as refusals instead.

use std::collections::HashSet;

use ddlsync_catalog::AlterChange;
use ddlsync_core::{SafetyConfig, TableDefinition};

/// Changes needed to move a live table to its desired definition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlterPlan {
    /// Changes in application order
    pub changes: Vec<AlterChange>,

    /// Reasons the table cannot be altered safely
    pub refusals: Vec<String>,
}

impl AlterPlan {
    /// Diff `desired` against `live`
    ///
    /// Changes are ordered so that nothing still referenced is dropped too
    /// early: foreign keys and indexes go first, then columns are dropped,
    /// added and altered, and indexes and foreign keys are added last.
    pub fn compute(
        desired: &TableDefinition,
        live: &TableDefinition,
        populated: bool,
        safety: &SafetyConfig,
    ) -> Self {
        let mut plan = Self::default();

        let mut drop_foreign_keys = Vec::new();
        let mut drop_indexes = Vec::new();
        let mut drop_columns = Vec::new();
        let mut add_columns = Vec::new();
        let mut alter_columns = Vec::new();
        let mut add_indexes = Vec::new();
        let mut add_foreign_keys = Vec::new();

        // Foreign keys by name
        for fk in &live.constraints.foreign_keys {
            match desired.constraints.foreign_keys.iter().find(|d| d.name == fk.name) {
                Some(wanted) if wanted == fk => {}
                _ => drop_foreign_keys.push(AlterChange::DropForeignKey { name: fk.name.clone() }),
            }
        }
        for fk in &desired.constraints.foreign_keys {
            match live.constraints.foreign_keys.iter().find(|l| l.name == fk.name) {
                Some(existing) if existing == fk => {}
                _ => add_foreign_keys.push(AlterChange::AddForeignKey { foreign_key: fk.clone() }),
            }
        }

        // Indexes by name
        for index in &live.indexes {
            match desired.indexes.iter().find(|d| d.name == index.name) {
                Some(wanted) if wanted == index => {}
                _ => drop_indexes.push(AlterChange::DropIndex { name: index.name.clone() }),
            }
        }
        for index in &desired.indexes {
            match live.indexes.iter().find(|l| l.name == index.name) {
                Some(existing) if existing == index => {}
                _ => add_indexes.push(AlterChange::AddIndex { index: index.clone() }),
            }
        }

        // Columns
        let wanted: HashSet<String> = desired.columns.iter().map(|c| c.name.to_uppercase()).collect();
        for column in &live.columns {
            if !wanted.contains(&column.name.to_uppercase()) {
                drop_columns.push(AlterChange::DropColumn { name: column.name.clone() });
            }
        }

        for column in &desired.columns {
            match live.find_column(&column.name) {
                None => {
                    let required = !column.nullable && column.default_value.is_none();
                    if populated && required && safety.refuse_required_column_on_populated {
                        plan.refusals.push(format!(
                            "adding NOT NULL column [{}] without default to populated table [{}]",
                            column.name, desired.name
                        ));
                        continue;
                    }
                    add_columns.push(AlterChange::AddColumn { column: column.clone() });
                }
                Some(existing) if existing.type_signature() != column.type_signature() => {
                    if populated && safety.refuse_type_change {
                        plan.refusals.push(format!(
                            "changing type of column [{}] in populated table [{}] from {} to {}",
                            column.name,
                            desired.name,
                            existing.type_signature(),
                            column.type_signature()
                        ));
                        continue;
                    }
                    drop_columns.push(AlterChange::DropColumn { name: existing.name.clone() });
                    add_columns.push(AlterChange::AddColumn { column: column.clone() });
                }
                Some(existing) => {
                    if existing.nullable != column.nullable
                        || existing.default_value != column.default_value
                        || existing.unique != column.unique
                        || existing.primary_key != column.primary_key
                    {
                        alter_columns.push(AlterChange::AlterColumn { column: column.clone() });
                    }
                }
            }
        }

        plan.changes.extend(drop_foreign_keys);
        plan.changes.extend(drop_indexes);
        plan.changes.extend(drop_columns);
        plan.changes.extend(add_columns);
        plan.changes.extend(alter_columns);
        plan.changes.extend(add_indexes);
        plan.changes.extend(add_foreign_keys);
        plan
    }

    /// Nothing to change
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.refusals.is_empty()
    }

    pub fn is_refused(&self) -> bool {
        !self.refusals.is_empty()
    }

    /// Comma-separated summary of the planned changes
    pub fn summary(&self) -> String {
        self.changes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
