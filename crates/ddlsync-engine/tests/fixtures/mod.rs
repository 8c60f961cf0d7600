//! Test fixtures for engine integration tests
//!
//! Definition files of a small order-management application, plus a harness
//! holding a mock target and an in-memory store that survive across runs.

#![allow(dead_code)]

use std::sync::Arc;

use ddlsync_catalog::{MemoryStore, MockTarget};
use ddlsync_core::Config;
use ddlsync_engine::{DefinitionSource, Reconciler};

/// Customers table, no dependencies
pub fn customers_table() -> DefinitionSource {
    DefinitionSource::new(
        "/sales/customers.table",
        r#"{
            "name": "CUSTOMERS",
            "columns": [
                {"name": "ID", "type": "INTEGER", "primaryKey": true},
                {"name": "EMAIL", "type": "VARCHAR", "length": 255, "nullable": false},
                {"name": "NAME", "type": "VARCHAR", "length": 100}
            ]
        }"#,
    )
}

/// Orders table with a foreign key to customers
pub fn orders_table() -> DefinitionSource {
    DefinitionSource::new(
        "/sales/orders.table",
        r#"{
            "name": "ORDERS",
            "columns": [
                {"name": "ID", "type": "INTEGER", "primaryKey": true},
                {"name": "CUSTOMER_ID", "type": "INTEGER", "nullable": false},
                {"name": "TOTAL", "type": "DECIMAL"}
            ],
            "constraints": {
                "foreignKeys": [
                    {"name": "FK_ORDERS_CUSTOMER", "columns": ["CUSTOMER_ID"],
                     "referencedTable": "CUSTOMERS", "referencedColumns": ["ID"]}
                ]
            }
        }"#,
    )
}

/// A standalone table in two versions: v2 adds a nullable NOTE column
pub fn audit_table(v2: bool) -> DefinitionSource {
    let note = if v2 { r#", {"name": "NOTE", "type": "VARCHAR"}"# } else { "" };
    DefinitionSource::new(
        "/audit/audit_log.table",
        format!(
            r#"{{"name": "AUDIT_LOG", "columns": [{{"name": "ID", "type": "INTEGER", "primaryKey": true}}{}]}}"#,
            note
        ),
    )
}

/// View over orders
pub fn order_totals_view() -> DefinitionSource {
    DefinitionSource::new(
        "/sales/order_totals.view",
        r#"{
            "name": "ORDER_TOTALS",
            "query": "SELECT CUSTOMER_ID, SUM(TOTAL) FROM ORDERS GROUP BY CUSTOMER_ID",
            "dependencies": [{"name": "ORDERS", "type": "table"}]
        }"#,
    )
}

/// View over the audit table
pub fn audit_view() -> DefinitionSource {
    DefinitionSource::new(
        "/audit/recent_audit.view",
        r#"{
            "name": "RECENT_AUDIT",
            "query": "SELECT * FROM AUDIT_LOG",
            "dependencies": [{"name": "AUDIT_LOG", "type": "table"}]
        }"#,
    )
}

/// Two views reading each other
pub fn cyclic_views() -> Vec<DefinitionSource> {
    vec![
        DefinitionSource::new(
            "/a.view",
            r#"{"name": "A", "query": "SELECT 1", "dependencies": [{"name": "B", "type": "view"}]}"#,
        ),
        DefinitionSource::new(
            "/b.view",
            r#"{"name": "B", "query": "SELECT 1", "dependencies": [{"name": "A", "type": "view"}]}"#,
        ),
    ]
}

/// Schema file holding two tables and a view
pub fn sales_schema() -> DefinitionSource {
    DefinitionSource::new(
        "/sales/sales.schema",
        r#"{
            "name": "SALES",
            "tables": [
                {"name": "CUSTOMERS", "columns": [{"name": "ID", "type": "INTEGER", "primaryKey": true}]},
                {"name": "ORDERS",
                 "columns": [{"name": "ID", "type": "INTEGER"}, {"name": "CUSTOMER_ID", "type": "INTEGER"}],
                 "constraints": {"foreignKeys": [
                     {"name": "FK_ORDERS_CUSTOMER", "columns": ["CUSTOMER_ID"],
                      "referencedTable": "CUSTOMERS", "referencedColumns": ["ID"]}
                 ]}}
            ],
            "views": [
                {"name": "ALL_ORDERS", "query": "SELECT * FROM ORDERS",
                 "dependencies": [{"name": "ORDERS", "type": "table"}]}
            ]
        }"#,
    )
}

/// Scheduled job with the given handler
pub fn cleanup_job(handler: &str) -> DefinitionSource {
    DefinitionSource::new(
        "/jobs/cleanup.job",
        format!(
            r#"{{"name": "cleanup", "group": "maintenance", "expression": "0 0 3 * * ?", "handler": "{}"}}"#,
            handler
        ),
    )
}

/// Target and store kept between runs
pub struct Harness {
    pub target: MockTarget,
    pub store: MemoryStore,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            target: MockTarget::new(),
            store: MemoryStore::new(),
        }
    }

    pub fn reconciler(&self) -> Reconciler {
        self.reconciler_with(Config::default())
    }

    pub fn reconciler_with(&self, config: Config) -> Reconciler {
        Reconciler::new(Arc::new(self.target.clone()), Arc::new(self.store.clone()), config)
    }

    /// Applied intents as "verb KIND [name]", then forget them
    pub async fn take_applied(&self) -> Vec<String> {
        let applied = self.target.applied().await.iter().map(ToString::to_string).collect();
        self.target.clear_applied().await;
        applied
    }
}
