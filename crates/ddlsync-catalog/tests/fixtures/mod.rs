//! Test fixtures for catalog integration tests
//!
//! Reusable table definitions resembling a small order-management schema.

use ddlsync_core::{ColumnDefinition, ForeignKey, TableDefinition};

/// Customers table
///
/// - Primary key (ID)
/// - Contact information (EMAIL, NAME)
pub fn customers_table() -> TableDefinition {
    TableDefinition::new(
        "CUSTOMERS",
        vec![
            ColumnDefinition::new("ID", "INTEGER").primary_key(),
            ColumnDefinition::new("EMAIL", "VARCHAR").not_null(),
            ColumnDefinition::new("NAME", "VARCHAR"),
        ],
    )
}

/// Orders table referencing customers
pub fn orders_table() -> TableDefinition {
    TableDefinition::new(
        "ORDERS",
        vec![
            ColumnDefinition::new("ID", "INTEGER").primary_key(),
            ColumnDefinition::new("CUSTOMER_ID", "INTEGER").not_null(),
            ColumnDefinition::new("TOTAL", "DECIMAL"),
        ],
    )
    .with_foreign_key(ForeignKey {
        name: "FK_ORDERS_CUSTOMER".to_string(),
        columns: vec!["CUSTOMER_ID".to_string()],
        referenced_table: "CUSTOMERS".to_string(),
        referenced_columns: vec!["ID".to_string()],
    })
}
