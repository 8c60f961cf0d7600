//! Structural definitions (schema, table, view, job)
//!
//! These mirror the JSON definition files. Objects that belong to another
//! object (a table inside a schema, a foreign key target) refer to it by name
//! only; resolution happens through keyed lookups, never through pointers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactKind, Dependency};

/// A malformed definition; fatal to that one artifact only
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Parse error in {location}: {message}")]
pub struct ParseError {
    /// Location of the offending definition
    pub location: String,

    /// What was wrong
    pub message: String,
}

impl ParseError {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Deserialize a JSON definition, mapping failures to [`ParseError`]
pub fn parse_json<T: DeserializeOwned>(location: &str, content: &[u8]) -> Result<T, ParseError> {
    serde_json::from_slice(content).map_err(|e| ParseError::new(location, e.to_string()))
}

/// A column of a table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,

    /// SQL type name as written in the definition (e.g. "VARCHAR")
    #[serde(rename = "type")]
    pub data_type: String,

    /// Optional length / precision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,

    /// Whether NULL values are allowed
    #[serde(default = "default_true")]
    pub nullable: bool,

    /// Part of the primary key
    #[serde(default)]
    pub primary_key: bool,

    /// Unique constraint on this column alone
    #[serde(default)]
    pub unique: bool,

    /// Default value expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl ColumnDefinition {
    /// Create a nullable column with no default
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            length: None,
            nullable: true,
            primary_key: false,
            unique: false,
            default_value: None,
        }
    }

    /// Mark as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark as primary key column (implies NOT NULL)
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Set default value
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Type with length, normalized for comparison
    pub fn type_signature(&self) -> String {
        match self.length {
            Some(length) => format!("{}({})", self.data_type.to_uppercase(), length),
            None => self.data_type.to_uppercase(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Foreign key to another table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    pub name: String,

    pub columns: Vec<String>,

    /// Name of the referenced table
    pub referenced_table: String,

    pub referenced_columns: Vec<String>,
}

/// Named index over one or more columns
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,

    pub columns: Vec<String>,

    #[serde(default)]
    pub unique: bool,
}

/// Table-level constraints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConstraints {
    /// Explicit primary key columns (otherwise derived from the columns)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKey>,

    /// Check constraint expressions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<String>,
}

/// A table definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    /// Table name
    pub name: String,

    /// Owning schema, by name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Ordered columns
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,

    #[serde(default)]
    pub constraints: TableConstraints,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexDefinition>,

    /// Extra declared dependencies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
}

impl TableDefinition {
    /// Create a table from columns
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            columns,
            constraints: TableConstraints::default(),
            indexes: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Add a foreign key
    pub fn with_foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.constraints.foreign_keys.push(foreign_key);
        self
    }

    /// Add an index
    pub fn with_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    /// Find a column by name (case-insensitive, as SQL identifiers are)
    pub fn find_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Primary key columns, explicit or derived
    pub fn primary_key_columns(&self) -> Vec<&str> {
        if !self.constraints.primary_key.is_empty() {
            return self.constraints.primary_key.iter().map(String::as_str).collect();
        }
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Names of tables referenced by foreign keys, excluding self-references
    pub fn referenced_tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::new();
        for fk in &self.constraints.foreign_keys {
            if fk.referenced_table != self.name && !tables.contains(&fk.referenced_table.as_str()) {
                tables.push(&fk.referenced_table);
            }
        }
        tables
    }

    /// Structural checks that JSON deserialization cannot express
    pub fn validate(&self, location: &str) -> Result<(), ParseError> {
        if self.name.trim().is_empty() {
            return Err(ParseError::new(location, "table name is empty"));
        }
        if self.columns.is_empty() {
            return Err(ParseError::new(
                location,
                format!("table [{}] has no columns", self.name),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.to_lowercase()) {
                return Err(ParseError::new(
                    location,
                    format!("table [{}] declares column [{}] twice", self.name, column.name),
                ));
            }
        }
        for fk in &self.constraints.foreign_keys {
            if fk.columns.len() != fk.referenced_columns.len() {
                return Err(ParseError::new(
                    location,
                    format!("foreign key [{}] column count does not match its reference", fk.name),
                ));
            }
        }
        Ok(())
    }
}

/// A view definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDefinition {
    pub name: String,

    /// Owning schema, by name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// SELECT statement
    pub query: String,

    /// Tables or views the query reads from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
}

/// A schema definition file: the schema plus its contained objects
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Schema name (defaults to the configured default schema)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<TableDefinition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<ViewDefinition>,
}

/// Parameter passed to a job handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobParameter {
    pub name: String,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

/// A scheduled job definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Cron expression (6 or 7 fields, seconds first)
    pub expression: String,

    /// Handler to invoke
    pub handler: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// At most one concurrent execution
    #[serde(default)]
    pub singleton: bool,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<JobParameter>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
}

impl JobDefinition {
    /// Structural checks that JSON deserialization cannot express
    pub fn validate(&self, location: &str) -> Result<(), ParseError> {
        if self.name.trim().is_empty() {
            return Err(ParseError::new(location, "job name is empty"));
        }
        if self.handler.trim().is_empty() {
            return Err(ParseError::new(
                location,
                format!("job [{}] has no handler", self.name),
            ));
        }
        let fields = self.expression.split_whitespace().count();
        if !(6..=7).contains(&fields) {
            return Err(ParseError::new(
                location,
                format!(
                    "job [{}] has an invalid cron expression [{}]: expected 6 or 7 fields, found {}",
                    self.name, self.expression, fields
                ),
            ));
        }
        Ok(())
    }
}

/// Parsed content of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Definition {
    Schema(SchemaDefinition),
    Table(TableDefinition),
    View(ViewDefinition),
    Job(JobDefinition),
}

impl Definition {
    /// Kind of artifact this definition describes
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Schema(_) => ArtifactKind::Schema,
            Self::Table(_) => ArtifactKind::Table,
            Self::View(_) => ArtifactKind::View,
            Self::Job(_) => ArtifactKind::Job,
        }
    }

    /// Owning schema of a table or view
    pub fn schema(&self) -> Option<&str> {
        match self {
            Self::Table(table) => table.schema.as_deref(),
            Self::View(view) => view.schema.as_deref(),
            Self::Schema(_) | Self::Job(_) => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableDefinition> {
        match self {
            Self::Table(table) => Some(table),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_from_json() {
        let json = br#"{
            "name": "ORDERS",
            "columns": [
                {"name": "ID", "type": "INTEGER", "primaryKey": true, "nullable": false},
                {"name": "CUSTOMER_ID", "type": "INTEGER"},
                {"name": "NOTE", "type": "VARCHAR", "length": 200}
            ],
            "constraints": {
                "foreignKeys": [
                    {"name": "FK_CUSTOMER", "columns": ["CUSTOMER_ID"],
                     "referencedTable": "CUSTOMERS", "referencedColumns": ["ID"]}
                ]
            }
        }"#;

        let table: TableDefinition = parse_json("/orders.table", json).unwrap();
        assert_eq!(table.column_names(), vec!["ID", "CUSTOMER_ID", "NOTE"]);
        assert_eq!(table.primary_key_columns(), vec!["ID"]);
        assert_eq!(table.referenced_tables(), vec!["CUSTOMERS"]);
        assert!(table.find_column("note").is_some());
        assert_eq!(table.find_column("NOTE").unwrap().type_signature(), "VARCHAR(200)");
        assert!(table.validate("/orders.table").is_ok());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse_json::<TableDefinition>("/bad.table", b"{ not json").unwrap_err();
        assert_eq!(err.location, "/bad.table");
    }

    #[test]
    fn duplicate_columns_rejected() {
        let table = TableDefinition::new(
            "T",
            vec![ColumnDefinition::new("A", "INT"), ColumnDefinition::new("a", "INT")],
        );
        assert!(table.validate("/t.table").is_err());
    }

    #[test]
    fn self_referencing_foreign_key_is_not_a_dependency() {
        let table = TableDefinition::new("NODE", vec![ColumnDefinition::new("PARENT", "INT")])
            .with_foreign_key(ForeignKey {
                name: "FK_PARENT".to_string(),
                columns: vec!["PARENT".to_string()],
                referenced_table: "NODE".to_string(),
                referenced_columns: vec!["ID".to_string()],
            });
        assert!(table.referenced_tables().is_empty());
    }

    #[test]
    fn job_cron_validation() {
        let mut job = JobDefinition {
            name: "cleanup".to_string(),
            group: None,
            expression: "0 0/5 * * * ?".to_string(),
            handler: "cleanup.js".to_string(),
            engine: None,
            description: None,
            singleton: false,
            enabled: true,
            parameters: Vec::new(),
            dependencies: Vec::new(),
        };
        assert!(job.validate("/cleanup.job").is_ok());

        job.expression = "* * *".to_string();
        assert!(job.validate("/cleanup.job").is_err());
    }
}
