//! Table schemas: column declarations and row validation.
//!
//! A [`Schema`] is an ordered set of [`Column`]s. Validation returns ordered
//! diagnostic strings rather than errors so collaborators can render the full
//! list in one pass.

use std::collections::BTreeMap;
use std::fmt;

/// Data type of a schema column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Free text.
    String,
    /// Plain decimal integer; empty cell means absent.
    Integer,
    /// Plain decimal float; empty cell means absent.
    Float,
    /// Literal `True`/`False`.
    Boolean,
    /// `YYYY-MM-DD`.
    Date,
    /// Pipe-delimited value set.
    List,
}

/// Pure predicate over a raw cell value.
pub type CellValidator = fn(&str) -> bool;

/// A single column declaration.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub required: bool,
    pub default: String,
    pub validator: Option<CellValidator>,
    pub description: String,
}

impl Column {
    /// Shorthand for an optional string column.
    pub fn string(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            column_type: ColumnType::String,
            required: false,
            default: String::new(),
            validator: None,
            description: description.to_string(),
        }
    }

    fn typed(name: &str, column_type: ColumnType, description: &str) -> Self {
        Self {
            column_type,
            ..Self::string(name, description)
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn with_default(mut self, default: &str) -> Self {
        self.default = default.to_string();
        self
    }

    fn with_validator(mut self, validator: CellValidator) -> Self {
        self.validator = Some(validator);
        self
    }
}

/// Named, ordered column collection.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    description: String,
    order: Vec<String>,
    columns: BTreeMap<String, Column>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            order: Vec::new(),
            columns: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Add a column. Re-adding an existing name replaces the declaration and
    /// keeps its position.
    pub fn add_column(&mut self, column: Column) {
        if !self.columns.contains_key(&column.name) {
            self.order.push(column.name.clone());
        }
        self.columns.insert(column.name.clone(), column);
    }

    /// Remove a column by name.
    pub fn remove_column(&mut self, name: &str) {
        if self.columns.remove(name).is_some() {
            self.order.retain(|n| n != name);
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Column names in declaration order.
    pub fn column_order(&self) -> &[String] {
        &self.order
    }

    /// Names of required columns, in declaration order.
    pub fn required_columns(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|n| self.columns[*n].required)
            .map(String::as_str)
            .collect()
    }

    /// Validate a raw row. Returns diagnostics in declaration order: missing
    /// required cells first, then validator failures.
    pub fn validate_row(&self, row: &BTreeMap<String, String>) -> Vec<String> {
        let mut diagnostics = Vec::new();

        for name in &self.order {
            let column = &self.columns[name];
            if column.required {
                let empty = row.get(name).map(|v| v.trim().is_empty()).unwrap_or(true);
                if empty {
                    diagnostics.push(format!("missing required column: {name}"));
                }
            }
        }

        for name in &self.order {
            let column = &self.columns[name];
            if let (Some(validator), Some(value)) = (column.validator, row.get(name)) {
                if !validator(value) {
                    diagnostics.push(format!("invalid value for {name}: {value}"));
                }
            }
        }

        diagnostics
    }

    /// Non-mutating extension: columns of `other` override same-named columns
    /// here and are appended otherwise.
    pub fn extend(&self, other: &Schema) -> Schema {
        let mut combined = Schema {
            name: format!("{}+{}", self.name, other.name),
            description: format!("{} extended with {}", self.description, other.description),
            order: self.order.clone(),
            columns: self.columns.clone(),
        };
        for name in &other.order {
            combined.add_column(other.columns[name].clone());
        }
        combined
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} columns)", self.name, self.order.len())
    }
}

fn valid_status_cell(value: &str) -> bool {
    matches!(
        value,
        "COMPLETE" | "PARTIAL" | "MISSING" | "NOT_STARTED" | ""
    )
}

fn valid_priority_cell(value: &str) -> bool {
    matches!(value, "P0" | "HIGH" | "MEDIUM" | "LOW" | "")
}

/// The 20-column core schema every table carries.
pub fn core_schema() -> Schema {
    let mut schema = Schema::new(
        "core",
        "Core RTM schema with the columns every requirements table carries",
    );
    schema.add_column(
        Column::string("req_id", "Unique requirement identifier (REQ-<CAT>-<NNN>)").required(),
    );
    schema.add_column(Column::string("category", "High-level grouping").required());
    schema.add_column(Column::string(
        "subcategory",
        "Detailed classification within category",
    ));
    schema.add_column(
        Column::string("requirement_text", "Human-readable requirement description").required(),
    );
    schema.add_column(Column::string(
        "target_value",
        "Quantitative acceptance criteria",
    ));
    schema.add_column(Column::string(
        "test_module",
        "Test file implementing validation",
    ));
    schema.add_column(Column::string("test_function", "Verifying test function"));
    schema.add_column(Column::string(
        "validation_method",
        "Testing approach (Analysis, Test, Design, Inspection)",
    ));
    schema.add_column(
        Column::string("status", "Completion status")
            .required()
            .with_default("MISSING")
            .with_validator(valid_status_cell),
    );
    schema.add_column(
        Column::string("priority", "Priority level")
            .with_default("MEDIUM")
            .with_validator(valid_priority_cell),
    );
    schema.add_column(Column::typed(
        "phase",
        ColumnType::Integer,
        "Development phase (positive integer)",
    ));
    schema.add_column(Column::string("notes", "Additional context"));
    schema.add_column(Column::typed(
        "effort_weeks",
        ColumnType::Float,
        "Estimated effort in weeks",
    ));
    schema.add_column(Column::typed(
        "dependencies",
        ColumnType::List,
        "Requirement ids this one depends on",
    ));
    schema.add_column(Column::typed(
        "blocks",
        ColumnType::List,
        "Requirement ids this one blocks",
    ));
    schema.add_column(Column::string("assignee", "Person responsible"));
    schema.add_column(Column::string("sprint", "Target sprint or version"));
    schema.add_column(Column::typed(
        "started_date",
        ColumnType::Date,
        "Date work began",
    ));
    schema.add_column(Column::typed(
        "completed_date",
        ColumnType::Date,
        "Date completed",
    ));
    schema.add_column(Column::string(
        "requirement_file",
        "Path to the detailed specification artifact",
    ));
    schema
}

/// Validation-taxonomy extension: scope/technique/environment markers plus
/// metric columns, layered on top of the core schema.
pub fn taxonomy_schema() -> Schema {
    let mut ext = Schema::new(
        "taxonomy",
        "Validation taxonomy with scope, technique, and environment markers",
    );
    for (name, description) in [
        ("scope_unit", "Single component isolation test"),
        ("scope_integration", "Multi-component interaction test"),
        ("scope_system", "End-to-end system test"),
        ("technique_nominal", "Typical operating parameters"),
        ("technique_parametric", "Systematic parameter sweep"),
        ("technique_monte_carlo", "Random scenario testing"),
        ("technique_stress", "Boundary and edge case testing"),
        ("env_simulation", "Pure software synthetic inputs"),
        ("env_hil", "Hardware-in-loop with controlled signals"),
        ("env_field", "Field conditions"),
    ] {
        ext.add_column(
            Column::typed(name, ColumnType::Boolean, description).with_default("False"),
        );
    }
    for (name, description) in [
        ("baseline_metric", "Previous measured value"),
        ("current_metric", "Latest measured value"),
        ("target_metric", "Acceptance threshold"),
    ] {
        ext.add_column(Column::typed(name, ColumnType::Float, description));
    }
    ext.add_column(Column::string("metric_unit", "Units for the metric columns"));
    ext.add_column(Column::typed(
        "lead_time_weeks",
        ColumnType::Float,
        "Procurement lead time",
    ));
    ext.add_column(Column::string(
        "supplier_part",
        "Hardware part number if applicable",
    ));
    core_schema().extend(&ext)
}

/// Look up a built-in schema by name.
pub fn builtin_schema(name: &str) -> Option<Schema> {
    match name {
        "core" => Some(core_schema()),
        "taxonomy" => Some(taxonomy_schema()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn core_schema_has_twenty_columns_in_fixed_order() {
        let schema = core_schema();
        assert_eq!(schema.column_order().len(), 20);
        assert_eq!(schema.column_order()[0], "req_id");
        assert_eq!(schema.column_order()[19], "requirement_file");
        assert_eq!(
            schema.required_columns(),
            vec!["req_id", "category", "requirement_text", "status"]
        );
    }

    #[test]
    fn validate_row_reports_missing_required() {
        let schema = core_schema();
        let diagnostics = schema.validate_row(&row(&[("req_id", "REQ-SW-001")]));
        assert!(diagnostics.iter().any(|d| d.contains("category")));
        assert!(diagnostics.iter().any(|d| d.contains("requirement_text")));
        assert!(diagnostics.iter().any(|d| d.contains("status")));
    }

    #[test]
    fn validate_row_treats_whitespace_as_missing() {
        let schema = core_schema();
        let diagnostics = schema.validate_row(&row(&[
            ("req_id", "   "),
            ("category", "SW"),
            ("requirement_text", "text"),
            ("status", "MISSING"),
        ]));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("req_id"));
    }

    #[test]
    fn validate_row_runs_cell_validators() {
        let schema = core_schema();
        let diagnostics = schema.validate_row(&row(&[
            ("req_id", "REQ-SW-001"),
            ("category", "SW"),
            ("requirement_text", "text"),
            ("status", "DONEISH"),
            ("priority", "URGENT"),
        ]));
        assert!(diagnostics.iter().any(|d| d.contains("status")));
        assert!(diagnostics.iter().any(|d| d.contains("priority")));
    }

    #[test]
    fn extend_overrides_and_appends() {
        let base = core_schema();
        let mut ext = Schema::new("ext", "test extension");
        ext.add_column(Column::string("notes", "overridden notes").required());
        ext.add_column(Column::string("custom", "brand new"));

        let combined = base.extend(&ext);
        assert!(combined.column("notes").unwrap().required);
        assert!(combined.has_column("custom"));
        // Overridden column keeps its original position; new one appends.
        let order = combined.column_order();
        assert_eq!(order.iter().position(|n| n == "notes"), Some(11));
        assert_eq!(order.last().map(String::as_str), Some("custom"));
        // Base is untouched.
        assert!(!base.column("notes").unwrap().required);
    }

    #[test]
    fn taxonomy_schema_extends_core() {
        let schema = taxonomy_schema();
        assert!(schema.has_column("req_id"));
        assert!(schema.has_column("scope_unit"));
        assert!(schema.has_column("target_metric"));
        assert_eq!(
            schema.column("scope_unit").unwrap().column_type,
            ColumnType::Boolean
        );
    }

    #[test]
    fn builtin_lookup() {
        assert!(builtin_schema("core").is_some());
        assert!(builtin_schema("taxonomy").is_some());
        assert!(builtin_schema("phoenix").is_none());
    }
}
