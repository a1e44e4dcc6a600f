use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// A row of any target, keyed by column property names.
pub type Record = serde_json::Map<String, Value>;

/// Display taxonomy for catalog columns. Physical storage types are folded
/// into this fixed set; relation columns are always `Reference`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DisplayType {
    String,
    Number,
    Boolean,
    Date,
    Reference,
    Unknown,
}

/// Metadata for one field or relation of a [`Target`].
///
/// `id` is globally unique: `"<tableName>.<path>"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub property: String,
    pub display_type: DisplayType,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_target_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_table_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Column {
    pub fn is_reference(&self) -> bool {
        self.display_type == DisplayType::Reference
    }
}

/// A registered, explorable table and its column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub name: String,
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Target {
    pub fn reference_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_reference())
    }

    /// Checks the catalog invariants callers rely on during traversal.
    /// Uniqueness of name/tableName/alias across targets is the store's
    /// concern; this validates a single descriptor in isolation.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.is_empty() || self.table_name.is_empty() {
            return Err(AppError::BadRequest("target name and tableName must be non-empty".to_string()));
        }
        let primaries = self.columns.iter().filter(|c| c.primary).count();
        if primaries != 1 {
            return Err(AppError::BadRequest(format!(
                "target '{}' must have exactly one primary column, found {}",
                self.name, primaries
            )));
        }
        for column in &self.columns {
            if column.is_reference() != column.referenced_target_name.is_some() {
                return Err(AppError::BadRequest(format!(
                    "column '{}' must set referencedTargetName iff displayType is reference",
                    column.id
                )));
            }
            if column.multiple && !column.is_reference() {
                return Err(AppError::BadRequest(format!(
                    "column '{}' is multiple but not a reference",
                    column.id
                )));
            }
        }
        Ok(())
    }
}

/// A resolved target plus its primary column. Computed on every resolve
/// call so it always reflects the latest catalog state.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetData {
    pub target: Target,
    pub primary_column: Column,
}

impl TargetData {
    pub fn primary_property(&self) -> &str {
        &self.primary_column.property
    }
}

/// Acting-user context threaded through the save-handler chain.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActingUser {
    pub id: String,
    pub admin: bool,
}

impl ActingUser {
    pub fn anonymous() -> Self {
        ActingUser { id: "anonymous".to_string(), admin: false }
    }

    pub fn admin(id: &str) -> Self {
        ActingUser { id: id.to_string(), admin: true }
    }
}
