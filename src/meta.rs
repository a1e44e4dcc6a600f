use serde::{Deserialize, Serialize};

/// Cardinality of a declared relation, as reported by the store's live
/// schema metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl RelationKind {
    /// To-many relations materialize as array-valued columns.
    pub fn is_multiple(self) -> bool {
        matches!(self, RelationKind::OneToMany | RelationKind::ManyToMany)
    }
}

/// One physical column as seen in the live schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub path: String,
    pub type_name: String,
    /// Virtual columns (computed, not backed by storage) are skipped by the
    /// analyzer.
    pub is_virtual: bool,
}

/// One declared relation; `target_name`/`table_name` describe the inverse
/// side the relation points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationMeta {
    pub path: String,
    pub kind: RelationKind,
    pub target_name: String,
    pub table_name: String,
}

/// Live schema metadata for one table, the analyzer's unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMeta {
    /// Logical target name, unique across the store.
    pub name: String,
    pub table_name: String,
    pub is_view: bool,
    pub columns: Vec<ColumnMeta>,
    pub relations: Vec<RelationMeta>,
    /// Paths making up the primary key.
    pub primary_keys: Vec<String>,
    /// Declared uniqueness constraints, each a set of column paths.
    pub uniques: Vec<Vec<String>>,
}

impl TableMeta {
    pub fn is_primary(&self, path: &str) -> bool {
        self.primary_keys.iter().any(|p| p == path)
    }

    /// A column is unique when it participates in any declared uniqueness
    /// constraint, single- or multi-column.
    pub fn is_unique(&self, path: &str) -> bool {
        self.uniques.iter().any(|set| set.iter().any(|p| p == path))
    }
}

/// Produces localized display labels for newly discovered targets and
/// columns. Label storage itself lives outside the engine.
pub trait LabelService: Send + Sync {
    fn display_name(&self, raw: &str) -> String;
}

/// Default labeler: `"created_at"` becomes `"Created At"`.
pub struct HumanizeLabels;

impl LabelService for HumanizeLabels {
    fn display_name(&self, raw: &str) -> String {
        raw.split(|c| c == '_' || c == '-')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanizes_snake_case() {
        let labels = HumanizeLabels;
        assert_eq!(labels.display_name("created_at"), "Created At");
        assert_eq!(labels.display_name("user"), "User");
        assert_eq!(labels.display_name("api-key"), "Api Key");
    }

    #[test]
    fn to_many_kinds_are_multiple() {
        assert!(RelationKind::OneToMany.is_multiple());
        assert!(RelationKind::ManyToMany.is_multiple());
        assert!(!RelationKind::ManyToOne.is_multiple());
        assert!(!RelationKind::OneToOne.is_multiple());
    }

    #[test]
    fn unique_membership_covers_multi_column_sets() {
        let table = TableMeta {
            name: "user".to_string(),
            table_name: "users".to_string(),
            is_view: false,
            columns: vec![],
            relations: vec![],
            primary_keys: vec!["id".to_string()],
            uniques: vec![vec!["tenant".to_string(), "login".to_string()]],
        };
        assert!(table.is_unique("login"));
        assert!(table.is_unique("tenant"));
        assert!(!table.is_unique("id"));
        assert!(table.is_primary("id"));
    }
}
