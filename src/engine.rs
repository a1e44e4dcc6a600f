use crate::error::AppError;
use crate::meta::{HumanizeLabels, LabelService};
use crate::model::{Record, Target};
use crate::page::{Page, PageParams};
use crate::persist::SaveHandler;
use crate::store::Store;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Relations are pre-expanded this deep on listing results.
pub const LIST_DEPTH: i64 = 2;

/// The data-exploration engine: schema analysis, catalog resolution, and
/// generic record operations for any registered target, with no
/// target-specific code anywhere.
///
/// Construction wires the collaborators once; per-request state is none.
#[derive(Clone)]
pub struct Engine {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) labels: Arc<dyn LabelService>,
    pub(crate) handlers: Vec<Arc<dyn SaveHandler>>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Engine { store, labels: Arc::new(HumanizeLabels), handlers: Vec::new() }
    }

    pub fn with_labels(mut self, labels: Arc<dyn LabelService>) -> Self {
        self.labels = labels;
        self
    }

    /// Installs the save-handler chain; handlers run in the given order.
    pub fn with_handlers(mut self, handlers: Vec<Arc<dyn SaveHandler>>) -> Self {
        self.handlers = handlers;
        self
    }

    pub async fn list_targets(&self) -> Result<Vec<Target>, AppError> {
        self.store.targets(true).await
    }

    /// Catalog-management upsert for display/behavioral edits. Validates
    /// the descriptor invariants and name/table/alias uniqueness against
    /// the rest of the catalog.
    pub async fn upsert_target(&self, target: Target) -> Result<Target, AppError> {
        target.validate()?;
        let existing = self.store.targets(false).await?;
        for other in existing.iter().filter(|t| t.name != target.name) {
            if other.table_name == target.table_name {
                return Err(AppError::BadRequest(format!(
                    "tableName '{}' is already used by target '{}'",
                    target.table_name, other.name
                )));
            }
            if target.alias.is_some() && other.alias == target.alias {
                return Err(AppError::BadRequest(format!(
                    "alias '{}' is already used by target '{}'",
                    target.alias.as_deref().unwrap_or_default(),
                    other.name
                )));
            }
        }
        self.store.put_target(target).await
    }

    /// Generic sort/filter/paginate listing. Every returned row is
    /// materialized to a fixed depth of [`LIST_DEPTH`] so one- and two-hop
    /// relations arrive pre-expanded for display.
    pub async fn list(&self, identifier: &str, params: &PageParams) -> Result<Page<Record>, AppError> {
        let data = self.resolve_required(identifier).await?;
        let (spec, page) = params.normalize(&data)?;
        let (rows, total) = self.store.query(&data.target.table_name, &spec).await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(self.attach(row, &data, HashSet::new(), LIST_DEPTH).await?);
        }
        Ok(Page { items, total_count: total, current_page: page, page_size: spec.limit })
    }

    /// Fetches one record by primary key, expanding relations up to
    /// `max_depth` hops (unbounded by default; the per-branch cycle guard
    /// bounds every path regardless).
    pub async fn get(&self, identifier: &str, id: &Value, max_depth: Option<i64>) -> Result<Record, AppError> {
        let data = self.resolve_required(identifier).await?;
        let row = self
            .store
            .find_by_id(&data.target.table_name, data.primary_property(), id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("record '{}' of target '{}'", id, data.target.name)))?;
        self.attach(row, &data, HashSet::new(), max_depth.unwrap_or(i64::MAX)).await
    }
}
