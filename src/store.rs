use crate::error::AppError;
use crate::meta::TableMeta;
use crate::model::{Column, Record, Target};
use crate::page::{json_cmp, QuerySpec, SortOrder};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Uniform repository abstraction over the backing relational store.
///
/// The engine drives everything through this seam: catalog rows, record
/// CRUD, and live schema metadata. Every call is one awaited round-trip;
/// the engine adds no locking or transactions on top (concurrent writes
/// rely on the store's own row-level consistency).
#[async_trait]
pub trait Store: Send + Sync {
    /// Enumerates the live schema metadata the analyzer walks at boot.
    async fn schema_tables(&self) -> Result<Vec<TableMeta>, AppError>;

    /// Loads all catalog targets with their columns. `full` additionally
    /// loads display labels; otherwise they are left unset.
    async fn targets(&self, full: bool) -> Result<Vec<Target>, AppError>;

    /// Inserts a new target row; returns `false` without touching anything
    /// when a target with that name already exists.
    async fn insert_target(&self, target: Target) -> Result<bool, AppError>;

    /// Inserts a single column row; returns `false` when the column id is
    /// already registered.
    async fn insert_column(&self, target_name: &str, column: Column) -> Result<bool, AppError>;

    /// Catalog-management upsert, replacing the whole descriptor.
    async fn put_target(&self, target: Target) -> Result<Target, AppError>;

    async fn find_by_id(&self, table: &str, pk: &str, id: &Value) -> Result<Option<Record>, AppError>;

    /// Fetches a row with the given reference columns joined one hop deep,
    /// as a single round-trip. Joined values stay shallow: their own
    /// reference columns are whatever the store holds physically.
    async fn find_with_relations(
        &self,
        table: &str,
        pk: &str,
        id: &Value,
        relations: &[Column],
    ) -> Result<Option<Record>, AppError>;

    /// Offset/limit query with total count in the same call.
    async fn query(&self, table: &str, spec: &QuerySpec) -> Result<(Vec<Record>, u64), AppError>;

    /// Creates a fresh row holding only a storage-assigned primary key.
    async fn create_stub(&self, table: &str, pk: &str) -> Result<Record, AppError>;

    async fn save_row(&self, table: &str, pk: &str, record: Record) -> Result<Record, AppError>;

    async fn delete_row(&self, table: &str, pk: &str, id: &Value) -> Result<Option<Record>, AppError>;
}

/// In-memory [`Store`] with schema metadata fixed at construction and
/// monotonically assigned integer keys. Reference columns are persisted
/// normalized to primary-key values; `find_with_relations` swaps them back
/// for shallow row copies. Backs the test suite and demo setups.
pub struct MemStore {
    inner: Mutex<MemInner>,
}

struct MemInner {
    tables: Vec<TableMeta>,
    targets: Vec<Target>,
    rows: BTreeMap<String, BTreeMap<String, Record>>,
    next_ids: BTreeMap<String, i64>,
}

/// Canonical map key for a primary-key value.
fn key_of(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl MemStore {
    pub fn new(tables: Vec<TableMeta>) -> Self {
        MemStore {
            inner: Mutex::new(MemInner {
                tables,
                targets: Vec::new(),
                rows: BTreeMap::new(),
                next_ids: BTreeMap::new(),
            }),
        }
    }
}

impl MemInner {
    fn table_meta(&self, table: &str) -> Option<&TableMeta> {
        self.tables.iter().find(|t| t.table_name == table)
    }

    /// Collapses joined objects on relation paths down to their primary-key
    /// values, the physical shape rows are kept in.
    fn normalize(&self, table: &str, mut record: Record) -> Record {
        let Some(meta) = self.table_meta(table) else { return record };
        let relations: Vec<(String, Option<String>)> = meta
            .relations
            .iter()
            .map(|r| {
                let child_pk = self
                    .table_meta(&r.table_name)
                    .and_then(|m| m.primary_keys.first().cloned());
                (r.path.clone(), child_pk)
            })
            .collect();
        for (path, child_pk) in relations {
            let Some(value) = record.get_mut(&path) else { continue };
            let Some(child_pk) = child_pk else { continue };
            let collapse = |v: &Value| -> Value {
                match v {
                    Value::Object(obj) => obj.get(&child_pk).cloned().unwrap_or(Value::Null),
                    other => other.clone(),
                }
            };
            let collapsed = match &*value {
                Value::Array(items) => Value::Array(items.iter().map(collapse).collect()),
                other => collapse(other),
            };
            *value = collapsed;
        }
        record
    }
}

#[async_trait]
impl Store for MemStore {
    async fn schema_tables(&self) -> Result<Vec<TableMeta>, AppError> {
        Ok(self.inner.lock()?.tables.clone())
    }

    async fn targets(&self, full: bool) -> Result<Vec<Target>, AppError> {
        let mut targets = self.inner.lock()?.targets.clone();
        if !full {
            for target in &mut targets {
                target.display_name = None;
                for column in &mut target.columns {
                    column.display_name = None;
                }
            }
        }
        Ok(targets)
    }

    async fn insert_target(&self, target: Target) -> Result<bool, AppError> {
        let mut inner = self.inner.lock()?;
        if inner.targets.iter().any(|t| t.name == target.name) {
            return Ok(false);
        }
        inner.targets.push(target);
        Ok(true)
    }

    async fn insert_column(&self, target_name: &str, column: Column) -> Result<bool, AppError> {
        let mut inner = self.inner.lock()?;
        if inner.targets.iter().any(|t| t.columns.iter().any(|c| c.id == column.id)) {
            return Ok(false);
        }
        let target = inner
            .targets
            .iter_mut()
            .find(|t| t.name == target_name)
            .ok_or_else(|| AppError::not_found(format!("target '{}'", target_name)))?;
        target.columns.push(column);
        Ok(true)
    }

    async fn put_target(&self, target: Target) -> Result<Target, AppError> {
        let mut inner = self.inner.lock()?;
        match inner.targets.iter_mut().find(|t| t.name == target.name) {
            Some(existing) => *existing = target.clone(),
            None => inner.targets.push(target.clone()),
        }
        Ok(target)
    }

    async fn find_by_id(&self, table: &str, _pk: &str, id: &Value) -> Result<Option<Record>, AppError> {
        let inner = self.inner.lock()?;
        Ok(inner.rows.get(table).and_then(|rows| rows.get(&key_of(id))).cloned())
    }

    async fn find_with_relations(
        &self,
        table: &str,
        _pk: &str,
        id: &Value,
        relations: &[Column],
    ) -> Result<Option<Record>, AppError> {
        let inner = self.inner.lock()?;
        let Some(mut record) = inner.rows.get(table).and_then(|rows| rows.get(&key_of(id))).cloned() else {
            return Ok(None);
        };
        for column in relations.iter().filter(|c| c.is_reference()) {
            let Some(ref_table) = &column.referenced_table_name else { continue };
            let Some(value) = record.get_mut(&column.property) else { continue };
            let join = |v: &Value| -> Value {
                match v {
                    Value::Null | Value::Object(_) => v.clone(),
                    key => inner
                        .rows
                        .get(ref_table)
                        .and_then(|rows| rows.get(&key_of(key)))
                        .map(|row| Value::Object(row.clone()))
                        .unwrap_or_else(|| key.clone()),
                }
            };
            let joined = match &*value {
                Value::Array(items) => Value::Array(items.iter().map(join).collect()),
                other => join(other),
            };
            *value = joined;
        }
        Ok(Some(record))
    }

    async fn query(&self, table: &str, spec: &QuerySpec) -> Result<(Vec<Record>, u64), AppError> {
        let inner = self.inner.lock()?;
        let mut matched: Vec<Record> = inner
            .rows
            .get(table)
            .map(|rows| {
                rows.values()
                    .filter(|record| spec.filters.iter().all(|f| f.matches(record)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let total = matched.len() as u64;
        matched.sort_by(|a, b| {
            let (va, vb) = (
                a.get(&spec.sort).unwrap_or(&Value::Null),
                b.get(&spec.sort).unwrap_or(&Value::Null),
            );
            let ord = json_cmp(va, vb);
            match spec.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        let items = matched.into_iter().skip(spec.offset).take(spec.limit).collect();
        Ok((items, total))
    }

    async fn create_stub(&self, table: &str, pk: &str) -> Result<Record, AppError> {
        let mut inner = self.inner.lock()?;
        let MemInner { rows, next_ids, .. } = &mut *inner;
        let occupied = rows.get(table);
        let next = next_ids.entry(table.to_string()).or_insert(0);
        // skip over keys taken by rows saved with explicit ids
        loop {
            *next += 1;
            if occupied.map_or(true, |r| !r.contains_key(&key_of(&Value::from(*next)))) {
                break;
            }
        }
        let id = Value::from(*next);
        let mut record = Record::new();
        record.insert(pk.to_string(), id.clone());
        rows.entry(table.to_string()).or_default().insert(key_of(&id), record.clone());
        Ok(record)
    }

    async fn save_row(&self, table: &str, pk: &str, record: Record) -> Result<Record, AppError> {
        let mut inner = self.inner.lock()?;
        let record = inner.normalize(table, record);
        let id = record
            .get(pk)
            .cloned()
            .ok_or_else(|| AppError::BadRequest(format!("record for '{}' has no primary value '{}'", table, pk)))?;
        inner
            .rows
            .entry(table.to_string())
            .or_default()
            .insert(key_of(&id), record.clone());
        Ok(record)
    }

    async fn delete_row(&self, table: &str, _pk: &str, id: &Value) -> Result<Option<Record>, AppError> {
        let mut inner = self.inner.lock()?;
        Ok(inner.rows.get_mut(table).and_then(|rows| rows.remove(&key_of(id))))
    }
}
