use crate::engine::Engine;
use crate::error::AppError;
use crate::model::{ActingUser, Column, Record, TargetData};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// One pluggable transform applied to inbound payloads before persistence,
/// in registration order. Handlers may strip or rewrite fields; they must
/// not perform I/O the engine depends on.
pub trait SaveHandler: Send + Sync {
    fn handle(&self, data: &TargetData, payload: Record, user: &ActingUser) -> Result<Record, AppError>;
}

/// Removes the configured properties from the payload unless the acting
/// user is an admin.
pub struct StripFields {
    pub fields: Vec<String>,
}

impl SaveHandler for StripFields {
    fn handle(&self, _data: &TargetData, mut payload: Record, user: &ActingUser) -> Result<Record, AppError> {
        if !user.admin {
            for field in &self.fields {
                payload.remove(field);
            }
        }
        Ok(payload)
    }
}

impl Engine {
    /// Recursively upserts an entity graph.
    ///
    /// The payload runs through the save-handler chain, then children are
    /// persisted depth-first: every reference-typed value present in the
    /// payload is saved before the parent row is written, so the
    /// parent-to-child key always points at an existing row.
    pub async fn save(&self, identifier: &str, payload: Record, user: &ActingUser) -> Result<Record, AppError> {
        let data = self.resolve_required(identifier).await?;
        let mut payload = payload;
        for handler in &self.handlers {
            payload = handler.handle(&data, payload, user)?;
        }
        self.save_entity(&data, payload).await
    }

    /// Resolves the target, loads the row by its primary column and deletes
    /// it, returning the removed record. NotFound when either the target or
    /// the row is missing.
    pub async fn remove(&self, identifier: &str, id: &Value) -> Result<Record, AppError> {
        let data = self.resolve_required(identifier).await?;
        let table = &data.target.table_name;
        let pk = data.primary_property();
        let existing = self
            .store
            .find_by_id(table, pk, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("record '{}' of target '{}'", id, data.target.name)))?;
        self.store.delete_row(table, pk, id).await?;
        Ok(existing)
    }

    fn save_entity<'a>(
        &'a self,
        data: &'a TargetData,
        mut entity: Record,
    ) -> Pin<Box<dyn Future<Output = Result<Record, AppError>> + Send + 'a>> {
        Box::pin(async move {
            let pk = data.primary_property();
            // inserts get a storage-assigned key before children are attached
            if entity.get(pk).map_or(true, Value::is_null) {
                let stub = self.store.create_stub(&data.target.table_name, pk).await?;
                if let Some(id) = stub.get(pk) {
                    entity.insert(pk.to_string(), id.clone());
                }
            }
            let reference_columns: Vec<Column> = data.target.reference_columns().cloned().collect();
            for column in &reference_columns {
                if entity.get(&column.property).map_or(true, Value::is_null) {
                    continue;
                }
                let Some(child_name) = &column.referenced_target_name else { continue };
                let Some(taken) = entity.remove(&column.property) else { continue };
                let saved = match self.resolve(child_name, false).await? {
                    // unknown sub-target: tolerated with an empty stub so
                    // partial schemas stay functional
                    None => Value::Object(Record::new()),
                    Some(child_data) => match taken {
                        Value::Array(items) => {
                            let mut saved_items = Vec::with_capacity(items.len());
                            for item in items {
                                match item {
                                    Value::Object(child) => {
                                        let child = self.save_entity(&child_data, child).await?;
                                        saved_items.push(Value::Object(child));
                                    }
                                    other => saved_items.push(other),
                                }
                            }
                            Value::Array(saved_items)
                        }
                        Value::Object(child) => Value::Object(self.save_entity(&child_data, child).await?),
                        other => other,
                    },
                };
                entity.insert(column.property.clone(), saved);
            }
            self.store.save_row(&data.target.table_name, pk, entity).await
        })
    }
}
