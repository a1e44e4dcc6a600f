use crate::engine::Engine;
use crate::error::AppError;
use crate::model::TargetData;

impl Engine {
    /// Resolves a target identifier — internal name, physical table name,
    /// or alias, in that order — to its descriptor plus primary column.
    ///
    /// The descriptor is recomputed from the catalog on every call, never
    /// cached, so edits to the catalog are visible immediately. `full`
    /// loads display labels as well. Returns `Ok(None)` for an unknown
    /// identifier; callers translate that into NotFound.
    pub async fn resolve(&self, identifier: &str, full: bool) -> Result<Option<TargetData>, AppError> {
        let targets = self.store.targets(full).await?;
        let target = targets
            .iter()
            .find(|t| t.name == identifier)
            .or_else(|| targets.iter().find(|t| t.table_name == identifier))
            .or_else(|| targets.iter().find(|t| t.alias.as_deref() == Some(identifier)));
        let Some(target) = target else {
            return Ok(None);
        };
        let primary_column = target
            .columns
            .iter()
            .find(|c| c.primary)
            .cloned()
            .ok_or_else(|| AppError::Internal(format!("target '{}' has no primary column", target.name)))?;
        Ok(Some(TargetData { target: target.clone(), primary_column }))
    }

    /// Resolve-or-404 shorthand used by the record operations.
    pub(crate) async fn resolve_required(&self, identifier: &str) -> Result<TargetData, AppError> {
        self.resolve(identifier, false)
            .await?
            .ok_or_else(|| AppError::not_found(format!("target '{}'", identifier)))
    }
}
