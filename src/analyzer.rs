use crate::classify::classify;
use crate::engine::Engine;
use crate::error::AppError;
use crate::model::{Column, DisplayType, Target};
use crate::{debug, info};

impl Engine {
    /// Walks the store's live schema metadata and persists a catalog
    /// descriptor for every regular table.
    ///
    /// Idempotent and safe to invoke on every boot: existing targets and
    /// columns are skipped (logged, never overwritten), so manual edits to
    /// the catalog survive re-analysis while newly added physical columns
    /// are still picked up.
    pub async fn analyze(&self) -> Result<(), AppError> {
        let tables = self.store.schema_tables().await?;
        info!("analyzing schema: {} tables", tables.len());
        for table in tables {
            if table.is_view {
                debug!("skipping view '{}'", table.name);
                continue;
            }
            let target = Target {
                name: table.name.clone(),
                table_name: table.table_name.clone(),
                alias: None,
                display_name: Some(self.labels.display_name(&table.name)),
                columns: Vec::new(),
            };
            if self.store.insert_target(target).await? {
                info!("registered target '{}' for table '{}'", table.name, table.table_name);
            } else {
                info!("target '{}' already registered, skipping", table.name);
            }

            for column in &table.columns {
                if column.is_virtual {
                    continue;
                }
                let descriptor = Column {
                    id: format!("{}.{}", table.table_name, column.path),
                    property: column.path.clone(),
                    display_type: classify(&column.type_name),
                    primary: table.is_primary(&column.path),
                    unique: table.is_unique(&column.path),
                    multiple: false,
                    referenced_target_name: None,
                    referenced_table_name: None,
                    display_name: Some(self.labels.display_name(&column.path)),
                };
                self.register_column(&table.name, descriptor).await?;
            }

            for relation in &table.relations {
                let descriptor = Column {
                    id: format!("{}.{}", table.table_name, relation.path),
                    property: relation.path.clone(),
                    display_type: DisplayType::Reference,
                    primary: false,
                    unique: false,
                    multiple: relation.kind.is_multiple(),
                    referenced_target_name: Some(relation.target_name.clone()),
                    referenced_table_name: Some(relation.table_name.clone()),
                    display_name: Some(self.labels.display_name(&relation.path)),
                };
                self.register_column(&table.name, descriptor).await?;
            }
        }
        Ok(())
    }

    async fn register_column(&self, target_name: &str, column: Column) -> Result<(), AppError> {
        let id = column.id.clone();
        if !self.store.insert_column(target_name, column).await? {
            debug!("column '{}' already registered, skipping", id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::model::DisplayType;
    use crate::testkit;

    #[tokio::test]
    async fn it_should_build_the_catalog_from_live_metadata() {
        let (_, engine) = testkit::setup().await;
        let data = engine.resolve("user", false).await.unwrap().unwrap();
        assert_eq!(data.target.table_name, "users");
        assert_eq!(data.primary_column.property, "id");
        assert!(data.primary_column.primary);

        let login = data.target.columns.iter().find(|c| c.property == "login").unwrap();
        assert_eq!(login.display_type, DisplayType::String);
        assert!(login.unique);
        assert_eq!(login.id, "users.login");

        let profile = data.target.columns.iter().find(|c| c.property == "profile").unwrap();
        assert_eq!(profile.display_type, DisplayType::Reference);
        assert!(!profile.multiple);
        assert_eq!(profile.referenced_target_name.as_deref(), Some("profile"));
        assert_eq!(profile.referenced_table_name.as_deref(), Some("profiles"));

        let posts = data.target.columns.iter().find(|c| c.property == "posts").unwrap();
        assert!(posts.multiple);
        assert_eq!(posts.referenced_target_name.as_deref(), Some("post"));
    }

    #[tokio::test]
    async fn analysis_is_idempotent() {
        let (_, engine) = testkit::setup().await;
        let before = engine.list_targets().await.unwrap();
        engine.analyze().await.unwrap();
        let after = engine.list_targets().await.unwrap();
        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(after.iter()) {
            assert_eq!(a.columns.len(), b.columns.len(), "target '{}' gained columns", a.name);
        }
    }

    #[tokio::test]
    async fn reanalysis_preserves_manual_catalog_edits() {
        let (_, engine) = testkit::setup().await;
        let mut user = engine.resolve("user", true).await.unwrap().unwrap().target;
        user.alias = Some("usr".to_string());
        engine.upsert_target(user).await.unwrap();

        engine.analyze().await.unwrap();
        let user = engine.resolve("usr", false).await.unwrap().unwrap();
        assert_eq!(user.target.name, "user");
    }

    #[tokio::test]
    async fn views_are_not_registered() {
        let (_, engine) = testkit::setup().await;
        assert!(engine.resolve("user_stats", false).await.unwrap().is_none());
    }
}
