//! Shared fixture schema for the unit tests: users with a to-one profile,
//! to-many posts, a post back-reference to its author, a self-referential
//! category tree, and one view that analysis must skip.

use crate::engine::Engine;
use crate::meta::{ColumnMeta, RelationKind, RelationMeta, TableMeta};
use crate::model::Record;
use crate::store::{MemStore, Store};
use serde_json::Value;
use std::sync::Arc;

fn column(path: &str, type_name: &str) -> ColumnMeta {
    ColumnMeta { path: path.to_string(), type_name: type_name.to_string(), is_virtual: false }
}

fn relation(path: &str, kind: RelationKind, target: &str, table: &str) -> RelationMeta {
    RelationMeta { path: path.to_string(), kind, target_name: target.to_string(), table_name: table.to_string() }
}

pub(crate) fn schema() -> Vec<TableMeta> {
    vec![
        TableMeta {
            name: "user".to_string(),
            table_name: "users".to_string(),
            is_view: false,
            columns: vec![column("id", "bigint"), column("login", "varchar(64)"), column("secret", "varchar(64)")],
            relations: vec![
                relation("profile", RelationKind::ManyToOne, "profile", "profiles"),
                relation("posts", RelationKind::OneToMany, "post", "posts"),
            ],
            primary_keys: vec!["id".to_string()],
            uniques: vec![vec!["login".to_string()]],
        },
        TableMeta {
            name: "profile".to_string(),
            table_name: "profiles".to_string(),
            is_view: false,
            columns: vec![column("id", "bigint"), column("bio", "text")],
            relations: vec![relation("user", RelationKind::ManyToOne, "user", "users")],
            primary_keys: vec!["id".to_string()],
            uniques: vec![],
        },
        TableMeta {
            name: "post".to_string(),
            table_name: "posts".to_string(),
            is_view: false,
            columns: vec![column("id", "bigint"), column("title", "varchar(255)")],
            relations: vec![
                relation("author", RelationKind::ManyToOne, "user", "users"),
                relation("topic", RelationKind::ManyToOne, "category", "categories"),
            ],
            primary_keys: vec!["id".to_string()],
            uniques: vec![],
        },
        TableMeta {
            name: "category".to_string(),
            table_name: "categories".to_string(),
            is_view: false,
            columns: vec![column("id", "bigint"), column("label", "varchar(64)")],
            relations: vec![relation("parent", RelationKind::ManyToOne, "category", "categories")],
            primary_keys: vec!["id".to_string()],
            uniques: vec![],
        },
        TableMeta {
            name: "user_stats".to_string(),
            table_name: "user_stats".to_string(),
            is_view: true,
            columns: vec![column("id", "bigint")],
            relations: vec![],
            primary_keys: vec!["id".to_string()],
            uniques: vec![],
        },
    ]
}

pub(crate) fn record(pairs: &[(&str, Value)]) -> Record {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

pub(crate) async fn save(store: &Arc<MemStore>, table: &str, pairs: &[(&str, Value)]) {
    store.save_row(table, "id", record(pairs)).await.unwrap();
}

/// Fresh store with an analyzed catalog and no rows.
pub(crate) async fn setup() -> (Arc<MemStore>, Engine) {
    let store = Arc::new(MemStore::new(schema()));
    let engine = Engine::new(store.clone());
    engine.analyze().await.unwrap();
    (store, engine)
}

/// [`setup`] plus the canonical rows used by the traversal tests.
pub(crate) async fn setup_with_rows() -> (Arc<MemStore>, Engine) {
    use serde_json::json;
    let (store, engine) = setup().await;
    save(&store, "users", &[
        ("id", json!(7)),
        ("login", json!("a")),
        ("secret", json!("s3cret")),
        ("profile", json!(3)),
        ("posts", json!([1, 2])),
    ])
    .await;
    save(&store, "profiles", &[("id", json!(3)), ("bio", json!("hello")), ("user", json!(7))]).await;
    save(&store, "posts", &[("id", json!(1)), ("title", json!("t1")), ("author", json!(7))]).await;
    save(&store, "posts", &[("id", json!(2)), ("title", json!("t2")), ("author", json!(7))]).await;
    (store, engine)
}
