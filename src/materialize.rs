use crate::engine::Engine;
use crate::error::AppError;
use crate::model::{Column, Record, TargetData};
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

impl Engine {
    /// Recursively attaches related records to `row`, depth-limited and
    /// cycle-safe per branch.
    ///
    /// The row is re-fetched once with all its reference columns joined
    /// (one extra round-trip instead of one per relation), then each joined
    /// value is expanded by recursing with `max_depth - 1`. The visited set
    /// is forked per branch and per array element: it blocks a target from
    /// reappearing along a single path, while the same target reached from
    /// different siblings is expanded again independently. A referenced
    /// target already in `visited`, or one that no longer resolves, stays
    /// as the shallow value the store returned.
    pub(crate) fn attach<'a>(
        &'a self,
        row: Record,
        data: &'a TargetData,
        visited: HashSet<String>,
        max_depth: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Record, AppError>> + Send + 'a>> {
        Box::pin(async move {
            if max_depth < 0 {
                return Err(AppError::BadRequest("maxDepth must not be negative".to_string()));
            }
            let reference_columns: Vec<Column> = data.target.reference_columns().cloned().collect();
            if max_depth == 0 || reference_columns.is_empty() {
                return Ok(row);
            }
            let Some(id) = row.get(data.primary_property()).filter(|v| !v.is_null()).cloned() else {
                return Ok(row);
            };
            let mut hydrated = self
                .store
                .find_with_relations(&data.target.table_name, data.primary_property(), &id, &reference_columns)
                .await?
                .unwrap_or(row);

            for column in &reference_columns {
                let Some(child_name) = &column.referenced_target_name else { continue };
                if visited.contains(child_name) {
                    continue;
                }
                let Some(child_data) = self.resolve(child_name, false).await? else {
                    continue;
                };
                let Some(value) = hydrated.get_mut(&column.property) else { continue };
                let mut branch_visited = visited.clone();
                branch_visited.insert(data.target.name.clone());
                match value {
                    Value::Array(items) => {
                        for item in items.iter_mut() {
                            if let Value::Object(obj) = item {
                                let child_row = std::mem::take(obj);
                                let expanded = self
                                    .attach(child_row, &child_data, branch_visited.clone(), max_depth - 1)
                                    .await?;
                                *item = Value::Object(expanded);
                            }
                        }
                    }
                    Value::Object(obj) => {
                        let child_row = std::mem::take(obj);
                        let expanded = self
                            .attach(child_row, &child_data, branch_visited, max_depth - 1)
                            .await?;
                        *value = Value::Object(expanded);
                    }
                    _ => {}
                }
            }
            Ok(hydrated)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::testkit;
    use serde_json::json;

    #[tokio::test]
    async fn depth_zero_leaves_relations_unexpanded() {
        let (_, engine) = testkit::setup_with_rows().await;
        let user = engine.get("user", &json!(7), Some(0)).await.unwrap();
        assert_eq!(user["profile"], json!(3));
        assert_eq!(user["posts"], json!([1, 2]));
    }

    #[tokio::test]
    async fn it_should_expand_one_level_and_leave_deeper_refs_shallow() {
        let (_, engine) = testkit::setup_with_rows().await;
        let user = engine.get("user", &json!(7), Some(1)).await.unwrap();
        assert_eq!(user["profile"]["bio"], json!("hello"));
        // the profile's own back-reference stays a shallow key
        assert_eq!(user["profile"]["user"], json!(7));
    }

    #[tokio::test]
    async fn depth_two_expands_two_hops() {
        let (_, engine) = testkit::setup_with_rows().await;
        let post = engine.get("post", &json!(1), Some(1)).await.unwrap();
        assert_eq!(post["author"]["login"], json!("a"));
        assert_eq!(post["author"]["profile"], json!(3));

        let post = engine.get("post", &json!(1), Some(2)).await.unwrap();
        assert_eq!(post["author"]["profile"]["bio"], json!("hello"));
    }

    #[tokio::test]
    async fn negative_depth_is_rejected() {
        let (_, engine) = testkit::setup_with_rows().await;
        let err = engine.get("user", &json!(7), Some(-1)).await.unwrap_err();
        assert!(matches!(err, crate::AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn it_should_terminate_on_self_referential_cycles() {
        let (store, engine) = testkit::setup_with_rows().await;
        testkit::save(&store, "categories", &[("id", json!(1)), ("label", json!("a")), ("parent", json!(2))]).await;
        testkit::save(&store, "categories", &[("id", json!(2)), ("label", json!("b")), ("parent", json!(1))]).await;

        // unbounded depth must still terminate: the guarded branch keeps
        // the shallow join the store returned, nothing recurses further
        let category = engine.get("category", &json!(1), None).await.unwrap();
        assert_eq!(category["parent"]["label"], json!("b"));
        assert_eq!(category["parent"]["parent"]["id"], json!(1));
        assert_eq!(category["parent"]["parent"]["parent"], json!(2));
    }

    #[tokio::test]
    async fn sibling_branches_fork_the_visited_set() {
        let (store, engine) = testkit::setup_with_rows().await;
        testkit::save(&store, "categories", &[("id", json!(9)), ("label", json!("rust"))]).await;
        testkit::save(
            &store,
            "posts",
            &[("id", json!(1)), ("title", json!("t1")), ("author", json!(7)), ("topic", json!(9))],
        )
        .await;
        testkit::save(
            &store,
            "posts",
            &[("id", json!(2)), ("title", json!("t2")), ("author", json!(7)), ("topic", json!(9))],
        )
        .await;

        // the same topic target is expanded independently in every element
        let user = engine.get("user", &json!(7), Some(2)).await.unwrap();
        let posts = user["posts"].as_array().unwrap();
        assert_eq!(posts[0]["topic"]["label"], json!("rust"));
        assert_eq!(posts[1]["topic"]["label"], json!("rust"));
        // the author back-reference is on the path: it keeps the shallow
        // join and its own references stay raw keys
        assert_eq!(posts[0]["author"]["id"], json!(7));
        assert_eq!(posts[0]["author"]["profile"], json!(3));
    }
}
