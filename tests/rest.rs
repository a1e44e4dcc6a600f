use axum_test::TestServer;
use datascope::{
    build_router, ColumnMeta, Engine, MemStore, RelationKind, RelationMeta, RequestState, StripFields, TableMeta,
};
use http::{HeaderName, HeaderValue};
use serde_json::{json, Value};
use std::sync::Arc;

fn column(path: &str, type_name: &str) -> ColumnMeta {
    ColumnMeta { path: path.to_string(), type_name: type_name.to_string(), is_virtual: false }
}

fn schema() -> Vec<TableMeta> {
    vec![
        TableMeta {
            name: "user".to_string(),
            table_name: "users".to_string(),
            is_view: false,
            columns: vec![column("id", "bigint"), column("login", "varchar(64)"), column("secret", "varchar(64)")],
            relations: vec![RelationMeta {
                path: "profile".to_string(),
                kind: RelationKind::ManyToOne,
                target_name: "profile".to_string(),
                table_name: "profiles".to_string(),
            }],
            primary_keys: vec!["id".to_string()],
            uniques: vec![vec!["login".to_string()]],
        },
        TableMeta {
            name: "profile".to_string(),
            table_name: "profiles".to_string(),
            is_view: false,
            columns: vec![column("id", "bigint"), column("bio", "text")],
            relations: vec![],
            primary_keys: vec!["id".to_string()],
            uniques: vec![],
        },
    ]
}

fn server() -> TestServer {
    let store = Arc::new(MemStore::new(schema()));
    let engine = Engine::new(store).with_handlers(vec![Arc::new(StripFields { fields: vec!["secret".to_string()] })]);
    let state = RequestState { engine: Arc::new(engine) };
    TestServer::new(build_router(state, None)).unwrap()
}

#[tokio::test]
async fn it_should_analyze_then_serve_the_catalog() {
    let server = server();
    let response = server.post("/analyze").await;
    response.assert_status(http::StatusCode::NO_CONTENT);

    let response = server.get("/targets").await;
    response.assert_status_ok();
    let targets: Value = response.json();
    assert_eq!(targets.as_array().unwrap().len(), 2);

    let response = server.get("/targets/users").await;
    response.assert_status_ok();
    let data: Value = response.json();
    assert_eq!(data["target"]["name"], json!("user"));
    assert_eq!(data["primaryColumn"]["property"], json!("id"));

    let response = server.get("/targets/nope").await;
    response.assert_status_not_found();
    let body: Value = response.json();
    assert_eq!(body["code"], json!(404));
}

#[tokio::test]
async fn it_should_save_list_get_and_remove_records_generically() {
    let server = server();
    server.post("/analyze").await.assert_status(http::StatusCode::NO_CONTENT);

    let response = server
        .post("/records/user")
        .json(&json!({"login": "alice", "secret": "hunter2", "profile": {"bio": "hi"}}))
        .await;
    response.assert_status_ok();
    let saved: Value = response.json();
    assert_eq!(saved["id"], json!(1));
    assert_eq!(saved["profile"], json!(1));
    // the save-handler chain stripped the privileged field for anonymous callers
    assert!(saved.get("secret").is_none());

    let response = server
        .post("/records/user")
        .add_header(HeaderName::from_static("x-user-id"), HeaderValue::from_static("root"))
        .add_header(HeaderName::from_static("x-user-admin"), HeaderValue::from_static("true"))
        .json(&json!({"login": "bob", "secret": "kept"}))
        .await;
    response.assert_status_ok();
    let saved: Value = response.json();
    assert_eq!(saved["secret"], json!("kept"));

    let response = server.get("/records/user?limit=10&sort=login&order=ASC").await;
    response.assert_status_ok();
    let page: Value = response.json();
    assert_eq!(page["totalCount"], json!(2));
    assert_eq!(page["currentPage"], json!(1));
    assert_eq!(page["items"][0]["login"], json!("alice"));

    let response = server.get("/records/user/1?depth=1").await;
    response.assert_status_ok();
    let user: Value = response.json();
    assert_eq!(user["profile"]["bio"], json!("hi"));

    let response = server.get("/records/user/1?depth=0").await;
    let user: Value = response.json();
    assert_eq!(user["profile"], json!(1));

    server.delete("/records/user/1").await.assert_status_ok();
    server.get("/records/user/1").await.assert_status_not_found();
}

#[tokio::test]
async fn it_should_reject_bad_filters_and_unknown_targets() {
    let server = server();
    server.post("/analyze").await.assert_status(http::StatusCode::NO_CONTENT);

    server.get("/records/nope").await.assert_status_not_found();

    let response = server.get("/records/user?filter=bogus").await;
    response.assert_status(http::StatusCode::BAD_REQUEST);
}
