use std::time::Duration;

use eden_query::config::{self, ConfigArgs, ConfigOverrides, Settings};
use eden_query::hooks::{
    FetchInfiniteOptions, MutationObserver, MutationOptions, QueryObserver, QueryOptions,
    QueryRequestOptions, QueryStatus,
};
use eden_query::infra::bootstrap;
use eden_query::{EdenContext, QueryFilter};
use httpmock::MockServer;
use serde_json::{Value, json};

fn settings(server: &MockServer, overrides: ConfigOverrides) -> Settings {
    let args = ConfigArgs {
        config_file: None,
        overrides: ConfigOverrides {
            domain: Some(server.base_url()),
            ..overrides
        },
    };
    config::load(&args).expect("settings")
}

fn context(settings: &Settings) -> EdenContext {
    bootstrap::build_context(settings).expect("context")
}

fn next_cursor(last: &Value, _pages: &[Value]) -> Option<Value> {
    last.get("nextCursor").filter(|cursor| !cursor.is_null()).cloned()
}

#[tokio::test]
async fn fresh_results_are_served_from_cache() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/batch")
            .json_body(json!([{ "path": ["posts", "list"], "method": "GET" }]));
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"[{"status":200,"data":["a","b"]}]"#);
    });

    let mut settings = settings(&server, ConfigOverrides::default());
    settings.query.stale_time = Duration::from_secs(60);
    let context = context(&settings);
    let utils = context.utils();
    let route = context.client().route("posts").route("list");
    let options = QueryRequestOptions::default();

    let first = utils.fetch(&route, None, &options).await.expect("network");
    let second = utils.fetch(&route, None, &options).await.expect("cache");
    assert_eq!(first, second);
    mock.assert();

    assert_eq!(utils.invalidate(&route.filter()), 1);
    let key = route.query_key(None);
    assert!(
        context
            .query_client()
            .get_query_entry(&key)
            .expect("entry kept")
            .invalidated
    );
    assert_eq!(
        utils.get_data::<Vec<String>>(&key).expect("decode"),
        Some(vec!["a".to_string(), "b".to_string()])
    );
}

#[tokio::test]
async fn infinite_fetch_walks_cursor_through_batch_endpoint() {
    let server = MockServer::start();
    let first = server.mock(|when, then| {
        when.method("POST").path("/batch").json_body(json!([{
            "path": ["feed"],
            "method": "GET",
            "input": { "limit": 1, "direction": "forward" },
        }]));
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"[{"status":200,"data":{"items":["x"],"nextCursor":"c2"}}]"#);
    });
    let second = server.mock(|when, then| {
        when.method("POST").path("/batch").json_body(json!([{
            "path": ["feed"],
            "method": "GET",
            "input": { "limit": 1, "cursor": "c2", "direction": "forward" },
        }]));
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"[{"status":200,"data":{"items":["y"],"nextCursor":null}}]"#);
    });

    let context = context(&settings(&server, ConfigOverrides::default()));
    let utils = context.utils();
    let route = context.client().route("feed");

    let data = utils
        .fetch_infinite(
            &route,
            Some(json!({ "limit": 1 })),
            &FetchInfiniteOptions::new(next_cursor).pages(5),
        )
        .await
        .expect("two pages");

    assert_eq!(data.pages.len(), 2);
    assert_eq!(data.page_params, vec![Value::Null, json!("c2")]);
    first.assert();
    second.assert();

    // Cursor fields never reach the key, so the pages are cached under it.
    let key = route.infinite_query_key(Some(&json!({ "limit": 1, "cursor": "c9" })));
    assert!(context.query_client().get_query_value(&key).is_some());
}

#[tokio::test]
async fn mutation_success_can_invalidate_observed_queries() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST")
            .path("/batch")
            .json_body(json!([{ "path": ["todos", "list"], "method": "GET" }]));
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"[{"status":200,"data":[]}]"#);
    });
    let add = server.mock(|when, then| {
        when.method("POST")
            .path("/batch")
            .header("authorization", "Bearer t")
            .json_body(json!([{
                "path": ["todos", "add"],
                "method": "POST",
                "input": { "title": "write tests" },
            }]));
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"[{"status":200,"data":{"id":1}}]"#);
    });

    let context = context(&settings(&server, ConfigOverrides::default()));
    let todos = context.client().route("todos");
    let list = QueryObserver::new(
        &context,
        todos.clone().route("list"),
        None,
        QueryOptions::default(),
    );
    list.mount().await.expect("enabled").expect("list");
    assert_eq!(list.state().status, QueryStatus::Success);

    let invalidator = context.utils();
    let options = MutationOptions::default()
        .request(QueryRequestOptions::default().header("authorization", "Bearer t"))
        .on_success(move |_data, _variables| {
            invalidator.invalidate(&QueryFilter::route(&["todos"]));
        });
    let observer = MutationObserver::new(&context, todos.route("add"), options);
    let created = observer
        .mutate(Some(json!({ "title": "write tests" })))
        .await
        .expect("created");

    assert_eq!(created, json!({ "id": 1 }));
    add.assert();
    assert!(
        context
            .query_client()
            .get_query_entry(list.key())
            .expect("entry")
            .invalidated
    );
}

#[tokio::test]
async fn disabling_batching_sends_calls_separately() {
    let server = MockServer::start();
    let mocks: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|segment| {
            server.mock(|when, then| {
                when.method("POST")
                    .path("/rpc")
                    .json_body(json!([{ "path": [segment], "method": "GET" }]));
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"[{"status":200,"data":true}]"#);
            })
        })
        .collect();

    let context = context(&settings(
        &server,
        ConfigOverrides {
            endpoint: Some("/rpc".to_string()),
            batching: Some(false),
            ..Default::default()
        },
    ));
    let utils = context.utils();
    let options = QueryRequestOptions::default();
    let a = context.client().route("a");
    let b = context.client().route("b");

    let (a, b) = tokio::join!(
        utils.fetch(&a, None, &options),
        utils.fetch(&b, None, &options)
    );
    assert_eq!(a, Ok(json!(true)));
    assert_eq!(b, Ok(json!(true)));
    for mock in &mocks {
        mock.assert();
    }
}
