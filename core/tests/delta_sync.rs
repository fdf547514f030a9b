//! Integration tests for delta-set collection refresh.

use ferry_core::{
    Client, Config, DataPolicy, DeltaSetRequest, Error, MemoryRack, Method, MockRack, Request,
    Response,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn test_client(cache: Arc<MemoryRack>, network: Arc<MockRack>) -> Arc<Client> {
    Arc::new(Client::new("https", "baas.example.com", cache, network))
}

async fn seed_cache(client: &Arc<Client>, pathname: &str, entities: Value) {
    Request::new(client.clone())
        .with_method(Method::Put)
        .with_pathname(pathname)
        .with_policy(DataPolicy::ForceLocal)
        .with_skip_sync(true)
        .with_data(entities)
        .execute()
        .await
        .unwrap();
}

fn delta_request(client: &Arc<Client>, pathname: &str) -> DeltaSetRequest {
    DeltaSetRequest::new(
        Request::new(client.clone())
            .with_pathname(pathname)
            .with_policy(DataPolicy::PreferNetwork),
    )
}

fn ids_of(data: &Value) -> Vec<&str> {
    data.as_array()
        .unwrap()
        .iter()
        .map(|entity| entity["_id"].as_str().unwrap())
        .collect()
}

// ============================================================================
// Diff and refetch
// ============================================================================

#[tokio::test]
async fn refetches_only_changed_ids() {
    let cache = Arc::new(MemoryRack::new());
    let network = Arc::new(MockRack::new());
    let client = test_client(cache, network.clone());

    seed_cache(
        &client,
        "/appdata/app1/books",
        json!([
            {"_id": "b1", "title": "old b1", "_kmd": {"lmt": "2020-01-01"}},
            {"_id": "b2", "title": "cached b2", "_kmd": {"lmt": "2020-01-01"}}
        ]),
    )
    .await;

    // Projection listing: b1 changed upstream, b2 unchanged, b3 new
    network.push_response(Response::ok(json!([
        {"_id": "b1", "_kmd": {"lmt": "2020-01-02"}},
        {"_id": "b2", "_kmd": {"lmt": "2020-01-01"}},
        {"_id": "b3", "_kmd": {"lmt": "2020-01-01"}}
    ])));
    // Full fetch of the delta set
    network.push_response(Response::ok(json!([
        {"_id": "b1", "title": "new b1", "_kmd": {"lmt": "2020-01-02"}},
        {"_id": "b3", "title": "new b3", "_kmd": {"lmt": "2020-01-01"}}
    ])));

    let response = delta_request(&client, "/appdata/app1/books")
        .execute()
        .await
        .unwrap();

    let mut ids = ids_of(&response.data);
    ids.sort_unstable();
    assert_eq!(ids, vec!["b1", "b2", "b3"]);

    // The unchanged entity came from the cache, the rest from the network
    let by_id = |id: &str| {
        response
            .data
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["_id"] == id)
            .unwrap()
            .clone()
    };
    assert_eq!(by_id("b1")["title"], "new b1");
    assert_eq!(by_id("b2")["title"], "cached b2");
    assert_eq!(by_id("b3")["title"], "new b3");

    // Exactly two network round-trips: the projection and one batch
    let executed = network.executed();
    assert_eq!(executed.len(), 2);

    let projection = &executed[0];
    assert_eq!(
        projection.query.as_ref().unwrap().fields,
        vec!["_id", "_kmd"]
    );

    let batch = &executed[1];
    let in_set = &batch.query.as_ref().unwrap().filter["_id"]["$in"];
    assert_eq!(in_set, &json!(["b1", "b3"]));

    // The refetched entities were mirrored into the cache
    let cached = Request::new(client)
        .with_pathname("/appdata/app1/books/b1")
        .with_policy(DataPolicy::ForceLocal)
        .execute()
        .await
        .unwrap();
    assert_eq!(cached.data["title"], "new b1");
}

#[tokio::test]
async fn cold_cache_fetches_everything_from_the_network() {
    let cache = Arc::new(MemoryRack::new());
    let network = Arc::new(MockRack::new());
    let client = test_client(cache, network.clone());

    network.push_response(Response::ok(json!([
        {"_id": "b1", "_kmd": {"lmt": "2020-01-01"}}
    ])));
    network.push_response(Response::ok(json!([
        {"_id": "b1", "title": "fetched", "_kmd": {"lmt": "2020-01-01"}}
    ])));

    let response = delta_request(&client, "/appdata/app1/books")
        .execute()
        .await
        .unwrap();

    assert_eq!(ids_of(&response.data), vec!["b1"]);

    let cached = Request::new(client)
        .with_pathname("/appdata/app1/books/b1")
        .with_policy(DataPolicy::ForceLocal)
        .execute()
        .await
        .unwrap();
    assert_eq!(cached.data["title"], "fetched");
}

#[tokio::test]
async fn locally_cached_ids_missing_upstream_are_kept() {
    let cache = Arc::new(MemoryRack::new());
    let network = Arc::new(MockRack::new());
    let client = test_client(cache, network.clone());

    seed_cache(
        &client,
        "/appdata/app1/books",
        json!([{"_id": "b9", "title": "local only", "_kmd": {"lmt": "2020-01-01"}}]),
    )
    .await;

    // The backend listing no longer carries b9
    network.push_response(Response::ok(json!([])));

    let response = delta_request(&client, "/appdata/app1/books")
        .execute()
        .await
        .unwrap();

    assert_eq!(ids_of(&response.data), vec!["b9"]);
    assert_eq!(network.executed().len(), 1);
}

// ============================================================================
// Batching
// ============================================================================

#[tokio::test]
async fn changed_ids_are_fetched_in_bounded_batches() {
    let cache = Arc::new(MemoryRack::new());
    let network = Arc::new(MockRack::new());
    let client = Arc::new(
        Client::new("https", "baas.example.com", cache, network.clone()).with_config(Config {
            max_ids_per_request: 2,
            ..Config::default()
        }),
    );

    // Five new ids against an empty cache: ceil(5 / 2) = 3 batches
    network.push_response(Response::ok(json!([
        {"_id": "b1", "_kmd": {"lmt": "2020-01-01"}},
        {"_id": "b2", "_kmd": {"lmt": "2020-01-01"}},
        {"_id": "b3", "_kmd": {"lmt": "2020-01-01"}},
        {"_id": "b4", "_kmd": {"lmt": "2020-01-01"}},
        {"_id": "b5", "_kmd": {"lmt": "2020-01-01"}}
    ])));
    for _ in 0..3 {
        network.push_response(Response::ok(json!([])));
    }

    delta_request(&client, "/appdata/app1/books")
        .execute()
        .await
        .unwrap();

    let executed = network.executed();
    assert_eq!(executed.len(), 4);

    let mut batch_sizes: Vec<usize> = executed[1..]
        .iter()
        .map(|descriptor| {
            descriptor.query.as_ref().unwrap().filter["_id"]["$in"]
                .as_array()
                .unwrap()
                .len()
        })
        .collect();
    batch_sizes.sort_unstable();
    assert_eq!(batch_sizes, vec![1, 2, 2]);
}

#[tokio::test]
async fn one_failed_batch_rejects_the_whole_refresh() {
    let cache = Arc::new(MemoryRack::new());
    let network = Arc::new(MockRack::new());
    let client = Arc::new(
        Client::new("https", "baas.example.com", cache, network.clone()).with_config(Config {
            max_ids_per_request: 1,
            ..Config::default()
        }),
    );

    network.push_response(Response::ok(json!([
        {"_id": "b1", "_kmd": {"lmt": "2020-01-01"}},
        {"_id": "b2", "_kmd": {"lmt": "2020-01-01"}}
    ])));
    network.push_response(Response::ok(json!([{"_id": "b1"}])));
    network.push_error(Error::Transport("wire cut".into()));

    let result = delta_request(&client, "/appdata/app1/books").execute().await;
    assert!(matches!(result, Err(Error::Transport(_))));

    // Both batches were issued before the rejection surfaced
    assert_eq!(network.executed().len(), 3);
}

// ============================================================================
// Fall-through and delegation
// ============================================================================

#[tokio::test]
async fn network_listing_failure_falls_through_to_plain_execute() {
    let cache = Arc::new(MemoryRack::new());
    let network = Arc::new(MockRack::new());
    let client = test_client(cache, network.clone());

    seed_cache(
        &client,
        "/appdata/app1/books",
        json!([{"_id": "b1", "title": "cached"}]),
    )
    .await;

    // The projection listing fails; the plain PreferNetwork machine runs
    network.push_response(Response::new(
        500,
        Default::default(),
        json!({"message": "listing broke"}),
    ));
    network.push_response(Response::ok(json!([{"_id": "b1", "title": "fresh"}])));

    let response = delta_request(&client, "/appdata/app1/books")
        .execute()
        .await
        .unwrap();

    assert_eq!(response.data[0]["title"], "fresh");
    assert_eq!(network.executed().len(), 2);
}

#[tokio::test]
async fn non_matching_policy_delegates_to_the_wrapped_request() {
    let cache = Arc::new(MemoryRack::new());
    let network = Arc::new(MockRack::new());
    let client = test_client(cache, network.clone());

    seed_cache(
        &client,
        "/appdata/app1/books",
        json!([{"_id": "b1", "title": "cached"}]),
    )
    .await;

    let request = DeltaSetRequest::new(
        Request::new(client.clone())
            .with_pathname("/appdata/app1/books")
            .with_policy(DataPolicy::ForceLocal),
    );
    let response = request.execute().await.unwrap();

    assert_eq!(response.data[0]["title"], "cached");
    assert!(network.executed().is_empty());
}

#[tokio::test]
async fn non_get_method_delegates_to_the_wrapped_request() {
    let cache = Arc::new(MemoryRack::new());
    let network = Arc::new(MockRack::new());
    network.push_response(Response::new(
        201,
        Default::default(),
        json!({"_id": "b1", "title": "T"}),
    ));
    let client = test_client(cache, network.clone());

    let request = DeltaSetRequest::new(
        Request::new(client)
            .with_method(Method::Post)
            .with_pathname("/appdata/app1/books")
            .with_policy(DataPolicy::PreferNetwork)
            .with_data(json!({"title": "T"})),
    );
    let response = request.execute().await.unwrap();

    assert_eq!(response.status_code, 201);
    assert_eq!(network.executed().len(), 1);
    assert_eq!(network.executed()[0].method, Method::Post);
}

#[tokio::test]
async fn original_query_filter_rides_along_with_batches() {
    let cache = Arc::new(MemoryRack::new());
    let network = Arc::new(MockRack::new());
    let client = test_client(cache, network.clone());

    network.push_response(Response::ok(json!([
        {"_id": "b1", "_kmd": {"lmt": "2020-01-01"}}
    ])));
    network.push_response(Response::ok(json!([
        {"_id": "b1", "author": "poe", "_kmd": {"lmt": "2020-01-01"}}
    ])));

    let request = DeltaSetRequest::new(
        Request::new(client)
            .with_pathname("/appdata/app1/books")
            .with_policy(DataPolicy::PreferNetwork)
            .with_query(ferry_core::Query::with_filter(json!({"author": "poe"}))),
    );
    request.execute().await.unwrap();

    let executed = network.executed();

    // The projection keeps the caller's filter alongside the field list
    let projection_query = executed[0].query.as_ref().unwrap();
    assert_eq!(projection_query.filter["author"], "poe");
    assert_eq!(projection_query.fields, vec!["_id", "_kmd"]);

    // Batches conjoin the filter with the id set
    let batch_query = executed[1].query.as_ref().unwrap();
    assert_eq!(batch_query.filter["author"], "poe");
    assert_eq!(batch_query.filter["_id"]["$in"], json!(["b1"]));
    assert!(batch_query.fields.is_empty());
}
