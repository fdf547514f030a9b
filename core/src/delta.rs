//! Delta-set collection refresh.
//!
//! A delta-set request minimizes network payload when refreshing a cached
//! collection: both stores are asked for an `{_id, _kmd}` projection, the
//! two listings are diffed by last-modified time, and only the entities the
//! backend has newer versions of are fetched in full. Everything already
//! current is served from the cache.

use crate::entity;
use crate::error::{Error, Result};
use crate::headers::HeaderMap;
use crate::policy::DataPolicy;
use crate::request::{ExecutingGuard, Method, Request};
use crate::response::Response;
use futures_util::future::{join_all, BoxFuture};
use serde_json::Value;
use std::collections::HashSet;

/// A request that refreshes a collection by delta set.
///
/// The specialization applies only to `GET` with
/// [`DataPolicy::PreferNetwork`]; every other combination executes exactly
/// like the wrapped request.
#[derive(Debug)]
pub struct DeltaSetRequest {
    inner: Request,
}

impl DeltaSetRequest {
    /// Wrap a request.
    pub fn new(request: Request) -> Self {
        Self { inner: request }
    }

    /// The wrapped request.
    pub fn inner(&self) -> &Request {
        &self.inner
    }

    /// Unwrap.
    pub fn into_inner(self) -> Request {
        self.inner
    }

    /// Execute with delta-set semantics where they apply, delegating to the
    /// plain state machine otherwise.
    pub async fn execute(&self) -> Result<Response> {
        let inner = &self.inner;
        if inner.policy() != DataPolicy::PreferNetwork || inner.method() != Method::Get {
            return inner.execute().await;
        }

        let guard = ExecutingGuard::acquire(inner.executing_flag())?;
        inner.resolve_credentials()?;

        // Both stores are asked only for ids and metadata; the caller's
        // filter still applies.
        let original_query = inner.query().cloned();
        let projected = original_query
            .clone()
            .unwrap_or_default()
            .with_fields([entity::ID_FIELD, entity::KMD_FIELD]);

        let local = match inner
            .run_local(inner.descriptor_with_query(Some(projected.clone())))
            .await
        {
            Ok(response) if response.is_success() => response.entities(),
            // A cold cache diffs as the empty set
            Ok(_) | Err(Error::NotFound(_)) => Vec::new(),
            Err(err) => return Err(err),
        };

        let network = match inner
            .run_network(inner.descriptor_with_query(Some(projected)))
            .await
        {
            Ok(response) if response.is_success() => response.entities(),
            // Without a network listing there is nothing to diff against;
            // run the plain PreferNetwork machine instead.
            _ => {
                drop(guard);
                return inner.execute().await;
            }
        };

        let (changed, unchanged) = diff(&local, &network);

        let max_ids = inner.client().config().max_ids_per_request;
        let base_query = original_query.unwrap_or_default();
        let mut tasks: Vec<BoxFuture<'static, Result<Response>>> = Vec::new();

        for batch in changed.chunks(max_ids) {
            let query = base_query
                .clone()
                .contained_in(entity::ID_FIELD, batch.to_vec());
            let sub = inner
                .sub_request(DataPolicy::PreferNetwork)
                .with_query(query);
            tasks.push(Box::pin(async move { sub.execute().await }));
        }
        for batch in unchanged.chunks(max_ids) {
            let query = base_query
                .clone()
                .contained_in(entity::ID_FIELD, batch.to_vec());
            let sub = inner.sub_request(DataPolicy::ForceLocal).with_query(query);
            tasks.push(Box::pin(async move { sub.execute().await }));
        }

        tracing::debug!(
            "delta set for GET {}: {} changed, {} unchanged, {} batch request(s)",
            inner.pathname(),
            changed.len(),
            unchanged.len(),
            tasks.len()
        );

        // Every batch settles before the fold; the first failure wins.
        let settled = join_all(tasks).await;

        let mut combined = Vec::new();
        let mut merged_headers = HeaderMap::new();
        let mut first_error = None;
        for result in settled {
            match result {
                Ok(response) => {
                    merged_headers.extend(&response.headers);
                    combined.extend(response.entities());
                }
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        let response = Response::new(200, merged_headers, Value::Array(combined));
        inner.store_response(&response);
        Ok(response)
    }
}

/// Split the network listing into changed ids (absent locally, or newer on
/// the backend) and the locally cached ids that are still current.
fn diff(local: &[Value], network: &[Value]) -> (Vec<String>, Vec<String>) {
    let local_ids: Vec<(&str, Option<&str>)> = local
        .iter()
        .filter_map(|item| entity::entity_id(item).map(|id| (id, entity::lmt(item))))
        .collect();

    let mut changed = Vec::new();
    for item in network {
        let Some(id) = entity::entity_id(item) else {
            continue;
        };
        let fresh = match local_ids.iter().find(|(local_id, _)| *local_id == id) {
            None => true,
            Some((_, local_lmt)) => is_newer(entity::lmt(item), *local_lmt),
        };
        if fresh {
            changed.push(id.to_string());
        }
    }

    let changed_set: HashSet<&str> = changed.iter().map(String::as_str).collect();
    let unchanged = local_ids
        .iter()
        .filter(|(id, _)| !changed_set.contains(id))
        .map(|(id, _)| id.to_string())
        .collect();

    (changed, unchanged)
}

// Equal stamps are current; a stamp on only one side counts as changed.
fn is_newer(network_lmt: Option<&str>, local_lmt: Option<&str>) -> bool {
    match (network_lmt, local_lmt) {
        (None, None) => false,
        (Some(network), Some(local)) => network > local,
        _ => true,
    }
}
