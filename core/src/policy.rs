//! Data policies: which store serves a request and how the other is kept
//! consistent.

use serde::{Deserialize, Serialize};

/// Strategy selecting the authoritative store for a request.
///
/// The older policy spellings are accepted on deserialization: `localOnly`
/// for [`ForceLocal`](DataPolicy::ForceLocal), `localFirst` for
/// [`PreferLocal`](DataPolicy::PreferLocal), and `networkOnly` for
/// [`ForceNetwork`](DataPolicy::ForceNetwork).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataPolicy {
    /// Only the local cache is consulted; mutations are queued for sync
    #[serde(alias = "localOnly")]
    ForceLocal,
    /// Local first, escalating to the network when the cache cannot satisfy
    /// the request (default)
    #[default]
    #[serde(alias = "localFirst")]
    PreferLocal,
    /// Only the network is consulted; the cache is untouched
    #[serde(alias = "networkOnly")]
    ForceNetwork,
    /// Network first, mirroring results into the cache and falling back to
    /// it for reads when the network fails
    PreferNetwork,
}
