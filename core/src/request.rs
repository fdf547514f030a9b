//! The request object and its execution state machine.
//!
//! A [`Request`] owns everything needed to satisfy one data operation:
//! method, resource path, query, body, headers, credentials, and the data
//! policy that decides which rack serves it. [`Request::execute`] resolves
//! credentials, dispatches across the racks per policy, and lifts failed
//! responses into typed errors.

use crate::auth::Auth;
use crate::client::Client;
use crate::error::{Error, Result};
use crate::headers as header_names;
use crate::headers::HeaderMap;
use crate::policy::DataPolicy;
use crate::properties::RequestProperties;
use crate::query::Query;
use crate::response::Response;
use crate::sync;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl Method {
    /// The uppercase wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PATCH" => Ok(Method::Patch),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(Error::InvalidInput(format!(
                "invalid request method: {}",
                other
            ))),
        }
    }
}

/// Semantic response type requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Text,
    Json,
    Blob,
    Document,
}

impl ResponseType {
    /// The transport hint handed to the racks. `Text` maps to the empty
    /// hint.
    pub fn transport_hint(&self) -> &'static str {
        match self {
            ResponseType::Text => "",
            ResponseType::Json => "json",
            ResponseType::Blob => "blob",
            ResponseType::Document => "document",
        }
    }
}

/// The serialized form of a request, handed to the racks and persisted in
/// sync-queue entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDescriptor {
    pub method: Method,
    pub headers: HeaderMap,
    pub url: String,
    pub pathname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Query>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub search: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub response_type: String,
    /// Timeout in milliseconds, enforced by the rack
    pub timeout: u64,
}

/// A data operation against the local cache and the network backend.
///
/// Built with the `with_*` combinators, then driven through
/// [`execute`](Request::execute). A request is not reusable while an
/// `execute` call is in flight.
#[derive(Debug)]
pub struct Request {
    client: Arc<Client>,
    method: Method,
    protocol: String,
    host: String,
    pathname: String,
    query: Option<Query>,
    search: HashMap<String, String>,
    data: Option<Value>,
    headers: Mutex<HeaderMap>,
    response_type: ResponseType,
    auth: Auth,
    policy: DataPolicy,
    timeout_ms: u64,
    skip_sync: bool,
    properties: Option<RequestProperties>,
    executing: AtomicBool,
    last_response: Mutex<Option<Response>>,
}

impl Request {
    /// Create a request with defaults: `GET /`, the default data policy,
    /// text response type, and the client's standard headers installed.
    pub fn new(client: Arc<Client>) -> Self {
        let mut map = HeaderMap::new();
        map.set(header_names::ACCEPT, "application/json");
        map.set(
            header_names::API_VERSION,
            client.config().api_version.to_string(),
        );
        map.set(header_names::DEVICE_INFORMATION, client.device_info());

        Self {
            method: Method::Get,
            protocol: client.protocol().to_string(),
            host: client.host().to_string(),
            pathname: "/".to_string(),
            query: None,
            search: HashMap::new(),
            data: None,
            headers: Mutex::new(map),
            response_type: ResponseType::default(),
            auth: Auth::default(),
            policy: DataPolicy::default(),
            timeout_ms: client.config().default_timeout_ms,
            skip_sync: false,
            properties: None,
            executing: AtomicBool::new(false),
            last_response: Mutex::new(None),
            client,
        }
    }

    /// Set the request method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the resource pathname.
    pub fn with_pathname(mut self, pathname: impl Into<String>) -> Self {
        self.pathname = pathname.into();
        self
    }

    /// Set the query.
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    /// Add a raw query-string parameter. The racks re-compose the URL from
    /// the pathname and query; `search` rides along untouched.
    pub fn with_search_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.search.insert(key.into(), value.into());
        self
    }

    /// Set the body data.
    pub fn with_data(mut self, data: Value) -> Self {
        self.set_data(Some(data));
        self
    }

    /// Set the data policy.
    pub fn with_policy(mut self, policy: DataPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the authentication source.
    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    /// Set the timeout in milliseconds.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Suppress sync-queue recording for local mutations.
    pub fn with_skip_sync(mut self, skip_sync: bool) -> Self {
        self.skip_sync = skip_sync;
        self
    }

    /// Set the semantic response type.
    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Declare the body content type for the backend.
    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        self.set_header(header_names::CONTENT_TYPE_OVERRIDE, content_type.into());
        self
    }

    /// Ask the backend to skip server-side business logic.
    pub fn with_skip_business_logic(self) -> Self {
        self.set_header(header_names::SKIP_BUSINESS_LOGIC, "true");
        self
    }

    /// Ask the backend to echo the request id and wrap the response for
    /// tracing.
    pub fn with_trace(self) -> Self {
        self.set_header(
            header_names::INCLUDE_HEADERS_IN_RESPONSE,
            header_names::REQUEST_ID,
        );
        self.set_header(header_names::RESPONSE_WRAPPER, "true");
        self
    }

    /// Attach custom request properties, failing if their serialized form
    /// exceeds the configured cap.
    pub fn with_properties(mut self, properties: RequestProperties) -> Result<Self> {
        self.set_properties(properties)?;
        Ok(self)
    }

    /// Replace the body data, keeping the `Content-Type` header in step:
    /// gaining data defaults it to JSON unless already set, losing data
    /// removes it.
    pub fn set_data(&mut self, data: Option<Value>) {
        let mut map = self.headers.lock().unwrap();
        match &data {
            Some(_) => {
                if !map.contains(header_names::CONTENT_TYPE) {
                    map.set(header_names::CONTENT_TYPE, header_names::JSON_CONTENT_TYPE);
                }
            }
            None => {
                map.remove(header_names::CONTENT_TYPE);
            }
        }
        drop(map);
        self.data = data;
    }

    /// Replace the custom request properties and their derived headers.
    pub fn set_properties(&mut self, properties: RequestProperties) -> Result<()> {
        let json = properties.to_header_json(self.client.config().max_custom_props_bytes)?;

        let mut map = self.headers.lock().unwrap();
        match properties.app_version() {
            Some(version) => map.set(header_names::CLIENT_APP_VERSION, version),
            None => {
                map.remove(header_names::CLIENT_APP_VERSION);
            }
        }
        map.set(header_names::CUSTOM_REQUEST_PROPERTIES, json);
        drop(map);

        self.properties = Some(properties);
        Ok(())
    }

    /// Set a header.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.lock().unwrap().set(name, value);
    }

    /// Get a header value, ignoring case.
    pub fn get_header(&self, name: &str) -> Option<String> {
        self.headers.lock().unwrap().get(name).map(str::to_string)
    }

    /// Remove a header, ignoring case.
    pub fn remove_header(&self, name: &str) -> Option<String> {
        self.headers.lock().unwrap().remove(name)
    }

    /// Remove all headers.
    pub fn clear_headers(&self) {
        self.headers.lock().unwrap().clear();
    }

    /// The request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The resource pathname.
    pub fn pathname(&self) -> &str {
        &self.pathname
    }

    /// The data policy.
    pub fn policy(&self) -> DataPolicy {
        self.policy
    }

    /// The query, if any.
    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// The body data, if any.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Whether local mutations skip sync-queue recording.
    pub fn skip_sync(&self) -> bool {
        self.skip_sync
    }

    /// Whether an `execute` call is currently in flight.
    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    /// The response stored by the last successful `execute`.
    pub fn response(&self) -> Option<Response> {
        self.last_response.lock().unwrap().clone()
    }

    /// The shared client.
    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    /// The full request URL.
    pub fn url(&self) -> String {
        format!("{}://{}{}", self.protocol, self.host, self.pathname)
    }

    /// The serialized hand-off form of this request.
    pub fn descriptor(&self) -> RequestDescriptor {
        self.descriptor_with_query(self.query.clone())
    }

    pub(crate) fn descriptor_with_query(&self, query: Option<Query>) -> RequestDescriptor {
        RequestDescriptor {
            method: self.method,
            headers: self.headers.lock().unwrap().clone(),
            url: self.url(),
            pathname: self.pathname.clone(),
            query,
            search: self.search.clone(),
            data: self.data.clone(),
            response_type: self.response_type.transport_hint().to_string(),
            timeout: self.timeout_ms,
        }
    }

    /// Cancel the in-flight execution. In-flight cancellation is not
    /// implemented; this always fails.
    pub fn abort(&self) -> Result<()> {
        Err(Error::Unsupported("abort"))
    }

    /// Execute the request: resolve credentials, dispatch across the racks
    /// per data policy, and validate the outcome.
    ///
    /// Fails fast with [`Error::AlreadyExecuting`] if a previous call has
    /// not settled. The in-flight flag is cleared on every exit path.
    pub async fn execute(&self) -> Result<Response> {
        self.execute_boxed().await
    }

    // Sub-requests recurse through execute; boxing keeps the future sized.
    pub(crate) fn execute_boxed(&self) -> BoxFuture<'_, Result<Response>> {
        Box::pin(async move {
            let _guard = ExecutingGuard::acquire(&self.executing)?;
            self.resolve_credentials()?;

            let response = self.dispatch().await?;
            if response.is_success() {
                self.store_response(&response);
                Ok(response)
            } else {
                Err(response.into_error())
            }
        })
    }

    /// Resolve the auth source and install the `Authorization` header.
    pub(crate) fn resolve_credentials(&self) -> Result<()> {
        if let Some(credentials) = self.auth.resolve(&self.client)? {
            self.set_header(header_names::AUTHORIZATION, credentials.header_value());
        }
        Ok(())
    }

    pub(crate) fn store_response(&self, response: &Response) {
        *self.last_response.lock().unwrap() = Some(response.clone());
    }

    pub(crate) fn executing_flag(&self) -> &AtomicBool {
        &self.executing
    }

    /// Run this request's descriptor through the cache rack.
    pub(crate) async fn run_local(&self, request: RequestDescriptor) -> Result<Response> {
        self.client.cache_rack().execute(request).await
    }

    /// Run this request's descriptor through the network rack.
    pub(crate) async fn run_network(&self, request: RequestDescriptor) -> Result<Response> {
        self.client.network_rack().execute(request).await
    }

    async fn execute_local(&self) -> Result<Response> {
        self.run_local(self.descriptor()).await
    }

    async fn execute_network(&self) -> Result<Response> {
        self.run_network(self.descriptor()).await
    }

    /// A fresh request sharing this one's parameters and client, with the
    /// given policy. Sub-requests never share execution state.
    pub(crate) fn sub_request(&self, policy: DataPolicy) -> Request {
        Request {
            client: self.client.clone(),
            method: self.method,
            protocol: self.protocol.clone(),
            host: self.host.clone(),
            pathname: self.pathname.clone(),
            query: self.query.clone(),
            search: self.search.clone(),
            data: self.data.clone(),
            headers: Mutex::new(self.headers.lock().unwrap().clone()),
            response_type: self.response_type,
            auth: self.auth.clone(),
            policy,
            timeout_ms: self.timeout_ms,
            skip_sync: self.skip_sync,
            properties: self.properties.clone(),
            executing: AtomicBool::new(false),
            last_response: Mutex::new(None),
        }
    }

    async fn dispatch(&self) -> Result<Response> {
        tracing::debug!(
            "dispatching {} {} with policy {:?}",
            self.method,
            self.pathname,
            self.policy
        );

        match self.policy {
            DataPolicy::ForceLocal => self.dispatch_force_local().await,
            DataPolicy::PreferLocal => self.dispatch_prefer_local().await,
            DataPolicy::ForceNetwork => self.execute_network().await,
            DataPolicy::PreferNetwork => self.dispatch_prefer_network().await,
        }
    }

    async fn dispatch_force_local(&self) -> Result<Response> {
        let response = self.execute_local().await?;
        if response.is_success() && self.method != Method::Get && !self.skip_sync {
            sync::notify(self, &response.data).await?;
        }
        Ok(response)
    }

    async fn dispatch_prefer_local(&self) -> Result<Response> {
        if self.method == Method::Get {
            let response = match self.execute_local().await {
                Ok(response) => response,
                // An absent entity reads as an empty 404, not a failure
                Err(Error::NotFound(_)) => {
                    Response::new(404, HeaderMap::new(), Value::Array(Vec::new()))
                }
                Err(err) => return Err(err),
            };
            if response.is_success() {
                return Ok(response);
            }

            tracing::debug!(
                "cache could not satisfy GET {}, escalating to network",
                self.pathname
            );
            let escalated = self
                .sub_request(DataPolicy::PreferNetwork)
                .with_data(response.data);
            escalated.execute().await
        } else {
            let network = self.sub_request(DataPolicy::PreferNetwork);
            match network.execute().await {
                Ok(response) => Ok(response),
                Err(err) => {
                    tracing::warn!(
                        "network write failed for {} {}, persisting locally: {}",
                        self.method,
                        self.pathname,
                        err
                    );
                    // Keep the change offline, but surface the network error
                    let fallback = self.sub_request(DataPolicy::ForceLocal);
                    fallback.execute().await?;
                    Err(err)
                }
            }
        }
    }

    async fn dispatch_prefer_network(&self) -> Result<Response> {
        let response = self.execute_network().await?;

        if response.is_success() {
            // GET results upsert into the cache; writes mirror verbatim.
            // Mirrored state is authoritative and is never re-queued.
            let mirror_method = match self.method {
                Method::Get => Method::Put,
                other => other,
            };
            let mirror = self
                .sub_request(DataPolicy::ForceLocal)
                .with_method(mirror_method)
                .with_skip_sync(true)
                .with_data(response.data.clone());
            mirror.execute().await?;
            return Ok(response);
        }

        if self.method == Method::Get {
            tracing::debug!(
                "network read failed for GET {}, falling back to cache",
                self.pathname
            );
            let fallback = self
                .sub_request(DataPolicy::ForceLocal)
                .with_data(response.data);
            return fallback.execute().await;
        }

        Ok(response)
    }
}

/// Clears the executing flag on every exit path.
pub(crate) struct ExecutingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ExecutingGuard<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::AlreadyExecuting)?;
        Ok(Self { flag })
    }
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
