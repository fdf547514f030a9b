//! Rack contract: the pluggable pipelines that execute request descriptors.
//!
//! Every request pipes through exactly two racks: one backed by local
//! storage, one by the network. A rack never fails for a non-2xx status; it
//! returns the response and lets the caller decide. It may reject with
//! transport errors, and must report local absence as
//! [`Error::NotFound`](crate::Error::NotFound).

use crate::error::{Error, Result};
use crate::request::RequestDescriptor;
use crate::response::Response;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Executes serialized request descriptors against a backing store.
#[async_trait]
pub trait Rack: Send + Sync {
    /// Execute one request descriptor.
    async fn execute(&self, request: RequestDescriptor) -> Result<Response>;
}

/// A scripted rack for tests.
///
/// Responses are served in the order they were queued; executed descriptors
/// are recorded for inspection. Running past the script is a transport
/// error.
#[derive(Debug, Default)]
pub struct MockRack {
    script: Mutex<VecDeque<Result<Response>>>,
    executed: Mutex<Vec<RequestDescriptor>>,
}

impl MockRack {
    /// Create a mock rack with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn push_response(&self, response: Response) {
        self.script.lock().unwrap().push_back(Ok(response));
    }

    /// Queue a rejection.
    pub fn push_error(&self, error: Error) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// Descriptors executed so far, oldest first.
    pub fn executed(&self) -> Vec<RequestDescriptor> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Rack for MockRack {
    async fn execute(&self, request: RequestDescriptor) -> Result<Response> {
        self.executed.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Transport("mock rack script exhausted".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Method;
    use serde_json::json;

    fn descriptor(pathname: &str) -> RequestDescriptor {
        RequestDescriptor {
            method: Method::Get,
            headers: Default::default(),
            url: format!("https://example.com{}", pathname),
            pathname: pathname.to_string(),
            query: None,
            search: Default::default(),
            data: None,
            response_type: String::new(),
            timeout: 10_000,
        }
    }

    #[tokio::test]
    async fn serves_script_in_order() {
        let rack = MockRack::new();
        rack.push_response(Response::ok(json!({"_id": "a"})));
        rack.push_error(Error::NotFound("gone".into()));

        let first = rack.execute(descriptor("/appdata/app/books")).await.unwrap();
        assert_eq!(first.data, json!({"_id": "a"}));

        let second = rack.execute(descriptor("/appdata/app/books")).await;
        assert!(matches!(second, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn exhausted_script_is_a_transport_error() {
        let rack = MockRack::new();
        let result = rack.execute(descriptor("/appdata/app/books")).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn records_executed_descriptors() {
        let rack = MockRack::new();
        rack.push_response(Response::ok(json!([])));
        rack.execute(descriptor("/appdata/app/books")).await.unwrap();

        let executed = rack.executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].pathname, "/appdata/app/books");
    }
}
