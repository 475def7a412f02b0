//! Per-request context handed to route handlers and middleware.

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::Request;

/// Path parameters captured by the matched route.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    map: HashMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    /// Value captured for the route parameter `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A request plus whatever routing learned about it.
#[derive(Debug)]
pub struct Context {
    request: Request,
    params: Parameters,
}

impl Context {
    /// A context with no route parameters.
    pub fn new(request: Request) -> Self {
        Self::with_params(request, Parameters::new())
    }

    pub fn with_params(request: Request, params: Parameters) -> Self {
        Self { request, params }
    }

    /// The incoming request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Parameters captured by the matched route.
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Replaces the parameters, keeping the request.
    pub fn set_params(&mut self, params: Parameters) {
        self.params = params;
    }

    /// Consumes the context, returning the request.
    pub fn into_request(self) -> Request {
        self.request
    }

    /// Decodes the request body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(self.request.body())
    }
}
