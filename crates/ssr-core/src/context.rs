//! Request context with typed parameters.

use std::collections::HashMap;

use crate::lifecycle::TimingContext;

/// Unique request identifier for tracing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new request ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Create from an existing ID string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Query string parameters.
pub type QueryParams = HashMap<String, String>;

/// Typed request context passed to render handlers.
#[derive(Debug)]
pub struct RequestContext {
    /// Unique request identifier.
    pub request_id: RequestId,
    /// Request path.
    pub path: String,
    /// Query string parameters.
    pub query: QueryParams,
    /// Timing context for observability.
    pub timing: TimingContext,
}

impl RequestContext {
    /// Create a new request context.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::generate(),
            path: path.into(),
            query: HashMap::new(),
            timing: TimingContext::new(),
        }
    }

    /// Attach query parameters.
    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// Get a query parameter by name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::generate(), RequestId::generate());
    }

    #[test]
    fn test_query_param_lookup() {
        let mut query = QueryParams::new();
        query.insert("mode".to_string(), "buffered".to_string());
        let ctx = RequestContext::new("/render").with_query(query);
        assert_eq!(ctx.query_param("mode"), Some("buffered"));
        assert_eq!(ctx.query_param("fail"), None);
    }
}
