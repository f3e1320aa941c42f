//! Search request composition.
//!
//! Assembles a search body from independently optional fragments: a primary
//! query, filter clauses, a sort specification, pagination bounds and
//! aggregations. Composition is pure: identical inputs always give identical
//! output, and filters never discard a query that was supplied with them.
//!
//! ```
//! use elk_connector::query::{SearchOptions, compose_search};
//! use serde_json::json;
//!
//! let options = SearchOptions::new()
//!     .with_query(json!({ "match": { "active": true } }))
//!     .with_filter(json!({ "range": { "age": { "gt": 30 } } }))
//!     .with_limit(10);
//!
//! let request = compose_search(&options);
//! assert_eq!(request.to_value()["query"]["bool"]["must"][0]["match"]["active"], true);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Default page size.
pub const DEFAULT_LIMIT: u64 = 10;

/// A composed search body, ready to be sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Offset of the first hit.
    pub from: u64,
    /// Maximum number of hits.
    pub size: u64,
    /// Query expression; absent means match everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
    /// Ordered sort clauses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<Value>>,
    /// Aggregations by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggs: Option<Map<String, Value>>,
}

impl SearchRequest {
    /// Returns the request as a JSON value.
    pub fn to_value(&self) -> Value {
        let mut body = json!({
            "from": self.from,
            "size": self.size,
        });
        if let Some(ref query) = self.query {
            body["query"] = query.clone();
        }
        if let Some(ref sort) = self.sort {
            body["sort"] = Value::Array(sort.clone());
        }
        if let Some(ref aggs) = self.aggs {
            body["aggs"] = Value::Object(aggs.clone());
        }
        body
    }
}

/// Inputs to [`compose_search`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Primary query.
    pub query: Option<Value>,
    /// Filter clauses, ANDed in order.
    pub filters: Vec<Value>,
    /// Sort clauses.
    pub sort: Option<Vec<Value>>,
    /// Page size (default 10).
    pub limit: u64,
    /// Page offset (default 0).
    pub offset: u64,
    /// Aggregations by name.
    pub aggregations: Option<Map<String, Value>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            query: None,
            filters: Vec::new(),
            sort: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
            aggregations: None,
        }
    }
}

impl SearchOptions {
    /// Creates options that match everything, first page of ten.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the primary query.
    pub fn with_query(mut self, query: Value) -> Self {
        self.query = Some(query);
        self
    }

    /// Appends one filter clause.
    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filters.push(filter);
        self
    }

    /// Appends filter clauses in order.
    pub fn with_filters(mut self, filters: impl IntoIterator<Item = Value>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Sets the sort clauses.
    pub fn with_sort(mut self, sort: Vec<Value>) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Sets the page size.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the page offset.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the aggregations.
    pub fn with_aggregations(mut self, aggregations: Map<String, Value>) -> Self {
        self.aggregations = Some(aggregations);
        self
    }
}

/// Composes a search request from its fragments.
///
/// When filters are present the query becomes a `bool` container:
/// - an existing `bool` query keeps its clauses and gains the filters,
/// - any other query is nested under `bool.must`,
/// - without a query the container holds only the filters.
pub fn compose_search(options: &SearchOptions) -> SearchRequest {
    let mut request = SearchRequest {
        from: options.offset,
        size: options.limit,
        query: options.query.clone(),
        sort: None,
        aggs: None,
    };

    if !options.filters.is_empty() {
        request.query = Some(merge_filters(request.query.take(), &options.filters));
    }

    if let Some(ref sort) = options.sort {
        request.sort = Some(sort.clone());
    }

    if let Some(ref aggregations) = options.aggregations {
        request.aggs = Some(aggregations.clone());
    }

    request
}

/// Folds filter clauses into a boolean container around `query`.
fn merge_filters(query: Option<Value>, filters: &[Value]) -> Value {
    match query {
        Some(Value::Object(mut outer)) if is_bool_container(&outer) => {
            if let Some(Value::Object(bool_query)) = outer.get_mut("bool") {
                let existing = bool_query.remove("filter");
                let mut merged = match existing {
                    Some(Value::Array(clauses)) => clauses,
                    Some(single) => vec![single],
                    None => Vec::with_capacity(filters.len()),
                };
                merged.extend(filters.iter().cloned());
                bool_query.insert("filter".to_string(), Value::Array(merged));
            }
            Value::Object(outer)
        }
        Some(other) => json!({
            "bool": {
                "must": [other],
                "filter": filters,
            }
        }),
        None => json!({
            "bool": {
                "filter": filters,
            }
        }),
    }
}

/// A query is a boolean container if `bool` is its only key and holds an object.
fn is_bool_container(query: &Map<String, Value>) -> bool {
    query.len() == 1 && query.get("bool").is_some_and(Value::is_object)
}
