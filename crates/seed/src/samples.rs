//! Canned queries, filters, aggregations, sorts and the sample index layout.
//!
//! Entries are looked up by name so the driver can pick them from the
//! command line.

use serde_json::{Map, Value, json};

pub const INDEX_NAME: &str = "test_index_1";
pub const ALIAS_NAME: &str = "test_alias";

pub const QUERY_NAMES: &[&str] = &[
    "match_all_query",
    "basic_search_query",
    "name_search_query",
    "active_bool_query",
    "age_and_email_query",
];
pub const FILTER_NAMES: &[&str] = &["filter1", "filter2"];
pub const AGGREGATION_NAMES: &[&str] = &["aggregation1"];
pub const SORT_NAMES: &[&str] = &["sort_desc"];

/// Returns the named query.
pub fn query(name: &str) -> Option<Value> {
    let query = match name {
        "match_all_query" => json!({ "match_all": {} }),
        "basic_search_query" => json!({ "match": { "name": "AibA4jqBJnQT" } }),
        "name_search_query" => json!({ "match": { "name": "YTa2ryD6eVSe" } }),
        "active_bool_query" => json!({
            "bool": {
                "must": [{ "match": { "active": true } }]
            }
        }),
        "age_and_email_query" => json!({
            "bool": {
                "must": [
                    { "match": { "age": 51 } },
                    { "match": { "email": "YSLhFeXd@yANp3h.com" } }
                ]
            }
        }),
        _ => return None,
    };
    Some(query)
}

/// Returns the named filter clauses.
pub fn filters(name: &str) -> Option<Vec<Value>> {
    match name {
        // Older than thirty and inactive
        "filter1" => Some(vec![
            json!({ "range": { "age": { "gt": 30 } } }),
            json!({ "term": { "active": false } }),
        ]),
        "filter2" => Some(vec![json!({
            "bool": {
                "filter": [
                    { "range": { "age": { "gte": 30 } } },
                    { "term": { "metadata.attributes.attributes.value": "trg5iSat2x" } }
                ]
            }
        })]),
        _ => None,
    }
}

/// Returns the named aggregations.
pub fn aggregations(name: &str) -> Option<Map<String, Value>> {
    match name {
        "aggregation1" => {
            let mut aggs = Map::new();
            aggs.insert("age_groups".to_string(), json!({ "terms": { "field": "age" } }));
            aggs.insert(
                "active_status".to_string(),
                json!({ "terms": { "field": "active" } }),
            );
            Some(aggs)
        }
        _ => None,
    }
}

/// Returns the named sort clauses.
pub fn sort(name: &str) -> Option<Vec<Value>> {
    match name {
        "sort_desc" => Some(vec![json!({ "score": "desc" })]),
        _ => None,
    }
}

/// Settings and mappings for the sample index.
pub fn index_body() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1,
            "analysis": {
                "analyzer": {
                    "default": {
                        "type": "custom",
                        "tokenizer": "whitespace",
                        "filter": ["lowercase", "asciifolding"]
                    }
                }
            }
        },
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "name": { "type": "text" },
                "age": { "type": "integer" },
                "email": { "type": "keyword" },
                "score": { "type": "float" },
                "active": { "type": "boolean" },
                "created_at": { "type": "date", "format": "yyyy-MM-dd" },
                "metadata": {
                    "properties": {
                        "name": { "type": "text" },
                        "attributes": {
                            "properties": {
                                "name": { "type": "text" },
                                "attributes": {
                                    "properties": {
                                        "value": { "type": "text" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}
