use crate::models::AggregationBucket;
use serde_json::Value;
use std::collections::BTreeMap;

/// A selected location attached to a hit, with its sort values (distance first).
#[derive(Debug, Clone, PartialEq)]
pub struct InnerLocationHit {
    pub source: Value,
    pub sort: Vec<Value>,
}

impl InnerLocationHit {
    pub fn distance(&self) -> Option<f64> {
        self.sort.first().and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub source: Value,
    pub sort: Vec<Value>,
    pub inner_hits: Vec<InnerLocationHit>,
    /// Number of matching locations, which may exceed `inner_hits.len()`.
    pub inner_hit_total: u64,
    /// Documents folded into this hit by a collapse; 1 when nothing was collapsed.
    pub collapsed_total: u64,
}

impl RawHit {
    pub fn sort_f64(&self, position: usize) -> Option<f64> {
        self.sort.get(position).and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSearchResponse {
    pub total_hits: u64,
    pub hits: Vec<RawHit>,
    pub aggregations: BTreeMap<String, AggregationBucket>,
}
