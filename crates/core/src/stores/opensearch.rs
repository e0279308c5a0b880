use crate::fields::{Field, TRAINING_LOCATIONS_PATH};
use crate::models::{AggregationBucket, Coordinate, CourseKind};
use crate::query::{FilterValue, LocationSelection, PostFilter, ProviderQuery, SortClause};
use crate::store::{InnerLocationHit, RawHit, RawSearchResponse};
use crate::traits::ProviderIndex;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

const BACKEND: &str = "opensearch";
const MATCHING_LOCATIONS: &str = "matchingLocations";
const COLLAPSED_PROVIDERS: &str = "collapsedProviders";
const COLLAPSED_TOTAL: &str = "collapsedTotal";
// index.max_inner_result_window default
const MAX_INNER_HITS: u64 = 100;
const FACET_SIZE: u64 = 20;

/// Index names per course kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseIndices {
    pub standards: String,
    pub frameworks: String,
}

impl CourseIndices {
    pub fn new(standards: impl Into<String>, frameworks: impl Into<String>) -> Self {
        Self {
            standards: standards.into(),
            frameworks: frameworks.into(),
        }
    }

    pub fn for_kind(&self, kind: CourseKind) -> &str {
        match kind {
            CourseKind::Standard => &self.standards,
            CourseKind::Framework => &self.frameworks,
        }
    }
}

impl Default for CourseIndices {
    fn default() -> Self {
        Self::new("standardproviders", "frameworkproviders")
    }
}

pub struct OpenSearchStore {
    client: Arc<Client>,
    endpoint: String,
    indices: CourseIndices,
}

impl OpenSearchStore {
    pub fn new(endpoint: impl Into<String>, indices: CourseIndices) -> Self {
        Self {
            client: Arc::new(Client::new()),
            endpoint: endpoint.into(),
            indices,
        }
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>, indices: CourseIndices) -> Self {
        Self {
            client: Arc::new(client),
            endpoint: endpoint.into(),
            indices,
        }
    }

    fn search_url(&self, kind: CourseKind) -> Result<Url, SearchError> {
        let url = format!(
            "{}/{}/_search",
            self.endpoint.trim_end_matches('/'),
            self.indices.for_kind(kind)
        );
        Ok(Url::parse(&url)?)
    }
}

#[async_trait]
impl ProviderIndex for OpenSearchStore {
    async fn search(&self, query: &ProviderQuery) -> Result<RawSearchResponse, SearchError> {
        let url = self.search_url(query.course_kind)?;
        let body = render_query(query);
        debug!(url = %url, body = %body, "provider search request");

        let response = self.client.post(url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            warn!(status = %status, details = %details, "opensearch rejected provider search");
            return Err(SearchError::backend(BACKEND, status.to_string()));
        }

        let response_json: Value = response.json().await?;
        parse_response(&response_json, query)
    }
}

/// Renders the query AST as an OpenSearch/Elasticsearch request body.
pub fn render_query(query: &ProviderQuery) -> Value {
    let point = query.locations.point;
    let (inner_from, inner_size) = match query.locations.selection {
        LocationSelection::Nearest => (0, 1),
        LocationSelection::All => (0, MAX_INNER_HITS),
        LocationSelection::Page { skip, take } => (skip, take),
    };

    let mut filters: Vec<Value> = query
        .filters
        .iter()
        .map(|filter| term(filter.field, filter_value(&filter.value)))
        .collect();
    filters.push(json!({
        "nested": {
            "path": TRAINING_LOCATIONS_PATH,
            "query": geo_shape_intersects(point),
            "inner_hits": {
                "name": MATCHING_LOCATIONS,
                "from": inner_from,
                "size": inner_size,
                "sort": [geo_distance_sort(point, false)]
            }
        }
    }));

    let sort: Vec<Value> = query
        .sort
        .iter()
        .map(|clause| match clause {
            SortClause::GeoDistance { point } => geo_distance_sort(*point, true),
            SortClause::Field { field, order } => {
                let path = field.path();
                json!({ path: { "order": order.as_str() } })
            }
        })
        .collect();

    let post_filters: Vec<Value> = query.post_filters.iter().map(post_filter_clause).collect();

    let mut aggregations = Map::new();
    for facet in &query.aggregations {
        aggregations.insert(
            facet.name().to_string(),
            json!({ "terms": { "field": facet.field().path(), "size": FACET_SIZE } }),
        );
    }

    let mut body = json!({
        "from": query.skip,
        "size": query.take,
        "track_total_hits": true,
        "query": { "bool": { "filter": filters } },
    });

    if !sort.is_empty() {
        body["sort"] = Value::Array(sort);
    }

    if let Some(field) = query.collapse {
        body["collapse"] = json!({
            "field": field.path(),
            "inner_hits": { "name": COLLAPSED_PROVIDERS, "size": 0 }
        });
        // hits.total counts documents, not groups; count groups after the post filter
        let restrict = if post_filters.is_empty() {
            json!({ "match_all": {} })
        } else {
            json!({ "bool": { "filter": post_filters.clone() } })
        };
        aggregations.insert(
            COLLAPSED_TOTAL.to_string(),
            json!({
                "filter": restrict,
                "aggs": { "groups": { "cardinality": { "field": field.path() } } }
            }),
        );
    }

    if !aggregations.is_empty() {
        body["aggs"] = Value::Object(aggregations);
    }

    if !post_filters.is_empty() {
        body["post_filter"] = json!({ "bool": { "filter": post_filters } });
    }

    body
}

/// Reads a `_search` response body back into the store-neutral shape.
pub fn parse_response(body: &Value, query: &ProviderQuery) -> Result<RawSearchResponse, SearchError> {
    let raw_hits = body
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::backend(BACKEND, "response has no hits array"))?;

    let hits = raw_hits
        .iter()
        .map(parse_hit)
        .collect::<Result<Vec<_>, SearchError>>()?;

    let collapsed_total = query.collapse.and_then(|_| {
        body.pointer(&format!("/aggregations/{COLLAPSED_TOTAL}/groups/value"))
            .and_then(Value::as_u64)
    });
    let total_hits = match collapsed_total {
        Some(total) => total,
        None => body.pointer("/hits/total").map(total_of).unwrap_or_default(),
    };

    let mut aggregations = BTreeMap::new();
    for facet in &query.aggregations {
        let bucket = body
            .pointer(&format!("/aggregations/{}/buckets", facet.name()))
            .and_then(Value::as_array)
            .map(|buckets| parse_buckets(buckets))
            .unwrap_or_default();
        aggregations.insert(facet.name().to_string(), bucket);
    }

    Ok(RawSearchResponse {
        total_hits,
        hits,
        aggregations,
    })
}

fn parse_hit(raw: &Value) -> Result<RawHit, SearchError> {
    let source = raw
        .get("_source")
        .cloned()
        .ok_or_else(|| SearchError::backend(BACKEND, "hit without _source"))?;
    let sort = sort_values(raw);

    let locations = raw.pointer(&format!("/inner_hits/{MATCHING_LOCATIONS}/hits"));
    let inner_hits = locations
        .and_then(|hits| hits.get("hits"))
        .and_then(Value::as_array)
        .map(|inner| {
            inner
                .iter()
                .filter_map(|hit| {
                    hit.get("_source").map(|source| InnerLocationHit {
                        source: source.clone(),
                        sort: sort_values(hit),
                    })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let inner_hit_total = locations
        .and_then(|hits| hits.get("total"))
        .map(total_of)
        .unwrap_or(inner_hits.len() as u64);

    let collapsed_total = raw
        .pointer(&format!("/inner_hits/{COLLAPSED_PROVIDERS}/hits/total"))
        .map(total_of)
        .unwrap_or(1)
        .max(1);

    Ok(RawHit {
        source,
        sort,
        inner_hits,
        inner_hit_total,
        collapsed_total,
    })
}

fn sort_values(hit: &Value) -> Vec<Value> {
    hit.get("sort")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

// `hits.total` is `{"value": n}` on current engines and a bare number on old ones.
fn total_of(total: &Value) -> u64 {
    total
        .get("value")
        .and_then(Value::as_u64)
        .or_else(|| total.as_u64())
        .unwrap_or_default()
}

fn parse_buckets(buckets: &[Value]) -> AggregationBucket {
    buckets
        .iter()
        .filter_map(|bucket| {
            let key = bucket
                .get("key_as_string")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| match bucket.get("key")? {
                    Value::String(key) => Some(key.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })?;
            let count = bucket.get("doc_count").and_then(Value::as_u64)?;
            Some((key, count))
        })
        .collect()
}

fn term(field: Field, value: Value) -> Value {
    let path = field.path();
    json!({ "term": { path: value } })
}

fn filter_value(value: &FilterValue) -> Value {
    match value {
        FilterValue::Int(value) => json!(value),
        FilterValue::Text(value) => json!(value),
        FilterValue::Bool(value) => json!(value),
    }
}

fn post_filter_clause(filter: &PostFilter) -> Value {
    match filter {
        PostFilter::AnyDeliveryMode(modes) => {
            let path = Field::DeliveryModes.path();
            let values: Vec<&str> = modes.iter().map(|mode| mode.index_value()).collect();
            json!({ "terms": { path: values } })
        }
        PostFilter::NationalOnly => term(Field::NationalProvider, json!(true)),
    }
}

fn geo_shape_intersects(point: Coordinate) -> Value {
    let path = Field::LocationGeoShape.path();
    json!({
        "geo_shape": {
            path: {
                "shape": { "type": "point", "coordinates": [point.lon, point.lat] },
                "relation": "intersects"
            }
        }
    })
}

// Nested sorts only consider locations that passed the shape filter.
fn geo_distance_sort(point: Coordinate, nested: bool) -> Value {
    let path = Field::LocationGeoPoint.path();
    let mut sort = json!({
        path: { "lat": point.lat, "lon": point.lon },
        "order": "asc",
        "unit": "mi",
        "distance_type": "arc"
    });
    if nested {
        sort["nested"] = json!({
            "path": TRAINING_LOCATIONS_PATH,
            "filter": geo_shape_intersects(point)
        });
    }
    json!({ "_geo_distance": sort })
}
