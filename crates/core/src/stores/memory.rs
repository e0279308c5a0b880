use crate::fields::{Facet, Field, SortOrder};
use crate::geo::{arc_distance_miles, shape_contains};
use crate::models::{AggregationBucket, CourseId, CourseKind, FrameworkProvider, ProviderLocation};
use crate::models::StandardProvider;
use crate::query::{FilterValue, LocationSelection, PostFilter, ProviderQuery, SortClause, TermFilter};
use crate::store::{InnerLocationHit, RawHit, RawSearchResponse};
use crate::traits::{ProviderIndex, ProviderOffering};
use crate::SearchError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

const BACKEND: &str = "memory";

/// Evaluates provider queries over records held in memory: nearest-location selection,
/// facets, post-filters and collapse are all computed client-side.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndex {
    standards: Vec<StandardProvider>,
    frameworks: Vec<FrameworkProvider>,
}

#[derive(Debug, Default, Deserialize)]
struct Fixture {
    #[serde(default)]
    standards: Vec<StandardProvider>,
    #[serde(default)]
    frameworks: Vec<FrameworkProvider>,
}

impl InMemoryIndex {
    pub fn new(standards: Vec<StandardProvider>, frameworks: Vec<FrameworkProvider>) -> Self {
        Self {
            standards,
            frameworks,
        }
    }

    /// Parses `{"standards": [...], "frameworks": [...]}`; either list may be absent.
    pub fn from_json_str(raw: &str) -> Result<Self, SearchError> {
        let fixture: Fixture = serde_json::from_str(raw)?;
        Ok(Self::new(fixture.standards, fixture.frameworks))
    }

    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SearchError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&raw)
    }

    pub fn len(&self) -> usize {
        self.standards.len() + self.frameworks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProviderIndex for InMemoryIndex {
    async fn search(&self, query: &ProviderQuery) -> Result<RawSearchResponse, SearchError> {
        match query.course_kind {
            CourseKind::Standard => evaluate(&self.standards, query),
            CourseKind::Framework => evaluate(&self.frameworks, query),
        }
    }
}

struct Candidate<'a, O> {
    offering: &'a O,
    // ascending by distance
    matches: Vec<(&'a ProviderLocation, f64)>,
    collapsed_total: u64,
}

impl<O> Candidate<'_, O> {
    fn nearest(&self) -> f64 {
        self.matches.first().map_or(f64::INFINITY, |(_, distance)| *distance)
    }
}

fn evaluate<O: ProviderOffering>(
    records: &[O],
    query: &ProviderQuery,
) -> Result<RawSearchResponse, SearchError> {
    let point = query.locations.point;

    let mut candidates: Vec<Candidate<'_, O>> = records
        .iter()
        .filter(|record| query.filters.iter().all(|filter| matches_term(*record, filter)))
        .filter_map(|record| {
            let mut matches: Vec<_> = record
                .training_locations()
                .iter()
                .filter(|location| shape_contains(&location.geo_shape, point))
                .map(|location| (location, arc_distance_miles(point, location.geo_point)))
                .collect();
            if matches.is_empty() {
                return None;
            }
            matches.sort_by(|left, right| left.1.total_cmp(&right.1));
            Some(Candidate {
                offering: record,
                matches,
                collapsed_total: 1,
            })
        })
        .collect();

    let aggregations = query
        .aggregations
        .iter()
        .map(|facet| (facet.name().to_string(), facet_bucket(&candidates, *facet)))
        .collect::<BTreeMap<_, _>>();

    candidates.retain(|candidate| {
        query
            .post_filters
            .iter()
            .all(|filter| passes_post_filter(candidate.offering, filter))
    });

    candidates.sort_by(|left, right| compare(left, right, &query.sort));

    if let Some(field) = query.collapse {
        candidates = collapse(candidates, field)?;
    }

    let total_hits = candidates.len() as u64;
    let hits = candidates
        .into_iter()
        .skip(to_usize(query.skip))
        .take(to_usize(query.take))
        .map(|candidate| raw_hit(candidate, query))
        .collect::<Result<Vec<_>, SearchError>>()?;

    Ok(RawSearchResponse {
        total_hits,
        hits,
        aggregations,
    })
}

fn matches_term<O: ProviderOffering>(record: &O, filter: &TermFilter) -> bool {
    match (filter.field, &filter.value) {
        (Field::StandardCode, FilterValue::Int(code)) => {
            matches!(record.course_id(), CourseId::Standard(own) if i64::from(own) == *code)
        }
        (Field::FrameworkId, FilterValue::Text(code)) => {
            matches!(record.course_id(), CourseId::Framework(own) if own == *code)
        }
        (Field::Ukprn, FilterValue::Int(ukprn)) => record.ukprn() == *ukprn,
        (Field::HasNonLevyContract, FilterValue::Bool(flag)) => {
            record.has_non_levy_contract() == *flag
        }
        _ => false,
    }
}

fn passes_post_filter<O: ProviderOffering>(record: &O, filter: &PostFilter) -> bool {
    match filter {
        PostFilter::AnyDeliveryMode(modes) => record
            .delivery_modes()
            .iter()
            .any(|mode| modes.contains(mode)),
        PostFilter::NationalOnly => record.national_provider(),
    }
}

fn facet_bucket<O: ProviderOffering>(candidates: &[Candidate<'_, O>], facet: Facet) -> AggregationBucket {
    let mut bucket = AggregationBucket::new();
    for candidate in candidates {
        for key in facet_keys(candidate.offering, facet) {
            *bucket.entry(key).or_insert(0) += 1;
        }
    }
    bucket
}

fn facet_keys<O: ProviderOffering>(record: &O, facet: Facet) -> Vec<String> {
    match facet {
        Facet::TrainingOptions => record
            .delivery_modes()
            .iter()
            .map(|mode| mode.index_value())
            .collect::<HashSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect(),
        Facet::NationalProviders => vec![record.national_provider().to_string()],
    }
}

fn compare<O: ProviderOffering>(
    left: &Candidate<'_, O>,
    right: &Candidate<'_, O>,
    clauses: &[SortClause],
) -> Ordering {
    for clause in clauses {
        let ordering = match clause {
            SortClause::GeoDistance { .. } => left.nearest().total_cmp(&right.nearest()),
            SortClause::Field { field, order } => {
                let ordering = match field {
                    Field::ProviderNameSortable => sortable_name(left.offering)
                        .cmp(&sortable_name(right.offering)),
                    _ => Ordering::Equal,
                };
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn sortable_name<O: ProviderOffering>(record: &O) -> String {
    record.provider_name().to_lowercase()
}

// Keeps the first (best sorted) candidate per key, like a server-side collapse.
fn collapse<'a, O: ProviderOffering>(
    candidates: Vec<Candidate<'a, O>>,
    field: Field,
) -> Result<Vec<Candidate<'a, O>>, SearchError> {
    if field != Field::Ukprn {
        return Err(SearchError::backend(
            BACKEND,
            format!("collapse on {} is not supported", field.path()),
        ));
    }

    let mut positions = BTreeMap::new();
    let mut collapsed: Vec<Candidate<'a, O>> = Vec::new();
    for candidate in candidates {
        let ukprn = candidate.offering.ukprn();
        match positions.get(&ukprn) {
            Some(&position) => {
                let kept: &mut Candidate<'a, O> = &mut collapsed[position];
                kept.collapsed_total += 1;
            }
            None => {
                positions.insert(ukprn, collapsed.len());
                collapsed.push(candidate);
            }
        }
    }
    Ok(collapsed)
}

fn raw_hit<O: ProviderOffering>(
    candidate: Candidate<'_, O>,
    query: &ProviderQuery,
) -> Result<RawHit, SearchError> {
    let sort = query
        .sort
        .iter()
        .map(|clause| match clause {
            SortClause::GeoDistance { .. } => json!(candidate.nearest()),
            SortClause::Field { field, .. } => match field {
                Field::ProviderNameSortable => json!(sortable_name(candidate.offering)),
                _ => Value::Null,
            },
        })
        .collect();

    let inner_hit_total = candidate.matches.len() as u64;
    let selected: Vec<_> = match query.locations.selection {
        LocationSelection::Nearest => candidate.matches.iter().take(1).collect(),
        LocationSelection::All => candidate.matches.iter().collect(),
        LocationSelection::Page { skip, take } => candidate
            .matches
            .iter()
            .skip(to_usize(skip))
            .take(to_usize(take))
            .collect(),
    };
    let inner_hits = selected
        .into_iter()
        .map(|(location, distance)| -> Result<InnerLocationHit, SearchError> {
            Ok(InnerLocationHit {
                source: serde_json::to_value(location)?,
                sort: vec![json!(distance)],
            })
        })
        .collect::<Result<Vec<_>, SearchError>>()?;

    Ok(RawHit {
        source: serde_json::to_value(candidate.offering)?,
        sort,
        inner_hits,
        inner_hit_total,
        collapsed_total: candidate.collapsed_total,
    })
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Address, ClosestLocationsRequest, Coordinate, DeliveryMode, GeoShape, OrderBy,
        ProviderProfile, ProviderSearchRequest, SearchMode,
    };
    use crate::paging::Paging;
    use crate::query::{build_closest_locations_query, build_provider_query};
    use crate::geo::EARTH_RADIUS_MILES;
    use std::io::Write;

    const ORIGIN: Coordinate = Coordinate { lat: 52.0, lon: -1.0 };

    fn location_north(id: i64, miles: f64) -> ProviderLocation {
        let lat = ORIGIN.lat + (miles / EARTH_RADIUS_MILES).to_degrees();
        ProviderLocation {
            location_id: id,
            name: format!("site {id}"),
            address: Address::default(),
            geo_point: Coordinate { lat, lon: ORIGIN.lon },
            geo_shape: GeoShape::Circle {
                coordinates: [ORIGIN.lon, lat],
                radius: "20mi".to_string(),
            },
        }
    }

    fn provider(ukprn: i64, name: &str, modes: &[DeliveryMode], miles: &[f64]) -> StandardProvider {
        StandardProvider {
            standard_code: 30,
            profile: ProviderProfile {
                ukprn,
                provider_name: name.to_string(),
                legal_name: None,
                delivery_modes: modes.to_vec(),
                national_provider: ukprn % 2 == 0,
                has_non_levy_contract: false,
                is_levy_payer_only: false,
                currently_not_starting_new_apprentices: false,
                overall_achievement_rate: None,
                national_overall_achievement_rate: None,
                employer_satisfaction: None,
                learner_satisfaction: None,
                training_locations: miles
                    .iter()
                    .enumerate()
                    .map(|(index, miles)| location_north(ukprn * 10 + index as i64, *miles))
                    .collect(),
            },
        }
    }

    fn request() -> ProviderSearchRequest {
        ProviderSearchRequest::new(CourseId::Standard(30), ORIGIN, Paging::new(1, 10).unwrap())
    }

    fn index() -> InMemoryIndex {
        use DeliveryMode::*;
        InMemoryIndex::new(
            vec![
                provider(1, "beta college", &[DayRelease], &[3.0, 1.0]),
                provider(2, "Alpha Training", &[BlockRelease], &[2.0]),
                provider(3, "gamma skills", &[DayRelease, HundredPercentEmployer], &[5.0]),
                provider(4, "Far Away Ltd", &[DayRelease], &[45.0]),
            ],
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn locations_outside_their_shape_do_not_match() {
        let response = index().search(&build_provider_query(&request())).await.unwrap();
        assert_eq!(response.total_hits, 3);
        assert!(response
            .hits
            .iter()
            .all(|hit| hit.source["ukprn"] != json!(4)));
    }

    #[tokio::test]
    async fn hits_are_ordered_by_nearest_location() {
        let response = index().search(&build_provider_query(&request())).await.unwrap();
        let distances: Vec<f64> = response
            .hits
            .iter()
            .map(|hit| hit.sort_f64(0).unwrap())
            .collect();
        assert_eq!(response.hits[0].source["ukprn"], json!(1));
        assert!(distances.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(response.hits[0].inner_hits.len(), 2);
        assert_eq!(response.hits[0].inner_hits[0].source["locationId"], json!(11));
    }

    #[tokio::test]
    async fn facets_are_counted_before_post_filters() {
        let mut request = request();
        request.delivery_modes = vec![DeliveryMode::BlockRelease];
        let response = index().search(&build_provider_query(&request)).await.unwrap();

        assert_eq!(response.total_hits, 1);
        let options = &response.aggregations[Facet::TrainingOptions.name()];
        assert_eq!(options["dayrelease"], 2);
        assert_eq!(options["blockrelease"], 1);
        assert_eq!(options["100percentemployer"], 1);
        let national = &response.aggregations[Facet::NationalProviders.name()];
        assert_eq!(national.values().sum::<u64>(), 3);
    }

    #[tokio::test]
    async fn national_only_post_filter() {
        let mut request = request();
        request.national_only = true;
        let response = index().search(&build_provider_query(&request)).await.unwrap();
        assert_eq!(response.total_hits, 1);
        assert_eq!(response.hits[0].source["ukprn"], json!(2));
    }

    #[tokio::test]
    async fn name_sort_ignores_case() {
        let mut request = request();
        request.order_by = OrderBy::NameAsc;
        let response = index().search(&build_provider_query(&request)).await.unwrap();
        let names: Vec<_> = response
            .hits
            .iter()
            .map(|hit| hit.sort[0].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["alpha training", "beta college", "gamma skills"]);
    }

    #[tokio::test]
    async fn collapse_keeps_nearest_document_and_counts_the_group() {
        let mut records = index().standards;
        records.push(provider(1, "beta college", &[DeliveryMode::DayRelease], &[0.5]));
        let index = InMemoryIndex::new(records, Vec::new());

        let mut request = request();
        request.mode = SearchMode::UniqueProviders;
        let response = index.search(&build_provider_query(&request)).await.unwrap();

        assert_eq!(response.total_hits, 3);
        let first = &response.hits[0];
        assert_eq!(first.source["ukprn"], json!(1));
        assert_eq!(first.collapsed_total, 2);
        assert_eq!(first.inner_hits.len(), 1);
        assert_eq!(first.inner_hit_total, 1);
        assert_eq!(response.aggregations[Facet::NationalProviders.name()].values().sum::<u64>(), 4);
    }

    #[tokio::test]
    async fn location_selection_pages_within_one_provider() {
        let index = InMemoryIndex::new(vec![provider(7, "Solo", &[], &[5.0, 1.0, 3.0])], Vec::new());
        let request = ClosestLocationsRequest {
            ukprn: 7,
            course: CourseId::Standard(30),
            point: ORIGIN,
            show_for_non_levy_only: false,
            paging: Paging::new(2, 2).unwrap(),
        };
        let mut query = build_closest_locations_query(&request);
        let response = index.search(&query).await.unwrap();
        assert_eq!(response.hits.len(), 1);
        assert_eq!(response.hits[0].inner_hit_total, 3);
        assert_eq!(response.hits[0].inner_hits.len(), 3);
        assert!((response.hits[0].inner_hits[0].distance().unwrap() - 1.0).abs() < 1e-9);

        query.locations.selection = LocationSelection::Page { skip: 2, take: 1 };
        let response = index.search(&query).await.unwrap();
        assert_eq!(response.hits[0].inner_hit_total, 3);
        assert_eq!(response.hits[0].inner_hits.len(), 1);
        assert!((response.hits[0].inner_hits[0].distance().unwrap() - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn framework_queries_only_see_framework_records() {
        let framework = FrameworkProvider {
            framework_id: "403-2-1".to_string(),
            profile: provider(9, "Framework Co", &[], &[1.0]).profile,
        };
        let index = InMemoryIndex::new(index().standards, vec![framework]);
        let mut request = request();
        request.course = CourseId::Framework("403-2-1".to_string());
        let response = index.search(&build_provider_query(&request)).await.unwrap();
        assert_eq!(response.total_hits, 1);
        assert_eq!(response.hits[0].source["frameworkId"], json!("403-2-1"));

        request.course = CourseId::Framework("999-1-1".to_string());
        let response = index.search(&build_provider_query(&request)).await.unwrap();
        assert_eq!(response.total_hits, 0);
    }

    #[tokio::test]
    async fn fixtures_load_from_a_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let fixture = json!({ "standards": [provider(1, "beta college", &[], &[1.0])] });
        write!(file, "{fixture}").unwrap();

        let index = InMemoryIndex::from_json_file(file.path()).await.unwrap();
        assert_eq!(index.len(), 1);
        assert!(!index.is_empty());
    }

    #[tokio::test]
    async fn missing_fixture_file_is_an_io_error() {
        let error = InMemoryIndex::from_json_file("/definitely/not/here.json")
            .await
            .unwrap_err();
        assert!(matches!(error, SearchError::Io(_)));
    }
}
