use crate::paging::{Paging, DEFAULT_PAGE_SIZE};
use crate::SearchError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, SearchError> {
        let coordinate = Self { lat, lon };
        coordinate.validate()?;
        Ok(coordinate)
    }

    /// Builds a coordinate from optional request parameters; both halves are required.
    pub fn from_parts(lat: Option<f64>, lon: Option<f64>) -> Result<Self, SearchError> {
        match (lat, lon) {
            (Some(lat), Some(lon)) => Self::new(lat, lon),
            (None, _) => Err(SearchError::invalid("latitude is required")),
            (_, None) => Err(SearchError::invalid("longitude is required")),
        }
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(SearchError::invalid(format!(
                "latitude {} is outside -90..=90",
                self.lat
            )));
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(SearchError::invalid(format!(
                "longitude {} is outside -180..=180",
                self.lon
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CourseKind {
    Standard,
    Framework,
}

/// The course a search targets. Standards are numeric, frameworks carry a composite
/// code such as `403-2-1`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CourseId {
    Standard(i32),
    Framework(String),
}

impl CourseId {
    /// Anything that is not a whole base-10 integer is taken as a framework code,
    /// unvalidated. `"12a"` is the framework `12a`, not an error.
    pub fn resolve(id: &str) -> Self {
        match id.parse::<i32>() {
            Ok(code) => Self::Standard(code),
            Err(_) => Self::Framework(id.to_string()),
        }
    }

    pub fn kind(&self) -> CourseKind {
        match self {
            Self::Standard(_) => CourseKind::Standard,
            Self::Framework(_) => CourseKind::Framework,
        }
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard(code) => write!(f, "{code}"),
            Self::Framework(code) => f.write_str(code),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeliveryMode {
    #[serde(rename = "dayrelease")]
    DayRelease,
    #[serde(rename = "blockrelease")]
    BlockRelease,
    #[serde(rename = "100percentemployer")]
    HundredPercentEmployer,
}

impl DeliveryMode {
    pub const ALL: [Self; 3] = [
        Self::DayRelease,
        Self::BlockRelease,
        Self::HundredPercentEmployer,
    ];

    /// Request token: `0` day release, `1` block release, `2` at the employer's location.
    pub fn from_token(token: &str) -> Result<Self, SearchError> {
        match token.trim() {
            "0" => Ok(Self::DayRelease),
            "1" => Ok(Self::BlockRelease),
            "2" => Ok(Self::HundredPercentEmployer),
            other => Err(SearchError::invalid(format!(
                "unknown delivery mode '{other}'"
            ))),
        }
    }

    /// Parses a comma separated token list such as `0,2`. Blank entries are skipped,
    /// anything else that is not a known token fails the whole request.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, SearchError> {
        let mut modes = Vec::new();
        for token in raw.split(',').filter(|token| !token.trim().is_empty()) {
            let mode = Self::from_token(token)?;
            if !modes.contains(&mode) {
                modes.push(mode);
            }
        }
        Ok(modes)
    }

    /// Value stored in the index and used as the facet bucket key.
    pub fn index_value(self) -> &'static str {
        match self {
            Self::DayRelease => "dayrelease",
            Self::BlockRelease => "blockrelease",
            Self::HundredPercentEmployer => "100percentemployer",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum OrderBy {
    #[default]
    Distance,
    NameAsc,
    NameDesc,
}

impl OrderBy {
    /// `2` and `3` select name ordering; every other value means distance.
    pub fn from_code(code: i64) -> Self {
        match code {
            2 => Self::NameAsc,
            3 => Self::NameDesc,
            _ => Self::Distance,
        }
    }
}

/// `AllLocations` lists every matching location of a provider, `UniqueProviders`
/// collapses to one row per provider at its nearest location.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum SearchMode {
    #[default]
    AllLocations,
    UniqueProviders,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub address2: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
}

/// GeoJSON-shaped area a location covers. Coordinates are `[lon, lat]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeoShape {
    Point {
        coordinates: [f64; 2],
    },
    Circle {
        coordinates: [f64; 2],
        radius: String,
    },
    Polygon {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderLocation {
    pub location_id: i64,
    pub name: String,
    #[serde(default)]
    pub address: Address,
    pub geo_point: Coordinate,
    pub geo_shape: GeoShape,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    pub ukprn: i64,
    pub provider_name: String,
    #[serde(default)]
    pub legal_name: Option<String>,
    #[serde(default)]
    pub delivery_modes: Vec<DeliveryMode>,
    #[serde(default)]
    pub national_provider: bool,
    #[serde(default)]
    pub has_non_levy_contract: bool,
    #[serde(default)]
    pub is_levy_payer_only: bool,
    #[serde(default)]
    pub currently_not_starting_new_apprentices: bool,
    #[serde(default)]
    pub overall_achievement_rate: Option<f64>,
    #[serde(default)]
    pub national_overall_achievement_rate: Option<f64>,
    #[serde(default)]
    pub employer_satisfaction: Option<f64>,
    #[serde(default)]
    pub learner_satisfaction: Option<f64>,
    #[serde(default)]
    pub training_locations: Vec<ProviderLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StandardProvider {
    pub standard_code: i32,
    #[serde(flatten)]
    pub profile: ProviderProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkProvider {
    pub framework_id: String,
    #[serde(flatten)]
    pub profile: ProviderProfile,
}

/// Raw parameters of a provider search, as a controller or CLI receives them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub id: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    #[serde(default)]
    pub show_for_non_levy_only: bool,
    #[serde(default)]
    pub show_national_only: bool,
    pub delivery_modes: Option<String>,
    pub order_by: Option<i64>,
    #[serde(default)]
    pub unique_providers: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSearchRequest {
    pub course: CourseId,
    pub point: Coordinate,
    pub paging: Paging,
    pub show_for_non_levy_only: bool,
    pub delivery_modes: Vec<DeliveryMode>,
    pub national_only: bool,
    pub order_by: OrderBy,
    pub mode: SearchMode,
}

impl ProviderSearchRequest {
    pub fn new(course: CourseId, point: Coordinate, paging: Paging) -> Self {
        Self {
            course,
            point,
            paging,
            show_for_non_levy_only: false,
            delivery_modes: Vec::new(),
            national_only: false,
            order_by: OrderBy::Distance,
            mode: SearchMode::AllLocations,
        }
    }

    pub fn from_params(params: &SearchParams) -> Result<Self, SearchError> {
        let point = Coordinate::from_parts(params.lat, params.lon)?;
        let paging = paging_from(params.page, params.page_size)?;
        let delivery_modes = match params.delivery_modes.as_deref() {
            Some(raw) => DeliveryMode::parse_list(raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            course: CourseId::resolve(&params.id),
            point,
            paging,
            show_for_non_levy_only: params.show_for_non_levy_only,
            delivery_modes,
            national_only: params.show_national_only,
            order_by: OrderBy::from_code(params.order_by.unwrap_or_default()),
            mode: if params.unique_providers {
                SearchMode::UniqueProviders
            } else {
                SearchMode::AllLocations
            },
        })
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        self.point.validate()
    }
}

/// Raw parameters of a closest-location lookup for one provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationParams {
    pub id: String,
    pub ukprn: i64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    #[serde(default)]
    pub show_for_non_levy_only: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosestLocationsRequest {
    pub ukprn: i64,
    pub course: CourseId,
    pub point: Coordinate,
    pub show_for_non_levy_only: bool,
    pub paging: Paging,
}

impl ClosestLocationsRequest {
    pub fn from_params(params: &LocationParams) -> Result<Self, SearchError> {
        Ok(Self {
            ukprn: params.ukprn,
            course: CourseId::resolve(&params.id),
            point: Coordinate::from_parts(params.lat, params.lon)?,
            show_for_non_levy_only: params.show_for_non_levy_only,
            paging: paging_from(params.page, params.page_size)?,
        })
    }
}

fn paging_from(page: Option<i64>, page_size: Option<i64>) -> Result<Paging, SearchError> {
    Paging::new(
        page.unwrap_or(1),
        page_size.unwrap_or(DEFAULT_PAGE_SIZE as i64),
    )
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationResult {
    pub location: ProviderLocation,
    /// Unset when results are ordered by name, like the item-level distance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_miles: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub ukprn: i64,
    pub provider_name: String,
    pub legal_name: Option<String>,
    pub location: Option<ProviderLocation>,
    /// Only set when results are ordered by distance.
    pub distance_miles: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matching_locations: Vec<LocationResult>,
    pub delivery_modes: Vec<DeliveryMode>,
    pub national_provider: bool,
    pub has_non_levy_contract: bool,
    pub is_levy_payer_only: bool,
    pub currently_not_starting_new_apprentices: bool,
    pub overall_achievement_rate: Option<f64>,
    pub national_overall_achievement_rate: Option<f64>,
    pub employer_satisfaction: Option<f64>,
    pub learner_satisfaction: Option<f64>,
    pub has_other_matching_locations: bool,
}

pub type AggregationBucket = BTreeMap<String, u64>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult {
    pub total_results: u64,
    pub page_number: u64,
    pub page_size: u64,
    pub results: Vec<SearchResultItem>,
    #[serde(flatten)]
    pub aggregations: BTreeMap<String, AggregationBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderLocations {
    pub ukprn: i64,
    pub provider_name: Option<String>,
    pub total_results: u64,
    pub page_number: u64,
    pub page_size: u64,
    pub results: Vec<LocationResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_resolve_to_standards() {
        assert_eq!(CourseId::resolve("123"), CourseId::Standard(123));
        assert_eq!(CourseId::resolve("-4"), CourseId::Standard(-4));
    }

    #[test]
    fn anything_else_resolves_to_a_framework_code() {
        assert_eq!(
            CourseId::resolve("123-4-5"),
            CourseId::Framework("123-4-5".to_string())
        );
        assert_eq!(CourseId::resolve("12a"), CourseId::Framework("12a".to_string()));
        assert_eq!(CourseId::resolve(" 12"), CourseId::Framework(" 12".to_string()));
        assert_eq!(
            CourseId::resolve("99999999999"),
            CourseId::Framework("99999999999".to_string())
        );
        assert_eq!(CourseId::resolve(""), CourseId::Framework(String::new()));
    }

    #[test]
    fn delivery_mode_tokens_map_to_modes() {
        assert_eq!(
            DeliveryMode::parse_list("0,2").unwrap(),
            vec![DeliveryMode::DayRelease, DeliveryMode::HundredPercentEmployer]
        );
        assert_eq!(
            DeliveryMode::parse_list(" 1 , 1,").unwrap(),
            vec![DeliveryMode::BlockRelease]
        );
        assert!(DeliveryMode::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn unknown_delivery_mode_token_is_a_validation_error() {
        let error = DeliveryMode::parse_list("0,x").unwrap_err();
        assert!(error.is_validation());
        assert!(DeliveryMode::from_token("3").is_err());
    }

    #[test]
    fn delivery_modes_serialize_as_index_values() {
        for mode in DeliveryMode::ALL {
            let json = serde_json::to_value(mode).unwrap();
            assert_eq!(json, serde_json::json!(mode.index_value()));
        }
    }

    #[test]
    fn order_by_codes_map_exactly() {
        assert_eq!(OrderBy::from_code(0), OrderBy::Distance);
        assert_eq!(OrderBy::from_code(1), OrderBy::Distance);
        assert_eq!(OrderBy::from_code(2), OrderBy::NameAsc);
        assert_eq!(OrderBy::from_code(3), OrderBy::NameDesc);
        assert_eq!(OrderBy::from_code(4), OrderBy::Distance);
        assert_eq!(OrderBy::from_code(-1), OrderBy::Distance);
    }

    #[test]
    fn coordinates_are_required_and_bounded() {
        assert!(Coordinate::from_parts(None, Some(1.0)).unwrap_err().is_validation());
        assert!(Coordinate::from_parts(Some(1.0), None).unwrap_err().is_validation());
        assert!(Coordinate::new(91.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.5).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(52.4, -1.5).is_ok());
    }

    #[test]
    fn search_params_build_a_request() {
        let params = SearchParams {
            id: "30".to_string(),
            lat: Some(10.1),
            lon: Some(12.2),
            page: Some(2),
            page_size: Some(5),
            show_for_non_levy_only: true,
            show_national_only: true,
            delivery_modes: Some("0,1".to_string()),
            order_by: Some(3),
            unique_providers: true,
        };

        let request = ProviderSearchRequest::from_params(&params).unwrap();
        assert_eq!(request.course, CourseId::Standard(30));
        assert_eq!(request.paging.skip(), 5);
        assert!(request.show_for_non_levy_only);
        assert!(request.national_only);
        assert_eq!(
            request.delivery_modes,
            vec![DeliveryMode::DayRelease, DeliveryMode::BlockRelease]
        );
        assert_eq!(request.order_by, OrderBy::NameDesc);
        assert_eq!(request.mode, SearchMode::UniqueProviders);
    }

    #[test]
    fn search_params_default_to_first_page_by_distance() {
        let params = SearchParams {
            id: "403-2-1".to_string(),
            lat: Some(52.0),
            lon: Some(-1.0),
            ..Default::default()
        };

        let request = ProviderSearchRequest::from_params(&params).unwrap();
        assert_eq!(request.course, CourseId::Framework("403-2-1".to_string()));
        assert_eq!(request.paging, Paging::default());
        assert_eq!(request.order_by, OrderBy::Distance);
        assert_eq!(request.mode, SearchMode::AllLocations);
        assert!(request.delivery_modes.is_empty());
    }

    #[test]
    fn zero_page_size_is_rejected_before_anything_else() {
        let params = LocationParams {
            id: "30".to_string(),
            ukprn: 10000001,
            lat: Some(52.0),
            lon: Some(-1.0),
            page: Some(1),
            page_size: Some(0),
            show_for_non_levy_only: false,
        };
        assert!(ClosestLocationsRequest::from_params(&params)
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn framework_records_parse_from_index_documents() {
        let record: FrameworkProvider = serde_json::from_value(serde_json::json!({
            "frameworkId": "403-2-1",
            "ukprn": 10001234,
            "providerName": "Northfield College",
            "deliveryModes": ["dayrelease", "100percentemployer"],
            "trainingLocations": [{
                "locationId": 7,
                "name": "Main campus",
                "geoPoint": {"lat": 52.4, "lon": -1.5},
                "geoShape": {"type": "circle", "coordinates": [-1.5, 52.4], "radius": "10mi"}
            }]
        }))
        .unwrap();

        assert_eq!(record.framework_id, "403-2-1");
        assert_eq!(record.profile.ukprn, 10001234);
        assert!(!record.profile.has_non_levy_contract);
        assert_eq!(record.profile.training_locations[0].address, Address::default());
        assert_eq!(
            record.profile.delivery_modes,
            vec![DeliveryMode::DayRelease, DeliveryMode::HundredPercentEmployer]
        );
    }
}
