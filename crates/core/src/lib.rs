pub mod collapse;
pub mod error;
pub mod fields;
pub mod geo;
pub mod mapper;
pub mod models;
pub mod orchestrator;
pub mod paging;
pub mod query;
pub mod store;
pub mod stores;
pub mod traits;

pub use error::SearchError;
pub use fields::{Facet, Field, SortOrder};
pub use geo::{arc_distance_miles, round_to_tenth};
pub use models::{
    Address, AggregationBucket, ClosestLocationsRequest, Coordinate, CourseId, CourseKind,
    DeliveryMode, FrameworkProvider, GeoShape, LocationParams, LocationResult, OrderBy,
    PagedResult, ProviderLocation, ProviderLocations, ProviderProfile, ProviderSearchRequest,
    SearchMode, SearchParams, SearchResultItem, StandardProvider,
};
pub use orchestrator::ProviderSearchCoordinator;
pub use paging::Paging;
pub use query::{build_closest_locations_query, build_provider_query, ProviderQuery};
pub use store::{InnerLocationHit, RawHit, RawSearchResponse};
pub use stores::{CourseIndices, InMemoryIndex, OpenSearchStore};
pub use traits::{ProviderIndex, ProviderOffering};
