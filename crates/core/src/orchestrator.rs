use crate::collapse::collapse_by_provider;
use crate::fields::Facet;
use crate::mapper::{decode_location, DecodedHit};
use crate::models::{
    ClosestLocationsRequest, CourseId, FrameworkProvider, PagedResult, ProviderLocations,
    ProviderSearchRequest, SearchMode, StandardProvider,
};
use crate::query::{build_closest_locations_query, build_provider_query};
use crate::traits::{ProviderIndex, ProviderOffering};
use crate::SearchError;
use tracing::{debug, info};

/// Runs provider searches against one `ProviderIndex`.
pub struct ProviderSearchCoordinator<S>
where
    S: ProviderIndex,
{
    index: S,
}

impl<S> ProviderSearchCoordinator<S>
where
    S: ProviderIndex + Send + Sync,
{
    pub fn new(index: S) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &S {
        &self.index
    }

    /// Providers delivering the course near the request point, one page at a time.
    pub async fn search_providers(
        &self,
        request: &ProviderSearchRequest,
    ) -> Result<PagedResult, SearchError> {
        request.validate()?;

        match &request.course {
            CourseId::Standard(_) => self.run_search::<StandardProvider>(request).await,
            CourseId::Framework(_) => self.run_search::<FrameworkProvider>(request).await,
        }
    }

    /// Locations of one provider for a course, closest first.
    pub async fn closest_locations(
        &self,
        request: &ClosestLocationsRequest,
    ) -> Result<ProviderLocations, SearchError> {
        request.point.validate()?;

        match &request.course {
            CourseId::Standard(_) => self.run_closest::<StandardProvider>(request).await,
            CourseId::Framework(_) => self.run_closest::<FrameworkProvider>(request).await,
        }
    }

    async fn run_search<O: ProviderOffering>(
        &self,
        request: &ProviderSearchRequest,
    ) -> Result<PagedResult, SearchError> {
        let query = build_provider_query(request);
        debug_assert_eq!(query.course_kind, O::KIND);
        debug!(course = %request.course, skip = query.skip, take = query.take, "searching providers");

        let response = self.index.search(&query).await?;
        let distance_position = query.distance_sort_position();

        let mut hits = response
            .hits
            .into_iter()
            .map(|hit| DecodedHit::<O>::decode(hit, distance_position))
            .collect::<Result<Vec<_>, _>>()?;
        if request.mode == SearchMode::UniqueProviders {
            hits = collapse_by_provider(hits);
        }

        let results: Vec<_> = hits
            .into_iter()
            .take(to_usize(query.take))
            .map(|hit| hit.into_result_item(request.order_by, request.mode))
            .collect();

        let mut aggregations = response.aggregations;
        for facet in Facet::ALL {
            aggregations.entry(facet.name().to_string()).or_default();
        }

        info!(
            course = %request.course,
            total = response.total_hits,
            returned = results.len(),
            "provider search complete"
        );

        Ok(PagedResult {
            total_results: response.total_hits,
            page_number: request.paging.page(),
            page_size: request.paging.page_size(),
            results,
            aggregations,
        })
    }

    async fn run_closest<O: ProviderOffering>(
        &self,
        request: &ClosestLocationsRequest,
    ) -> Result<ProviderLocations, SearchError> {
        let query = build_closest_locations_query(request);
        let response = self.index.search(&query).await?;

        let mut located = ProviderLocations {
            ukprn: request.ukprn,
            provider_name: None,
            total_results: 0,
            page_number: request.paging.page(),
            page_size: request.paging.page_size(),
            results: Vec::new(),
        };

        if response.hits.is_empty() {
            debug!(ukprn = request.ukprn, course = %request.course, "provider has no matching locations");
            return Ok(located);
        }
        if response.hits.len() > 1 {
            debug!(
                ukprn = request.ukprn,
                documents = response.hits.len(),
                "merging locations from several provider documents"
            );
        }

        let mut selected = Vec::new();
        for hit in response.hits {
            if located.provider_name.is_none() {
                let offering: O = serde_json::from_value(hit.source)?;
                located.provider_name = Some(offering.provider_name().to_string());
            }
            located.total_results += hit.inner_hit_total;
            selected.extend(hit.inner_hits);
        }
        selected.sort_by(|left, right| {
            let left = left.distance().unwrap_or(f64::INFINITY);
            left.total_cmp(&right.distance().unwrap_or(f64::INFINITY))
        });

        located.results = selected
            .into_iter()
            .skip(to_usize(request.paging.skip()))
            .take(to_usize(request.paging.take()))
            .map(decode_location)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(located)
    }
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}
