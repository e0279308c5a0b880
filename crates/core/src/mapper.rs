use crate::geo::round_to_tenth;
use crate::models::{LocationResult, OrderBy, ProviderLocation, SearchMode, SearchResultItem};
use crate::store::{InnerLocationHit, RawHit};
use crate::traits::ProviderOffering;
use crate::SearchError;

/// A store hit decoded into a typed offering plus what the query selected for it.
#[derive(Debug, Clone)]
pub(crate) struct DecodedHit<O> {
    pub offering: O,
    /// Unrounded geo-distance sort value of the hit.
    pub distance: Option<f64>,
    pub locations: Vec<LocationResult>,
    /// Lower bound on how many locations of this provider matched the point.
    pub matching_locations: u64,
}

impl<O: ProviderOffering> DecodedHit<O> {
    pub fn decode(hit: RawHit, distance_position: Option<usize>) -> Result<Self, SearchError> {
        let distance = distance_position.and_then(|position| hit.sort_f64(position));
        let offering: O = serde_json::from_value(hit.source)?;
        let locations = hit
            .inner_hits
            .into_iter()
            .map(decode_location)
            .collect::<Result<Vec<_>, _>>()?;

        let matching_locations = hit.inner_hit_total.max(locations.len() as u64)
            + hit.collapsed_total.saturating_sub(1);

        Ok(Self {
            offering,
            distance,
            locations,
            matching_locations,
        })
    }

    /// Distance to the nearest selected location, falling back to the first inner hit.
    pub fn nearest_distance(&self) -> Option<f64> {
        self.distance
            .or_else(|| self.locations.first().and_then(|location| location.distance_miles))
    }

    pub fn into_result_item(self, order_by: OrderBy, mode: SearchMode) -> SearchResultItem {
        let distance_miles = match order_by {
            OrderBy::Distance => self.nearest_distance().map(round_to_tenth),
            OrderBy::NameAsc | OrderBy::NameDesc => None,
        };
        let has_other_matching_locations = self.matching_locations > 1;
        let location = self
            .locations
            .first()
            .map(|selected| selected.location.clone());
        let matching_locations = match mode {
            SearchMode::AllLocations if order_by == OrderBy::Distance => self.locations,
            SearchMode::AllLocations => self
                .locations
                .into_iter()
                .map(|selected| LocationResult {
                    distance_miles: None,
                    ..selected
                })
                .collect(),
            SearchMode::UniqueProviders => Vec::new(),
        };

        let profile = self.offering.profile();
        SearchResultItem {
            ukprn: profile.ukprn,
            provider_name: profile.provider_name.clone(),
            legal_name: profile.legal_name.clone(),
            location,
            distance_miles,
            matching_locations,
            delivery_modes: profile.delivery_modes.clone(),
            national_provider: profile.national_provider,
            has_non_levy_contract: profile.has_non_levy_contract,
            is_levy_payer_only: profile.is_levy_payer_only,
            currently_not_starting_new_apprentices: profile.currently_not_starting_new_apprentices,
            overall_achievement_rate: profile.overall_achievement_rate,
            national_overall_achievement_rate: profile.national_overall_achievement_rate,
            employer_satisfaction: profile.employer_satisfaction,
            learner_satisfaction: profile.learner_satisfaction,
            has_other_matching_locations,
        }
    }
}

pub(crate) fn decode_location(inner: InnerLocationHit) -> Result<LocationResult, SearchError> {
    let distance_miles = inner.distance().map(round_to_tenth);
    let location: ProviderLocation = serde_json::from_value(inner.source)?;
    Ok(LocationResult {
        location,
        distance_miles,
    })
}
