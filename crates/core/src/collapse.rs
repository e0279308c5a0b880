use crate::mapper::DecodedHit;
use crate::traits::ProviderOffering;
use std::collections::HashMap;

/// Folds hits sharing a `ukprn` into one row per provider.
///
/// The row keeps the position of the provider's first hit, takes the nearest location
/// as its representative and sums matching-location counts, so the "other locations"
/// flag still reflects every match. Stores that collapse server-side hand over unique
/// rows and pass through untouched.
pub(crate) fn collapse_by_provider<O: ProviderOffering>(
    hits: Vec<DecodedHit<O>>,
) -> Vec<DecodedHit<O>> {
    let mut positions: HashMap<i64, usize> = HashMap::with_capacity(hits.len());
    let mut collapsed: Vec<DecodedHit<O>> = Vec::with_capacity(hits.len());

    for hit in hits {
        let ukprn = hit.offering.ukprn();
        let Some(&position) = positions.get(&ukprn) else {
            positions.insert(ukprn, collapsed.len());
            collapsed.push(hit);
            continue;
        };

        let existing = &mut collapsed[position];
        let matching = existing.matching_locations + hit.matching_locations;
        if is_nearer(&hit, existing) {
            *existing = hit;
        }
        existing.matching_locations = matching;
    }

    collapsed
}

fn is_nearer<O: ProviderOffering>(candidate: &DecodedHit<O>, current: &DecodedHit<O>) -> bool {
    match (candidate.nearest_distance(), current.nearest_distance()) {
        (Some(candidate), Some(current)) => candidate < current,
        (Some(_), None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinate, GeoShape, LocationResult, ProviderLocation, StandardProvider};
    use crate::models::{Address, ProviderProfile};

    fn hit(ukprn: i64, location_id: i64, distance: f64) -> DecodedHit<StandardProvider> {
        let location = ProviderLocation {
            location_id,
            name: format!("site {location_id}"),
            address: Address::default(),
            geo_point: Coordinate { lat: 52.0, lon: -1.0 },
            geo_shape: GeoShape::Point {
                coordinates: [-1.0, 52.0],
            },
        };
        DecodedHit {
            offering: StandardProvider {
                standard_code: 30,
                profile: ProviderProfile {
                    ukprn,
                    provider_name: format!("provider {ukprn}"),
                    legal_name: None,
                    delivery_modes: Vec::new(),
                    national_provider: false,
                    has_non_levy_contract: false,
                    is_levy_payer_only: false,
                    currently_not_starting_new_apprentices: false,
                    overall_achievement_rate: None,
                    national_overall_achievement_rate: None,
                    employer_satisfaction: None,
                    learner_satisfaction: None,
                    training_locations: vec![location.clone()],
                },
            },
            distance: Some(distance),
            locations: vec![LocationResult {
                location,
                distance_miles: Some(distance),
            }],
            matching_locations: 1,
        }
    }

    #[test]
    fn duplicate_providers_collapse_to_the_nearest_location() {
        let hits = vec![hit(1, 10, 2.0), hit(2, 20, 2.5), hit(1, 11, 0.5)];
        let collapsed = collapse_by_provider(hits);

        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[0].offering.ukprn(), 1);
        assert_eq!(collapsed[0].locations[0].location.location_id, 11);
        assert_eq!(collapsed[0].matching_locations, 2);
        assert_eq!(collapsed[1].offering.ukprn(), 2);
        assert_eq!(collapsed[1].matching_locations, 1);
    }

    #[test]
    fn unique_rows_pass_through_in_order() {
        let hits = vec![hit(3, 30, 1.0), hit(1, 10, 2.0), hit(2, 20, 3.0)];
        let ukprns: Vec<_> = collapse_by_provider(hits)
            .iter()
            .map(|hit| hit.offering.ukprn())
            .collect();
        assert_eq!(ukprns, vec![3, 1, 2]);
    }
}
