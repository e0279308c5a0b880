//! Store-agnostic description of a proximity search. Adapters in `stores` translate a
//! `ProviderQuery` into whatever their engine speaks.

use crate::fields::{name_order, Facet, Field, SortOrder};
use crate::models::{
    ClosestLocationsRequest, Coordinate, CourseId, CourseKind, DeliveryMode,
    ProviderSearchRequest, SearchMode,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FilterValue {
    Int(i64),
    Text(String),
    Bool(bool),
}

/// Exact-match filter on a top-level document field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TermFilter {
    pub field: Field,
    pub value: FilterValue,
}

impl TermFilter {
    pub fn new(field: Field, value: FilterValue) -> Self {
        Self { field, value }
    }
}

/// Which of a provider's matching locations come back with each hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LocationSelection {
    /// Only the closest one; the total number of matches is still reported.
    Nearest,
    All,
    Page { skip: u64, take: u64 },
}

/// Keeps providers with at least one location whose shape contains `point`, and
/// selects those locations in ascending distance order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NestedLocationFilter {
    pub point: Coordinate,
    pub selection: LocationSelection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SortClause {
    /// Ascending arc distance in miles to the nearest matching location.
    GeoDistance { point: Coordinate },
    Field { field: Field, order: SortOrder },
}

/// Applied after aggregation, so it narrows results without touching facet counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PostFilter {
    AnyDeliveryMode(Vec<DeliveryMode>),
    NationalOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderQuery {
    pub course_kind: CourseKind,
    pub filters: Vec<TermFilter>,
    pub locations: NestedLocationFilter,
    pub sort: Vec<SortClause>,
    pub aggregations: Vec<Facet>,
    pub post_filters: Vec<PostFilter>,
    pub collapse: Option<Field>,
    pub skip: u64,
    pub take: u64,
}

impl ProviderQuery {
    /// Index of the geo-distance clause within each hit's sort values.
    pub fn distance_sort_position(&self) -> Option<usize> {
        self.sort
            .iter()
            .position(|clause| matches!(clause, SortClause::GeoDistance { .. }))
    }
}

pub fn build_provider_query(request: &ProviderSearchRequest) -> ProviderQuery {
    let filters = vec![
        course_filter(&request.course),
        // Equality, not a toggle: `false` keeps only providers without a non-levy contract.
        TermFilter::new(
            Field::HasNonLevyContract,
            FilterValue::Bool(request.show_for_non_levy_only),
        ),
    ];

    let (selection, collapse) = match request.mode {
        SearchMode::AllLocations => (LocationSelection::All, None),
        SearchMode::UniqueProviders => (LocationSelection::Nearest, Some(Field::Ukprn)),
    };

    let geo_sort = SortClause::GeoDistance {
        point: request.point,
    };
    let sort = match name_order(request.order_by) {
        Some(order) => vec![
            SortClause::Field {
                field: Field::ProviderNameSortable,
                order,
            },
            geo_sort,
        ],
        None => vec![geo_sort],
    };

    let mut post_filters = Vec::new();
    if !request.delivery_modes.is_empty() {
        post_filters.push(PostFilter::AnyDeliveryMode(request.delivery_modes.clone()));
    }
    if request.national_only {
        post_filters.push(PostFilter::NationalOnly);
    }

    ProviderQuery {
        course_kind: request.course.kind(),
        filters,
        locations: NestedLocationFilter {
            point: request.point,
            selection,
        },
        sort,
        aggregations: Facet::ALL.to_vec(),
        post_filters,
        collapse,
        skip: request.paging.skip(),
        take: request.paging.take(),
    }
}

/// Upper bound on documents read for one provider and course. The index normally holds
/// one; any extras have their locations merged by the coordinator.
pub const MAX_PROVIDER_DOCUMENTS: u64 = 10;

/// One provider, many locations: paging applies to the selected locations, not to hits.
///
/// Every document selects its nearest `skip + take` locations so the page can be cut
/// from the merged list when the provider is split over several documents.
pub fn build_closest_locations_query(request: &ClosestLocationsRequest) -> ProviderQuery {
    ProviderQuery {
        course_kind: request.course.kind(),
        filters: vec![
            course_filter(&request.course),
            TermFilter::new(
                Field::HasNonLevyContract,
                FilterValue::Bool(request.show_for_non_levy_only),
            ),
            TermFilter::new(Field::Ukprn, FilterValue::Int(request.ukprn)),
        ],
        locations: NestedLocationFilter {
            point: request.point,
            selection: LocationSelection::Page {
                skip: 0,
                take: request.paging.skip().saturating_add(request.paging.take()),
            },
        },
        sort: Vec::new(),
        aggregations: Vec::new(),
        post_filters: Vec::new(),
        collapse: None,
        skip: 0,
        take: MAX_PROVIDER_DOCUMENTS,
    }
}

fn course_filter(course: &CourseId) -> TermFilter {
    let value = match course {
        CourseId::Standard(code) => FilterValue::Int(i64::from(*code)),
        CourseId::Framework(code) => FilterValue::Text(code.clone()),
    };
    TermFilter::new(Field::course_code(course.kind()), value)
}
