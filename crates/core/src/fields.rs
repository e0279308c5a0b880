//! Closed mapping from query concepts to document field paths.

use crate::models::{CourseKind, OrderBy};
use serde::{Deserialize, Serialize};

pub const TRAINING_LOCATIONS_PATH: &str = "trainingLocations";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Field {
    StandardCode,
    FrameworkId,
    Ukprn,
    HasNonLevyContract,
    DeliveryModes,
    NationalProvider,
    ProviderNameSortable,
    LocationGeoPoint,
    LocationGeoShape,
}

impl Field {
    pub const ALL: [Self; 9] = [
        Self::StandardCode,
        Self::FrameworkId,
        Self::Ukprn,
        Self::HasNonLevyContract,
        Self::DeliveryModes,
        Self::NationalProvider,
        Self::ProviderNameSortable,
        Self::LocationGeoPoint,
        Self::LocationGeoShape,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Self::StandardCode => "standardCode",
            Self::FrameworkId => "frameworkId",
            Self::Ukprn => "ukprn",
            Self::HasNonLevyContract => "hasNonLevyContract",
            Self::DeliveryModes => "deliveryModes",
            Self::NationalProvider => "nationalProvider",
            // untokenized, lower-cased keyword sub-field
            Self::ProviderNameSortable => "providerName.sortable",
            Self::LocationGeoPoint => "trainingLocations.geoPoint",
            Self::LocationGeoShape => "trainingLocations.geoShape",
        }
    }

    pub fn course_code(kind: CourseKind) -> Self {
        match kind {
            CourseKind::Standard => Self::StandardCode,
            CourseKind::Framework => Self::FrameworkId,
        }
    }
}

/// Facet buckets computed for every provider search.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Facet {
    TrainingOptions,
    NationalProviders,
}

impl Facet {
    pub const ALL: [Self; 2] = [Self::TrainingOptions, Self::NationalProviders];

    /// Name the buckets are published under.
    pub fn name(self) -> &'static str {
        match self {
            Self::TrainingOptions => "trainingOptionsAggregation",
            Self::NationalProviders => "nationalProvidersAggregation",
        }
    }

    pub fn field(self) -> Field {
        match self {
            Self::TrainingOptions => Field::DeliveryModes,
            Self::NationalProviders => Field::NationalProvider,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Name ordering for an `OrderBy`, `None` when results are ranked by distance.
pub fn name_order(order_by: OrderBy) -> Option<SortOrder> {
    match order_by {
        OrderBy::Distance => None,
        OrderBy::NameAsc => Some(SortOrder::Asc),
        OrderBy::NameDesc => Some(SortOrder::Desc),
    }
}
