use crate::models::{
    CourseId, CourseKind, DeliveryMode, FrameworkProvider, ProviderLocation, ProviderProfile,
    StandardProvider,
};
use crate::query::ProviderQuery;
use crate::store::RawSearchResponse;
use crate::SearchError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A geo-capable document store holding provider offerings for both course kinds.
#[async_trait]
pub trait ProviderIndex {
    /// Runs one query. A store that answered with zero hits returns an empty response;
    /// any non-success answer is an error.
    async fn search(&self, query: &ProviderQuery) -> Result<RawSearchResponse, SearchError>;
}

/// What the search path needs from a course-linked provider record.
pub trait ProviderOffering: Serialize + DeserializeOwned + Send + Sync {
    const KIND: CourseKind;

    fn course_id(&self) -> CourseId;

    fn profile(&self) -> &ProviderProfile;

    fn ukprn(&self) -> i64 {
        self.profile().ukprn
    }

    fn provider_name(&self) -> &str {
        &self.profile().provider_name
    }

    fn training_locations(&self) -> &[ProviderLocation] {
        &self.profile().training_locations
    }

    fn delivery_modes(&self) -> &[DeliveryMode] {
        &self.profile().delivery_modes
    }

    fn national_provider(&self) -> bool {
        self.profile().national_provider
    }

    fn has_non_levy_contract(&self) -> bool {
        self.profile().has_non_levy_contract
    }
}

impl ProviderOffering for StandardProvider {
    const KIND: CourseKind = CourseKind::Standard;

    fn course_id(&self) -> CourseId {
        CourseId::Standard(self.standard_code)
    }

    fn profile(&self) -> &ProviderProfile {
        &self.profile
    }
}

impl ProviderOffering for FrameworkProvider {
    const KIND: CourseKind = CourseKind::Framework;

    fn course_id(&self) -> CourseId {
        CourseId::Framework(self.framework_id.clone())
    }

    fn profile(&self) -> &ProviderProfile {
        &self.profile
    }
}
