// Business logic services

pub mod plan_tree;
pub mod plan_service;
pub mod catalog_service;
pub mod athlete_service;
pub mod assignment_service;
pub mod session_service;
pub mod dashboard_service;
pub mod plan_generation_service;
pub mod background_job_service;

pub use plan_service::PlanService;
pub use catalog_service::CatalogService;
pub use athlete_service::AthleteService;
pub use assignment_service::AssignmentService;
pub use session_service::SessionService;
pub use dashboard_service::DashboardService;
pub use plan_generation_service::{GeneratorError, HttpPlanGenerator, PlanGenerationService, PlanGenerator};
pub use background_job_service::BackgroundJobService;

use crate::auth::Principal;
use crate::errors::ServiceResult;
use crate::models::Athlete;
use crate::repository::Store;

/// The athlete profile behind an athlete principal. Coaches have none.
pub(crate) async fn caller_athlete(store: &dyn Store, principal: &Principal) -> ServiceResult<Option<Athlete>> {
    if !principal.is_athlete() {
        return Ok(None);
    }
    Ok(store.get_athlete_by_user(principal.user_id).await?)
}
