//! Use cases behind the HTTP surface: resolve the addressed company, check
//! the caller, run the store operation, shape the response.

mod admin;
mod floor;
mod location;
mod reservation;
mod schedule;
mod space;
#[cfg(test)]
mod tests;
pub mod time;
mod user;

pub use admin::EditRole;
pub use floor::{FloorDeleted, FloorDetail, FloorInput, FloorResponse};
pub use location::{LocationInput, LocationResponse, Occupant};
pub use reservation::{
    RescheduleInput, ReservationResponse, ReserveInput, SlotResponse, TimetableResponse, WindowResponse,
};
pub use schedule::{ScheduleDayResponse, ScheduleInput, ScheduleResponse};
pub use space::{SpaceDeleted, SpaceDetail, SpaceInput, SpaceResponse};
pub use user::{CertificationMatch, SignupAdmin, SignupUser, UserResponse};

use std::sync::Arc;

use crate::engine::{Engine, EngineError, Entity, OperatingHours};
use crate::guard::{self, Caller};
use crate::model::Role;
use crate::tenant::TenantManager;

pub struct Service {
    tenants: Arc<TenantManager>,
    hours: OperatingHours,
}

impl Service {
    pub fn new(tenants: Arc<TenantManager>, hours: OperatingHours) -> Self {
        Self { tenants, hours }
    }

    pub fn tenants(&self) -> &TenantManager {
        &self.tenants
    }

    /// Resolve a company by name and check the caller may act on it with
    /// `required`.
    fn scope(&self, caller: &Caller, company_name: &str, required: Role) -> Result<Arc<Engine>, EngineError> {
        let engine = self
            .tenants
            .by_name(company_name)
            .ok_or_else(|| EngineError::not_found(Entity::Company, company_name))?;
        guard::authorize(caller, engine.company().id, required)?;
        Ok(engine)
    }

    /// The caller's own company, for routes that don't name one.
    fn own_company(&self, caller: &Caller, required: Role) -> Result<Arc<Engine>, EngineError> {
        let engine = self
            .tenants
            .get(&caller.company_id)
            .ok_or_else(|| EngineError::not_found(Entity::Company, caller.company_id))?;
        guard::authorize(caller, engine.company().id, required)?;
        Ok(engine)
    }
}
