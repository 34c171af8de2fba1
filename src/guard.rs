use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::{Reservation, Role};

/// Identity of an authenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Ulid,
    pub role: Role,
    pub company_id: Ulid,
}

/// True iff the caller belongs to the resource's company and holds at least
/// `required`. The company check applies to ADMIN too.
pub fn allowed(caller_role: Role, caller_company: Ulid, resource_company: Ulid, required: Role) -> bool {
    caller_company == resource_company && caller_role >= required
}

/// Like `allowed`, but says why not. Tenant is checked first, so a caller
/// from another company always sees `TenantMismatch`.
pub fn authorize(caller: &Caller, resource_company: Ulid, required: Role) -> Result<(), EngineError> {
    if caller.company_id != resource_company {
        return Err(EngineError::TenantMismatch);
    }
    if caller.role < required {
        return Err(EngineError::PermissionDenied {
            required,
            actual: caller.role,
        });
    }
    Ok(())
}

/// Reservations may be changed by their owner or by a MANAGER+.
pub fn may_modify_reservation(caller: &Caller, reservation: &Reservation) -> Result<(), EngineError> {
    if reservation.user_id == caller.user_id || caller.role >= Role::Manager {
        Ok(())
    } else {
        Err(EngineError::PermissionDenied {
            required: Role::Manager,
            actual: caller.role,
        })
    }
}
