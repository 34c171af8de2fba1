use serde::Deserialize;
use tracing::info;
use ulid::Ulid;

use super::{Service, UserResponse};
use crate::engine::{EngineError, Entity};
use crate::guard::Caller;
use crate::model::Role;

#[derive(Debug, Deserialize)]
pub struct EditRole {
    pub role: Role,
}

impl Service {
    pub fn list_users(&self, caller: &Caller) -> Result<Vec<UserResponse>, EngineError> {
        let engine = self.own_company(caller, Role::Admin)?;
        Ok(engine
            .list_users()
            .into_iter()
            .map(|u| UserResponse::new(&engine, u))
            .collect())
    }

    pub fn get_user(&self, caller: &Caller, user_id: Ulid) -> Result<UserResponse, EngineError> {
        let engine = self.own_company(caller, Role::Admin)?;
        let user = engine
            .get_user(&user_id)
            .ok_or_else(|| EngineError::not_found(Entity::User, user_id))?;
        Ok(UserResponse::new(&engine, user))
    }

    /// Promote or demote a user between USER and MANAGER. ADMIN can't be
    /// granted, and an ADMIN's own role can't be changed here.
    pub async fn edit_user_role(
        &self,
        caller: &Caller,
        user_id: Ulid,
        req: EditRole,
    ) -> Result<UserResponse, EngineError> {
        let engine = self.own_company(caller, Role::Admin)?;
        if req.role == Role::Admin {
            return Err(EngineError::validation("the ADMIN role cannot be granted"));
        }
        let target = engine
            .get_user(&user_id)
            .ok_or_else(|| EngineError::not_found(Entity::User, user_id))?;
        if target.role == Role::Admin {
            return Err(EngineError::validation("an ADMIN's role cannot be changed"));
        }
        let user = engine.change_role(user_id, req.role).await?;
        info!("{} set role of {} to {}", caller.user_id, user.id, user.role);
        Ok(UserResponse::new(&engine, user))
    }
}
