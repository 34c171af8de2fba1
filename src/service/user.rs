use serde::{Deserialize, Serialize};
use tracing::info;
use ulid::Ulid;

use super::Service;
use crate::engine::{Engine, EngineError, Entity};
use crate::guard::Caller;
use crate::model::{Role, User};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupAdmin {
    pub company_name: String,
    pub certification: String,
    pub email: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupUser {
    pub certification: String,
    pub email: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user_id: Ulid,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub company_id: Ulid,
    pub company_name: String,
    /// Box or multibox the user sits at.
    pub location_id: Option<Ulid>,
}

impl UserResponse {
    pub(super) fn new(engine: &Engine, user: User) -> Self {
        let company = engine.company();
        Self {
            location_id: engine.seat_of(&user.id),
            user_id: user.id,
            email: user.email,
            username: user.username,
            role: user.role,
            company_id: company.id,
            company_name: company.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificationMatch {
    pub company_name: String,
}

impl Service {
    /// Register a company and its first ADMIN.
    pub async fn signup_admin(&self, req: SignupAdmin) -> Result<UserResponse, EngineError> {
        let (engine, admin) = self
            .tenants
            .register_company(req.company_name, req.certification, req.email, req.username)
            .await?;
        info!("admin {} signed up for {}", admin.id, engine.company().name);
        Ok(UserResponse::new(&engine, admin))
    }

    /// Join the company owning the certification code as a USER.
    pub async fn signup_user(&self, req: SignupUser) -> Result<UserResponse, EngineError> {
        let (engine, user) = self
            .tenants
            .join_company(&req.certification, req.email, req.username)
            .await?;
        info!("user {} joined {}", user.id, engine.company().name);
        Ok(UserResponse::new(&engine, user))
    }

    pub fn check_certification(&self, code: &str) -> Result<CertificationMatch, EngineError> {
        let engine = self
            .tenants
            .by_certification(code)
            .ok_or_else(|| EngineError::not_found(Entity::Company, "certification code"))?;
        Ok(CertificationMatch { company_name: engine.company().name.clone() })
    }

    pub fn me(&self, caller: &Caller) -> Result<UserResponse, EngineError> {
        let engine = self.own_company(caller, Role::User)?;
        let user = engine
            .get_user(&caller.user_id)
            .ok_or_else(|| EngineError::not_found(Entity::User, caller.user_id))?;
        Ok(UserResponse::new(&engine, user))
    }
}
