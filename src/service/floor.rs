use serde::{Deserialize, Serialize};
use tracing::info;
use ulid::Ulid;

use super::{Service, SpaceResponse};
use crate::engine::{EngineError, Entity};
use crate::guard::Caller;
use crate::model::{Floor, Role};

#[derive(Debug, Deserialize)]
pub struct FloorInput {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorResponse {
    pub floor_id: Ulid,
    pub name: String,
}

impl From<Floor> for FloorResponse {
    fn from(f: Floor) -> Self {
        Self { floor_id: f.id, name: f.name }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorDetail {
    pub floor_id: Ulid,
    pub name: String,
    pub spaces: Vec<SpaceResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorDeleted {
    pub floor_id: Ulid,
    pub spaces_detached: usize,
}

impl Service {
    pub async fn create_floor(
        &self,
        caller: &Caller,
        company: &str,
        req: FloorInput,
    ) -> Result<FloorResponse, EngineError> {
        let engine = self.scope(caller, company, Role::Manager)?;
        let floor = engine.create_floor(Ulid::new(), req.name).await?;
        info!("floor {} created in {company}", floor.id);
        Ok(floor.into())
    }

    pub fn list_floors(&self, caller: &Caller, company: &str) -> Result<Vec<FloorResponse>, EngineError> {
        let engine = self.scope(caller, company, Role::User)?;
        Ok(engine.list_floors().into_iter().map(Into::into).collect())
    }

    pub fn get_floor(&self, caller: &Caller, company: &str, floor_id: Ulid) -> Result<FloorDetail, EngineError> {
        let engine = self.scope(caller, company, Role::User)?;
        let floor = engine
            .get_floor(&floor_id)
            .ok_or_else(|| EngineError::not_found(Entity::Floor, floor_id))?;
        let spaces = engine
            .list_spaces()
            .into_iter()
            .filter(|s| s.floor_id == Some(floor_id))
            .map(|s| SpaceResponse::new(&engine, s))
            .collect();
        Ok(FloorDetail { floor_id: floor.id, name: floor.name, spaces })
    }

    pub async fn rename_floor(
        &self,
        caller: &Caller,
        company: &str,
        floor_id: Ulid,
        req: FloorInput,
    ) -> Result<FloorResponse, EngineError> {
        let engine = self.scope(caller, company, Role::Manager)?;
        Ok(engine.rename_floor(floor_id, req.name).await?.into())
    }

    pub async fn delete_floor(
        &self,
        caller: &Caller,
        company: &str,
        floor_id: Ulid,
    ) -> Result<FloorDeleted, EngineError> {
        let engine = self.scope(caller, company, Role::Manager)?;
        let spaces_detached = engine.delete_floor(floor_id).await?;
        info!("floor {floor_id} deleted in {company}, {spaces_detached} spaces detached");
        Ok(FloorDeleted { floor_id, spaces_detached })
    }
}
