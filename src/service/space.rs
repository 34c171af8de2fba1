use serde::{Deserialize, Serialize};
use tracing::info;
use ulid::Ulid;

use super::{LocationResponse, Service};
use crate::engine::{Engine, EngineError, Entity};
use crate::guard::Caller;
use crate::model::{LocationKind, Role, Space};

/// Body of space create and update. Updates replace both fields; an absent
/// `floorId` leaves the space outside any floor.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceInput {
    pub name: String,
    #[serde(default)]
    pub floor_id: Option<Ulid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceResponse {
    pub space_id: Ulid,
    pub name: String,
    pub floor_id: Option<Ulid>,
    pub floor_name: Option<String>,
}

impl SpaceResponse {
    pub(super) fn new(engine: &Engine, space: Space) -> Self {
        let floor_name = space
            .floor_id
            .and_then(|f| engine.get_floor(&f))
            .map(|f| f.name);
        Self {
            space_id: space.id,
            name: space.name,
            floor_id: space.floor_id,
            floor_name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceDetail {
    #[serde(flatten)]
    pub space: SpaceResponse,
    pub meeting_rooms: Vec<LocationResponse>,
    pub boxes: Vec<LocationResponse>,
    pub multi_boxes: Vec<LocationResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceDeleted {
    pub space_id: Ulid,
    pub reservations_removed: usize,
}

impl Service {
    pub async fn create_space(
        &self,
        caller: &Caller,
        company: &str,
        req: SpaceInput,
    ) -> Result<SpaceResponse, EngineError> {
        let engine = self.scope(caller, company, Role::Manager)?;
        let space = engine.create_space(Ulid::new(), req.name, req.floor_id).await?;
        info!("space {} created in {company}", space.id);
        Ok(SpaceResponse::new(&engine, space))
    }

    pub fn list_spaces(&self, caller: &Caller, company: &str) -> Result<Vec<SpaceResponse>, EngineError> {
        let engine = self.scope(caller, company, Role::User)?;
        Ok(engine
            .list_spaces()
            .into_iter()
            .map(|s| SpaceResponse::new(&engine, s))
            .collect())
    }

    /// A space with its meeting rooms, boxes and multiboxes and who sits where.
    pub async fn get_space(&self, caller: &Caller, company: &str, space_id: Ulid) -> Result<SpaceDetail, EngineError> {
        let engine = self.scope(caller, company, Role::User)?;
        let space = engine
            .get_space(&space_id)
            .ok_or_else(|| EngineError::not_found(Entity::Space, space_id))?;

        let mut detail = SpaceDetail {
            space: SpaceResponse::new(&engine, space),
            meeting_rooms: Vec::new(),
            boxes: Vec::new(),
            multi_boxes: Vec::new(),
        };
        for location in engine.locations_in_space(&space_id).await {
            let kind = location.kind;
            let response = LocationResponse::new(&engine, location);
            match kind {
                LocationKind::MeetingRoom => detail.meeting_rooms.push(response),
                LocationKind::Box => detail.boxes.push(response),
                LocationKind::MultiBox => detail.multi_boxes.push(response),
            }
        }
        Ok(detail)
    }

    pub async fn update_space(
        &self,
        caller: &Caller,
        company: &str,
        space_id: Ulid,
        req: SpaceInput,
    ) -> Result<SpaceResponse, EngineError> {
        let engine = self.scope(caller, company, Role::Manager)?;
        let space = engine.update_space(space_id, req.name, req.floor_id).await?;
        Ok(SpaceResponse::new(&engine, space))
    }

    /// Delete a space and everything in it, reservations included.
    pub async fn delete_space(
        &self,
        caller: &Caller,
        company: &str,
        space_id: Ulid,
    ) -> Result<SpaceDeleted, EngineError> {
        let engine = self.scope(caller, company, Role::Manager)?;
        let reservations_removed = engine.delete_space(space_id).await?;
        info!("space {space_id} deleted in {company}, {reservations_removed} reservations removed");
        Ok(SpaceDeleted { space_id, reservations_removed })
    }
}
