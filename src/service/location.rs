use serde::{Deserialize, Serialize};
use tracing::info;
use ulid::Ulid;

use super::Service;
use crate::engine::{Engine, EngineError};
use crate::guard::Caller;
use crate::model::{Location, LocationKind, Role};

/// Body of box, multibox and meeting-room create and update.
#[derive(Debug, Deserialize)]
pub struct LocationInput {
    pub name: String,
    #[serde(default)]
    pub x: String,
    #[serde(default)]
    pub y: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupant {
    pub user_id: Ulid,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResponse {
    pub location_id: Ulid,
    pub kind: LocationKind,
    pub name: String,
    pub x: String,
    pub y: String,
    pub space_id: Ulid,
    pub occupants: Vec<Occupant>,
}

impl LocationResponse {
    pub(super) fn new(engine: &Engine, location: Location) -> Self {
        let occupants = engine
            .occupants(&location.id)
            .into_iter()
            .map(|u| Occupant { user_id: u.id, username: u.username })
            .collect();
        Self {
            location_id: location.id,
            kind: location.kind,
            name: location.name,
            x: location.x,
            y: location.y,
            space_id: location.space_id,
            occupants,
        }
    }
}

impl Service {
    pub async fn create_location(
        &self,
        caller: &Caller,
        company: &str,
        space_id: Ulid,
        kind: LocationKind,
        req: LocationInput,
    ) -> Result<LocationResponse, EngineError> {
        let engine = self.scope(caller, company, Role::Manager)?;
        let location = engine
            .create_location(Ulid::new(), space_id, kind, req.name, req.x, req.y)
            .await?;
        info!("{} {} created in {company}", kind.label(), location.id);
        Ok(LocationResponse::new(&engine, location))
    }

    /// Rename or move a location of `kind`; other kinds are not found.
    pub async fn update_location(
        &self,
        caller: &Caller,
        company: &str,
        location_id: Ulid,
        kind: LocationKind,
        req: LocationInput,
    ) -> Result<LocationResponse, EngineError> {
        let engine = self.scope(caller, company, Role::Manager)?;
        let location = engine
            .update_location(location_id, kind, req.name, req.x, req.y)
            .await?;
        Ok(LocationResponse::new(&engine, location))
    }

    /// Delete a location of `kind` with its reservations and seats.
    pub async fn delete_location(
        &self,
        caller: &Caller,
        company: &str,
        location_id: Ulid,
        kind: LocationKind,
    ) -> Result<usize, EngineError> {
        let engine = self.scope(caller, company, Role::Manager)?;
        let removed = engine.delete_location(location_id, kind).await?;
        info!("{} {location_id} deleted in {company}, {removed} reservations removed", kind.label());
        Ok(removed)
    }

    pub async fn list_meeting_rooms(&self, caller: &Caller, company: &str) -> Result<Vec<LocationResponse>, EngineError> {
        let engine = self.scope(caller, company, Role::User)?;
        Ok(engine
            .list_locations(LocationKind::MeetingRoom)
            .await
            .into_iter()
            .map(|l| LocationResponse::new(&engine, l))
            .collect())
    }

    /// Seat the caller at a box or multibox, leaving any previous seat.
    pub async fn move_user(
        &self,
        caller: &Caller,
        company: &str,
        location_id: Ulid,
    ) -> Result<LocationResponse, EngineError> {
        let engine = self.scope(caller, company, Role::User)?;
        let location = engine.seat_user(caller.user_id, location_id).await?;
        info!("user {} moved to {} {location_id}", caller.user_id, location.kind.label());
        Ok(LocationResponse::new(&engine, location))
    }
}
