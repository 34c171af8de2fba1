use std::fmt;

use ulid::Ulid;

use crate::model::{LocationKind, Role};

/// Kind of entity a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Company,
    User,
    Floor,
    Space,
    MeetingRoom,
    Box,
    MultiBox,
    Location,
    Reservation,
    Schedule,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::Company => "company",
            Entity::User => "user",
            Entity::Floor => "floor",
            Entity::Space => "space",
            Entity::MeetingRoom => "meeting room",
            Entity::Box => "box",
            Entity::MultiBox => "multibox",
            Entity::Location => "location",
            Entity::Reservation => "reservation",
            Entity::Schedule => "schedule",
        })
    }
}

impl From<LocationKind> for Entity {
    fn from(kind: LocationKind) -> Self {
        match kind {
            LocationKind::MeetingRoom => Entity::MeetingRoom,
            LocationKind::Box => Entity::Box,
            LocationKind::MultiBox => Entity::MultiBox,
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    NotFound(Entity, String),
    PermissionDenied { required: Role, actual: Role },
    TenantMismatch,
    Validation(String),
    /// Overlapping reservation (its id) or an occupied seat.
    Conflict(Ulid),
    AlreadyExists(String),
    WalError(String),
}

impl EngineError {
    pub fn not_found(entity: Entity, key: impl fmt::Display) -> Self {
        EngineError::NotFound(entity, key.to_string())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    /// HTTP status this rejection is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::NotFound(..) => 404,
            EngineError::PermissionDenied { .. } | EngineError::TenantMismatch => 403,
            EngineError::Validation(_) => 400,
            EngineError::Conflict(_) | EngineError::AlreadyExists(_) => 409,
            EngineError::WalError(_) => 500,
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotFound(..) => "not_found",
            EngineError::PermissionDenied { .. } => "permission",
            EngineError::TenantMismatch => "tenant_mismatch",
            EngineError::Validation(_) => "validation",
            EngineError::Conflict(_) => "conflict",
            EngineError::AlreadyExists(_) => "already_exists",
            EngineError::WalError(_) => "journal",
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotFound(entity, key) => write!(f, "{entity} not found: {key}"),
            EngineError::PermissionDenied { required, actual } => {
                write!(f, "permission denied: requires {required}, caller is {actual}")
            }
            EngineError::TenantMismatch => write!(f, "resource belongs to another company"),
            EngineError::Validation(msg) => write!(f, "invalid request: {msg}"),
            EngineError::Conflict(id) => write!(f, "conflicts with existing entry: {id}"),
            EngineError::AlreadyExists(what) => write!(f, "already exists: {what}"),
            EngineError::WalError(e) => write!(f, "journal error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
