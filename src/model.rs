use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Wall-clock milliseconds. The only time type inside the store.
pub type Ms = i64;

pub const HOUR_MS: Ms = 3_600_000;
pub const DAY_MS: Ms = 24 * HOUR_MS;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Caller roles. Declaration order is the privilege order: `User < Manager < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Manager => "MANAGER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a location inside a space is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationKind {
    /// Reservable by the hour.
    MeetingRoom,
    /// Single desk, seats one user.
    Box,
    /// Shared desk cluster, seats any number of users.
    MultiBox,
}

impl LocationKind {
    pub fn label(&self) -> &'static str {
        match self {
            LocationKind::MeetingRoom => "meeting room",
            LocationKind::Box => "box",
            LocationKind::MultiBox => "multibox",
        }
    }

    pub fn is_seat(&self) -> bool {
        matches!(self, LocationKind::Box | LocationKind::MultiBox)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: Ulid,
    pub name: String,
    pub certification: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Ulid,
    pub email: String,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Floor {
    pub id: Ulid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Space {
    pub id: Ulid,
    pub name: String,
    pub floor_id: Option<Ulid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub id: Ulid,
    pub space_id: Ulid,
    pub kind: LocationKind,
    pub name: String,
    pub x: String,
    pub y: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub id: Ulid,
    pub location_id: Ulid,
    pub user_id: Ulid,
    pub span: Span,
}

/// Personal calendar entry, visible to its owner only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub id: Ulid,
    pub user_id: Ulid,
    pub title: String,
    pub comment: String,
    pub span: Span,
}

/// A location plus the reservations it owns. Guarded by one lock per location;
/// holding the write lock is what makes a booking check-then-insert atomic.
#[derive(Debug, Clone)]
pub struct LocationState {
    pub location: Location,
    /// Sorted by `span.start`.
    pub reservations: Vec<Reservation>,
    /// Set once the location is deleted. Writers that raced the deletion see it
    /// after acquiring the lock.
    pub retired: bool,
}

impl LocationState {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            reservations: Vec::new(),
            retired: false,
        }
    }

    /// Insert reservation maintaining sort order by span.start.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.span.start, |r| r.span.start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    pub fn remove_reservation(&mut self, id: Ulid) -> Option<Reservation> {
        let pos = self.reservations.iter().position(|r| r.id == id)?;
        Some(self.reservations.remove(pos))
    }

    /// Return only reservations whose span overlaps the query window.
    /// Uses binary search to skip reservations starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.span.start < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.span.end > query.start)
    }
}

/// Journal record format: flat, one variant per state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    CompanyRegistered {
        id: Ulid,
        name: String,
        certification: String,
    },
    UserRegistered {
        id: Ulid,
        email: String,
        username: String,
        role: Role,
    },
    UserRoleChanged {
        id: Ulid,
        role: Role,
    },
    FloorCreated {
        id: Ulid,
        name: String,
    },
    FloorRenamed {
        id: Ulid,
        name: String,
    },
    FloorDeleted {
        id: Ulid,
    },
    SpaceCreated {
        id: Ulid,
        name: String,
        floor_id: Option<Ulid>,
    },
    SpaceUpdated {
        id: Ulid,
        name: String,
        floor_id: Option<Ulid>,
    },
    SpaceDeleted {
        id: Ulid,
    },
    LocationCreated {
        id: Ulid,
        space_id: Ulid,
        kind: LocationKind,
        name: String,
        x: String,
        y: String,
    },
    LocationUpdated {
        id: Ulid,
        name: String,
        x: String,
        y: String,
    },
    LocationDeleted {
        id: Ulid,
    },
    UserSeated {
        user_id: Ulid,
        location_id: Ulid,
    },
    ReservationConfirmed {
        id: Ulid,
        location_id: Ulid,
        user_id: Ulid,
        span: Span,
    },
    /// A batch booking: every slot lands or none does.
    ReservationsConfirmed {
        location_id: Ulid,
        user_id: Ulid,
        slots: Vec<(Ulid, Span)>,
    },
    ReservationRescheduled {
        id: Ulid,
        location_id: Ulid,
        span: Span,
    },
    ReservationCancelled {
        id: Ulid,
        location_id: Ulid,
    },
    ScheduleCreated {
        id: Ulid,
        user_id: Ulid,
        title: String,
        comment: String,
        span: Span,
    },
    ScheduleUpdated {
        id: Ulid,
        title: String,
        comment: String,
        span: Span,
    },
    ScheduleDeleted {
        id: Ulid,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Location {
        Location {
            id: Ulid::new(),
            space_id: Ulid::new(),
            kind: LocationKind::MeetingRoom,
            name: "Room".into(),
            x: "0".into(),
            y: "0".into(),
        }
    }

    fn reservation(start: Ms, end: Ms) -> Reservation {
        Reservation {
            id: Ulid::new(),
            location_id: Ulid::new(),
            user_id: Ulid::new(),
            span: Span::new(start, end),
        }
    }

    #[test]
    fn span_overlap() {
        let a = Span::new(100, 200);
        let b = Span::new(150, 250);
        let c = Span::new(200, 300);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
        assert_eq!(a.duration_ms(), 100);
    }

    #[test]
    fn role_total_order() {
        assert!(Role::Admin > Role::Manager);
        assert!(Role::Manager > Role::User);
        assert!(Role::Admin > Role::User);
        let mut roles = vec![Role::Admin, Role::User, Role::Manager];
        roles.sort();
        assert_eq!(roles, vec![Role::User, Role::Manager, Role::Admin]);
    }

    #[test]
    fn role_display() {
        assert_eq!(Role::User.to_string(), "USER");
        assert_eq!(Role::Admin.to_string(), "ADMIN");
    }

    #[test]
    fn role_serde_uses_uppercase_names() {
        let json = serde_json::to_string(&Role::Manager).unwrap();
        assert_eq!(json, "\"MANAGER\"");
        let back: Role = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(back, Role::Admin);
    }

    #[test]
    fn reservations_kept_sorted() {
        let mut ls = LocationState::new(room());
        ls.insert_reservation(reservation(300, 400));
        ls.insert_reservation(reservation(100, 200));
        ls.insert_reservation(reservation(200, 300));
        let starts: Vec<Ms> = ls.reservations.iter().map(|r| r.span.start).collect();
        assert_eq!(starts, vec![100, 200, 300]);
    }

    #[test]
    fn remove_middle_preserves_order() {
        let mut ls = LocationState::new(room());
        let rs: Vec<Reservation> = (0..3).map(|i| reservation(i * 100, i * 100 + 50)).collect();
        for r in &rs {
            ls.insert_reservation(r.clone());
        }
        assert!(ls.remove_reservation(rs[1].id).is_some());
        assert!(ls.remove_reservation(Ulid::new()).is_none());
        assert_eq!(ls.reservations.len(), 2);
        assert_eq!(ls.reservations[0].id, rs[0].id);
        assert_eq!(ls.reservations[1].id, rs[2].id);
    }

    #[test]
    fn overlapping_skips_past_and_future() {
        let mut ls = LocationState::new(room());
        ls.insert_reservation(reservation(100, 200));
        ls.insert_reservation(reservation(450, 600));
        ls.insert_reservation(reservation(1000, 1100));

        let hits: Vec<_> = ls.overlapping(&Span::new(500, 800)).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].span, Span::new(450, 600));
    }

    #[test]
    fn overlapping_adjacent_not_included() {
        let mut ls = LocationState::new(room());
        ls.insert_reservation(reservation(100, 200));
        assert_eq!(ls.overlapping(&Span::new(200, 300)).count(), 0);
        assert_eq!(ls.overlapping(&Span::new(0, 100)).count(), 0);
        assert_eq!(ls.overlapping(&Span::new(199, 300)).count(), 1);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::LocationCreated {
            id: Ulid::new(),
            space_id: Ulid::new(),
            kind: LocationKind::MultiBox,
            name: "Hot desks".into(),
            x: "12".into(),
            y: "40".into(),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
