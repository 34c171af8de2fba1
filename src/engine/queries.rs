use ulid::Ulid;

use crate::model::*;

use super::timetable::{free_windows, timetable, OperatingHours, Slot};
use super::{Engine, EngineError, Entity};

/// One day of a meeting room: the hourly table and the free stretches.
#[derive(Debug, Clone)]
pub struct RoomDay {
    pub room: Location,
    pub slots: Vec<Slot>,
    pub free: Vec<Span>,
}

/// One day of a user's schedules: the hourly table and the entries touching it.
#[derive(Debug, Clone)]
pub struct ScheduleDay {
    pub slots: Vec<Slot>,
    pub schedules: Vec<Schedule>,
}

impl Engine {
    // ── Users ────────────────────────────────────────────────

    pub fn get_user(&self, id: &Ulid) -> Option<User> {
        self.users.get(id).map(|e| e.value().clone())
    }

    pub fn list_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by_key(|u| u.id);
        users
    }

    // ── Floors & spaces ──────────────────────────────────────

    pub fn get_floor(&self, id: &Ulid) -> Option<Floor> {
        self.floors.get(id).map(|e| e.value().clone())
    }

    pub fn list_floors(&self) -> Vec<Floor> {
        let mut floors: Vec<Floor> = self.floors.iter().map(|e| e.value().clone()).collect();
        floors.sort_by_key(|f| f.id);
        floors
    }

    pub fn get_space(&self, id: &Ulid) -> Option<Space> {
        self.spaces.get(id).map(|e| e.value().clone())
    }

    pub fn list_spaces(&self) -> Vec<Space> {
        let mut spaces: Vec<Space> = self.spaces.iter().map(|e| e.value().clone()).collect();
        spaces.sort_by_key(|s| s.id);
        spaces
    }

    // ── Locations ────────────────────────────────────────────

    pub async fn get_location(&self, id: &Ulid) -> Option<Location> {
        let ls = self.get_location_state(id)?;
        let guard = ls.read().await;
        (!guard.retired).then(|| guard.location.clone())
    }

    /// Locations inside a space, ordered by id.
    pub async fn locations_in_space(&self, space_id: &Ulid) -> Vec<Location> {
        let mut ids = self.space_location_ids(space_id);
        ids.sort();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(location) = self.get_location(&id).await {
                out.push(location);
            }
        }
        out
    }

    /// Every location of one kind across the company, ordered by id.
    pub async fn list_locations(&self, kind: LocationKind) -> Vec<Location> {
        let mut ids: Vec<Ulid> = self.locations.iter().map(|e| *e.key()).collect();
        ids.sort();
        let mut out = Vec::new();
        for id in ids {
            if let Some(location) = self.get_location(&id).await
                && location.kind == kind
            {
                out.push(location);
            }
        }
        out
    }

    // ── Seating ──────────────────────────────────────────────

    pub fn seat_of(&self, user_id: &Ulid) -> Option<Ulid> {
        self.seats.get(user_id).map(|e| *e.value())
    }

    pub(super) fn occupant_ids(&self, location_id: &Ulid) -> Vec<Ulid> {
        let mut ids: Vec<Ulid> = self
            .seats
            .iter()
            .filter(|e| e.value() == location_id)
            .map(|e| *e.key())
            .collect();
        ids.sort();
        ids
    }

    /// Users currently seated at a location.
    pub fn occupants(&self, location_id: &Ulid) -> Vec<User> {
        self.occupant_ids(location_id)
            .iter()
            .filter_map(|id| self.get_user(id))
            .collect()
    }

    // ── Reservations ─────────────────────────────────────────

    pub async fn get_reservation(&self, id: &Ulid) -> Option<Reservation> {
        let location_id = *self.reservation_to_location.get(id)?.value();
        let ls = self.get_location_state(&location_id)?;
        let guard = ls.read().await;
        guard.reservations.iter().find(|r| r.id == *id).cloned()
    }

    /// Reservations of every meeting room, optionally only those of one
    /// user, ordered by start.
    pub async fn list_reservations(&self, user_id: Option<Ulid>) -> Vec<Reservation> {
        let states: Vec<_> = self.locations.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::new();
        for ls in states {
            let guard = ls.read().await;
            if guard.retired {
                continue;
            }
            out.extend(
                guard
                    .reservations
                    .iter()
                    .filter(|r| user_id.is_none_or(|u| r.user_id == u))
                    .cloned(),
            );
        }
        out.sort_by_key(|r| (r.span.start, r.id));
        out
    }

    // ── Schedules ────────────────────────────────────────────

    /// A schedule owned by `user_id`. Other users' schedules are not found.
    pub(super) fn owned_schedule(&self, id: Ulid, user_id: Ulid) -> Result<Schedule, EngineError> {
        self.schedules
            .get(&id)
            .filter(|s| s.user_id == user_id)
            .map(|s| s.value().clone())
            .ok_or_else(|| EngineError::not_found(Entity::Schedule, id))
    }

    pub fn get_schedule(&self, id: Ulid, user_id: Ulid) -> Result<Schedule, EngineError> {
        self.owned_schedule(id, user_id)
    }

    /// A user's schedules, ordered by start.
    pub fn list_schedules(&self, user_id: Ulid) -> Vec<Schedule> {
        let mut out: Vec<Schedule> = self
            .schedules
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.value().clone())
            .collect();
        out.sort_by_key(|s| (s.span.start, s.id));
        out
    }

    /// Hourly table of a user's day, busy where any schedule overlaps.
    pub fn schedule_day(&self, user_id: Ulid, day_start: Ms, hours: OperatingHours) -> ScheduleDay {
        let window = hours.window(day_start);
        let schedules: Vec<Schedule> = self
            .list_schedules(user_id)
            .into_iter()
            .filter(|s| s.span.overlaps(&window))
            .collect();
        let spans: Vec<Span> = schedules.iter().map(|s| s.span).collect();
        ScheduleDay {
            slots: timetable(day_start, hours, &spans),
            schedules,
        }
    }

    /// Hourly timetable of a meeting room for the day starting at `day_start`.
    pub async fn room_day(
        &self,
        room_id: Ulid,
        day_start: Ms,
        hours: OperatingHours,
    ) -> Result<RoomDay, EngineError> {
        let ls = self
            .get_location_state(&room_id)
            .ok_or_else(|| EngineError::not_found(Entity::MeetingRoom, room_id))?;
        let guard = ls.read().await;
        if guard.retired || guard.location.kind != LocationKind::MeetingRoom {
            return Err(EngineError::not_found(Entity::MeetingRoom, room_id));
        }

        let window = hours.window(day_start);
        let spans: Vec<Span> = guard.overlapping(&window).map(|r| r.span).collect();
        Ok(RoomDay {
            room: guard.location.clone(),
            slots: timetable(day_start, hours, &spans),
            free: free_windows(day_start, hours, &spans),
        })
    }
}
