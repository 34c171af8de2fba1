use tokio::sync::oneshot;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_batch_disjoint, check_no_conflict, validate_span};
use super::timetable::SLOT_MS;
use super::{Engine, EngineError, Entity, WalCommand};

pub(crate) fn check_email(email: &str) -> Result<(), EngineError> {
    if email.is_empty() || email.len() > MAX_EMAIL_LEN || !email.contains('@') {
        return Err(EngineError::validation("invalid email"));
    }
    Ok(())
}

pub(crate) fn check_name(name: &str, what: &str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::validation(format!("{what} name must not be empty")));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::validation(format!("{what} name too long")));
    }
    Ok(())
}

fn check_coordinates(x: &str, y: &str) -> Result<(), EngineError> {
    if x.len() > MAX_COORDINATE_LEN || y.len() > MAX_COORDINATE_LEN {
        return Err(EngineError::validation("coordinate too long"));
    }
    Ok(())
}

fn check_schedule_text(title: &str, comment: &str) -> Result<(), EngineError> {
    check_name(title, "schedule")?;
    if comment.len() > MAX_COMMENT_LEN {
        return Err(EngineError::validation("schedule comment too long"));
    }
    Ok(())
}

impl Engine {
    // ── Users ────────────────────────────────────────────────

    pub async fn register_user(
        &self,
        id: Ulid,
        email: String,
        username: String,
        role: Role,
    ) -> Result<User, EngineError> {
        check_email(&email)?;
        check_name(&username, "user")?;
        let _catalog = self.catalog.lock().await;
        if self.users.len() >= MAX_USERS_PER_COMPANY {
            return Err(EngineError::validation("too many users"));
        }
        if self.users.iter().any(|u| u.email == email) {
            return Err(EngineError::AlreadyExists(email));
        }

        let event = Event::UserRegistered { id, email: email.clone(), username: username.clone(), role };
        self.persist_catalog(&event).await?;
        Ok(User { id, email, username, role })
    }

    pub async fn change_role(&self, id: Ulid, role: Role) -> Result<User, EngineError> {
        let _catalog = self.catalog.lock().await;
        let mut user = self
            .get_user(&id)
            .ok_or_else(|| EngineError::not_found(Entity::User, id))?;
        if user.role != role {
            self.persist_catalog(&Event::UserRoleChanged { id, role }).await?;
            user.role = role;
        }
        Ok(user)
    }

    // ── Floors ───────────────────────────────────────────────

    pub async fn create_floor(&self, id: Ulid, name: String) -> Result<Floor, EngineError> {
        check_name(&name, "floor")?;
        let _catalog = self.catalog.lock().await;
        if self.floors.len() >= MAX_FLOORS_PER_COMPANY {
            return Err(EngineError::validation("too many floors"));
        }
        self.persist_catalog(&Event::FloorCreated { id, name: name.clone() }).await?;
        Ok(Floor { id, name })
    }

    pub async fn rename_floor(&self, id: Ulid, name: String) -> Result<Floor, EngineError> {
        check_name(&name, "floor")?;
        let _catalog = self.catalog.lock().await;
        if !self.floors.contains_key(&id) {
            return Err(EngineError::not_found(Entity::Floor, id));
        }
        self.persist_catalog(&Event::FloorRenamed { id, name: name.clone() }).await?;
        Ok(Floor { id, name })
    }

    /// Delete a floor. Its spaces survive, detached from any floor; returns
    /// how many were detached.
    pub async fn delete_floor(&self, id: Ulid) -> Result<usize, EngineError> {
        let _catalog = self.catalog.lock().await;
        if !self.floors.contains_key(&id) {
            return Err(EngineError::not_found(Entity::Floor, id));
        }
        let detached = self
            .spaces
            .iter()
            .filter(|s| s.floor_id == Some(id))
            .count();
        self.persist_catalog(&Event::FloorDeleted { id }).await?;
        Ok(detached)
    }

    // ── Spaces ───────────────────────────────────────────────

    pub async fn create_space(
        &self,
        id: Ulid,
        name: String,
        floor_id: Option<Ulid>,
    ) -> Result<Space, EngineError> {
        check_name(&name, "space")?;
        let _catalog = self.catalog.lock().await;
        if self.spaces.len() >= MAX_SPACES_PER_COMPANY {
            return Err(EngineError::validation("too many spaces"));
        }
        if let Some(fid) = floor_id
            && !self.floors.contains_key(&fid)
        {
            return Err(EngineError::not_found(Entity::Floor, fid));
        }
        let event = Event::SpaceCreated { id, name: name.clone(), floor_id };
        self.persist_catalog(&event).await?;
        Ok(Space { id, name, floor_id })
    }

    pub async fn update_space(
        &self,
        id: Ulid,
        name: String,
        floor_id: Option<Ulid>,
    ) -> Result<Space, EngineError> {
        check_name(&name, "space")?;
        let _catalog = self.catalog.lock().await;
        if !self.spaces.contains_key(&id) {
            return Err(EngineError::not_found(Entity::Space, id));
        }
        if let Some(fid) = floor_id
            && !self.floors.contains_key(&fid)
        {
            return Err(EngineError::not_found(Entity::Floor, fid));
        }
        let event = Event::SpaceUpdated { id, name: name.clone(), floor_id };
        self.persist_catalog(&event).await?;
        Ok(Space { id, name, floor_id })
    }

    /// Delete a space with every location in it, their reservations and
    /// seats. Returns the number of reservations removed.
    pub async fn delete_space(&self, id: Ulid) -> Result<usize, EngineError> {
        let _catalog = self.catalog.lock().await;
        if !self.spaces.contains_key(&id) {
            return Err(EngineError::not_found(Entity::Space, id));
        }

        // Bookings only ever hold one location lock, so acquisition order is free.
        let mut guards = Vec::new();
        for location_id in self.space_location_ids(&id) {
            if let Some(ls) = self.get_location_state(&location_id) {
                guards.push(ls.write_owned().await);
            }
        }

        let event = Event::SpaceDeleted { id };
        self.wal_append(&event).await?;
        let mut removed = 0;
        for guard in &mut guards {
            removed += self.remove_location(guard);
        }
        self.apply_catalog(&event);
        Ok(removed)
    }

    // ── Locations ────────────────────────────────────────────

    pub async fn create_location(
        &self,
        id: Ulid,
        space_id: Ulid,
        kind: LocationKind,
        name: String,
        x: String,
        y: String,
    ) -> Result<Location, EngineError> {
        check_name(&name, kind.label())?;
        check_coordinates(&x, &y)?;
        let _catalog = self.catalog.lock().await;
        if self.locations.len() >= MAX_LOCATIONS_PER_COMPANY {
            return Err(EngineError::validation("too many locations"));
        }
        if !self.spaces.contains_key(&space_id) {
            return Err(EngineError::not_found(Entity::Space, space_id));
        }
        let event = Event::LocationCreated {
            id,
            space_id,
            kind,
            name: name.clone(),
            x: x.clone(),
            y: y.clone(),
        };
        self.persist_catalog(&event).await?;
        Ok(Location { id, space_id, kind, name, x, y })
    }

    /// Rename or move a location. A location of another kind is reported as
    /// not found under `kind`.
    pub async fn update_location(
        &self,
        id: Ulid,
        kind: LocationKind,
        name: String,
        x: String,
        y: String,
    ) -> Result<Location, EngineError> {
        check_name(&name, kind.label())?;
        check_coordinates(&x, &y)?;
        let mut guard = self
            .lock_location(id)
            .await
            .map_err(|_| EngineError::not_found(Entity::from(kind), id))?;
        if guard.location.kind != kind {
            return Err(EngineError::not_found(Entity::from(kind), id));
        }
        let event = Event::LocationUpdated { id, name, x, y };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(guard.location.clone())
    }

    /// Delete a location, its reservations and seats. Returns the number of
    /// reservations removed.
    pub async fn delete_location(&self, id: Ulid, kind: LocationKind) -> Result<usize, EngineError> {
        let _catalog = self.catalog.lock().await;
        let mut guard = self
            .lock_location(id)
            .await
            .map_err(|_| EngineError::not_found(Entity::from(kind), id))?;
        if guard.location.kind != kind {
            return Err(EngineError::not_found(Entity::from(kind), id));
        }
        self.wal_append(&Event::LocationDeleted { id }).await?;
        Ok(self.remove_location(&mut guard))
    }

    // ── Seating ──────────────────────────────────────────────

    /// Seat a user at a box or multibox, releasing any previous seat.
    pub async fn seat_user(&self, user_id: Ulid, location_id: Ulid) -> Result<Location, EngineError> {
        let _catalog = self.catalog.lock().await;
        if !self.users.contains_key(&user_id) {
            return Err(EngineError::not_found(Entity::User, user_id));
        }
        let ls = self
            .get_location_state(&location_id)
            .ok_or_else(|| EngineError::not_found(Entity::Location, location_id))?;
        let guard = ls.read().await;
        if guard.retired {
            return Err(EngineError::not_found(Entity::Location, location_id));
        }
        let location = guard.location.clone();
        drop(guard);

        if !location.kind.is_seat() {
            return Err(EngineError::validation(format!(
                "cannot sit at a {}",
                location.kind.label()
            )));
        }
        if self.seat_of(&user_id) == Some(location_id) {
            return Ok(location);
        }
        if location.kind == LocationKind::Box && !self.occupant_ids(&location_id).is_empty() {
            return Err(EngineError::Conflict(location_id));
        }

        self.persist_catalog(&Event::UserSeated { user_id, location_id }).await?;
        Ok(location)
    }

    // ── Reservations ─────────────────────────────────────────

    pub async fn confirm_reservation(
        &self,
        id: Ulid,
        location_id: Ulid,
        user_id: Ulid,
        start: Ms,
        end: Ms,
    ) -> Result<Reservation, EngineError> {
        let span = validate_span(start, end)?;
        if !self.users.contains_key(&user_id) {
            return Err(EngineError::not_found(Entity::User, user_id));
        }
        let mut guard = self.lock_meeting_room(location_id).await?;
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_LOCATION {
            return Err(EngineError::validation("too many reservations on room"));
        }

        check_no_conflict(&guard, &span, None)?;

        let event = Event::ReservationConfirmed { id, location_id, user_id, span };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(Reservation { id, location_id, user_id, span })
    }

    /// Book several one-slot reservations of one room. All-or-nothing: the
    /// batch is validated as a whole and journaled as one record.
    pub async fn batch_confirm_reservations(
        &self,
        location_id: Ulid,
        user_id: Ulid,
        slots: Vec<(Ulid, Ms)>,
    ) -> Result<Vec<Reservation>, EngineError> {
        if slots.is_empty() {
            return Err(EngineError::validation("no slots to reserve"));
        }
        if slots.len() > MAX_BATCH_SIZE {
            return Err(EngineError::validation("batch too large"));
        }
        let mut batch = Vec::with_capacity(slots.len());
        for (id, start) in slots {
            batch.push((id, validate_span(start, start + SLOT_MS)?));
        }
        check_batch_disjoint(&batch)?;
        if !self.users.contains_key(&user_id) {
            return Err(EngineError::not_found(Entity::User, user_id));
        }

        let mut guard = self.lock_meeting_room(location_id).await?;
        if guard.reservations.len() + batch.len() > MAX_RESERVATIONS_PER_LOCATION {
            return Err(EngineError::validation("too many reservations on room"));
        }

        for (_, span) in &batch {
            check_no_conflict(&guard, span, None)?;
        }

        let confirmed = batch
            .iter()
            .map(|&(id, span)| Reservation { id, location_id, user_id, span })
            .collect();
        let event = Event::ReservationsConfirmed { location_id, user_id, slots: batch };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(confirmed)
    }

    /// Move a reservation to a new span. `permit` sees the current
    /// reservation under the room lock and may reject the caller.
    pub async fn reschedule_reservation(
        &self,
        id: Ulid,
        start: Ms,
        end: Ms,
        permit: impl FnOnce(&Reservation) -> Result<(), EngineError>,
    ) -> Result<Reservation, EngineError> {
        let span = validate_span(start, end)?;
        let mut guard = self.resolve_reservation_write(id).await?;
        let current = guard
            .reservations
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(Entity::Reservation, id))?;
        permit(&current)?;

        check_no_conflict(&guard, &span, Some(id))?;

        let location_id = guard.location.id;
        let event = Event::ReservationRescheduled { id, location_id, span };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(Reservation { span, ..current })
    }

    pub async fn cancel_reservation(
        &self,
        id: Ulid,
        permit: impl FnOnce(&Reservation) -> Result<(), EngineError>,
    ) -> Result<Reservation, EngineError> {
        let mut guard = self.resolve_reservation_write(id).await?;
        let current = guard
            .reservations
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(Entity::Reservation, id))?;
        permit(&current)?;

        let location_id = guard.location.id;
        let event = Event::ReservationCancelled { id, location_id };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(current)
    }

    /// Write lock on a live meeting room. Other kinds report `Validation`.
    async fn lock_meeting_room(
        &self,
        location_id: Ulid,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<LocationState>, EngineError> {
        let guard = self
            .lock_location(location_id)
            .await
            .map_err(|_| EngineError::not_found(Entity::MeetingRoom, location_id))?;
        if guard.location.kind != LocationKind::MeetingRoom {
            return Err(EngineError::validation(format!(
                "a {} cannot be reserved",
                guard.location.kind.label()
            )));
        }
        Ok(guard)
    }

    // ── Schedules ────────────────────────────────────────────

    pub async fn create_schedule(
        &self,
        id: Ulid,
        user_id: Ulid,
        title: String,
        comment: String,
        start: Ms,
        end: Ms,
    ) -> Result<Schedule, EngineError> {
        let span = validate_span(start, end)?;
        check_schedule_text(&title, &comment)?;
        let _catalog = self.catalog.lock().await;
        if !self.users.contains_key(&user_id) {
            return Err(EngineError::not_found(Entity::User, user_id));
        }
        let owned = self.schedules.iter().filter(|s| s.user_id == user_id).count();
        if owned >= MAX_SCHEDULES_PER_USER {
            return Err(EngineError::validation("too many schedules"));
        }
        let event = Event::ScheduleCreated {
            id,
            user_id,
            title: title.clone(),
            comment: comment.clone(),
            span,
        };
        self.persist_catalog(&event).await?;
        Ok(Schedule { id, user_id, title, comment, span })
    }

    /// Replace a schedule's text and span. Other users' schedules are not found.
    pub async fn update_schedule(
        &self,
        id: Ulid,
        user_id: Ulid,
        title: String,
        comment: String,
        start: Ms,
        end: Ms,
    ) -> Result<Schedule, EngineError> {
        let span = validate_span(start, end)?;
        check_schedule_text(&title, &comment)?;
        let _catalog = self.catalog.lock().await;
        self.owned_schedule(id, user_id)?;
        let event = Event::ScheduleUpdated {
            id,
            title: title.clone(),
            comment: comment.clone(),
            span,
        };
        self.persist_catalog(&event).await?;
        Ok(Schedule { id, user_id, title, comment, span })
    }

    pub async fn delete_schedule(&self, id: Ulid, user_id: Ulid) -> Result<Schedule, EngineError> {
        let _catalog = self.catalog.lock().await;
        let schedule = self.owned_schedule(id, user_id)?;
        self.persist_catalog(&Event::ScheduleDeleted { id }).await?;
        Ok(schedule)
    }

    // ── Journal ──────────────────────────────────────────────

    /// Rewrite the journal with only the records needed to recreate the
    /// current state. Holds the catalog lock and every location read lock
    /// until the writer has swapped files, so no append can slip between
    /// the snapshot and the swap.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _catalog = self.catalog.lock().await;

        let company = self.company();
        let mut events = vec![Event::CompanyRegistered {
            id: company.id,
            name: company.name.clone(),
            certification: company.certification.clone(),
        }];

        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by_key(|u| u.id);
        events.extend(users.into_iter().map(|u| Event::UserRegistered {
            id: u.id,
            email: u.email,
            username: u.username,
            role: u.role,
        }));

        let mut floors: Vec<Floor> = self.floors.iter().map(|e| e.value().clone()).collect();
        floors.sort_by_key(|f| f.id);
        events.extend(floors.into_iter().map(|f| Event::FloorCreated { id: f.id, name: f.name }));

        let mut spaces: Vec<Space> = self.spaces.iter().map(|e| e.value().clone()).collect();
        spaces.sort_by_key(|s| s.id);
        events.extend(spaces.into_iter().map(|s| Event::SpaceCreated {
            id: s.id,
            name: s.name,
            floor_id: s.floor_id,
        }));

        let mut schedules: Vec<Schedule> = self.schedules.iter().map(|e| e.value().clone()).collect();
        schedules.sort_by_key(|s| s.id);
        events.extend(schedules.into_iter().map(|s| Event::ScheduleCreated {
            id: s.id,
            user_id: s.user_id,
            title: s.title,
            comment: s.comment,
            span: s.span,
        }));

        let mut location_ids: Vec<Ulid> = self.locations.iter().map(|e| *e.key()).collect();
        location_ids.sort();
        let mut guards = Vec::with_capacity(location_ids.len());
        for location_id in location_ids {
            let Some(ls) = self.get_location_state(&location_id) else {
                continue;
            };
            let guard = ls.read_owned().await;
            if guard.retired {
                continue;
            }
            let l = &guard.location;
            events.push(Event::LocationCreated {
                id: l.id,
                space_id: l.space_id,
                kind: l.kind,
                name: l.name.clone(),
                x: l.x.clone(),
                y: l.y.clone(),
            });
            for r in &guard.reservations {
                events.push(Event::ReservationConfirmed {
                    id: r.id,
                    location_id: r.location_id,
                    user_id: r.user_id,
                    span: r.span,
                });
            }
            guards.push(guard);
        }

        let mut seats: Vec<(Ulid, Ulid)> = self.seats.iter().map(|e| (*e.key(), *e.value())).collect();
        seats.sort();
        events.extend(
            seats
                .into_iter()
                .map(|(user_id, location_id)| Event::UserSeated { user_id, location_id }),
        );

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("journal writer shut down".into()))?;
        let result = rx
            .await
            .map_err(|_| EngineError::WalError("journal writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()));
        drop(guards);
        result
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
