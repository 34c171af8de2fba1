mod conflict;
mod error;
mod mutations;
mod queries;
mod timetable;

pub use error::{EngineError, Entity};
pub(crate) use mutations::{check_email, check_name};
pub use queries::{RoomDay, ScheduleDay};
pub use timetable::{
    free_windows, merge_overlapping, subtract_intervals, timetable, OperatingHours, Slot, SLOT_MS,
};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

pub type SharedLocationState = Arc<RwLock<LocationState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the journal and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            commit_batch(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                if !batch.is_empty() {
                    commit_batch(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let results = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for ((_, tx), result) in batch.drain(..).zip(results) {
        let _ = tx.send(result);
    }
}

/// Stage and sync one batch, yielding one result per event. A record that
/// cannot be framed fails alone; any write or sync error fails every staged
/// record and leaves the journal at its last synced length.
fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> Vec<io::Result<()>> {
    let mut results: Vec<Option<io::Error>> = Vec::with_capacity(batch.len());
    for (event, _) in batch {
        match wal.append_buffered(event) {
            Ok(()) => results.push(None),
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => results.push(Some(e)),
            Err(e) => {
                wal.discard_pending();
                return batch.iter().map(|_| Err(io::Error::new(e.kind(), e.to_string()))).collect();
            }
        }
    }
    let synced = wal.flush_sync();
    results
        .into_iter()
        .map(|rejected| match (rejected, &synced) {
            (Some(e), _) => Err(e),
            (None, Ok(())) => Ok(()),
            (None, Err(e)) => Err(io::Error::new(e.kind(), e.to_string())),
        })
        .collect()
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = wal
                .write_compact_file(&events)
                .and_then(|len| wal.swap_compact_file(len));
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The entity store of one company. Every mutation is validated, appended to
/// the company journal and only then applied in memory.
#[derive(Debug)]
pub struct Engine {
    company: Company,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub(super) users: DashMap<Ulid, User>,
    pub(super) floors: DashMap<Ulid, Floor>,
    pub(super) spaces: DashMap<Ulid, Space>,
    pub(super) locations: DashMap<Ulid, SharedLocationState>,
    /// Space → locations index.
    pub(super) space_locations: DashMap<Ulid, Vec<Ulid>>,
    /// Reverse lookup: reservation id → location id.
    pub(super) reservation_to_location: DashMap<Ulid, Ulid>,
    /// User id → the box or multibox the user sits at.
    pub(super) seats: DashMap<Ulid, Ulid>,
    pub(super) schedules: DashMap<Ulid, Schedule>,
    /// Serializes catalog mutations (users, floors, spaces, locations, seats,
    /// schedules).
    /// Lock order: catalog before any location lock.
    pub(super) catalog: Mutex<()>,
}

/// Apply a reservation-level event to a location (caller holds its lock).
fn apply_to_location(ls: &mut LocationState, event: &Event, index: &DashMap<Ulid, Ulid>) {
    match event {
        Event::ReservationConfirmed {
            id,
            location_id,
            user_id,
            span,
        } => {
            ls.insert_reservation(Reservation {
                id: *id,
                location_id: *location_id,
                user_id: *user_id,
                span: *span,
            });
            index.insert(*id, *location_id);
        }
        Event::ReservationsConfirmed { location_id, user_id, slots } => {
            for (id, span) in slots {
                ls.insert_reservation(Reservation {
                    id: *id,
                    location_id: *location_id,
                    user_id: *user_id,
                    span: *span,
                });
                index.insert(*id, *location_id);
            }
        }
        Event::ReservationRescheduled { id, span, .. } => {
            if let Some(mut r) = ls.remove_reservation(*id) {
                r.span = *span;
                ls.insert_reservation(r);
            }
        }
        Event::ReservationCancelled { id, .. } => {
            ls.remove_reservation(*id);
            index.remove(id);
        }
        Event::LocationUpdated { name, x, y, .. } => {
            ls.location.name = name.clone();
            ls.location.x = x.clone();
            ls.location.y = y.clone();
        }
        _ => {}
    }
}

/// Location id a location-level event targets.
fn event_location_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::ReservationConfirmed { location_id, .. }
        | Event::ReservationsConfirmed { location_id, .. }
        | Event::ReservationRescheduled { location_id, .. }
        | Event::ReservationCancelled { location_id, .. } => Some(*location_id),
        Event::LocationUpdated { id, .. } => Some(*id),
        _ => None,
    }
}

impl Engine {
    /// Rebuild a company store from its journal. A torn tail is cut off
    /// before the writer resumes appending.
    pub fn open(wal_path: PathBuf) -> io::Result<Self> {
        let (wal, events) = Wal::recover(&wal_path)?;
        let company = match events.first() {
            Some(Event::CompanyRegistered { id, name, certification }) => Company {
                id: *id,
                name: name.clone(),
                certification: certification.clone(),
            },
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{} does not start with a company record", wal_path.display()),
                ));
            }
        };
        let engine = Self::with_writer(company, wal);

        // We're the sole owner of every lock here, so try_write always succeeds.
        // Never block: this may run inside an async context.
        for event in &events[1..] {
            engine.replay_event(event);
        }

        Ok(engine)
    }

    /// Start the journal of a newly registered company with its founding
    /// ADMIN. Both records are synced together; if that fails the file is
    /// removed. Fails if a journal already exists at `wal_path`.
    pub fn create(wal_path: PathBuf, company: Company, founder: User) -> io::Result<Self> {
        let mut wal = Wal::create_new(&wal_path)?;
        let head = Event::CompanyRegistered {
            id: company.id,
            name: company.name.clone(),
            certification: company.certification.clone(),
        };
        let admin = Event::UserRegistered {
            id: founder.id,
            email: founder.email,
            username: founder.username,
            role: founder.role,
        };
        let written = wal
            .append_buffered(&head)
            .and_then(|()| wal.append_buffered(&admin))
            .and_then(|()| wal.flush_sync());
        if let Err(e) = written {
            drop(wal);
            if let Err(rm) = std::fs::remove_file(&wal_path) {
                tracing::warn!("could not remove {}: {rm}", wal_path.display());
            }
            return Err(e);
        }
        let engine = Self::with_writer(company, wal);
        engine.apply_catalog(&admin);
        Ok(engine)
    }

    fn with_writer(company: Company, wal: Wal) -> Self {
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));
        Self {
            company,
            wal_tx,
            users: DashMap::new(),
            floors: DashMap::new(),
            spaces: DashMap::new(),
            locations: DashMap::new(),
            space_locations: DashMap::new(),
            reservation_to_location: DashMap::new(),
            seats: DashMap::new(),
            schedules: DashMap::new(),
            catalog: Mutex::new(()),
        }
    }

    pub fn company(&self) -> &Company {
        &self.company
    }

    fn replay_event(&self, event: &Event) {
        match event {
            Event::LocationDeleted { id } => {
                if let Some(ls) = self.get_location_state(id)
                    && let Ok(mut guard) = ls.try_write()
                {
                    self.remove_location(&mut guard);
                }
            }
            Event::SpaceDeleted { id } => {
                for location_id in self.space_location_ids(id) {
                    if let Some(ls) = self.get_location_state(&location_id)
                        && let Ok(mut guard) = ls.try_write()
                    {
                        self.remove_location(&mut guard);
                    }
                }
                self.apply_catalog(event);
            }
            other => match event_location_id(other) {
                Some(location_id) => {
                    if let Some(ls) = self.get_location_state(&location_id)
                        && let Ok(mut guard) = ls.try_write()
                    {
                        apply_to_location(&mut guard, other, &self.reservation_to_location);
                    }
                }
                None => self.apply_catalog(other),
            },
        }
    }

    /// Apply a catalog event to the maps. Location removal is not handled here:
    /// it needs the location lock, see `remove_location`.
    pub(super) fn apply_catalog(&self, event: &Event) {
        match event {
            Event::UserRegistered { id, email, username, role } => {
                self.users.insert(
                    *id,
                    User {
                        id: *id,
                        email: email.clone(),
                        username: username.clone(),
                        role: *role,
                    },
                );
            }
            Event::UserRoleChanged { id, role } => {
                if let Some(mut user) = self.users.get_mut(id) {
                    user.role = *role;
                }
            }
            Event::FloorCreated { id, name } | Event::FloorRenamed { id, name } => {
                self.floors.insert(*id, Floor { id: *id, name: name.clone() });
            }
            Event::FloorDeleted { id } => {
                self.floors.remove(id);
                for mut space in self.spaces.iter_mut() {
                    if space.floor_id == Some(*id) {
                        space.floor_id = None;
                    }
                }
            }
            Event::SpaceCreated { id, name, floor_id } | Event::SpaceUpdated { id, name, floor_id } => {
                self.spaces.insert(
                    *id,
                    Space {
                        id: *id,
                        name: name.clone(),
                        floor_id: *floor_id,
                    },
                );
            }
            Event::SpaceDeleted { id } => {
                self.spaces.remove(id);
                self.space_locations.remove(id);
            }
            Event::LocationCreated { id, space_id, kind, name, x, y } => {
                let location = Location {
                    id: *id,
                    space_id: *space_id,
                    kind: *kind,
                    name: name.clone(),
                    x: x.clone(),
                    y: y.clone(),
                };
                self.locations
                    .insert(*id, Arc::new(RwLock::new(LocationState::new(location))));
                self.space_locations.entry(*space_id).or_default().push(*id);
            }
            Event::UserSeated { user_id, location_id } => {
                self.seats.insert(*user_id, *location_id);
            }
            Event::ScheduleCreated { id, user_id, title, comment, span } => {
                self.schedules.insert(
                    *id,
                    Schedule {
                        id: *id,
                        user_id: *user_id,
                        title: title.clone(),
                        comment: comment.clone(),
                        span: *span,
                    },
                );
            }
            Event::ScheduleUpdated { id, title, comment, span } => {
                if let Some(mut schedule) = self.schedules.get_mut(id) {
                    schedule.title = title.clone();
                    schedule.comment = comment.clone();
                    schedule.span = *span;
                }
            }
            Event::ScheduleDeleted { id } => {
                self.schedules.remove(id);
            }
            Event::CompanyRegistered { .. }
            | Event::LocationUpdated { .. }
            | Event::LocationDeleted { .. }
            | Event::ReservationConfirmed { .. }
            | Event::ReservationsConfirmed { .. }
            | Event::ReservationRescheduled { .. }
            | Event::ReservationCancelled { .. } => {}
        }
    }

    /// Retire a location whose write lock the caller holds: drop its
    /// reservations, seats and index entries. Returns the number of
    /// reservations removed.
    pub(super) fn remove_location(&self, ls: &mut LocationState) -> usize {
        let id = ls.location.id;
        ls.retired = true;
        let removed = ls.reservations.len();
        for r in ls.reservations.drain(..) {
            self.reservation_to_location.remove(&r.id);
        }
        self.seats.retain(|_, at| *at != id);
        self.locations.remove(&id);
        if let Some(mut ids) = self.space_locations.get_mut(&ls.location.space_id) {
            ids.retain(|l| *l != id);
        }
        removed
    }

    /// Write event to the journal via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("journal writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// Journal a catalog event, then apply it.
    pub(super) async fn persist_catalog(&self, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.apply_catalog(event);
        Ok(())
    }

    /// Journal a location-level event, then apply it under the held lock.
    pub(super) async fn persist_and_apply(
        &self,
        ls: &mut LocationState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_location(ls, event, &self.reservation_to_location);
        Ok(())
    }

    pub(super) fn get_location_state(&self, id: &Ulid) -> Option<SharedLocationState> {
        self.locations.get(id).map(|e| e.value().clone())
    }

    pub(super) fn space_location_ids(&self, space_id: &Ulid) -> Vec<Ulid> {
        self.space_locations
            .get(space_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// Acquire a location's write lock. A location deleted while we waited
    /// reports `NotFound`.
    pub(super) async fn lock_location(
        &self,
        id: Ulid,
    ) -> Result<OwnedRwLockWriteGuard<LocationState>, EngineError> {
        let ls = self
            .get_location_state(&id)
            .ok_or_else(|| EngineError::not_found(Entity::Location, id))?;
        let guard = ls.write_owned().await;
        if guard.retired {
            return Err(EngineError::not_found(Entity::Location, id));
        }
        Ok(guard)
    }

    /// Lookup reservation → location, acquire the location's write lock.
    pub(super) async fn resolve_reservation_write(
        &self,
        reservation_id: Ulid,
    ) -> Result<OwnedRwLockWriteGuard<LocationState>, EngineError> {
        let location_id = self
            .reservation_to_location
            .get(&reservation_id)
            .map(|e| *e.value())
            .ok_or_else(|| EngineError::not_found(Entity::Reservation, reservation_id))?;
        let guard = self
            .lock_location(location_id)
            .await
            .map_err(|_| EngineError::not_found(Entity::Reservation, reservation_id))?;
        // Cancelled while we waited for the lock.
        if !guard.reservations.iter().any(|r| r.id == reservation_id) {
            return Err(EngineError::not_found(Entity::Reservation, reservation_id));
        }
        Ok(guard)
    }
}
