use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ulid::Ulid;

use super::{time, Service};
use crate::engine::{Engine, EngineError};
use crate::guard::{self, Caller};
use crate::model::{Ms, Reservation, Role};
use crate::observability;

/// Booking body: one explicit span, or a list of one-hour slot starts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ReserveInput {
    Span {
        #[serde(with = "time::instant")]
        start: Ms,
        #[serde(with = "time::instant")]
        end: Ms,
    },
    Slots {
        #[serde(deserialize_with = "time::instants::deserialize")]
        starts: Vec<Ms>,
    },
}

#[derive(Debug, Deserialize)]
pub struct RescheduleInput {
    #[serde(with = "time::instant")]
    pub start: Ms,
    #[serde(with = "time::instant")]
    pub end: Ms,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    pub reservation_id: Ulid,
    pub mr_id: Ulid,
    pub mr_name: String,
    pub user_id: Ulid,
    pub username: String,
    #[serde(with = "time::instant")]
    pub start: Ms,
    #[serde(with = "time::instant")]
    pub end: Ms,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotResponse {
    pub is_check_out: bool,
    #[serde(serialize_with = "time::clock")]
    pub start: Ms,
    #[serde(serialize_with = "time::clock")]
    pub end: Ms,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowResponse {
    #[serde(serialize_with = "time::clock")]
    pub start: Ms,
    #[serde(serialize_with = "time::clock")]
    pub end: Ms,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableResponse {
    pub mr_id: Ulid,
    pub mr_name: String,
    pub date: NaiveDate,
    pub slots: Vec<SlotResponse>,
    pub free_windows: Vec<WindowResponse>,
}

async fn describe(engine: &Engine, r: Reservation) -> ReservationResponse {
    let mr_name = engine
        .get_location(&r.location_id)
        .await
        .map(|l| l.name)
        .unwrap_or_default();
    let username = engine.get_user(&r.user_id).map(|u| u.username).unwrap_or_default();
    ReservationResponse {
        reservation_id: r.id,
        mr_id: r.location_id,
        mr_name,
        user_id: r.user_id,
        username,
        start: r.span.start,
        end: r.span.end,
    }
}

fn count_booking<T>(result: &Result<T, EngineError>, slots: usize) {
    match result {
        Ok(_) => {
            metrics::counter!(observability::RESERVATIONS_CONFIRMED_TOTAL).increment(slots as u64);
        }
        Err(EngineError::Conflict(existing)) => {
            metrics::counter!(observability::RESERVATION_CONFLICTS_TOTAL).increment(1);
            debug!("booking refused, overlaps {existing}");
        }
        Err(_) => {}
    }
}

impl Service {
    /// Hourly occupancy of a meeting room over the operating hours of `date`.
    pub async fn room_timetable(
        &self,
        caller: &Caller,
        company: &str,
        mr_id: Ulid,
        date: NaiveDate,
    ) -> Result<TimetableResponse, EngineError> {
        let engine = self.scope(caller, company, Role::User)?;
        let day = engine.room_day(mr_id, time::day_start(date), self.hours).await?;
        Ok(TimetableResponse {
            mr_id: day.room.id,
            mr_name: day.room.name,
            date,
            slots: day
                .slots
                .iter()
                .map(|s| SlotResponse {
                    is_check_out: s.is_check_out,
                    start: s.span.start,
                    end: s.span.end,
                })
                .collect(),
            free_windows: day
                .free
                .iter()
                .map(|w| WindowResponse { start: w.start, end: w.end })
                .collect(),
        })
    }

    pub async fn reserve(
        &self,
        caller: &Caller,
        company: &str,
        mr_id: Ulid,
        start: Ms,
        end: Ms,
    ) -> Result<ReservationResponse, EngineError> {
        let engine = self.scope(caller, company, Role::User)?;
        let result = engine
            .confirm_reservation(Ulid::new(), mr_id, caller.user_id, start, end)
            .await;
        count_booking(&result, 1);
        let reservation = result?;
        info!("reservation {} confirmed on {mr_id}", reservation.id);
        Ok(describe(&engine, reservation).await)
    }

    /// Book several one-hour slots of one room, all or none.
    pub async fn reserve_slots(
        &self,
        caller: &Caller,
        company: &str,
        mr_id: Ulid,
        starts: Vec<Ms>,
    ) -> Result<Vec<ReservationResponse>, EngineError> {
        let engine = self.scope(caller, company, Role::User)?;
        let slots: Vec<(Ulid, Ms)> = starts.into_iter().map(|s| (Ulid::new(), s)).collect();
        let count = slots.len();
        let result = engine
            .batch_confirm_reservations(mr_id, caller.user_id, slots)
            .await;
        count_booking(&result, count);
        let mut out = Vec::with_capacity(count);
        for reservation in result? {
            out.push(describe(&engine, reservation).await);
        }
        info!("{count} slots confirmed on {mr_id}");
        Ok(out)
    }

    /// Move a reservation. Owner or MANAGER+ only.
    pub async fn reschedule(
        &self,
        caller: &Caller,
        company: &str,
        reservation_id: Ulid,
        req: RescheduleInput,
    ) -> Result<ReservationResponse, EngineError> {
        let engine = self.scope(caller, company, Role::User)?;
        let reservation = engine
            .reschedule_reservation(reservation_id, req.start, req.end, |r| {
                guard::may_modify_reservation(caller, r)
            })
            .await?;
        info!("reservation {reservation_id} rescheduled");
        Ok(describe(&engine, reservation).await)
    }

    /// Cancel a reservation. Owner or MANAGER+ only.
    pub async fn cancel(
        &self,
        caller: &Caller,
        company: &str,
        reservation_id: Ulid,
    ) -> Result<ReservationResponse, EngineError> {
        let engine = self.scope(caller, company, Role::User)?;
        let reservation = engine
            .cancel_reservation(reservation_id, |r| guard::may_modify_reservation(caller, r))
            .await?;
        info!("reservation {reservation_id} cancelled");
        Ok(describe(&engine, reservation).await)
    }

    /// Every reservation of the company, or only the caller's.
    pub async fn list_reservations(
        &self,
        caller: &Caller,
        company: &str,
        mine: bool,
    ) -> Result<Vec<ReservationResponse>, EngineError> {
        let engine = self.scope(caller, company, Role::User)?;
        let owner = mine.then_some(caller.user_id);
        let mut out = Vec::new();
        for reservation in engine.list_reservations(owner).await {
            out.push(describe(&engine, reservation).await);
        }
        Ok(out)
    }
}
