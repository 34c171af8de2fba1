use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use ulid::Ulid;

use super::{time, Service, SlotResponse};
use crate::engine::EngineError;
use crate::guard::Caller;
use crate::model::{Ms, Role, Schedule};

#[derive(Debug, Deserialize)]
pub struct ScheduleInput {
    pub title: String,
    #[serde(default)]
    pub comment: String,
    #[serde(with = "time::instant")]
    pub start: Ms,
    #[serde(with = "time::instant")]
    pub end: Ms,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub schedule_id: Ulid,
    pub title: String,
    pub comment: String,
    #[serde(with = "time::instant")]
    pub start: Ms,
    #[serde(with = "time::instant")]
    pub end: Ms,
}

impl From<Schedule> for ScheduleResponse {
    fn from(s: Schedule) -> Self {
        Self {
            schedule_id: s.id,
            title: s.title,
            comment: s.comment,
            start: s.span.start,
            end: s.span.end,
        }
    }
}

/// The caller's day: hourly occupancy plus the schedules behind it.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleDayResponse {
    pub date: NaiveDate,
    pub slots: Vec<SlotResponse>,
    pub schedules: Vec<ScheduleResponse>,
}

// Schedules are personal: every operation acts on the caller's own entries
// in the caller's own company.
impl Service {
    pub async fn create_schedule(&self, caller: &Caller, req: ScheduleInput) -> Result<ScheduleResponse, EngineError> {
        let engine = self.own_company(caller, Role::User)?;
        let schedule = engine
            .create_schedule(Ulid::new(), caller.user_id, req.title, req.comment, req.start, req.end)
            .await?;
        info!("schedule {} created for {}", schedule.id, caller.user_id);
        Ok(schedule.into())
    }

    pub fn list_schedules(&self, caller: &Caller) -> Result<Vec<ScheduleResponse>, EngineError> {
        let engine = self.own_company(caller, Role::User)?;
        Ok(engine.list_schedules(caller.user_id).into_iter().map(Into::into).collect())
    }

    pub fn get_schedule(&self, caller: &Caller, schedule_id: Ulid) -> Result<ScheduleResponse, EngineError> {
        let engine = self.own_company(caller, Role::User)?;
        Ok(engine.get_schedule(schedule_id, caller.user_id)?.into())
    }

    pub fn schedule_day(&self, caller: &Caller, date: NaiveDate) -> Result<ScheduleDayResponse, EngineError> {
        let engine = self.own_company(caller, Role::User)?;
        let day = engine.schedule_day(caller.user_id, time::day_start(date), self.hours);
        Ok(ScheduleDayResponse {
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
            schedules: day.schedules.into_iter().map(Into::into).collect(),
        })
    }

    pub async fn update_schedule(
        &self,
        caller: &Caller,
        schedule_id: Ulid,
        req: ScheduleInput,
    ) -> Result<ScheduleResponse, EngineError> {
        let engine = self.own_company(caller, Role::User)?;
        let schedule = engine
            .update_schedule(schedule_id, caller.user_id, req.title, req.comment, req.start, req.end)
            .await?;
        Ok(schedule.into())
    }

    pub async fn delete_schedule(&self, caller: &Caller, schedule_id: Ulid) -> Result<ScheduleResponse, EngineError> {
        let engine = self.own_company(caller, Role::User)?;
        let schedule = engine.delete_schedule(schedule_id, caller.user_id).await?;
        info!("schedule {schedule_id} deleted for {}", caller.user_id);
        Ok(schedule.into())
    }
}
