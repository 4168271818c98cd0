use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{
        attendance::{self, Entity as AttendanceEntity},
        operator::Entity as OperatorEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{paginate, Page},
};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CheckInInput {
    /// Defaults to the caller
    pub operator_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CheckOutInput {
    pub operator_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub operator_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceSummary {
    pub operator_id: Uuid,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub days_present: u64,
    pub total_minutes: i64,
    /// Days checked in but never checked out
    pub open_days: u64,
}

/// Whole minutes between check-in and check-out, never negative.
pub fn worked_minutes(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> i64 {
    (check_out - check_in).num_minutes().max(0)
}

/// Totals for one operator's records.
pub fn summarize(
    operator_id: Uuid,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    records: &[attendance::Model],
) -> AttendanceSummary {
    let mut days: Vec<NaiveDate> = records.iter().map(|r| r.work_date).collect();
    days.sort_unstable();
    days.dedup();
    AttendanceSummary {
        operator_id,
        from,
        to,
        days_present: days.len() as u64,
        total_minutes: records.iter().filter_map(|r| r.worked_minutes).sum(),
        open_days: records.iter().filter(|r| r.check_out.is_none()).count() as u64,
    }
}

#[derive(Clone)]
pub struct AttendanceService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl AttendanceService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    async fn record_for(
        &self,
        operator_id: Uuid,
        work_date: NaiveDate,
    ) -> Result<Option<attendance::Model>, ServiceError> {
        AttendanceEntity::find()
            .filter(attendance::Column::OperatorId.eq(operator_id))
            .filter(attendance::Column::WorkDate.eq(work_date))
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Opens today's record. A second check-in on the same day is a conflict.
    #[instrument(skip(self, notes))]
    pub async fn check_in(
        &self,
        operator_id: Uuid,
        notes: Option<String>,
    ) -> Result<attendance::Model, ServiceError> {
        OperatorEntity::find_by_id(operator_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Operator", operator_id))?;

        let now = Utc::now();
        let today = now.date_naive();
        if self.record_for(operator_id, today).await?.is_some() {
            warn!(operator_id = %operator_id, "Duplicate check-in");
            return Err(ServiceError::Conflict(format!(
                "operator already checked in on {}",
                today
            )));
        }

        let record = attendance::ActiveModel {
            id: Set(Uuid::new_v4()),
            operator_id: Set(operator_id),
            work_date: Set(today),
            check_in: Set(now),
            check_out: Set(None),
            worked_minutes: Set(None),
            notes: Set(notes),
            created_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(ServiceError::db_error)?;

        info!(operator_id = %operator_id, "Checked in");
        self.event_sender
            .send_or_log(Event::AttendanceRecorded {
                operator_id,
                work_date: today,
                checked_out: false,
            })
            .await;
        Ok(record)
    }

    async fn open_record(
        &self,
        operator_id: Uuid,
    ) -> Result<Option<attendance::Model>, ServiceError> {
        AttendanceEntity::find()
            .filter(attendance::Column::OperatorId.eq(operator_id))
            .filter(attendance::Column::CheckOut.is_null())
            .order_by_desc(attendance::Column::CheckIn)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Closes the operator's latest open record, even one opened on an
    /// earlier day, and stores the minutes worked.
    #[instrument(skip(self, notes))]
    pub async fn check_out(
        &self,
        operator_id: Uuid,
        notes: Option<String>,
    ) -> Result<attendance::Model, ServiceError> {
        let now = Utc::now();
        let Some(record) = self.open_record(operator_id).await? else {
            let today = now.date_naive();
            if self.record_for(operator_id, today).await?.is_some() {
                return Err(ServiceError::Conflict(format!(
                    "operator already checked out on {}",
                    today
                )));
            }
            return Err(ServiceError::InvalidOperation(
                "no open check-in to close".into(),
            ));
        };
        let work_date = record.work_date;

        let minutes = worked_minutes(record.check_in, now);
        let notes = match (record.notes.clone(), notes) {
            (Some(a), Some(b)) => Some(format!("{}\n{}", a, b)),
            (a, b) => b.or(a),
        };
        let mut active: attendance::ActiveModel = record.into();
        active.check_out = Set(Some(now));
        active.worked_minutes = Set(Some(minutes));
        active.notes = Set(notes);
        let record = active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        info!(operator_id = %operator_id, minutes, "Checked out");
        self.event_sender
            .send_or_log(Event::AttendanceRecorded {
                operator_id,
                work_date,
                checked_out: true,
            })
            .await;
        Ok(record)
    }

    fn filtered(filter: &AttendanceFilter) -> sea_orm::Select<AttendanceEntity> {
        let mut query = AttendanceEntity::find();
        if let Some(operator_id) = filter.operator_id {
            query = query.filter(attendance::Column::OperatorId.eq(operator_id));
        }
        if let Some(from) = filter.from {
            query = query.filter(attendance::Column::WorkDate.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(attendance::Column::WorkDate.lte(to));
        }
        query
    }

    #[instrument(skip(self))]
    pub async fn list_records(
        &self,
        filter: AttendanceFilter,
        page: u64,
        per_page: u64,
    ) -> Result<Page<attendance::Model>, ServiceError> {
        paginate(
            Self::filtered(&filter).order_by_desc(attendance::Column::WorkDate),
            self.db.as_ref(),
            page,
            per_page,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn summary(
        &self,
        operator_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<AttendanceSummary, ServiceError> {
        let filter = AttendanceFilter {
            operator_id: Some(operator_id),
            from,
            to,
        };
        let records = Self::filtered(&filter)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        Ok(summarize(operator_id, from, to, &records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(day: u32, minutes: Option<i64>) -> attendance::Model {
        let check_in = Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap();
        attendance::Model {
            id: Uuid::new_v4(),
            operator_id: Uuid::nil(),
            work_date: check_in.date_naive(),
            check_in,
            check_out: minutes.map(|m| check_in + Duration::minutes(m)),
            worked_minutes: minutes,
            notes: None,
            created_at: check_in,
        }
    }

    #[test]
    fn minutes_are_truncated_and_non_negative() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        assert_eq!(worked_minutes(start, start + Duration::seconds(8 * 3600 + 59)), 480);
        assert_eq!(worked_minutes(start, start - Duration::minutes(5)), 0);
    }

    #[test]
    fn summary_counts_days_and_minutes() {
        let records = vec![record(1, Some(480)), record(2, Some(450)), record(3, None)];
        let summary = summarize(Uuid::nil(), None, None, &records);
        assert_eq!(summary.days_present, 3);
        assert_eq!(summary.total_minutes, 930);
        assert_eq!(summary.open_days, 1);
    }
}
