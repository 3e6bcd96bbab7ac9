//! SQLite-backed push job repository.
//!
//! Implements [`PushJobRepository`] over the `push_job` and `push_field`
//! tables. All database operations run in `spawn_blocking` to avoid blocking
//! the async runtime. Jobs are deleted logically; every read filters on
//! `deleted = 0`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use datapush_core::PushJobRepository;
use datapush_domain::constants::{DATETIME_FORMAT, DATE_FORMAT};
use datapush_domain::{
    split_primary_keys, AuditState, DataPushError, Dialect, Operation, PushField, PushJob,
    PushStatus, Result, Schedule, ScheduleType, SourceTable, SynthesizedSql, TargetLocation,
    TargetTable, TransmitMode,
};
use rusqlite::types::Type;
use rusqlite::{named_params, params, Connection, OptionalExtension, Row};
use tokio::task;
use tracing::debug;

use super::manager::{map_sql_error, DbManager};
use crate::errors::InfraError;

const JOB_COLUMNS: &str = "id, tenant_id, name, \
     source_catalog_id, source_table_id, source_table_name, source_datasource_id, \
     source_department_id, source_dialect, \
     target_kind, target_location_id, target_table_name, target_table_exists, target_dialect, \
     transmit_mode, increment_field, high_water_mark, update_existing, primary_keys, \
     filter_condition, masking_enabled, create_sql, insert_sql, update_sql, \
     status, audit_state, pending_operation, apply_id, \
     schedule_type, once_at, start_date, end_date, crontab, draft_schedule, \
     error_message, published_at, created_at, updated_at";

/// SQLite-backed push job repository.
pub struct SqlitePushJobRepository {
    db: Arc<DbManager>,
}

impl SqlitePushJobRepository {
    /// Create a new repository with the given database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Run a synchronous SQL operation on a pooled connection.
    async fn with_connection<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<T> {
            let mut conn = db.get_connection()?;
            op(&mut *conn).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl PushJobRepository for SqlitePushJobRepository {
    async fn create(&self, job: &PushJob) -> Result<()> {
        let job = job.clone();
        debug!(job_id = %job.id, fields = job.fields.len(), "inserting push job");

        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            insert_job(&tx, &job)?;
            insert_fields(&tx, &job.id, &job.fields)?;
            tx.commit()
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<PushJob>> {
        let id = id.to_string();
        self.with_connection(move |conn| query_job(conn, "id = ?1", &id)).await
    }

    async fn update(&self, job: &PushJob) -> Result<()> {
        let job = job.clone();
        let id = job.id.clone();

        let affected = self
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                let affected = update_job_row(&tx, &job)?;
                if affected > 0 {
                    tx.execute("DELETE FROM push_field WHERE job_id = ?1", params![job.id])?;
                    insert_fields(&tx, &job.id, &job.fields)?;
                }
                tx.commit()?;
                Ok(affected)
            })
            .await?;
        ensure_found(affected, &id)
    }

    async fn update_status(&self, id: &str, status: PushStatus) -> Result<()> {
        let owned = id.to_string();
        let affected = self
            .with_connection(move |conn| {
                conn.execute(
                    "UPDATE push_job SET status = ?2, updated_at = ?3 WHERE id = ?1 AND deleted = 0",
                    params![owned, status.code(), now_text()],
                )
            })
            .await?;
        ensure_found(affected, id)
    }

    async fn mark_published(
        &self,
        id: &str,
        status: PushStatus,
        published_at: NaiveDateTime,
    ) -> Result<()> {
        let owned = id.to_string();
        let affected = self
            .with_connection(move |conn| {
                conn.execute(
                    "UPDATE push_job SET status = ?2, published_at = ?3, updated_at = ?4
                     WHERE id = ?1 AND deleted = 0",
                    params![owned, status.code(), datetime_text(published_at), now_text()],
                )
            })
            .await?;
        ensure_found(affected, id)
    }

    async fn update_schedule(&self, id: &str, schedule: &Schedule) -> Result<()> {
        let owned = id.to_string();
        let schedule = schedule.clone();
        let affected = self
            .with_connection(move |conn| {
                conn.execute(
                    "UPDATE push_job SET schedule_type = ?2, once_at = ?3, start_date = ?4,
                         end_date = ?5, crontab = ?6, updated_at = ?7
                     WHERE id = ?1 AND deleted = 0",
                    params![
                        owned,
                        schedule.schedule_type.code(),
                        schedule.once_at.map(datetime_text),
                        schedule.start_date.map(date_text),
                        schedule.end_date.map(date_text),
                        schedule.crontab,
                        now_text(),
                    ],
                )
            })
            .await?;
        ensure_found(affected, id)
    }

    async fn save_draft_schedule(&self, id: &str, draft: Option<&str>) -> Result<()> {
        let owned = id.to_string();
        let draft = draft.map(str::to_string);
        let affected = self
            .with_connection(move |conn| {
                conn.execute(
                    "UPDATE push_job SET draft_schedule = ?2, updated_at = ?3
                     WHERE id = ?1 AND deleted = 0",
                    params![owned, draft, now_text()],
                )
            })
            .await?;
        ensure_found(affected, id)
    }

    async fn update_audit(
        &self,
        id: &str,
        state: AuditState,
        apply_id: Option<&str>,
        pending: Option<Operation>,
    ) -> Result<()> {
        let owned = id.to_string();
        let apply_id = apply_id.map(str::to_string);
        let affected = self
            .with_connection(move |conn| {
                conn.execute(
                    "UPDATE push_job SET audit_state = ?2, apply_id = ?3, pending_operation = ?4,
                         updated_at = ?5
                     WHERE id = ?1 AND deleted = 0",
                    params![owned, state.code(), apply_id, pending.map(Operation::code), now_text()],
                )
            })
            .await?;
        ensure_found(affected, id)
    }

    async fn update_error(&self, id: &str, error: Option<&str>) -> Result<()> {
        let owned = id.to_string();
        let error = error.map(str::to_string);
        let affected = self
            .with_connection(move |conn| {
                conn.execute(
                    "UPDATE push_job SET error_message = ?2, updated_at = ?3
                     WHERE id = ?1 AND deleted = 0",
                    params![owned, error, now_text()],
                )
            })
            .await?;
        ensure_found(affected, id)
    }

    async fn find_by_apply_id(&self, apply_id: &str) -> Result<Option<PushJob>> {
        let apply_id = apply_id.to_string();
        self.with_connection(move |conn| query_job(conn, "apply_id = ?1", &apply_id)).await
    }

    async fn list_unfinished(&self, now: NaiveDateTime) -> Result<Vec<PushJob>> {
        self.with_connection(move |conn| query_unfinished(conn, now)).await
    }

    async fn list_auditing(&self, pending: Operation) -> Result<Vec<PushJob>> {
        self.with_connection(move |conn| {
            let sql = format!(
                "SELECT {JOB_COLUMNS} FROM push_job
                 WHERE deleted = 0 AND audit_state = ?1 AND pending_operation = ?2
                 ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let jobs = stmt
                .query_map(params![AuditState::Auditing.code(), pending.code()], map_job_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            attach_fields(conn, jobs)
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let owned = id.to_string();
        let affected = self
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                let affected = tx.execute(
                    "UPDATE push_job SET deleted = 1, updated_at = ?2 WHERE id = ?1 AND deleted = 0",
                    params![owned, now_text()],
                )?;
                tx.execute("UPDATE push_field SET deleted = 1 WHERE job_id = ?1", params![owned])?;
                tx.commit()?;
                Ok(affected)
            })
            .await?;
        ensure_found(affected, id)
    }
}

fn ensure_found(affected: usize, id: &str) -> Result<()> {
    if affected == 0 {
        return Err(DataPushError::NotFound(format!("push job {id}")));
    }
    Ok(())
}

fn map_join_error(err: task::JoinError) -> DataPushError {
    DataPushError::from(InfraError::from(err))
}

// ============================================================================
// Synchronous SQL Operations (called inside spawn_blocking)
// ============================================================================

fn insert_job(conn: &Connection, job: &PushJob) -> rusqlite::Result<()> {
    let (target_kind, target_location_id) = location_columns(&job.target.location);

    conn.execute(
        &format!(
            "INSERT INTO push_job ({JOB_COLUMNS}) VALUES (
                :id, :tenant_id, :name,
                :source_catalog_id, :source_table_id, :source_table_name, :source_datasource_id,
                :source_department_id, :source_dialect,
                :target_kind, :target_location_id, :target_table_name, :target_table_exists,
                :target_dialect,
                :transmit_mode, :increment_field, :high_water_mark, :update_existing,
                :primary_keys, :filter_condition, :masking_enabled,
                :create_sql, :insert_sql, :update_sql,
                :status, :audit_state, :pending_operation, :apply_id,
                :schedule_type, :once_at, :start_date, :end_date, :crontab, :draft_schedule,
                :error_message, :published_at, :created_at, :updated_at)"
        ),
        named_params! {
            ":id": job.id,
            ":tenant_id": job.tenant_id,
            ":name": job.name,
            ":source_catalog_id": job.source.catalog_id,
            ":source_table_id": job.source.table_id,
            ":source_table_name": job.source.table_name,
            ":source_datasource_id": job.source.datasource_id,
            ":source_department_id": job.source.department_id,
            ":source_dialect": job.source.dialect.name(),
            ":target_kind": target_kind,
            ":target_location_id": target_location_id,
            ":target_table_name": job.target.table_name,
            ":target_table_exists": job.target.table_exists,
            ":target_dialect": job.target.dialect.name(),
            ":transmit_mode": job.transmit_mode.code(),
            ":increment_field": job.increment_field,
            ":high_water_mark": job.high_water_mark.map(datetime_text),
            ":update_existing": job.update_existing,
            ":primary_keys": job.primary_keys_joined(),
            ":filter_condition": job.filter_condition,
            ":masking_enabled": job.masking_enabled,
            ":create_sql": job.sql.create_sql,
            ":insert_sql": job.sql.insert_sql,
            ":update_sql": job.sql.update_sql,
            ":status": job.status.code(),
            ":audit_state": job.audit_state.code(),
            ":pending_operation": job.pending_operation.map(Operation::code),
            ":apply_id": job.apply_id,
            ":schedule_type": job.schedule.schedule_type.code(),
            ":once_at": job.schedule.once_at.map(datetime_text),
            ":start_date": job.schedule.start_date.map(date_text),
            ":end_date": job.schedule.end_date.map(date_text),
            ":crontab": job.schedule.crontab,
            ":draft_schedule": job.draft_schedule,
            ":error_message": job.error_message,
            ":published_at": job.published_at.map(datetime_text),
            ":created_at": datetime_text(job.created_at),
            ":updated_at": datetime_text(job.updated_at),
        },
    )?;
    Ok(())
}

/// Overwrite every mutable column; `id`, `tenant_id` and `created_at` stay.
fn update_job_row(conn: &Connection, job: &PushJob) -> rusqlite::Result<usize> {
    let (target_kind, target_location_id) = location_columns(&job.target.location);

    conn.execute(
        "UPDATE push_job SET
            name = :name,
            source_catalog_id = :source_catalog_id,
            source_table_id = :source_table_id,
            source_table_name = :source_table_name,
            source_datasource_id = :source_datasource_id,
            source_department_id = :source_department_id,
            source_dialect = :source_dialect,
            target_kind = :target_kind,
            target_location_id = :target_location_id,
            target_table_name = :target_table_name,
            target_table_exists = :target_table_exists,
            target_dialect = :target_dialect,
            transmit_mode = :transmit_mode,
            increment_field = :increment_field,
            high_water_mark = :high_water_mark,
            update_existing = :update_existing,
            primary_keys = :primary_keys,
            filter_condition = :filter_condition,
            masking_enabled = :masking_enabled,
            create_sql = :create_sql,
            insert_sql = :insert_sql,
            update_sql = :update_sql,
            status = :status,
            audit_state = :audit_state,
            pending_operation = :pending_operation,
            apply_id = :apply_id,
            schedule_type = :schedule_type,
            once_at = :once_at,
            start_date = :start_date,
            end_date = :end_date,
            crontab = :crontab,
            draft_schedule = :draft_schedule,
            error_message = :error_message,
            published_at = :published_at,
            updated_at = :updated_at
         WHERE id = :id AND deleted = 0",
        named_params! {
            ":id": job.id,
            ":name": job.name,
            ":source_catalog_id": job.source.catalog_id,
            ":source_table_id": job.source.table_id,
            ":source_table_name": job.source.table_name,
            ":source_datasource_id": job.source.datasource_id,
            ":source_department_id": job.source.department_id,
            ":source_dialect": job.source.dialect.name(),
            ":target_kind": target_kind,
            ":target_location_id": target_location_id,
            ":target_table_name": job.target.table_name,
            ":target_table_exists": job.target.table_exists,
            ":target_dialect": job.target.dialect.name(),
            ":transmit_mode": job.transmit_mode.code(),
            ":increment_field": job.increment_field,
            ":high_water_mark": job.high_water_mark.map(datetime_text),
            ":update_existing": job.update_existing,
            ":primary_keys": job.primary_keys_joined(),
            ":filter_condition": job.filter_condition,
            ":masking_enabled": job.masking_enabled,
            ":create_sql": job.sql.create_sql,
            ":insert_sql": job.sql.insert_sql,
            ":update_sql": job.sql.update_sql,
            ":status": job.status.code(),
            ":audit_state": job.audit_state.code(),
            ":pending_operation": job.pending_operation.map(Operation::code),
            ":apply_id": job.apply_id,
            ":schedule_type": job.schedule.schedule_type.code(),
            ":once_at": job.schedule.once_at.map(datetime_text),
            ":start_date": job.schedule.start_date.map(date_text),
            ":end_date": job.schedule.end_date.map(date_text),
            ":crontab": job.schedule.crontab,
            ":draft_schedule": job.draft_schedule,
            ":error_message": job.error_message,
            ":published_at": job.published_at.map(datetime_text),
            ":updated_at": datetime_text(job.updated_at),
        },
    )
}

fn insert_fields(conn: &Connection, job_id: &str, fields: &[PushField]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO push_field (job_id, position, source_name, source_type, target_name,
             target_business_name, target_type, length, precision, nullable, masking_rule_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;

    for (position, field) in (0_i64..).zip(fields) {
        stmt.execute(params![
            job_id,
            position,
            field.source_name,
            field.source_type,
            field.target_name,
            field.target_business_name,
            field.target_type,
            field.length,
            field.precision,
            field.nullable,
            field.masking_rule_id,
        ])?;
    }
    Ok(())
}

/// Load a single live job matching `predicate` (one positional parameter).
fn query_job(conn: &Connection, predicate: &str, value: &str) -> rusqlite::Result<Option<PushJob>> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM push_job WHERE deleted = 0 AND {predicate}");
    let job = conn.query_row(&sql, params![value], map_job_row).optional()?;

    match job {
        Some(mut job) => {
            job.fields = query_fields(conn, &job.id)?;
            Ok(Some(job))
        }
        None => Ok(None),
    }
}

/// Jobs the reconciler may advance.
///
/// The schedule predicate matches `schedule::is_due`: a fixed one-shot time,
/// the publication time of an immediate job, or the first day of a period
/// must have arrived. Timestamps are stored in sortable text form.
fn query_unfinished(conn: &Connection, now: NaiveDateTime) -> rusqlite::Result<Vec<PushJob>> {
    let sql = format!(
        "SELECT {JOB_COLUMNS} FROM push_job
         WHERE deleted = 0
           AND status IN (:starting, :going)
           AND audit_state IN (:unaudited, :pass)
           AND (
                (schedule_type = :once AND once_at IS NOT NULL AND once_at <= :now)
             OR (schedule_type = :once AND once_at IS NULL
                 AND (published_at IS NULL OR published_at <= :now))
             OR (schedule_type = :period AND (start_date IS NULL OR start_date <= :today))
           )
         ORDER BY id"
    );

    let mut stmt = conn.prepare(&sql)?;
    let jobs = stmt
        .query_map(
            named_params! {
                ":starting": PushStatus::Starting.code(),
                ":going": PushStatus::Going.code(),
                ":unaudited": AuditState::Unaudited.code(),
                ":pass": AuditState::Pass.code(),
                ":once": ScheduleType::Once.code(),
                ":period": ScheduleType::Period.code(),
                ":now": datetime_text(now),
                ":today": date_text(now.date()),
            },
            map_job_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    attach_fields(conn, jobs)
}

fn attach_fields(conn: &Connection, mut jobs: Vec<PushJob>) -> rusqlite::Result<Vec<PushJob>> {
    for job in &mut jobs {
        job.fields = query_fields(conn, &job.id)?;
    }
    Ok(jobs)
}

fn query_fields(conn: &Connection, job_id: &str) -> rusqlite::Result<Vec<PushField>> {
    let mut stmt = conn.prepare(
        "SELECT source_name, source_type, target_name, target_business_name, target_type,
                length, precision, nullable, masking_rule_id
         FROM push_field
         WHERE job_id = ?1 AND deleted = 0
         ORDER BY position",
    )?;

    let fields = stmt
        .query_map(params![job_id], |row| {
            Ok(PushField {
                source_name: row.get(0)?,
                source_type: row.get(1)?,
                target_name: row.get(2)?,
                target_business_name: row.get(3)?,
                target_type: row.get(4)?,
                length: row.get(5)?,
                precision: row.get(6)?,
                nullable: row.get(7)?,
                masking_rule_id: row.get(8)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(fields)
}

/// Map a `JOB_COLUMNS` row; fields are attached separately.
fn map_job_row(row: &Row<'_>) -> rusqlite::Result<PushJob> {
    let location_id: String = row.get("target_location_id")?;
    let location = match row.get::<_, String>("target_kind")?.as_str() {
        "sandbox" => TargetLocation::Sandbox(location_id),
        "datasource" => TargetLocation::Datasource(location_id),
        other => return Err(invalid_column("target_kind", format!("unknown target kind {other}"))),
    };

    let schedule = Schedule {
        schedule_type: code_column(row, "schedule_type", ScheduleType::from_code)?,
        once_at: datetime_column(row, "once_at")?,
        start_date: date_column(row, "start_date")?,
        end_date: date_column(row, "end_date")?,
        crontab: row.get("crontab")?,
    };

    let pending_operation = match row.get::<_, Option<i64>>("pending_operation")? {
        Some(code) => Some(
            Operation::from_code(code)
                .ok_or_else(|| invalid_column("pending_operation", format!("unknown code {code}")))?,
        ),
        None => None,
    };

    Ok(PushJob {
        id: row.get("id")?,
        tenant_id: row.get("tenant_id")?,
        name: row.get("name")?,
        source: SourceTable {
            catalog_id: row.get("source_catalog_id")?,
            table_id: row.get("source_table_id")?,
            table_name: row.get("source_table_name")?,
            datasource_id: row.get("source_datasource_id")?,
            department_id: row.get("source_department_id")?,
            dialect: Dialect::new(row.get::<_, String>("source_dialect")?),
        },
        target: TargetTable {
            location,
            table_name: row.get("target_table_name")?,
            table_exists: row.get("target_table_exists")?,
            dialect: Dialect::new(row.get::<_, String>("target_dialect")?),
        },
        transmit_mode: code_column(row, "transmit_mode", TransmitMode::from_code)?,
        increment_field: row.get("increment_field")?,
        high_water_mark: datetime_column(row, "high_water_mark")?,
        update_existing: row.get("update_existing")?,
        primary_keys: split_primary_keys(&row.get::<_, String>("primary_keys")?),
        filter_condition: row.get("filter_condition")?,
        masking_enabled: row.get("masking_enabled")?,
        sql: SynthesizedSql {
            create_sql: row.get("create_sql")?,
            insert_sql: row.get("insert_sql")?,
            update_sql: row.get("update_sql")?,
        },
        status: code_column(row, "status", PushStatus::from_code)?,
        audit_state: code_column(row, "audit_state", AuditState::from_code)?,
        pending_operation,
        apply_id: row.get("apply_id")?,
        schedule,
        draft_schedule: row.get("draft_schedule")?,
        error_message: row.get("error_message")?,
        published_at: datetime_column(row, "published_at")?,
        created_at: required_datetime(row, "created_at")?,
        updated_at: required_datetime(row, "updated_at")?,
        fields: Vec::new(),
    })
}

fn code_column<T>(row: &Row<'_>, column: &str, decode: fn(i64) -> Option<T>) -> rusqlite::Result<T> {
    let code: i64 = row.get(column)?;
    decode(code).ok_or_else(|| invalid_column(column, format!("unknown code {code}")))
}

fn datetime_column(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<NaiveDateTime>> {
    row.get::<_, Option<String>>(column)?
        .map(|raw| {
            NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT)
                .map_err(|e| invalid_column(column, format!("bad timestamp {raw}: {e}")))
        })
        .transpose()
}

fn required_datetime(row: &Row<'_>, column: &str) -> rusqlite::Result<NaiveDateTime> {
    datetime_column(row, column)?.ok_or_else(|| invalid_column(column, "missing timestamp".into()))
}

fn date_column(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<NaiveDate>> {
    row.get::<_, Option<String>>(column)?
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, DATE_FORMAT)
                .map_err(|e| invalid_column(column, format!("bad date {raw}: {e}")))
        })
        .transpose()
}

fn invalid_column(column: &str, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        Type::Text,
        format!("column {column}: {message}").into(),
    )
}

fn location_columns(location: &TargetLocation) -> (&'static str, &str) {
    match location {
        TargetLocation::Datasource(id) => ("datasource", id.as_str()),
        TargetLocation::Sandbox(id) => ("sandbox", id.as_str()),
    }
}

fn datetime_text(at: NaiveDateTime) -> String {
    at.format(DATETIME_FORMAT).to_string()
}

fn date_text(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn now_text() -> String {
    datetime_text(chrono::Local::now().naive_local())
}
