//! Request and job builders

use chrono::NaiveDateTime;
use datapush_core::schedule::parse_datetime;
use datapush_domain::{
    Dialect, ExecutionHistory, ExecutionLogEntry, PushField, PushJobRequest, ScheduleBody,
    ScheduleType, SourceTable, TargetLocation, TargetTable, TransmitMode,
};

pub fn at(raw: &str) -> NaiveDateTime {
    parse_datetime(raw, "fixture").unwrap()
}

pub fn field(source: &str, source_type: &str, target: &str) -> PushField {
    PushField {
        source_name: source.to_string(),
        source_type: source_type.to_string(),
        target_name: target.to_string(),
        target_business_name: String::new(),
        target_type: String::new(),
        length: None,
        precision: None,
        nullable: true,
        masking_rule_id: None,
    }
}

pub fn immediate() -> ScheduleBody {
    ScheduleBody { schedule_type: Some(ScheduleType::Once), ..ScheduleBody::default() }
}

pub fn once(raw: &str) -> ScheduleBody {
    ScheduleBody {
        schedule_type: Some(ScheduleType::Once),
        once_time: Some(raw.to_string()),
        ..ScheduleBody::default()
    }
}

pub fn period(start: &str, end: &str, crontab: &str) -> ScheduleBody {
    ScheduleBody {
        schedule_type: Some(ScheduleType::Period),
        once_time: None,
        start_date: Some(start.to_string()),
        end_date: Some(end.to_string()),
        crontab: Some(crontab.to_string()),
    }
}

/// Full-sync postgres to mysql request over `ods.orders`.
pub fn request(name: &str) -> PushJobRequest {
    request_between(name, "postgres", "mysql", vec![
        field("id", "INT8", "id"),
        field("amount", "NUMERIC", "amount"),
        field("updated_at", "TIMESTAMP", "updated_at"),
    ])
}

pub fn request_between(
    name: &str,
    source_dialect: &str,
    target_dialect: &str,
    fields: Vec<PushField>,
) -> PushJobRequest {
    PushJobRequest {
        name: name.to_string(),
        shadow: false,
        source: SourceTable {
            catalog_id: "cat-1".into(),
            table_id: "tbl-1".into(),
            table_name: "ods.orders".into(),
            datasource_id: "ds-src".into(),
            department_id: "dept-1".into(),
            dialect: Dialect::new(source_dialect),
        },
        target: TargetTable {
            location: TargetLocation::Datasource("ds-tgt".into()),
            table_name: "orders_copy".into(),
            table_exists: false,
            dialect: Dialect::new(target_dialect),
        },
        transmit_mode: TransmitMode::Full,
        increment_field: None,
        high_water_mark: None,
        update_existing: false,
        primary_keys: Vec::new(),
        filter_condition: None,
        masking_enabled: false,
        schedule: immediate(),
        fields,
    }
}

/// Incremental variant of [`request`] keyed on `id`, watermarked on `updated_at`.
pub fn incremental_request(name: &str, update_existing: bool) -> PushJobRequest {
    PushJobRequest {
        transmit_mode: TransmitMode::Incremental,
        increment_field: Some("updated_at".into()),
        high_water_mark: Some("2024-01-01 00:00:00".into()),
        update_existing,
        primary_keys: vec!["id".into()],
        ..request(name)
    }
}

pub fn log(start: &str, end: &str, rows: i64, status: &str) -> ExecutionLogEntry {
    ExecutionLogEntry {
        start_time: start.to_string(),
        end_time: end.to_string(),
        row_count: rows,
        status: status.to_string(),
    }
}

pub fn history(entries: Vec<ExecutionLogEntry>) -> ExecutionHistory {
    ExecutionHistory { total: entries.len() as u64, entries }
}
