//! Crontab validation for period schedules
//!
//! Accepts the five standard fields (minute hour day month weekday) or six
//! with a leading seconds field, as the sync engine's scheduler does. `?` is
//! accepted in the day and weekday positions as "no specific value".

use std::fmt;

use thiserror::Error;

/// Error type for cron parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CronParseError {
    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Wrong number of fields: expected 5 or 6, got {0}")]
    FieldCount(usize),
}

/// A parsed crontab expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrontabExpression {
    second: Option<CronField>,
    minute: CronField,
    hour: CronField,
    day: CronField,
    month: CronField,
    weekday: CronField,
}

impl CrontabExpression {
    /// Parse a crontab expression from a string
    pub fn parse(expr: &str) -> Result<Self, CronParseError> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        let (second, rest) = match parts.len() {
            5 => (None, &parts[..]),
            6 => (Some(CronField::parse(parts[0], 0, 59, false)?), &parts[1..]),
            n => return Err(CronParseError::FieldCount(n)),
        };

        Ok(Self {
            second,
            minute: CronField::parse(rest[0], 0, 59, false)?,
            hour: CronField::parse(rest[1], 0, 23, false)?,
            day: CronField::parse(rest[2], 1, 31, true)?,
            month: CronField::parse(&month_names(rest[3]), 1, 12, false)?,
            weekday: CronField::parse(&weekday_names(rest[4]), 0, 7, true)?,
        })
    }

    pub fn has_seconds(&self) -> bool {
        self.second.is_some()
    }
}

impl fmt::Display for CrontabExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(second) = &self.second {
            write!(f, "{second} ")?;
        }
        write!(f, "{} {} {} {} {}", self.minute, self.hour, self.day, self.month, self.weekday)
    }
}

/// Validate a crontab string.
pub fn validate_crontab(expr: &str) -> Result<(), CronParseError> {
    CrontabExpression::parse(expr).map(|_| ())
}

/// One crontab field
#[derive(Debug, Clone, PartialEq, Eq)]
enum CronField {
    Any,
    NoSpecific,
    Single(u32),
    List(Vec<u32>),
    Range(u32, u32),
    Step(u32, u32), // start, step
}

impl CronField {
    fn parse(s: &str, min: u32, max: u32, allow_no_specific: bool) -> Result<Self, CronParseError> {
        if s == "*" {
            return Ok(CronField::Any);
        }
        if s == "?" {
            return if allow_no_specific {
                Ok(CronField::NoSpecific)
            } else {
                Err(CronParseError::InvalidField(s.to_string()))
            };
        }

        if s.contains(',') {
            let values = s
                .split(',')
                .map(|v| parse_value(v.trim(), s, min, max))
                .collect::<Result<Vec<u32>, _>>()?;
            return Ok(CronField::List(values));
        }

        if let Some((base, step)) = s.split_once('/') {
            let step: u32 = step.parse().map_err(|_| CronParseError::InvalidField(s.to_string()))?;
            if step == 0 {
                return Err(CronParseError::InvalidField(s.to_string()));
            }
            let start = match base {
                "*" => min,
                range if range.contains('-') => match CronField::parse(range, min, max, false)? {
                    CronField::Range(start, _) => start,
                    _ => return Err(CronParseError::InvalidField(s.to_string())),
                },
                value => parse_value(value, s, min, max)?,
            };
            return Ok(CronField::Step(start, step));
        }

        if let Some((start, end)) = s.split_once('-') {
            let start = parse_value(start, s, min, max)?;
            let end = parse_value(end, s, min, max)?;
            if start > end {
                return Err(CronParseError::InvalidRange(format!(
                    "{start}-{end} not valid in range {min}-{max}"
                )));
            }
            return Ok(CronField::Range(start, end));
        }

        Ok(CronField::Single(parse_value(s, s, min, max)?))
    }
}

fn parse_value(raw: &str, field: &str, min: u32, max: u32) -> Result<u32, CronParseError> {
    let value: u32 = raw.parse().map_err(|_| CronParseError::InvalidField(field.to_string()))?;
    if value < min || value > max {
        return Err(CronParseError::InvalidRange(format!("{value} not in range {min}-{max}")));
    }
    Ok(value)
}

const MONTHS: [&str; 12] =
    ["JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC"];
const WEEKDAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

fn month_names(field: &str) -> String {
    replace_names(field, &MONTHS, 1)
}

fn weekday_names(field: &str) -> String {
    replace_names(field, &WEEKDAYS, 0)
}

fn replace_names(field: &str, names: &[&str], offset: usize) -> String {
    let mut out = field.to_ascii_uppercase();
    for (i, name) in names.iter().enumerate() {
        out = out.replace(name, &(i + offset).to_string());
    }
    out
}

impl fmt::Display for CronField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CronField::Any => write!(f, "*"),
            CronField::NoSpecific => write!(f, "?"),
            CronField::Single(v) => write!(f, "{v}"),
            CronField::List(values) => {
                let strs: Vec<String> = values.iter().map(u32::to_string).collect();
                write!(f, "{}", strs.join(","))
            }
            CronField::Range(start, end) => write!(f, "{start}-{end}"),
            CronField::Step(start, step) => write!(f, "{start}/{step}"),
        }
    }
}
