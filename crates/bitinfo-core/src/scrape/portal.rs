//! JSON responses of the portal apps (timetable, exams, student info).
//!
//! Most endpoints wrap their rows as `{"datas": {"<name>": {"rows": [...]}}}`.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::api::ApiError;
use crate::models::{local_datetime, ClassPeriodTable, ExamRecord, PeriodTime, Profile};

/// Exam time text: "2022-01-10 08:00-10:00(星期一)"
static EXAM_TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+-\d+-\d+) (\d+:\d+)-(\d+:\d+)").expect("Invalid exam time regex")
});

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// Pull `datas.<name>.rows` out of a portal response.
pub fn datas_rows<T: DeserializeOwned>(body: &str, name: &'static str) -> Result<Vec<T>, ApiError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ApiError::malformed(name, format!("not JSON: {}", e)))?;
    let rows = value
        .pointer(&format!("/datas/{}/rows", name))
        .cloned()
        .ok_or_else(|| {
            warn!(endpoint = name, body = %ApiError::truncate_body(body), "Missing rows envelope");
            ApiError::malformed(name, "missing datas.rows envelope")
        })?;
    serde_json::from_value(rows).map_err(|e| ApiError::malformed(name, e.to_string()))
}

/// Weekday codes arrive as numbers from one endpoint and strings from another.
fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number, got {}", other))),
    }
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!("expected string or number, got {}", other))),
    }
}

#[derive(Debug, Deserialize)]
pub struct StudentInfoRow {
    #[serde(rename = "XM")]
    pub name: String,
    #[serde(rename = "YXMC", default)]
    pub department: Option<String>,
}

impl From<StudentInfoRow> for Profile {
    fn from(row: StudentInfoRow) -> Self {
        Profile {
            display_name: row.name,
            department: row.department.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TermRow {
    #[serde(rename = "DM")]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct PeriodRow {
    #[serde(rename = "MC")]
    pub label: String,
    #[serde(rename = "KSSJ")]
    pub start: String,
    #[serde(rename = "JSSJ")]
    pub end: String,
}

#[derive(Debug, Deserialize)]
pub struct WeekDateRow {
    #[serde(rename = "XQ", deserialize_with = "string_or_number")]
    pub weekday: String,
    #[serde(rename = "RQ")]
    pub date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassRow {
    #[serde(rename = "KCM")]
    pub course: String,
    #[serde(rename = "SKJS", default)]
    pub teacher: Option<String>,
    #[serde(rename = "XXXQMC", default)]
    pub campus: Option<String>,
    #[serde(rename = "JASMC", default)]
    pub room: Option<String>,
    #[serde(rename = "SKXQ", deserialize_with = "string_or_number")]
    pub weekday: String,
    #[serde(rename = "KSJC_DISPLAY")]
    pub start_period: String,
    #[serde(rename = "JSJC_DISPLAY")]
    pub end_period: String,
}

#[derive(Debug, Deserialize)]
pub struct ExamRow {
    #[serde(rename = "KCM")]
    pub course: String,
    #[serde(rename = "ZJJSXM", default)]
    pub teacher: Option<String>,
    #[serde(rename = "KCH")]
    pub course_code: String,
    #[serde(rename = "JASMC", default)]
    pub room: Option<String>,
    #[serde(rename = "KSSJMS")]
    pub time_text: String,
    #[serde(rename = "ZWH", default, deserialize_with = "opt_string_or_number")]
    pub seat: Option<String>,
}

fn parse_time(text: &str, what: &'static str) -> Result<NaiveTime, ApiError> {
    NaiveTime::parse_from_str(text.trim(), TIME_FORMAT)
        .map_err(|_| ApiError::malformed(what, format!("bad time {:?}", text)))
}

fn parse_date(text: &str, what: &'static str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|_| ApiError::malformed(what, format!("bad date {:?}", text)))
}

pub fn period_table(term: &str, rows: Vec<PeriodRow>) -> Result<ClassPeriodTable, ApiError> {
    let mut table = ClassPeriodTable::new(term);
    for row in rows {
        let time = PeriodTime {
            start: parse_time(&row.start, "class periods")?,
            end: parse_time(&row.end, "class periods")?,
        };
        table.periods.insert(row.label, time);
    }
    if table.periods.is_empty() {
        return Err(ApiError::malformed("class periods", "no periods returned"));
    }
    Ok(table)
}

/// Weekday code -> calendar date for one teaching week
pub fn week_dates(rows: Vec<WeekDateRow>) -> Result<HashMap<String, NaiveDate>, ApiError> {
    rows.into_iter()
        .map(|row| Ok((row.weekday, parse_date(&row.date, "week dates")?)))
        .collect()
}

/// Read the `data` array of the week-date endpoint, which skips the usual envelope.
pub fn week_date_rows(body: &str) -> Result<Vec<WeekDateRow>, ApiError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ApiError::malformed("week dates", format!("not JSON: {}", e)))?;
    let rows = value
        .get("data")
        .cloned()
        .ok_or_else(|| ApiError::malformed("week dates", "missing data array"))?;
    serde_json::from_value(rows).map_err(|e| ApiError::malformed("week dates", e.to_string()))
}

impl ExamRow {
    pub fn into_record(self) -> Result<ExamRecord, ApiError> {
        let caps = EXAM_TIME_REGEX.captures(&self.time_text).ok_or_else(|| {
            warn!(text = %self.time_text, "Exam time text did not match");
            ApiError::malformed("exams", format!("unrecognized time {:?}", self.time_text))
        })?;
        let date = parse_date(&caps[1], "exams")?;
        let begin = parse_time(&caps[2], "exams")?;
        let end = parse_time(&caps[3], "exams")?;
        let zoned = |time| {
            local_datetime(date, time)
                .ok_or_else(|| ApiError::malformed("exams", "ambiguous local time"))
        };

        Ok(ExamRecord {
            name: format!(
                "{}-{}-{}",
                self.course,
                self.teacher.unwrap_or_default(),
                self.course_code
            ),
            location: self.room.unwrap_or_default(),
            begin: zoned(begin)?,
            end: zoned(end)?,
            description: format!("Seat: {}", self.seat.unwrap_or_default()),
        })
    }
}
