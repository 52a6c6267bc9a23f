use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::api::{endpoints, ApiError, Realm, Request, Transport};
use crate::auth::session::check_authenticated;
use crate::auth::Session;
use crate::models::{local_datetime, ClassPeriodTable, ScheduleEvent};
use crate::scrape::portal::{
    datas_rows, period_table, week_date_rows, week_dates, ClassRow, PeriodRow,
};

/// Timetable queries for one term.
#[async_trait]
pub trait TimetableSource: Send + Sync {
    async fn class_periods(&self, term: &str) -> Result<ClassPeriodTable, ApiError>;

    /// Weekday code ("1".."7") -> calendar date for a teaching week
    async fn week_dates(&self, term: &str, week: u32) -> Result<HashMap<String, NaiveDate>, ApiError>;

    async fn week_classes(&self, term: &str, week: u32) -> Result<Vec<ClassRow>, ApiError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermSchedule {
    pub periods: ClassPeriodTable,
    /// Number of teaching weeks that had classes
    pub weeks: u32,
    pub events: Vec<ScheduleEvent>,
}

/// Expand a term into concrete class meetings, week 1 upward, until the
/// first week without classes or `max_weeks`, whichever comes first.
///
/// The period table is loaded first, so every event is built against the
/// timing of its own term.
pub async fn expand_term<S: TimetableSource + ?Sized>(
    source: &S,
    term: &str,
    max_weeks: u32,
) -> Result<TermSchedule, ApiError> {
    let periods = source.class_periods(term).await?;
    debug!(term, periods = periods.periods.len(), "Class periods loaded");

    let mut events = Vec::new();
    let mut weeks = 0;
    for week in 1..=max_weeks {
        let dates = source.week_dates(term, week).await?;
        let classes = source.week_classes(term, week).await?;
        if classes.is_empty() {
            info!(term, weeks, events = events.len(), "Term schedule expanded");
            return Ok(TermSchedule { periods, weeks, events });
        }

        debug!(term, week, classes = classes.len(), "Week expanded");
        for class in &classes {
            events.push(class_event(class, week, &dates, &periods)?);
        }
        weeks = week;
    }

    warn!(term, max_weeks, "Week limit reached before an empty week");
    Ok(TermSchedule { periods, weeks, events })
}

fn class_event(
    class: &ClassRow,
    week: u32,
    dates: &HashMap<String, NaiveDate>,
    periods: &ClassPeriodTable,
) -> Result<ScheduleEvent, ApiError> {
    let date = dates.get(&class.weekday).ok_or_else(|| {
        ApiError::malformed(
            "week dates",
            format!("no date for weekday {} in week {}", class.weekday, week),
        )
    })?;
    let period = |label: &str| {
        periods.get(label).ok_or_else(|| {
            warn!(term = %periods.term, label, "Unknown class period");
            ApiError::malformed("class periods", format!("unknown period {:?}", label))
        })
    };
    let start = period(&class.start_period)?.start;
    let end = period(&class.end_period)?.end;
    let zoned = |time| {
        local_datetime(*date, time).ok_or_else(|| ApiError::malformed("week classes", "ambiguous local time"))
    };

    let name = match class.teacher.as_deref() {
        Some(teacher) if !teacher.is_empty() => format!("{}-{}", class.course, teacher),
        _ => class.course.clone(),
    };
    let location = format!(
        "{}{}",
        class.campus.as_deref().unwrap_or_default(),
        class.room.as_deref().unwrap_or_default()
    );

    Ok(ScheduleEvent {
        name,
        location,
        begin: zoned(start)?,
        end: zoned(end)?,
        week,
    })
}

/// Timetable app behind the identity realm
struct PortalTimetable<'a, T: Transport> {
    transport: &'a T,
}

impl<'a, T: Transport> PortalTimetable<'a, T> {
    async fn post(&self, request: Request) -> Result<String, ApiError> {
        let response = self.transport.send(Realm::Identity, request).await?;
        Ok(check_authenticated(response)?.body)
    }
}

#[async_trait]
impl<'a, T: Transport> TimetableSource for PortalTimetable<'a, T> {
    async fn class_periods(&self, term: &str) -> Result<ClassPeriodTable, ApiError> {
        let body = self
            .post(Request::post(endpoints::class_periods_url()).form("XNXQDM", term))
            .await?;
        period_table(term, datas_rows::<PeriodRow>(&body, "jc")?)
    }

    async fn week_dates(&self, term: &str, week: u32) -> Result<HashMap<String, NaiveDate>, ApiError> {
        let param = json!({ "XNXQDM": term, "ZC": week.to_string() }).to_string();
        let body = self
            .post(Request::post(endpoints::week_dates_url()).form("requestParamStr", param))
            .await?;
        week_dates(week_date_rows(&body)?)
    }

    async fn week_classes(&self, term: &str, week: u32) -> Result<Vec<ClassRow>, ApiError> {
        let body = self
            .post(
                Request::post(endpoints::week_classes_url())
                    .form("XNXQDM", term)
                    .form("SKZC", week.to_string()),
            )
            .await?;
        datas_rows(&body, "cxxszhxqkb")
    }
}

impl<T: Transport> Session<T> {
    /// The given term, or the current one fetched from the portal
    pub(crate) async fn term_or_current(&mut self, term: Option<&str>) -> Result<String, ApiError> {
        match term {
            Some(term) => Ok(term.to_string()),
            None => self.current_term().await,
        }
    }

    /// Every class meeting of a term. Defaults to the current term.
    pub async fn term_schedule(&mut self, term: Option<&str>) -> Result<Vec<ScheduleEvent>, ApiError> {
        self.ensure_identity().await?;
        let term = self.term_or_current(term).await?;

        let source = PortalTimetable {
            transport: &self.transport,
        };
        let result = expand_term(&source, &term, self.options.max_weeks).await;
        let schedule = self.note_auth_error(Realm::Identity, result)?;

        self.state.class_period_table = Some(schedule.periods);
        Ok(schedule.events)
    }
}
