//! Data models for portal records.
//!
//! - `ScoreRow`, `ScoreDetail`, `ScoreRecord`, `ScoreCache`: scores and their analytics
//! - `ScheduleEvent`, `ClassPeriodTable`: timetable expansion
//! - `ExamRecord`: exam arrangements
//! - `Profile`, `CourseFile`: account info and course file listings

pub mod profile;
pub mod schedule;
pub mod score;

pub use profile::{CourseFile, Profile};
pub use schedule::{
    institution_offset, local_datetime, ClassPeriodTable, ExamRecord, PeriodTime, ScheduleEvent,
};
pub use score::{ScoreCache, ScoreDelta, ScoreDetail, ScoreKey, ScoreRecord, ScoreRow};
