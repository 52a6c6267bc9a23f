//! Timetable expansion and exam listing.
//!
//! The portal has no term-length field, so weeks are enumerated from 1 until
//! the first week without classes, capped by `SessionOptions::max_weeks`.

pub mod exams;
pub mod expand;

pub use expand::{expand_term, TermSchedule, TimetableSource};
