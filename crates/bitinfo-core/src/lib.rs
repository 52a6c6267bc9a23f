//! bitinfo core - authenticated session and incremental scrape-sync engine
//! for the campus portal.
//!
//! A [`Session`] owns one bound identity: its transport, its persisted
//! [`SessionState`] and, while linked, its password. Each operation first
//! repairs whichever of the two logins (identity provider and tunnel) has
//! expired, then scrapes the pages it needs and merges the results into the
//! state. Callers persist [`Session::snapshot`] through a [`SessionStore`]
//! after every operation.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod files;
pub mod models;
pub mod schedule;
pub mod scrape;
pub mod sync;

pub use api::{ApiError, HttpTransport, Realm, Transport};
pub use auth::{AuthPhase, CredentialStore, Credentials, Session, SessionOptions};
pub use cache::{FileStore, MemoryStore, SessionState, SessionStore};
pub use config::Config;
pub use models::{CourseFile, ExamRecord, Profile, ScheduleEvent, ScoreDelta, ScoreRecord};
