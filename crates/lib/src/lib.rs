//! # Intake
//!
//! The domain library of the intake backend: patients, form templates and the forms
//! engine that assigns templates, records submissions, computes completion and serves
//! the dashboard projections. Appointments, locations, staff profiles, analytics and CSV
//! export sit alongside.
//!
//! Every operation takes a `&turso::Database`, opens its own connection and drops it
//! before returning.

pub mod analytics;
pub mod appointments;
pub mod assignments;
pub mod completion;
pub mod constants;
pub mod delivery;
pub mod errors;
pub mod export;
pub mod locations;
pub mod patients;
pub mod projection;
pub mod providers;
pub mod staff;
pub mod submissions;
pub mod templates;
pub mod types;
pub mod validation;

pub use errors::IntakeError;
pub use providers::db::sqlite::SqliteProvider;
