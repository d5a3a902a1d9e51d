//! # Shared Constants
//!
//! Defaults shared by the library, the server and the tests.

/// The root directory for local databases.
pub const DB_DIR: &str = "db";

/// The default path for the intake SQLite database.
pub const DEFAULT_DB_FILE: &str = "db/intake.db";

/// The location label written on assignments when none is given.
pub const DEFAULT_LOCATION: &str = "GIA HR";
