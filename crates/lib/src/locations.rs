//! # Locations
//!
//! Clinic locations offered when assigning and dispatching forms.

use crate::{
    errors::IntakeError,
    providers::db::sqlite::{get_bool, get_i64, get_opt_text, get_text, int, opt_text, text, timestamp_now},
    types::{Location, LocationInput},
    validation::non_blank,
};
use tracing::info;
use turso::{params, params::Params, Connection, Database, Row, Value as TursoValue};

const LOCATION_COLUMNS: &str = "id, name, phone, timezone, schedule_start, schedule_end, address, \
     apartment_suite, city, state, zip_code, is_active, created_on";

impl TryFrom<&Row> for Location {
    type Error = IntakeError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Location {
            id: get_i64(row, 0)?,
            name: get_text(row, 1)?,
            phone: get_opt_text(row, 2)?,
            timezone: get_opt_text(row, 3)?,
            schedule_start: get_opt_text(row, 4)?,
            schedule_end: get_opt_text(row, 5)?,
            address: get_opt_text(row, 6)?,
            apartment_suite: get_opt_text(row, 7)?,
            city: get_opt_text(row, 8)?,
            state: get_opt_text(row, 9)?,
            zip_code: get_opt_text(row, 10)?,
            is_active: get_bool(row, 11)?,
            created_on: get_text(row, 12)?,
        })
    }
}

async fn find_location(conn: &Connection, id: i64) -> Result<Option<Location>, IntakeError> {
    let mut rows = conn
        .query(
            &format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?"),
            params![id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(Location::try_from(&row)?)),
        None => Ok(None),
    }
}

/// Rejects a name that is blank or already used by another location.
async fn checked_name(
    conn: &Connection,
    input: &LocationInput,
    except_id: Option<i64>,
) -> Result<String, IntakeError> {
    let name = non_blank(Some(&input.name))
        .ok_or_else(|| IntakeError::validation("Location name is required"))?;
    let mut rows = conn
        .query(
            "SELECT id FROM locations WHERE LOWER(name) = LOWER(?)",
            params![name.clone()],
        )
        .await?;
    while let Some(row) = rows.next().await? {
        if Some(get_i64(&row, 0)?) != except_id {
            return Err(IntakeError::Conflict(format!(
                "Location '{name}' already exists"
            )));
        }
    }
    Ok(name)
}

/// The optional columns of a location, in table order from `phone` to `is_active`.
fn detail_values(input: &LocationInput) -> Vec<TursoValue> {
    vec![
        opt_text(non_blank(input.phone.as_deref()).as_deref()),
        opt_text(non_blank(input.timezone.as_deref()).as_deref()),
        opt_text(non_blank(input.schedule_start.as_deref()).as_deref()),
        opt_text(non_blank(input.schedule_end.as_deref()).as_deref()),
        opt_text(non_blank(input.address.as_deref()).as_deref()),
        opt_text(non_blank(input.apartment_suite.as_deref()).as_deref()),
        opt_text(non_blank(input.city.as_deref()).as_deref()),
        opt_text(non_blank(input.state.as_deref()).as_deref()),
        opt_text(non_blank(input.zip_code.as_deref()).as_deref()),
        int(input.is_active as i64),
    ]
}

/// All locations ordered by name.
pub async fn list_locations(db: &Database) -> Result<Vec<Location>, IntakeError> {
    let conn = db.connect()?;
    let mut rows = conn
        .query(
            &format!("SELECT {LOCATION_COLUMNS} FROM locations ORDER BY name ASC"),
            (),
        )
        .await?;
    let mut locations = Vec::new();
    while let Some(row) = rows.next().await? {
        locations.push(Location::try_from(&row)?);
    }
    Ok(locations)
}

pub async fn add_location(db: &Database, input: LocationInput) -> Result<Location, IntakeError> {
    let conn = db.connect()?;
    let name = checked_name(&conn, &input, None).await?;

    let mut values = vec![text(&name)];
    values.extend(detail_values(&input));
    values.push(text(&timestamp_now()));
    let mut rows = conn
        .query(
            "INSERT INTO locations (name, phone, timezone, schedule_start, schedule_end, address,
                 apartment_suite, city, state, zip_code, is_active, created_on)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
            Params::Positional(values),
        )
        .await?;
    let id = match rows.next().await? {
        Some(row) => get_i64(&row, 0)?,
        None => {
            return Err(IntakeError::DataIntegrity(
                "Insert into locations returned no id".to_string(),
            ))
        }
    };
    drop(rows);
    info!(location_id = id, name = %name, "Added location.");

    find_location(&conn, id)
        .await?
        .ok_or_else(|| IntakeError::DataIntegrity(format!("Location {id} vanished after insert")))
}

/// Replaces every column of a location.
pub async fn update_location(
    db: &Database,
    id: i64,
    input: LocationInput,
) -> Result<Location, IntakeError> {
    let conn = db.connect()?;
    if find_location(&conn, id).await?.is_none() {
        return Err(IntakeError::not_found("Location not found"));
    }
    let name = checked_name(&conn, &input, Some(id)).await?;

    let mut values = vec![text(&name)];
    values.extend(detail_values(&input));
    values.push(int(id));
    conn.execute(
        "UPDATE locations SET name = ?, phone = ?, timezone = ?, schedule_start = ?, schedule_end = ?,
             address = ?, apartment_suite = ?, city = ?, state = ?, zip_code = ?, is_active = ?
         WHERE id = ?",
        Params::Positional(values),
    )
    .await?;
    info!(location_id = id, "Updated location.");

    find_location(&conn, id)
        .await?
        .ok_or_else(|| IntakeError::not_found("Location not found"))
}

/// Flips `is_active` and returns the new state.
pub async fn toggle_location(db: &Database, id: i64) -> Result<bool, IntakeError> {
    let conn = db.connect()?;
    let location = find_location(&conn, id)
        .await?
        .ok_or_else(|| IntakeError::not_found("Location not found"))?;
    let active = !location.is_active;
    conn.execute(
        "UPDATE locations SET is_active = ? WHERE id = ?",
        params![active as i64, id],
    )
    .await?;
    info!(location_id = id, active, "Toggled location.");
    Ok(active)
}
