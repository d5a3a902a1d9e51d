//! # Staff
//!
//! Staff profiles and the locations each member works at. Login identities and roles for
//! the API live in `core-access`; this module only keeps the directory administrators edit.

use crate::{
    errors::IntakeError,
    providers::db::sqlite::{
        begin, finish, get_bool, get_i64, get_opt_text, get_text, int, opt_text, text,
        timestamp_now,
    },
    types::{NewStaffMember, StaffMember, StaffUpdate},
    validation::{non_blank, normalize_phone},
};
use std::collections::HashMap;
use tracing::info;
use turso::{params, params::Params, Connection, Database, Row};

const STAFF_COLUMNS: &str = "id, first_name, last_name, email, mobile_phone, role_group, \
     default_location, is_active, created_on";

impl TryFrom<&Row> for StaffMember {
    type Error = IntakeError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(StaffMember {
            id: get_i64(row, 0)?,
            first_name: get_text(row, 1)?,
            last_name: get_text(row, 2)?,
            email: get_text(row, 3)?,
            mobile_phone: get_opt_text(row, 4)?,
            role_group: get_text(row, 5)?,
            default_location: get_opt_text(row, 6)?,
            locations: Vec::new(),
            is_active: get_bool(row, 7)?,
            created_on: get_text(row, 8)?,
        })
    }
}

fn required(value: &str, field: &str) -> Result<String, IntakeError> {
    non_blank(Some(value)).ok_or_else(|| IntakeError::validation(format!("Missing field: {field}")))
}

async fn find_staff(conn: &Connection, id: i64) -> Result<Option<StaffMember>, IntakeError> {
    let mut rows = conn
        .query(
            &format!("SELECT {STAFF_COLUMNS} FROM staff WHERE id = ?"),
            params![id],
        )
        .await?;
    let Some(row) = rows.next().await? else {
        return Ok(None);
    };
    let mut member = StaffMember::try_from(&row)?;
    drop(rows);
    member.locations = location_names(conn, Some(id))
        .await?
        .remove(&id)
        .unwrap_or_default();
    Ok(Some(member))
}

/// Location names keyed by staff id, for one member or for everyone.
async fn location_names(
    conn: &Connection,
    staff_id: Option<i64>,
) -> Result<HashMap<i64, Vec<String>>, IntakeError> {
    let sql = "SELECT sl.staff_id, l.name FROM staff_locations sl
               JOIN locations l ON l.id = sl.location_id";
    let mut rows = match staff_id {
        Some(id) => {
            conn.query(
                &format!("{sql} WHERE sl.staff_id = ? ORDER BY l.name ASC"),
                params![id],
            )
            .await?
        }
        None => conn.query(&format!("{sql} ORDER BY l.name ASC"), ()).await?,
    };
    let mut names: HashMap<i64, Vec<String>> = HashMap::new();
    while let Some(row) = rows.next().await? {
        names.entry(get_i64(&row, 0)?).or_default().push(get_text(&row, 1)?);
    }
    Ok(names)
}

/// Rejects an email already used by another member.
async fn ensure_email_free(
    conn: &Connection,
    email: &str,
    except_id: Option<i64>,
) -> Result<(), IntakeError> {
    let mut rows = conn
        .query(
            "SELECT id FROM staff WHERE LOWER(email) = ?",
            params![email.to_string()],
        )
        .await?;
    while let Some(row) = rows.next().await? {
        if Some(get_i64(&row, 0)?) != except_id {
            return Err(IntakeError::Conflict(
                "A user with this email already exists".to_string(),
            ));
        }
    }
    Ok(())
}

/// Replaces the location set of a member. Unknown location ids fail the whole write.
async fn assign_locations(
    conn: &Connection,
    staff_id: i64,
    location_ids: &[i64],
) -> Result<(), IntakeError> {
    let mut ids = location_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    for id in &ids {
        let mut rows = conn
            .query("SELECT id FROM locations WHERE id = ?", params![*id])
            .await?;
        if rows.next().await?.is_none() {
            return Err(IntakeError::not_found(format!("Location {id} not found")));
        }
    }

    conn.execute(
        "DELETE FROM staff_locations WHERE staff_id = ?",
        params![staff_id],
    )
    .await?;
    for id in ids {
        conn.execute(
            "INSERT INTO staff_locations (staff_id, location_id) VALUES (?, ?)",
            params![staff_id, id],
        )
        .await?;
    }
    Ok(())
}

/// Every staff member in creation order, with their location names.
pub async fn list_staff(db: &Database) -> Result<Vec<StaffMember>, IntakeError> {
    let conn = db.connect()?;
    let mut rows = conn
        .query(&format!("SELECT {STAFF_COLUMNS} FROM staff ORDER BY id ASC"), ())
        .await?;
    let mut members = Vec::new();
    while let Some(row) = rows.next().await? {
        members.push(StaffMember::try_from(&row)?);
    }
    drop(rows);

    let mut names = location_names(&conn, None).await?;
    for member in &mut members {
        member.locations = names.remove(&member.id).unwrap_or_default();
    }
    Ok(members)
}

pub async fn get_staff(db: &Database, id: i64) -> Result<StaffMember, IntakeError> {
    let conn = db.connect()?;
    find_staff(&conn, id)
        .await?
        .ok_or_else(|| IntakeError::not_found("User not found"))
}

/// Creates a member and their location assignments in one transaction.
pub async fn create_staff(db: &Database, input: NewStaffMember) -> Result<StaffMember, IntakeError> {
    let first_name = required(&input.first_name, "first_name")?;
    let last_name = required(&input.last_name, "last_name")?;
    let email = required(&input.email, "email")?.to_lowercase();
    let mobile_phone = normalize_phone(Some(&input.mobile_phone))
        .ok_or_else(|| IntakeError::validation("Missing field: mobile_phone"))?;
    let role_group = required(&input.role_group, "role_group")?;
    let default_location = non_blank(input.default_location.as_deref());

    let conn = db.connect()?;
    ensure_email_free(&conn, &email, None).await?;

    begin(&conn).await?;
    let result = insert_staff(
        &conn,
        [
            first_name.as_str(),
            last_name.as_str(),
            email.as_str(),
            mobile_phone.as_str(),
            role_group.as_str(),
        ],
        default_location.as_deref(),
        &input,
    )
    .await;
    let id = finish(&conn, result).await?;
    info!(staff_id = id, role_group = %role_group, "Created staff member.");

    find_staff(&conn, id)
        .await?
        .ok_or_else(|| IntakeError::DataIntegrity(format!("Staff member {id} vanished after insert")))
}

async fn insert_staff(
    conn: &Connection,
    [first_name, last_name, email, mobile_phone, role_group]: [&str; 5],
    default_location: Option<&str>,
    input: &NewStaffMember,
) -> Result<i64, IntakeError> {
    let mut rows = conn
        .query(
            "INSERT INTO staff (first_name, last_name, email, mobile_phone, role_group,
                 default_location, is_active, created_on)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
            Params::Positional(vec![
                text(first_name),
                text(last_name),
                text(email),
                text(mobile_phone),
                text(role_group),
                opt_text(default_location),
                int(input.is_active as i64),
                text(&timestamp_now()),
            ]),
        )
        .await?;
    let id = match rows.next().await? {
        Some(row) => get_i64(&row, 0)?,
        None => {
            return Err(IntakeError::DataIntegrity(
                "Insert into staff returned no id".to_string(),
            ))
        }
    };
    drop(rows);
    assign_locations(conn, id, &input.location_ids).await?;
    Ok(id)
}

async fn write_update(
    conn: &Connection,
    id: i64,
    profile: Params,
    location_ids: Option<&[i64]>,
) -> Result<(), IntakeError> {
    conn.execute(
        "UPDATE staff SET first_name = ?, last_name = ?, email = ?, mobile_phone = ?,
             role_group = ?, default_location = ?, is_active = ?
         WHERE id = ?",
        profile,
    )
    .await?;
    if let Some(location_ids) = location_ids {
        assign_locations(conn, id, location_ids).await?;
    }
    Ok(())
}

/// Updates a profile. Location assignments are replaced only when `location_ids` is given.
pub async fn update_staff(
    db: &Database,
    id: i64,
    update: StaffUpdate,
) -> Result<StaffMember, IntakeError> {
    let first_name = required(&update.first_name, "first_name")?;
    let email = required(&update.email, "email")?.to_lowercase();

    let conn = db.connect()?;
    let current = find_staff(&conn, id)
        .await?
        .ok_or_else(|| IntakeError::not_found("User not found"))?;
    ensure_email_free(&conn, &email, Some(id)).await?;

    let last_name = non_blank(update.last_name.as_deref()).unwrap_or(current.last_name);
    let mobile_phone = match update.mobile_phone {
        Some(raw) => normalize_phone(Some(&raw)),
        None => current.mobile_phone,
    };
    let role_group = non_blank(update.role_group.as_deref()).unwrap_or(current.role_group);
    let default_location = match update.default_location {
        Some(raw) => non_blank(Some(&raw)),
        None => current.default_location,
    };
    let is_active = update.is_active.unwrap_or(current.is_active);

    let profile = Params::Positional(vec![
        text(&first_name),
        text(&last_name),
        text(&email),
        opt_text(mobile_phone.as_deref()),
        text(&role_group),
        opt_text(default_location.as_deref()),
        int(is_active as i64),
        int(id),
    ]);
    begin(&conn).await?;
    let result = write_update(&conn, id, profile, update.location_ids.as_deref()).await;
    finish(&conn, result).await?;
    info!(staff_id = id, "Updated staff member.");

    find_staff(&conn, id)
        .await?
        .ok_or_else(|| IntakeError::not_found("User not found"))
}
