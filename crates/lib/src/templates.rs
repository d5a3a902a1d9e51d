//! # Form Templates
//!
//! Templates are immutable once created: a name plus an ordered set of fields whose
//! ids (`<form_id>.<position>`) never change.

use crate::{
    errors::IntakeError,
    providers::db::sqlite::{
        begin, finish, get_bool, get_i64, get_opt_text, get_text, int, opt_text, text,
        timestamp_now,
    },
    types::{FormField, FormTemplate, NewTemplate, TemplateSummary, TemplateWithFields},
};
use std::collections::HashMap;
use tracing::info;
use turso::{params, params::Params, Connection, Database, Row};

impl TryFrom<&Row> for FormTemplate {
    type Error = IntakeError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(FormTemplate {
            form_id: get_i64(row, 0)?,
            form_name: get_text(row, 1)?,
            form_url: get_opt_text(row, 2)?,
            created_at: get_text(row, 3)?,
        })
    }
}

impl TryFrom<&Row> for FormField {
    type Error = IntakeError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(FormField {
            field_id: get_text(row, 0)?,
            form_id: get_i64(row, 1)?,
            position: get_i64(row, 2)?,
            field_label: get_text(row, 3)?,
            field_type: get_text(row, 4)?,
            is_required: get_bool(row, 5)?,
        })
    }
}

pub(crate) async fn find_template(
    conn: &Connection,
    form_id: i64,
) -> Result<Option<FormTemplate>, IntakeError> {
    let mut rows = conn
        .query(
            "SELECT form_id, form_name, form_url, created_at FROM forms WHERE form_id = ?",
            params![form_id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(FormTemplate::try_from(&row)?)),
        None => Ok(None),
    }
}

/// The fields of a template in display order.
pub(crate) async fn fields_for_template(
    conn: &Connection,
    form_id: i64,
) -> Result<Vec<FormField>, IntakeError> {
    let mut rows = conn
        .query(
            "SELECT field_id, form_id, position, field_label, field_type, is_required
             FROM form_fields WHERE form_id = ? ORDER BY position ASC",
            params![form_id],
        )
        .await?;
    let mut fields = Vec::new();
    while let Some(row) = rows.next().await? {
        fields.push(FormField::try_from(&row)?);
    }
    Ok(fields)
}

/// Every template keyed by id.
pub(crate) async fn all_templates(
    conn: &Connection,
) -> Result<HashMap<i64, FormTemplate>, IntakeError> {
    let mut rows = conn
        .query("SELECT form_id, form_name, form_url, created_at FROM forms", ())
        .await?;
    let mut templates = HashMap::new();
    while let Some(row) = rows.next().await? {
        let template = FormTemplate::try_from(&row)?;
        templates.insert(template.form_id, template);
    }
    Ok(templates)
}

/// The fields of every template, keyed by template id and ordered by position.
pub(crate) async fn all_fields(
    conn: &Connection,
) -> Result<HashMap<i64, Vec<FormField>>, IntakeError> {
    let mut rows = conn
        .query(
            "SELECT field_id, form_id, position, field_label, field_type, is_required
             FROM form_fields ORDER BY form_id ASC, position ASC",
            (),
        )
        .await?;
    let mut fields: HashMap<i64, Vec<FormField>> = HashMap::new();
    while let Some(row) = rows.next().await? {
        let field = FormField::try_from(&row)?;
        fields.entry(field.form_id).or_default().push(field);
    }
    Ok(fields)
}

/// Creates a template and its fields in one transaction.
pub async fn create_template(
    db: &Database,
    input: NewTemplate,
) -> Result<TemplateWithFields, IntakeError> {
    let name = input.name.trim().to_string();
    if name.is_empty() || input.fields.is_empty() {
        return Err(IntakeError::validation(
            "Template name and fields required",
        ));
    }
    if let Some(pos) = input.fields.iter().position(|f| f.label.trim().is_empty()) {
        return Err(IntakeError::validation(format!(
            "Field label is required for field {}",
            pos + 1
        )));
    }

    let conn = db.connect()?;
    begin(&conn).await?;
    let result = insert_template(&conn, &name, &input).await;
    let form_id = finish(&conn, result).await?;
    info!(form_id, fields = input.fields.len(), "Created form template.");

    let template = find_template(&conn, form_id)
        .await?
        .ok_or_else(|| IntakeError::DataIntegrity(format!("Template {form_id} vanished")))?;
    let fields = fields_for_template(&conn, form_id).await?;
    Ok(TemplateWithFields { template, fields })
}

async fn insert_template(
    conn: &Connection,
    name: &str,
    input: &NewTemplate,
) -> Result<i64, IntakeError> {
    let mut rows = conn
        .query(
            "INSERT INTO forms (form_name, form_url, created_at) VALUES (?, ?, ?) RETURNING form_id",
            Params::Positional(vec![
                text(name),
                opt_text(input.form_url.as_deref()),
                text(&timestamp_now()),
            ]),
        )
        .await?;
    let form_id = match rows.next().await? {
        Some(row) => get_i64(&row, 0)?,
        None => {
            return Err(IntakeError::DataIntegrity(
                "Insert into forms returned no id".to_string(),
            ))
        }
    };
    drop(rows);

    for (index, field) in input.fields.iter().enumerate() {
        let position = index as i64 + 1;
        conn.execute(
            "INSERT INTO form_fields (field_id, form_id, position, field_label, field_type, is_required)
             VALUES (?, ?, ?, ?, ?, ?)",
            Params::Positional(vec![
                text(&format!("{form_id}.{position}")),
                int(form_id),
                int(position),
                text(field.label.trim()),
                text(&field.field_type),
                int(field.required as i64),
            ]),
        )
        .await?;
    }
    Ok(form_id)
}

/// All templates ordered by name, each with its field count.
pub async fn list_templates(db: &Database) -> Result<Vec<TemplateSummary>, IntakeError> {
    let conn = db.connect()?;

    let mut counts: HashMap<i64, i64> = HashMap::new();
    let mut rows = conn
        .query(
            "SELECT form_id, COUNT(*) FROM form_fields GROUP BY form_id",
            (),
        )
        .await?;
    while let Some(row) = rows.next().await? {
        counts.insert(get_i64(&row, 0)?, get_i64(&row, 1)?);
    }
    drop(rows);

    let mut rows = conn
        .query(
            "SELECT form_id, form_name, form_url, created_at FROM forms ORDER BY form_name ASC",
            (),
        )
        .await?;
    let mut templates = Vec::new();
    while let Some(row) = rows.next().await? {
        let template = FormTemplate::try_from(&row)?;
        templates.push(TemplateSummary {
            id: template.form_id,
            field_count: counts.get(&template.form_id).copied().unwrap_or(0),
            title: template.form_name,
            form_url: template.form_url,
        });
    }
    Ok(templates)
}

pub async fn get_template(db: &Database, form_id: i64) -> Result<TemplateWithFields, IntakeError> {
    let conn = db.connect()?;
    let template = find_template(&conn, form_id)
        .await?
        .ok_or_else(|| IntakeError::not_found("Form not found"))?;
    let fields = fields_for_template(&conn, form_id).await?;
    Ok(TemplateWithFields { template, fields })
}

/// The fields of a template; a template without fields is reported as not found.
pub async fn template_fields(db: &Database, form_id: i64) -> Result<Vec<FormField>, IntakeError> {
    let conn = db.connect()?;
    let fields = fields_for_template(&conn, form_id).await?;
    if fields.is_empty() {
        return Err(IntakeError::not_found("No fields found for this form"));
    }
    Ok(fields)
}
