//! # Forms API Tests
//!
//! Assign, save and read back forms over HTTP, checking that the detail view,
//! the patient's form list and the dashboards agree.

mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
async fn test_assign_save_and_read_back() -> Result<()> {
    // --- 1. Arrange ---
    let app = TestApp::spawn().await?;
    let token = app.token("nurse@example.com")?;
    let patient = app.patient("Ada", "Lovelace").await?;
    let first = app.template("History", &["Allergies", "Medications"]).await?;
    let second = app.template("Consent", &["Signature"]).await?;
    let (f1, f2) = (first.template.form_id, second.template.form_id);

    let assign = app
        .client
        .post(app.url("/api/home/assign_forms"))
        .bearer_auth(&token)
        .json(&json!({
            "patientId": patient.id.to_string(),
            "formIds": [f1, f2],
            "dueDate": "01/10/2025"
        }))
        .send()
        .await?;
    assert_eq!(assign.status(), StatusCode::OK);
    let body: Value = assign.json().await?;
    assert!(body["message"].as_str().unwrap().contains("2 form"));

    // --- 2. Act: half the fields, then all of them ---
    let save_url = app.url(&format!("/api/home/forms/{f1}?patientId={}", patient.id));
    let first_save: Value = app
        .client
        .put(&save_url)
        .bearer_auth(&token)
        .json(&json!({
            "fields": [
                {"field_id": format!("{f1}.1"), "response_value": "Yes"},
                {"field_id": format!("{f1}.2"), "response_value": ""}
            ],
            "status": "In Progress"
        }))
        .send()
        .await?
        .json()
        .await?;
    let second_save: Value = app
        .client
        .put(&save_url)
        .bearer_auth(&token)
        .json(&json!({
            "fields": [
                {"field_id": format!("{f1}.2"), "response_value": "No"},
                {"field_id": "999.1", "response_value": "ignored"}
            ]
        }))
        .send()
        .await?
        .json()
        .await?;

    // --- 3. Assert ---
    assert_eq!(first_save["completion"], 50.0);
    assert_eq!(second_save["completion"], 100.0);
    assert_eq!(first_save["submissionId"], second_save["submissionId"]);

    let detail: Value = app
        .client
        .get(&save_url)
        .bearer_auth(&token)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(detail["completion"], 100.0);
    assert_eq!(detail["status"], "Completed");
    assert_eq!(detail["dueDate"], "2025-01-10");
    assert_eq!(detail["fields"][1]["response_value"], "No");

    let forms: Value = app
        .client
        .get(app.url(&format!("/api/home/patient_forms/{}", patient.id)))
        .bearer_auth(&token)
        .send()
        .await?
        .json()
        .await?;
    let forms = forms.as_array().unwrap();
    assert_eq!(forms.len(), 2);
    let history = forms.iter().find(|f| f["form_id"] == f1).unwrap();
    assert_eq!(history["completion"], 100.0);
    let consent = forms.iter().find(|f| f["form_id"] == f2).unwrap();
    assert_eq!(consent["completion"], 0.0);
    assert_eq!(consent["status"], "Active");

    let grouped: Value = app
        .client
        .get(app.url("/api/home/data_grouped"))
        .bearer_auth(&token)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(grouped[0]["status"], "Assigned");
    assert_eq!(grouped[0]["forms"].as_array().unwrap().len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_save_rejects_bad_patient_ids() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token("nurse@example.com")?;
    let form = app.template("Consent", &["Signature"]).await?;
    let form_id = form.template.form_id;
    let body = json!({"fields": []});

    for query in ["", "?patientId=", "?patientId=null", "?patientId=abc"] {
        let response = app
            .client
            .put(app.url(&format!("/api/home/forms/{form_id}{query}")))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "query {query:?}");
        let error: Value = response.json().await?;
        assert!(error["error"].as_str().unwrap().contains("patientId"));
    }

    // Unknown patients and forms are 404, integral floats are accepted as ids.
    let missing_patient = app
        .client
        .put(app.url(&format!("/api/home/forms/{form_id}?patientId=404.0")))
        .bearer_auth(&token)
        .json(&body)
        .send()
        .await?;
    assert_eq!(missing_patient.status(), StatusCode::NOT_FOUND);

    let patient = app.patient("Grace", "Hopper").await?;
    let missing_form = app
        .client
        .put(app.url(&format!("/api/home/forms/404?patientId={}", patient.id)))
        .bearer_auth(&token)
        .json(&body)
        .send()
        .await?;
    assert_eq!(missing_form.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_new_submission_becomes_current() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token("nurse@example.com")?;
    let patient = app.patient("Ada", "Lovelace").await?;
    let form = app.template("Consent", &["Signature"]).await?;
    let form_id = form.template.form_id;
    let save_url = app.url(&format!("/api/home/forms/{form_id}?patientId={}", patient.id));

    let saved: Value = app
        .client
        .put(&save_url)
        .bearer_auth(&token)
        .json(&json!({"fields": [{"field_id": format!("{form_id}.1"), "response_value": "AL"}]}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(saved["completion"], 100.0);

    let started = app
        .client
        .post(app.url(&format!(
            "/api/home/forms/{form_id}/submissions?patientId={}",
            patient.id
        )))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(started.status(), StatusCode::CREATED);
    let started: Value = started.json().await?;
    assert_eq!(started["status"], "In Progress");
    assert_ne!(started["submissionId"], saved["submissionId"]);

    let detail: Value = app
        .client
        .get(&save_url)
        .bearer_auth(&token)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(detail["submissionId"], started["submissionId"]);
    assert_eq!(detail["completion"], 0.0);

    Ok(())
}

#[tokio::test]
async fn test_archive_and_flat_dashboard() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token("nurse@example.com")?;
    let patient = app.patient("Ada", "Lovelace").await?;
    let lonely = app.patient("Grace", "Hopper").await?;
    let form = app.template("Consent", &["Signature"]).await?;
    app.client
        .post(app.url("/api/home/assign_forms"))
        .bearer_auth(&token)
        .json(&json!({"patientId": patient.id, "formIds": [form.template.form_id]}))
        .send()
        .await?
        .error_for_status()?;

    let archived: Value = app
        .client
        .put(app.url("/api/home/patients/archive"))
        .bearer_auth(&token)
        .json(&json!({"patientIds": [patient.id]}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(archived["updated"], 1);

    let flat: Value = app
        .client
        .get(app.url("/api/home/data"))
        .bearer_auth(&token)
        .send()
        .await?
        .json()
        .await?;
    let rows = flat.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["patientId"], patient.id);
    assert_eq!(rows[0]["status"], "Archived");
    assert_eq!(rows[0]["location"], "GIA HR");
    assert_eq!(rows[1]["patientId"], lonely.id);
    assert_eq!(rows[1]["form"], "No Form Assigned");

    let empty = app
        .client
        .put(app.url("/api/home/patients/unarchive"))
        .bearer_auth(&token)
        .json(&json!({"patientIds": []}))
        .send()
        .await?;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_form_routes_require_staff_or_matching_link() -> Result<()> {
    // --- 1. Arrange ---
    let app = TestApp::spawn().await?;
    let staff = app.token("nurse@example.com")?;
    let ada = app.patient("Ada", "Lovelace").await?;
    let grace = app.patient("Grace", "Hopper").await?;
    let history = app.template("History", &["Allergies"]).await?.template.form_id;
    let consent = app.template("Consent", &["Signature"]).await?.template.form_id;
    let other = app.template("Billing", &["Insurer"]).await?.template.form_id;
    let link = app.link_token(ada.id, &[history, consent]).await?;
    let detail_url = |form_id: i64, query: &str| app.url(&format!("/api/home/forms/{form_id}{query}"));

    // --- 2. Act & Assert: no credentials, or a token that was never issued ---
    for query in [String::new(), "?token=".to_string(), format!("?token={}-{history}-0-deadbeef", ada.id)] {
        let response = app.client.get(detail_url(history, &query)).send().await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "query {query:?}");
    }
    let unsaved = app
        .client
        .put(detail_url(history, &format!("?patientId={}", ada.id)))
        .json(&json!({"fields": []}))
        .send()
        .await?;
    assert_eq!(unsaved.status(), StatusCode::UNAUTHORIZED);

    // The link opens its own patient's forms without naming the patient.
    let own: Value = app
        .client
        .get(detail_url(consent, &format!("?token={link}")))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(own["patientId"], ada.id);
    assert_eq!(own["patientName"], "Ada Lovelace");

    // Another patient, or a form outside the batch, is forbidden.
    let wrong_patient = app
        .client
        .get(detail_url(history, &format!("?token={link}&patientId={}", grace.id)))
        .send()
        .await?;
    assert_eq!(wrong_patient.status(), StatusCode::FORBIDDEN);
    let wrong_form = app
        .client
        .get(detail_url(other, &format!("?token={link}")))
        .send()
        .await?;
    assert_eq!(wrong_form.status(), StatusCode::FORBIDDEN);
    let foreign_save = app
        .client
        .put(detail_url(history, &format!("?token={link}")))
        .json(&json!({"patientId": grace.id, "fields": []}))
        .send()
        .await?;
    assert_eq!(foreign_save.status(), StatusCode::FORBIDDEN);

    // Saving through the link writes to the link's patient.
    let saved = app
        .client
        .put(detail_url(history, &format!("?token={link}")))
        .json(&json!({"fields": [{"field_id": format!("{history}.1"), "response_value": "None"}]}))
        .send()
        .await?;
    assert_eq!(saved.status(), StatusCode::OK);
    let saved: Value = saved.json().await?;
    assert_eq!(saved["completion"], 100.0);

    // Staff may read any patient.
    let staff_view = app
        .client
        .get(detail_url(history, &format!("?patientId={}", grace.id)))
        .bearer_auth(&staff)
        .send()
        .await?;
    assert_eq!(staff_view.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_save_reads_patient_from_body_and_accepts_submitted() -> Result<()> {
    // --- 1. Arrange ---
    let app = TestApp::spawn().await?;
    let token = app.token("nurse@example.com")?;
    let patient = app.patient("Ada", "Lovelace").await?;
    let form_id = app
        .template("History", &["Allergies", "Medications"])
        .await?
        .template
        .form_id;
    app.client
        .post(app.url("/api/home/assign_forms"))
        .bearer_auth(&token)
        .json(&json!({"patientId": patient.id, "formIds": [form_id]}))
        .send()
        .await?
        .error_for_status()?;
    let form_url = app.url(&format!("/api/home/forms/{form_id}"));

    // --- 2. Act: no `?patientId=`, the body names the patient ---
    let saved = app
        .client
        .put(&form_url)
        .bearer_auth(&token)
        .json(&json!({
            "patientId": patient.id.to_string(),
            "fields": [{"field_id": format!("{form_id}.1"), "response_value": "Penicillin"}],
            "status": "Submitted"
        }))
        .send()
        .await?;

    // --- 3. Assert ---
    assert_eq!(saved.status(), StatusCode::OK);
    let detail: Value = app
        .client
        .get(app.url(&format!("/api/home/forms/{form_id}?patientId={}", patient.id)))
        .bearer_auth(&token)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(detail["submissionStatus"], "Completed");
    assert_eq!(detail["status"], "Completed");
    assert_eq!(detail["completion"], 50.0);

    let unnamed = app
        .client
        .put(&form_url)
        .bearer_auth(&token)
        .json(&json!({"patientId": null, "fields": []}))
        .send()
        .await?;
    assert_eq!(unnamed.status(), StatusCode::BAD_REQUEST);

    Ok(())
}
