//! # Dispatch Tests
//!
//! Sends forms through the recording notifier and follows the resulting public links.

mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{TestApp, FRONTEND_URL};
use serde_json::{json, Value};

#[tokio::test]
async fn test_email_dispatch_and_public_link() -> Result<()> {
    // --- 1. Arrange ---
    let app = TestApp::spawn().await?;
    let token = app.token("nurse@example.com")?;
    let patient = app.patient("Ada", "Lovelace").await?;
    let a = app.template("History", &["Allergies"]).await?.template.form_id;
    let b = app.template("Consent", &["Signature"]).await?.template.form_id;

    // --- 2. Act ---
    let response = app
        .client
        .post(app.url("/api/home/send_forms"))
        .bearer_auth(&token)
        .json(&json!({
            "recipients": [{"patientId": patient.id, "dueDate": "2025-01-10"}],
            "forms": [a, b],
            "delivery": "patient"
        }))
        .send()
        .await?;

    // --- 3. Assert ---
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["delivery_method"], "patient");
    let recipient = &body["recipients"][0];
    assert_eq!(recipient["status"], "sent");
    assert_eq!(recipient["name"], "Ada Lovelace");
    assert!(recipient.get("error").is_none());
    let link_token = recipient["token"].as_str().unwrap().to_string();
    assert!(link_token.starts_with(&format!("{}-{a},{b}-", patient.id)));
    assert_eq!(body["qr_tokens"][patient.id.to_string()], link_token.as_str());

    let emails = app.notifier.sent_emails();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].to, "ada@example.com");
    assert!(emails[0].html.contains(&format!("/fill-form/{link_token}")));

    let rows: Value = app
        .client
        .get(app.url("/api/home/data"))
        .bearer_auth(&token)
        .send()
        .await?
        .json()
        .await?;
    for row in rows.as_array().unwrap() {
        assert!(row["emailSent"].is_string());
        assert!(row["smsSent"].is_null());
        assert_eq!(row["dueDate"], "2025-01-10");
    }

    // The public link redirects to the form editor with the whole batch and the token.
    let redirect = app
        .client
        .get(app.url(&format!("/fill-form/{link_token}")))
        .send()
        .await?;
    assert!(redirect.status().is_redirection());
    let location = redirect
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert_eq!(
        location,
        format!(
            "{FRONTEND_URL}/form-editor/{a}?patient={}&forms={a},{b}&token={link_token}",
            patient.id
        )
    );

    // The editor reads the form with the token it was handed.
    let form: Value = app
        .client
        .get(app.url(&format!("/api/home/forms/{b}?token={link_token}")))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(form["patientId"], patient.id);
    assert_eq!(form["title"], "Consent");

    Ok(())
}

#[tokio::test]
async fn test_failed_delivery_keeps_token_without_stamp() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token("nurse@example.com")?;
    let patient = app.patient("Ada", "Lovelace").await?;
    let form_id = app.template("Consent", &["Signature"]).await?.template.form_id;
    app.notifier.fail_sms();

    let body: Value = app
        .client
        .post(app.url("/api/home/send_forms"))
        .bearer_auth(&token)
        .json(&json!({
            "recipients": [{"patientId": patient.id.to_string(), "phone": "555-987-6543"}],
            "forms": [form_id.to_string()],
            "delivery": "sms"
        }))
        .send()
        .await?
        .json()
        .await?;

    let recipient = &body["recipients"][0];
    assert_eq!(recipient["status"], "failed");
    assert!(recipient["error"].as_str().unwrap().contains("mock sms failure"));

    // The assignment exists and the link works even though nothing was sent.
    let rows: Value = app
        .client
        .get(app.url("/api/home/data"))
        .bearer_auth(&token)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(rows[0]["status"], "Active");
    assert!(rows[0]["smsSent"].is_null());

    let link_token = recipient["token"].as_str().unwrap();
    let redirect = app
        .client
        .get(app.url(&format!("/fill-form/{link_token}")))
        .send()
        .await?;
    assert!(redirect.status().is_redirection());

    Ok(())
}

#[tokio::test]
async fn test_sms_and_office_delivery() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token("nurse@example.com")?;
    let ada = app.patient("Ada", "Lovelace").await?;
    let grace = app.patient("Grace", "Hopper").await?;
    let form_id = app.template("Consent", &["Signature"]).await?.template.form_id;

    let sms: Value = app
        .client
        .post(app.url("/api/home/send_forms"))
        .bearer_auth(&token)
        .json(&json!({
            "recipients": [{"patientId": ada.id, "phone": "(555) 987-6543", "name": "Ada"}],
            "forms": [form_id],
            "delivery": "sms"
        }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(sms["recipients"][0]["status"], "sent");
    let messages = app.notifier.sent_sms();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].to, "5559876543");
    assert!(messages[0].body.starts_with("Hello Ada,"));

    let office: Value = app
        .client
        .post(app.url("/api/home/send_forms"))
        .bearer_auth(&token)
        .json(&json!({
            "recipients": [{"patientId": grace.id, "location": "Downtown"}],
            "forms": [form_id],
            "delivery": "office"
        }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(office["recipients"][0]["status"], "office");
    assert_eq!(office["delivery_method"], "office");
    assert!(app.notifier.sent_emails().is_empty());

    let forms: Value = app
        .client
        .get(app.url(&format!("/api/home/patient_forms/{}", grace.id)))
        .bearer_auth(&token)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(forms[0]["location"], "Downtown");
    assert_eq!(forms[0]["status"], "Active");

    Ok(())
}

#[tokio::test]
async fn test_dispatch_validation_and_bad_links() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token("nurse@example.com")?;
    let patient = app.patient("Ada", "Lovelace").await?;

    let no_forms = app
        .client
        .post(app.url("/api/home/send_forms"))
        .bearer_auth(&token)
        .json(&json!({"recipients": [{"patientId": patient.id}], "forms": []}))
        .send()
        .await?;
    assert_eq!(no_forms.status(), StatusCode::BAD_REQUEST);

    let unknown_form = app
        .client
        .post(app.url("/api/home/send_forms"))
        .bearer_auth(&token)
        .json(&json!({"recipients": [{"patientId": patient.id}], "forms": [404]}))
        .send()
        .await?;
    assert_eq!(unknown_form.status(), StatusCode::NOT_FOUND);

    let malformed = app.client.get(app.url("/fill-form/garbage")).send().await?;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    let forged = app
        .client
        .get(app.url(&format!("/fill-form/{}-1-1700000000-deadbeef", patient.id)))
        .send()
        .await?;
    assert_eq!(forged.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_invalid_recipient_leaves_batch_unwritten() -> Result<()> {
    // --- 1. Arrange: the second recipient of each batch is invalid ---
    let app = TestApp::spawn().await?;
    let token = app.token("nurse@example.com")?;
    let ada = app.patient("Ada", "Lovelace").await?;
    let grace = app.patient("Grace", "Hopper").await?;
    let form_id = app.template("Consent", &["Signature"]).await?.template.form_id;
    let batches = [
        (json!({"patientId": 404}), StatusCode::NOT_FOUND),
        (json!({"patientId": grace.id, "dueDate": "13/45/2025"}), StatusCode::BAD_REQUEST),
        (json!({"patientId": "abc"}), StatusCode::BAD_REQUEST),
    ];

    for (bad, expected) in batches {
        // --- 2. Act ---
        let response = app
            .client
            .post(app.url("/api/home/send_forms"))
            .bearer_auth(&token)
            .json(&json!({
                "recipients": [{"patientId": ada.id}, bad],
                "forms": [form_id],
                "delivery": "patient"
            }))
            .send()
            .await?;

        // --- 3. Assert ---
        assert_eq!(response.status(), expected, "recipient {bad}");
    }

    assert!(app.notifier.sent_emails().is_empty());
    let forms: Value = app
        .client
        .get(app.url(&format!("/api/home/patient_forms/{}", ada.id)))
        .bearer_auth(&token)
        .send()
        .await?
        .json()
        .await?;
    assert!(forms.as_array().unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_forms_may_be_sent_as_objects() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token("nurse@example.com")?;
    let patient = app.patient("Ada", "Lovelace").await?;
    let a = app.template("History", &["Allergies"]).await?.template.form_id;
    let b = app.template("Consent", &["Signature"]).await?.template.form_id;
    let c = app.template("Billing", &["Insurer"]).await?.template.form_id;

    let body: Value = app
        .client
        .post(app.url("/api/home/send_forms"))
        .bearer_auth(&token)
        .json(&json!({
            "recipients": [{"patientId": patient.id}],
            "forms": [
                {"id": a, "title": "History"},
                {"formId": b.to_string()},
                {"form_id": c}
            ],
            "delivery": "office"
        }))
        .send()
        .await?
        .json()
        .await?;

    let link_token = body["recipients"][0]["token"].as_str().unwrap();
    assert!(link_token.starts_with(&format!("{}-{a},{b},{c}-", patient.id)));

    let nameless = app
        .client
        .post(app.url("/api/home/send_forms"))
        .bearer_auth(&token)
        .json(&json!({
            "recipients": [{"patientId": patient.id}],
            "forms": [{"title": "History"}]
        }))
        .send()
        .await?;
    assert_eq!(nameless.status(), StatusCode::BAD_REQUEST);

    Ok(())
}
