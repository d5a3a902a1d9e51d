//! # Server Endpoint Tests
//!
//! Health checks, CORS and request rejection that happen before any handler logic.

mod common;

use anyhow::Result;
use common::TestApp;

#[tokio::test]
async fn test_root_and_health_check_endpoints() -> Result<()> {
    // Arrange
    let app = TestApp::spawn().await?;

    // --- Test Root Endpoint ---
    let root_response = app.client.get(app.url("/")).send().await?;

    // Assert
    assert!(root_response.status().is_success());
    assert_eq!("intake server is running.", root_response.text().await?);

    // --- Test Health Check Endpoint ---
    let health_response = app.client.get(app.url("/health")).send().await?;

    // Assert
    assert!(health_response.status().is_success());
    assert_eq!("OK", health_response.text().await?);

    Ok(())
}

#[tokio::test]
async fn test_save_form_malformed_json() -> Result<()> {
    // Arrange
    let app = TestApp::spawn().await?;
    let token = app.token("nurse@example.com")?;
    // This JSON is syntactically invalid (missing closing brace).
    let malformed_body = r#"{"fields": []"#;

    // Act
    let response = app
        .client
        .put(app.url("/api/home/forms/1?patientId=1"))
        .bearer_auth(&token)
        .header("Content-Type", "application/json")
        .body(malformed_body)
        .send()
        .await?;

    // Assert
    // Axum's `Json` extractor rejects malformed JSON with a 400 Bad Request.
    assert_eq!(400, response.status().as_u16());

    Ok(())
}

#[tokio::test]
async fn test_cors_exposes_content_disposition() -> Result<()> {
    let app = TestApp::spawn().await?;

    let response = app
        .client
        .get(app.url("/health"))
        .header("Origin", "http://frontend.test")
        .send()
        .await?;

    assert!(response.status().is_success());
    let headers = response.headers();
    assert_eq!(
        headers
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
    let exposed = headers
        .get("access-control-expose-headers")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_lowercase();
    assert!(exposed.contains("content-disposition"), "{exposed}");

    Ok(())
}

#[tokio::test]
async fn test_unknown_route_is_not_found() -> Result<()> {
    let app = TestApp::spawn().await?;

    let response = app.client.get(app.url("/api/nothing-here")).send().await?;

    assert_eq!(404, response.status().as_u16());
    Ok(())
}
