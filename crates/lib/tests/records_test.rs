//! # Records Tests
//!
//! Patients, templates, appointments, locations, analytics and CSV export.

mod common;

use crate::common::setup_tracing;
use anyhow::Result;
use intake::{
    analytics::{form_stats, patient_stats, DateRange},
    appointments::{
        book_appointment, customer_appointments, delete_appointment, list_appointments,
        postpone_appointment,
    },
    assignments::assign_forms,
    export::{export_forms_csv, ExportFilter, NO_DATA},
    locations::{add_location, list_locations, toggle_location, update_location},
    patients::{
        create_patient, delete_patient, get_patient, search_patients, update_patient,
    },
    staff::{create_staff, get_staff, list_staff, update_staff},
    submissions::save_submission,
    templates::{list_templates, template_fields},
    types::{
        AppointmentFilter, AssignRequest, FieldAnswer, LocationInput, NewAppointment, NewPatient,
        NewStaffMember, PatientUpdate, SaveSubmission, StaffUpdate,
    },
    IntakeError,
};
use intake_test_utils::TestSetup;

fn staff_member(email: &str, location_ids: Vec<i64>) -> NewStaffMember {
    NewStaffMember {
        first_name: "Florence".to_string(),
        last_name: "Nightingale".to_string(),
        email: email.to_string(),
        mobile_phone: "(555) 987-6543".to_string(),
        role_group: "Nurse".to_string(),
        default_location: Some("Downtown".to_string()),
        is_active: true,
        location_ids,
    }
}

fn booking(name: &str, email: &str, date: &str, time: &str) -> NewAppointment {
    NewAppointment {
        patient_id: None,
        patient_name: name.to_string(),
        patient_email: email.to_string(),
        phone_number: "5551234567".to_string(),
        appointment_date: date.to_string(),
        appointment_time: time.to_string(),
        specialist: "Dr. Who".to_string(),
    }
}

#[tokio::test]
async fn test_patient_lifecycle() -> Result<()> {
    setup_tracing();
    let setup = TestSetup::new().await?;

    let invalid = create_patient(&setup.db, NewPatient::default()).await;
    assert!(matches!(invalid, Err(IntakeError::Validation(_))));

    let patient = create_patient(
        &setup.db,
        NewPatient {
            first_name: " Ada ".to_string(),
            last_name: "Lovelace".to_string(),
            email: Some("ada@example.com".to_string()),
            phone: Some("(555) 123-4567".to_string()),
            dob: Some("12/10/1815".to_string()),
        },
    )
    .await?;
    assert_eq!(patient.first_name, "Ada");
    assert_eq!(patient.phone.as_deref(), Some("5551234567"));
    assert_eq!(patient.dob.as_deref(), Some("1815-12-10"));

    let updated = update_patient(
        &setup.db,
        patient.id,
        PatientUpdate {
            last_name: Some("King".to_string()),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(updated.last_name, "King");
    assert_eq!(updated.email.as_deref(), Some("ada@example.com"));

    let hits = search_patients(&setup.db, "KING").await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "Ada King");
    assert!(search_patients(&setup.db, "   ").await?.is_empty());

    delete_patient(&setup.db, patient.id).await?;
    assert!(matches!(
        get_patient(&setup.db, patient.id).await,
        Err(IntakeError::NotFound(_))
    ));
    assert!(matches!(
        delete_patient(&setup.db, patient.id).await,
        Err(IntakeError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_template_listing() -> Result<()> {
    setup_tracing();
    let setup = TestSetup::new().await?;
    let consent = setup.template("Consent", &["Signature"]).await?;
    setup.template("Allergies", &["Food", "Drug"]).await?;

    let templates = list_templates(&setup.db).await?;
    let names: Vec<&str> = templates.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(names, vec!["Allergies", "Consent"]);
    assert_eq!(templates[0].field_count, 2);

    let fields = template_fields(&setup.db, consent.template.form_id).await?;
    assert_eq!(fields[0].field_label, "Signature");
    assert!(matches!(
        template_fields(&setup.db, 404).await,
        Err(IntakeError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_appointment_booking_rules() -> Result<()> {
    setup_tracing();
    let setup = TestSetup::new().await?;

    let booked = book_appointment(
        &setup.db,
        booking("Ada Lovelace", "ADA@example.com", "2099-01-10", "09:30"),
    )
    .await?;
    assert_eq!(booked.status, "Pending");
    assert_eq!(booked.patient_email, "ada@example.com");
    assert_eq!(booked.time, "09:30:00");

    // Same slot, different specialist casing.
    let mut clash = booking("Grace Hopper", "grace@example.com", "01/10/2099", "09:30:00");
    clash.specialist = "dr. WHO".to_string();
    assert!(matches!(
        book_appointment(&setup.db, clash).await,
        Err(IntakeError::Conflict(_))
    ));

    let mut incomplete = booking("Grace Hopper", "grace@example.com", "2099-01-11", "10:00");
    incomplete.specialist = String::new();
    assert!(matches!(
        book_appointment(&setup.db, incomplete).await,
        Err(IntakeError::Validation(_))
    ));

    let other = book_appointment(
        &setup.db,
        booking("Grace Hopper", "grace@example.com", "2099-01-11", "10:00"),
    )
    .await?;
    assert!(matches!(
        postpone_appointment(&setup.db, other.id, Some("2099-01-10"), Some("09:30")).await,
        Err(IntakeError::Conflict(_))
    ));
    let moved = postpone_appointment(&setup.db, other.id, Some("2099-02-01"), Some("08:00")).await?;
    assert_eq!(moved.date, "2099-02-01");
    assert!(matches!(
        postpone_appointment(&setup.db, other.id, None, Some("08:00")).await,
        Err(IntakeError::Validation(_))
    ));

    delete_appointment(&setup.db, booked.id).await?;
    assert!(matches!(
        delete_appointment(&setup.db, booked.id).await,
        Err(IntakeError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_appointment_listing_filters() -> Result<()> {
    setup_tracing();
    let setup = TestSetup::new().await?;
    let patient = setup.patient("Ada", "Lovelace").await?;
    book_appointment(&setup.db, booking("Ada Lovelace", "ada.lovelace@example.com", "2099-03-01", "09:00")).await?;
    book_appointment(&setup.db, booking("Grace Hopper", "grace@example.com", "2099-01-01", "09:00")).await?;
    book_appointment(&setup.db, booking("Alan Turing", "alan@example.com", "2000-01-01", "09:00")).await?;

    let upcoming = list_appointments(
        &setup.db,
        AppointmentFilter {
            upcoming: true,
            ..Default::default()
        },
    )
    .await?;
    let names: Vec<&str> = upcoming.iter().map(|a| a.patient_name.as_str()).collect();
    assert_eq!(names, vec!["Grace Hopper", "Ada Lovelace"]);

    let everything = list_appointments(&setup.db, AppointmentFilter::default()).await?;
    assert_eq!(everything.len(), 3);

    let either = list_appointments(
        &setup.db,
        AppointmentFilter {
            name: Some("ada".to_string()),
            email: Some("alan@example.com".to_string()),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(either.len(), 2);

    // Linked by the email the test fixture registers.
    let mine = customer_appointments(&setup.db, patient.id).await?;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].patient_name, "Ada Lovelace");
    Ok(())
}

#[tokio::test]
async fn test_wildcards_in_filters_are_literal() -> Result<()> {
    setup_tracing();
    let setup = TestSetup::new().await?;
    setup.patient("Ada", "Lovelace").await?;
    setup.patient("Grace", "Hopper").await?;
    book_appointment(&setup.db, booking("Ada Lovelace", "ada@example.com", "2099-03-01", "09:00")).await?;
    book_appointment(&setup.db, booking("50% Off", "promo@example.com", "2099-03-02", "09:00")).await?;

    for wildcard in ["%", "_", "a_a"] {
        let by_name = list_appointments(
            &setup.db,
            AppointmentFilter {
                name: Some(wildcard.to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert!(by_name.is_empty(), "name filter {wildcard:?} matched {by_name:?}");
        assert!(search_patients(&setup.db, wildcard).await?.is_empty());
    }

    let literal = list_appointments(
        &setup.db,
        AppointmentFilter {
            name: Some("50%".to_string()),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(literal.len(), 1);
    assert_eq!(literal[0].patient_name, "50% Off");

    let prefix = list_appointments(
        &setup.db,
        AppointmentFilter {
            name: Some("ADA L".to_string()),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(prefix.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_locations() -> Result<()> {
    setup_tracing();
    let setup = TestSetup::new().await?;
    let input = LocationInput {
        name: "Downtown".to_string(),
        city: Some("Springfield".to_string()),
        is_active: true,
        ..Default::default()
    };
    let location = add_location(&setup.db, input.clone()).await?;
    assert!(location.is_active);
    assert!(matches!(
        add_location(&setup.db, input).await,
        Err(IntakeError::Conflict(_))
    ));

    let updated = update_location(
        &setup.db,
        location.id,
        LocationInput {
            name: "Downtown Clinic".to_string(),
            zip_code: Some("12345".to_string()),
            is_active: true,
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(updated.name, "Downtown Clinic");
    assert_eq!(updated.city, None);

    assert!(!toggle_location(&setup.db, location.id).await?);
    assert!(!list_locations(&setup.db).await?[0].is_active);
    assert!(matches!(
        toggle_location(&setup.db, 404).await,
        Err(IntakeError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_staff_profiles_and_locations() -> Result<()> {
    setup_tracing();
    // Arrange
    let setup = TestSetup::new().await?;
    let mut ids = Vec::new();
    for name in ["Uptown", "Downtown"] {
        let location = add_location(
            &setup.db,
            LocationInput {
                name: name.to_string(),
                is_active: true,
                ..Default::default()
            },
        )
        .await?;
        ids.push(location.id);
    }

    // Act
    let member = create_staff(&setup.db, staff_member("Flo@Example.com", ids.clone())).await?;

    // Assert
    assert_eq!(member.email, "flo@example.com");
    assert_eq!(member.mobile_phone.as_deref(), Some("5559876543"));
    assert_eq!(member.locations, vec!["Downtown", "Uptown"]);
    assert!(member.is_active);

    assert!(matches!(
        create_staff(&setup.db, staff_member("flo@example.com", Vec::new())).await,
        Err(IntakeError::Conflict(_))
    ));
    let mut incomplete = staff_member("mary@example.com", Vec::new());
    incomplete.role_group = "  ".to_string();
    let err = create_staff(&setup.db, incomplete).await.unwrap_err();
    assert_eq!(err.to_string(), "Missing field: role_group");

    // An unknown location rolls the whole insert back.
    assert!(matches!(
        create_staff(&setup.db, staff_member("mary@example.com", vec![404])).await,
        Err(IntakeError::NotFound(_))
    ));
    assert_eq!(list_staff(&setup.db).await?.len(), 1);

    let updated = update_staff(
        &setup.db,
        member.id,
        StaffUpdate {
            first_name: "Flo".to_string(),
            email: "flo@example.com".to_string(),
            location_ids: Some(vec![ids[0]]),
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(updated.first_name, "Flo");
    assert_eq!(updated.last_name, "Nightingale");
    assert_eq!(updated.role_group, "Nurse");
    assert_eq!(updated.locations, vec!["Uptown"]);
    assert!(!updated.is_active);

    let missing_email = update_staff(
        &setup.db,
        member.id,
        StaffUpdate {
            first_name: "Flo".to_string(),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(missing_email, Err(IntakeError::Validation(_))));
    assert!(matches!(
        get_staff(&setup.db, 404).await,
        Err(IntakeError::NotFound(_))
    ));
    assert_eq!(get_staff(&setup.db, member.id).await?, updated);
    Ok(())
}

#[tokio::test]
async fn test_form_analytics() -> Result<()> {
    setup_tracing();
    let setup = TestSetup::new().await?;
    let patient = setup.patient("Ada", "Lovelace").await?;
    let a = setup.template("A", &["x"]).await?;
    let b = setup.template("B", &["y"]).await?;
    assign_forms(
        &setup.db,
        AssignRequest {
            patient_id: Some(patient.id),
            form_ids: vec![a.template.form_id, b.template.form_id],
            ..Default::default()
        },
        "GIA HR",
    )
    .await?;
    save_submission(
        &setup.db,
        a.template.form_id,
        patient.id,
        SaveSubmission {
            answers: vec![FieldAnswer {
                field_id: format!("{}.1", a.template.form_id),
                value: Some("done".to_string()),
            }],
            ..Default::default()
        },
    )
    .await?;

    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let range = DateRange::parse(Some(&today), Some(&today))?;
    let past = DateRange::parse(Some("2000-01-01"), Some("2000-01-31"))?;
    let stats = form_stats(&setup.db, &range, Some(&past)).await?;
    assert_eq!(stats.current.total, 2);
    assert_eq!(stats.current.assigned, 1);
    assert_eq!(stats.current.completed, 1);
    assert_eq!(stats.current.completion_rate, "50%");
    assert_eq!(stats.current.within24_completed, 1);
    assert_eq!(stats.current.within24_completion_rate, "100%");
    assert_eq!(stats.compare.map(|c| c.total), Some(0));

    let patients = patient_stats(&setup.db, None, None).await?;
    assert_eq!(patients.current.total, 1);
    Ok(())
}

#[tokio::test]
async fn test_csv_export() -> Result<()> {
    setup_tracing();
    let setup = TestSetup::new().await?;

    let empty = export_forms_csv(&setup.db, &ExportFilter::default()).await?;
    assert_eq!(empty.content, NO_DATA.as_bytes());
    assert!(empty.filename.starts_with("forms-export-"));

    let patient = setup.patient("Ada", "Lovelace").await?;
    let form = setup.template("Intake", &["Reason", "Allergies"]).await?;
    let form_id = form.template.form_id;
    assign_forms(
        &setup.db,
        AssignRequest {
            patient_id: Some(patient.id),
            form_ids: vec![form_id],
            due_date: Some("2025-01-10".to_string()),
            location: None,
        },
        "GIA HR",
    )
    .await?;
    save_submission(
        &setup.db,
        form_id,
        patient.id,
        SaveSubmission {
            answers: vec![FieldAnswer {
                field_id: format!("{form_id}.1"),
                value: Some("Checkup, yearly".to_string()),
            }],
            ..Default::default()
        },
    )
    .await?;

    let base = export_forms_csv(&setup.db, &ExportFilter::default()).await?;
    let text = String::from_utf8(base.content)?;
    assert!(text.starts_with('\u{feff}'));
    let lines: Vec<&str> = text.trim_start_matches('\u{feff}').lines().collect();
    assert_eq!(
        lines[0],
        "submission_id,patient_id,patient_name,form_id,form_name,status,due_date,completed_date"
    );
    assert!(lines[1].contains("Ada Lovelace"));
    assert!(lines[1].contains("Completed"));
    assert!(lines[1].contains("2025-01-10"));

    let with_answers = export_forms_csv(
        &setup.db,
        &ExportFilter {
            include_answers: true,
            ..Default::default()
        },
    )
    .await?;
    let text = String::from_utf8(with_answers.content)?;
    let lines: Vec<&str> = text.trim_start_matches('\u{feff}').lines().collect();
    assert_eq!(
        lines[0],
        "Form #,Created On,Location,Patient,Template,Completed On,Reason,Allergies"
    );
    assert!(lines[1].starts_with("1,"));
    assert!(lines[1].contains("\"Checkup, yearly\""));

    let filtered = export_forms_csv(
        &setup.db,
        &ExportFilter {
            statuses: vec!["active".to_string()],
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(filtered.rows, 0);
    Ok(())
}
