use super::{auth::middleware::AuthenticatedUser, handlers, state::AppState};
use axum::{
    http::{header, HeaderValue},
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION])
}

/// Creates the Axum router with all the application routes.
///
/// The patient form routes accept either a staff token or the link's `?token=`, checked
/// by the `FormAccess` extractor in each handler. Every other `/api` route requires a
/// staff token.
pub fn create_router(app_state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/fill-form/{token}", get(handlers::fill_form_handler))
        .route(
            "/api/home/forms/{form_id}/fields",
            get(handlers::template_fields_handler),
        );

    let patient_forms = Router::new()
        .route(
            "/api/home/forms/{form_id}",
            get(handlers::form_detail_handler).put(handlers::save_form_handler),
        )
        .route(
            "/api/home/forms/{form_id}/submissions",
            post(handlers::start_submission_handler),
        );

    let protected = Router::new()
        // Patients
        .route(
            "/api/patients",
            get(handlers::list_patients_handler).post(handlers::create_patient_handler),
        )
        .route(
            "/api/patients/{id}",
            get(handlers::get_patient_handler)
                .put(handlers::update_patient_handler)
                .delete(handlers::delete_patient_handler),
        )
        .route(
            "/api/home/patients/search",
            get(handlers::search_patients_handler),
        )
        .route(
            "/api/home/patients/archive",
            put(handlers::archive_patients_handler),
        )
        .route(
            "/api/home/patients/unarchive",
            put(handlers::unarchive_patients_handler),
        )
        // Templates & assignments
        .route(
            "/api/home/forms",
            get(handlers::list_templates_handler).post(handlers::create_template_handler),
        )
        .route("/api/home/assign_forms", post(handlers::assign_forms_handler))
        .route(
            "/api/home/patient_forms/{patient_id}",
            get(handlers::patient_forms_handler),
        )
        .route("/api/home/send_forms", post(handlers::send_forms_handler))
        .route("/api/home/data", get(handlers::dashboard_data_handler))
        .route(
            "/api/home/data_grouped",
            get(handlers::dashboard_grouped_handler),
        )
        // Analytics & export
        .route(
            "/api/home/analytics/forms",
            get(handlers::form_analytics_handler),
        )
        .route(
            "/api/home/analytics/patients",
            get(handlers::patient_analytics_handler),
        )
        .route(
            "/api/exports/forms/csv",
            post(handlers::export_forms_csv_handler),
        )
        // Appointments
        .route(
            "/api/book_appointment",
            post(handlers::book_appointment_handler),
        )
        .route("/api/appointment", get(handlers::list_appointments_handler))
        .route(
            "/api/appointment/{id}",
            axum::routing::delete(handlers::delete_appointment_handler),
        )
        .route(
            "/api/appointment/{id}/postpone",
            put(handlers::postpone_appointment_handler),
        )
        .route(
            "/api/customer/appointment/{patient_id}",
            get(handlers::customer_appointments_handler),
        )
        // Locations
        .route(
            "/api/locations",
            get(handlers::list_locations_handler).post(handlers::add_location_handler),
        )
        .route("/api/locations/{id}", put(handlers::update_location_handler))
        .route(
            "/api/locations/{id}/toggle",
            patch(handlers::toggle_location_handler),
        )
        // Staff
        .route(
            "/api/users",
            get(handlers::list_users_handler).post(handlers::create_user_handler),
        )
        .route(
            "/api/users/{id}",
            get(handlers::get_user_handler).put(handlers::update_user_handler),
        )
        // Session
        .route("/api/me", get(handlers::get_me_handler))
        .route("/api/logout", post(handlers::logout_handler))
        .route_layer(middleware::from_extractor_with_state::<
            AuthenticatedUser,
            AppState,
        >(app_state.clone()));

    let cors = cors_layer(&app_state.config.cors_origins);
    public
        .merge(patient_forms)
        .merge(protected)
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
