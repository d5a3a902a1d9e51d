pub mod form_access;
pub mod middleware;
