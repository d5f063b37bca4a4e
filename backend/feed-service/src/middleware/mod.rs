/// Request identity extraction
pub mod auth;

pub use auth::AuthenticatedUser;
