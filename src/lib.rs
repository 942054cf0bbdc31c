pub mod models;
pub mod schema;
pub mod error;
pub mod store;
pub mod parameters;
pub mod uri;
pub mod headers;
pub mod auth;
pub mod security;
pub mod request;
pub mod engine;

// Re-export commonly used items
pub use models::*;
pub use schema::*;
pub use error::*;
pub use store::*;
pub use parameters::*;  // Re-exports coercion + report compilation
pub use uri::*;
pub use headers::*;
pub use auth::*;
pub use security::*;
pub use request::*;
pub use engine::*;
