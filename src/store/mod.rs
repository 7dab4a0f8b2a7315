//! Persistence layer: libSQL-backed storage for profiles, scrapes and sessions.

pub mod libsql_backend;
pub mod migrations;
pub mod models;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use models::{
    GiftProduct, HandleRef, NewSession, Profile, RecommendationSession, ScrapeStatus,
    SessionStatus, SocialProfile,
};
pub use traits::Database;
