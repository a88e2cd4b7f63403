pub mod auth;
pub mod disk;
