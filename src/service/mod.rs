pub mod auth;
pub mod clock;
pub mod identity;
pub mod session;
pub mod tasks;
