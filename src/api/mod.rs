//! Typed marketplace API: auth, profiles and therapy sessions.

pub mod client;
pub mod models;

pub use client::CareClient;
pub use models::{AuthSession, NewSession, ProfileUpdate, SignIn, SignUp};
