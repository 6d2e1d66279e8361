//! Example wiring of the dispatch fabric: Accounts promotes
//! `user_registered`, Provider creates a provider profile for the new user.

pub mod provider;
pub mod wiring;

pub use provider::{CreateProviderProfile, ProviderProfile, ProviderProfiles};
pub use wiring::build_event_system;
