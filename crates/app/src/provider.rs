//! Provider context: provider profiles created from Accounts registrations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use brightpath_core::{DomainError, DomainResult};
use brightpath_events::{
    EventHandler, HandlerError, HandlerOutcome, IntegrationEvent, Retrier, RetryOutcome,
};
use brightpath_infra::EventingConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub user_id: String,
    pub contact_email: String,
}

/// In-memory provider profile store; one profile per user.
#[derive(Debug, Default)]
pub struct ProviderProfiles {
    by_user: Mutex<HashMap<String, ProviderProfile>>,
}

impl ProviderProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with `AlreadyExists` when the user already has a profile.
    pub fn create(&self, user_id: &str, contact_email: &str) -> DomainResult<ProviderProfile> {
        if contact_email.is_empty() {
            return Err(DomainError::validation("provider profile needs a contact email"));
        }
        let mut by_user = self
            .by_user
            .lock()
            .map_err(|_| DomainError::conflict("provider profile store poisoned"))?;
        if by_user.contains_key(user_id) {
            return Err(DomainError::already_exists(format!(
                "provider profile for user {user_id}"
            )));
        }
        let profile = ProviderProfile {
            user_id: user_id.to_string(),
            contact_email: contact_email.to_string(),
        };
        by_user.insert(user_id.to_string(), profile.clone());
        Ok(profile)
    }

    pub fn get(&self, user_id: &str) -> Option<ProviderProfile> {
        self.by_user.lock().ok()?.get(user_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_user.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reacts to `user_registered` integration events by creating a provider
/// profile, retrying transient store failures.
#[derive(Debug)]
pub struct CreateProviderProfile {
    profiles: Arc<ProviderProfiles>,
    config: EventingConfig,
}

impl CreateProviderProfile {
    pub fn new(profiles: Arc<ProviderProfiles>, config: EventingConfig) -> Self {
        Self { profiles, config }
    }
}

impl EventHandler<IntegrationEvent> for CreateProviderProfile {
    fn name(&self) -> &str {
        "create_provider_profile"
    }

    fn handle(&self, event: &IntegrationEvent) -> HandlerOutcome {
        let Some(email) = event.payload().get_str("email") else {
            return HandlerOutcome::error(HandlerError::rejected(
                "user_registered payload has no email",
            ));
        };
        let user_id = event.aggregate_id();

        let outcome = Retrier::new(self.config.retry_context("create_provider_profile", user_id))
            .idempotent_when(DomainError::is_idempotent_conflict)
            .run(|| self.profiles.create(user_id, email));

        match outcome {
            Ok(RetryOutcome::Completed(profile)) => {
                info!(user_id = %profile.user_id, "provider profile created");
                HandlerOutcome::Ok
            }
            Ok(RetryOutcome::AlreadySatisfied) => HandlerOutcome::Ok,
            Err(err) => HandlerOutcome::error(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use brightpath_core::BoundedContext;
    use brightpath_events::event_type::known;
    use brightpath_events::Payload;

    use super::*;

    fn handler(profiles: &Arc<ProviderProfiles>) -> CreateProviderProfile {
        let config = EventingConfig {
            retry_backoff: Duration::from_millis(1),
            ..EventingConfig::default()
        };
        CreateProviderProfile::new(Arc::clone(profiles), config)
    }

    fn registered(user_id: &str, payload: Payload) -> IntegrationEvent {
        IntegrationEvent::new(known::USER_REGISTERED, user_id, BoundedContext::Accounts, payload)
    }

    #[test]
    fn creates_a_profile_once() {
        let profiles = Arc::new(ProviderProfiles::new());
        let handler = handler(&profiles);
        let event = registered("user-1", Payload::new().with("email", "p@example.com"));

        assert_eq!(handler.handle(&event), HandlerOutcome::Ok);
        assert_eq!(handler.handle(&event), HandlerOutcome::Ok);

        assert_eq!(profiles.len(), 1);
        assert_eq!(
            profiles.get("user-1"),
            Some(ProviderProfile {
                user_id: "user-1".into(),
                contact_email: "p@example.com".into(),
            })
        );
    }

    #[test]
    fn missing_email_is_rejected() {
        let profiles = Arc::new(ProviderProfiles::new());
        let outcome = handler(&profiles).handle(&registered("user-2", Payload::new()));
        assert!(matches!(outcome, HandlerOutcome::Error(HandlerError::Rejected(_))));
        assert!(profiles.is_empty());
    }

    #[test]
    fn validation_failures_surface_after_retries() {
        let profiles = Arc::new(ProviderProfiles::new());
        let outcome =
            handler(&profiles).handle(&registered("user-3", Payload::new().with("email", "")));
        assert!(matches!(
            outcome,
            HandlerOutcome::Error(HandlerError::Domain(DomainError::Validation(_)))
        ));
    }
}
