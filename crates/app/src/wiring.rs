//! Builds the event system for the example flow.

use std::sync::Arc;

use brightpath_core::BoundedContext;
use brightpath_events::event_type::known;
use brightpath_events::{PubSub, Topic, WireMessage};
use brightpath_infra::{
    EventSystem, EventSystemBuilder, EventingConfig, EventingError, SubscriberBinding,
};

use crate::provider::{CreateProviderProfile, ProviderProfiles};

/// Accounts promotes `user_registered`; Provider subscribes to it and keeps
/// `profiles` in sync. Messaging broadcasts sent messages to their
/// conversation topic.
pub fn build_event_system<T>(
    transport: Arc<T>,
    config: EventingConfig,
    profiles: Arc<ProviderProfiles>,
) -> Result<EventSystem<T>, EventingError>
where
    T: PubSub<WireMessage> + 'static,
{
    let create_profile = SubscriberBinding::new(
        CreateProviderProfile::new(profiles, config.clone()),
        [Topic::integration(BoundedContext::Accounts, &known::USER_REGISTERED)],
    );

    EventSystemBuilder::new(transport, config)
        .promote(BoundedContext::Accounts, [known::USER_REGISTERED])
        .broadcast(BoundedContext::Messaging, [known::MESSAGE_SENT], |event| {
            event
                .payload()
                .get_str("conversation_id")
                .map(|id| Topic::entity("conversation", id))
        })
        .subscriber(create_profile)
        .start()
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use brightpath_events::{DomainEvent, InMemoryPubSub, Payload};

    use super::*;

    #[test]
    fn registration_in_accounts_creates_a_provider_profile() {
        let profiles = Arc::new(ProviderProfiles::new());
        let config = EventingConfig {
            subscriber_poll_interval: Duration::from_millis(10),
            ..EventingConfig::default()
        };
        let system = build_event_system(
            Arc::new(InMemoryPubSub::new()),
            config,
            Arc::clone(&profiles),
        )
        .unwrap();

        system.dispatch(
            &DomainEvent::new(
                known::USER_REGISTERED,
                "user-1",
                BoundedContext::Accounts,
                Payload::new().with("email", "p@example.com"),
            ),
            BoundedContext::Accounts,
        );

        let deadline = Instant::now() + Duration::from_secs(2);
        while profiles.get("user-1").is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        system.shutdown();

        assert_eq!(profiles.get("user-1").map(|p| p.contact_email).as_deref(), Some("p@example.com"));
    }
}
