use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;

use brightpath_app::{ProviderProfiles, build_event_system};
use brightpath_core::BoundedContext;
use brightpath_events::event_type::known;
use brightpath_events::{DomainEvent, InMemoryPubSub, Payload, PubSub, WireMessage};
use brightpath_infra::{EventingConfig, TransportKind};

const DEMO_USERS: [&str; 3] = ["parent-ada", "parent-grace", "parent-ada"];

fn main() -> anyhow::Result<()> {
    brightpath_observability::init();

    let config = EventingConfig::from_env().context("invalid eventing configuration")?;
    tracing::info!(transport = ?config.transport, "starting eventing demo");

    match config.transport {
        TransportKind::Memory => run(Arc::new(InMemoryPubSub::new()), config),
        TransportKind::Redis => run_redis(config),
    }
}

#[cfg(feature = "redis")]
fn run_redis(config: EventingConfig) -> anyhow::Result<()> {
    let transport = brightpath_infra::transport::RedisPubSub::new(&config.redis_url)
        .with_context(|| format!("failed to open redis at {}", config.redis_url))?;
    run(Arc::new(transport), config)
}

#[cfg(not(feature = "redis"))]
fn run_redis(_config: EventingConfig) -> anyhow::Result<()> {
    anyhow::bail!("EVENT_TRANSPORT=redis requires building with the `redis` feature")
}

fn run<T>(transport: Arc<T>, config: EventingConfig) -> anyhow::Result<()>
where
    T: PubSub<WireMessage> + 'static,
{
    let profiles = Arc::new(ProviderProfiles::new());
    let system = build_event_system(transport, config, Arc::clone(&profiles))
        .context("failed to start event system")?;

    for user_id in DEMO_USERS {
        let event = DomainEvent::new(
            known::USER_REGISTERED,
            user_id,
            BoundedContext::Accounts,
            Payload::new().with("email", format!("{user_id}@example.com")),
        );
        system.dispatch(&event, BoundedContext::Accounts);
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let settled = system
            .subscriber_stats()
            .iter()
            .all(|(_, s)| s.received >= DEMO_USERS.len() as u64);
        if settled || Instant::now() > deadline {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }

    for (name, stats) in system.subscriber_stats() {
        tracing::info!(subscriber = %name, ?stats, "subscriber finished");
    }
    tracing::info!(profiles = profiles.len(), "provider profiles in store");

    system.shutdown();
    Ok(())
}
