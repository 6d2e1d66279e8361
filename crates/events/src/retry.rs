//! Bounded retry with backoff for side-effecting handler writes.
//!
//! Cross-context handlers (e.g. "user registered ⇒ create a provider
//! profile") race with concurrent writes and transient persistence errors. A
//! few attempts with a short constant pause absorb that without unbounded
//! blocking. Concurrent retries from different processes are not coordinated;
//! the downstream operation's uniqueness constraints surface as an
//! idempotent conflict, which counts as success.

use std::time::Duration;

use tracing::{error, info, warn};

/// Attempts made by default (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Pause between attempts by default.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(100);

/// What is being retried, for logging, plus the retry budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryContext {
    operation_name: String,
    aggregate_id: String,
    backoff: Duration,
    max_attempts: u32,
}

impl RetryContext {
    pub fn new(operation_name: impl Into<String>, aggregate_id: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            aggregate_id: aggregate_id.into(),
            backoff: DEFAULT_BACKOFF,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Total attempts, including the first; `0` is treated as `1`.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Successful result of a retried operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    /// The operation itself succeeded.
    Completed(T),
    /// The operation failed with an idempotent conflict: the side effect it
    /// protects is already in place.
    AlreadySatisfied,
}

impl<T> RetryOutcome<T> {
    pub fn into_completed(self) -> Option<T> {
        match self {
            RetryOutcome::Completed(value) => Some(value),
            RetryOutcome::AlreadySatisfied => None,
        }
    }
}

type ConflictPredicate<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;
type Sleeper = Box<dyn Fn(Duration) + Send + Sync>;

/// Configurable retry runner.
///
/// ```ignore
/// let outcome = Retrier::new(RetryContext::new("create_provider_profile", &user_id))
///     .idempotent_when(DomainError::is_idempotent_conflict)
///     .run(|| profiles.create(&user_id))?;
/// ```
pub struct Retrier<E> {
    context: RetryContext,
    is_conflict: ConflictPredicate<E>,
    sleep: Sleeper,
}

impl<E> Retrier<E> {
    pub fn new(context: RetryContext) -> Self {
        Self {
            context,
            is_conflict: Box::new(|_: &E| false),
            sleep: Box::new(std::thread::sleep),
        }
    }

    /// Failures matching `predicate` mean the side effect already happened.
    pub fn idempotent_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.is_conflict = Box::new(predicate);
        self
    }

    /// Replace the blocking sleep between attempts.
    pub fn with_sleeper<S>(mut self, sleep: S) -> Self
    where
        S: Fn(Duration) + Send + Sync + 'static,
    {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn context(&self) -> &RetryContext {
        &self.context
    }

    /// Run `operation` until it succeeds, hits an idempotent conflict, or the
    /// attempt budget runs out. The last failure is returned untouched.
    pub fn run<T, Op>(&self, mut operation: Op) -> Result<RetryOutcome<T>, E>
    where
        Op: FnMut() -> Result<T, E>,
        E: core::fmt::Debug,
    {
        let ctx = &self.context;
        let max_attempts = ctx.max_attempts();
        let mut attempt = 1;

        loop {
            match operation() {
                Ok(value) => return Ok(RetryOutcome::Completed(value)),
                Err(err) if (self.is_conflict)(&err) => {
                    info!(
                        operation = %ctx.operation_name,
                        aggregate_id = %ctx.aggregate_id,
                        attempt,
                        error = ?err,
                        "operation already applied; treating conflict as success"
                    );
                    return Ok(RetryOutcome::AlreadySatisfied);
                }
                Err(err) if attempt >= max_attempts => {
                    error!(
                        operation = %ctx.operation_name,
                        aggregate_id = %ctx.aggregate_id,
                        attempts = attempt,
                        error = ?err,
                        "operation failed after exhausting retries"
                    );
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        operation = %ctx.operation_name,
                        aggregate_id = %ctx.aggregate_id,
                        attempt,
                        max_attempts,
                        backoff_ms = ctx.backoff.as_millis() as u64,
                        error = ?err,
                        "operation failed; retrying"
                    );
                    (self.sleep)(ctx.backoff);
                    attempt += 1;
                }
            }
        }
    }
}

/// Retry `operation` with the budget in `context`, sleeping `backoff`
/// between attempts. No failure is treated as an idempotent conflict; use
/// [`Retrier::idempotent_when`] for that.
pub fn retry_with_backoff<T, E, Op>(operation: Op, context: &RetryContext) -> Result<RetryOutcome<T>, E>
where
    Op: FnMut() -> Result<T, E>,
    E: core::fmt::Debug,
{
    Retrier::new(context.clone()).run(operation)
}
