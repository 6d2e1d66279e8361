//! In-thread supervision for bus and subscriber actors.
//!
//! An actor body runs under `catch_unwind`. If it unwinds, the crash is
//! logged and the body is entered again with the same state, so the
//! actor's mailbox and subscription outlive the crash. A body that
//! returns normally ends the actor.

use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use brightpath_events::dispatch::panic_message;

/// Run `body` until it returns normally, restarting it after every panic.
/// Returns how many restarts happened.
pub fn supervise(actor: &str, mut body: impl FnMut()) -> u32 {
    let mut restarts = 0;
    loop {
        match panic::catch_unwind(AssertUnwindSafe(&mut body)) {
            Ok(()) => return restarts,
            Err(payload) => {
                restarts += 1;
                error!(
                    actor = %actor,
                    restarts,
                    panic = %panic_message(payload.as_ref()),
                    "actor crashed; restarting"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;
    use crate::test_support::capture_logs;

    #[test]
    fn clean_exit_needs_no_restart() {
        let mut runs = 0;
        assert_eq!(supervise("quiet", || runs += 1), 0);
        assert_eq!(runs, 1);
    }

    #[test]
    fn crashes_are_logged_and_the_body_reentered() {
        let mut runs = 0;
        let (restarts, logs) = capture_logs(|| {
            supervise("event-bus-accounts", || {
                runs += 1;
                if runs < 3 {
                    panic!("mailbox poisoned {runs}");
                }
            })
        });

        assert_eq!(restarts, 2);
        assert_eq!(runs, 3);
        let crashes: Vec<_> = logs.iter().filter(|l| l.level == Level::ERROR).collect();
        assert_eq!(crashes.len(), 2);
        assert_eq!(crashes[0].field("actor"), Some("event-bus-accounts"));
        assert_eq!(crashes[1].field("panic"), Some("mailbox poisoned 2"));
    }
}
