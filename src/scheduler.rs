//! Enemy turn scheduler
//!
//! Watches the session's turn signal. When an enemy turn comes due it waits
//! the configured pause and then tells the session to play it. Any newer
//! signal arriving during the pause cancels the wait, so a load or reset in
//! between never lets an old turn fire.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::session::Session;

/// Default pause before an enemy acts
pub const DEFAULT_TURN_DELAY: Duration = Duration::from_millis(1500);

/// Spawn the scheduler task for `session`
///
/// The task runs until `shutdown` flips to `true` or its sender is dropped.
pub fn spawn_turn_scheduler(
    session: Arc<Session>,
    turn_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut turns = session.subscribe();
        info!(delay_ms = turn_delay.as_millis() as u64, "Turn scheduler started");

        loop {
            let due = turns.borrow_and_update().enemy_turn.clone();

            match due {
                Some(enemy) => {
                    tokio::select! {
                        _ = tokio::time::sleep(turn_delay) => {
                            if turns.has_changed().unwrap_or(true) {
                                continue;
                            }
                            debug!(enemy = %enemy, "Enemy turn due");
                            session.on_combatant_turn_due(&enemy).await;
                        }
                        changed = turns.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            debug!(enemy = %enemy, "Pending enemy turn superseded");
                        }
                        _ = shutdown.changed() => break,
                    }
                }
                None => {
                    tokio::select! {
                        changed = turns.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            }

            if *shutdown.borrow() {
                break;
            }
        }

        info!("Turn scheduler stopped");
    })
}
