//! Game session
//!
//! Owns the current [`GameState`] revision and the game log, dispatches the
//! command surface and talks to the narrative gateway.
//!
//! Every state change installs a new revision. A narrative request remembers
//! the revision it was planned against; when its text comes back the outcome
//! is applied only if that revision is still current. Loading or resetting
//! installs a new revision, so anything still in flight is discarded when it
//! lands.
//!
//! While a request is outstanding the session is busy: `attack`, `search` and
//! `image` are turned away, `save` and `load` are not.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::combat::{
    advance_turn, commit, enemy_turn_due, plan_enemy_turn, plan_player_action, Dice, EnemyPlan,
    PendingOutcome, Plan, PlayerAction,
};
use crate::error::GameResult;
use crate::log::{GameLog, LogEntry};
use crate::narrative::{prompts, NarrativeGateway};
use crate::state::{initial_state, Combatant, GameState, HitPoints};
use crate::storage::{load_snapshot, save_snapshot, SaveStore, DEFAULT_SAVE_KEY};

/// System message for actions refused while narration is outstanding
pub const BUSY_MESSAGE: &str = "The story is still unfolding...";

/// Default pause between an enemy's attack landing and the turn passing on
pub const DEFAULT_ADVANCE_DELAY: Duration = Duration::from_millis(100);

/// A verb from the command surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Attack { target: Option<String> },
    Search,
    Save,
    Load,
    Image,
}

impl Command {
    /// Build a command from a verb and optional target; unknown verbs are `None`
    pub fn parse(verb: &str, target: Option<&str>) -> Option<Self> {
        let target = target
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        match verb.trim().to_ascii_lowercase().as_str() {
            "attack" => Some(Command::Attack { target }),
            "search" => Some(Command::Search),
            "save" => Some(Command::Save),
            "load" => Some(Command::Load),
            "image" => Some(Command::Image),
            _ => None,
        }
    }

    /// Parse a typed line such as `attack enemy_goblin_1`
    pub fn from_input(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next()?;
        Self::parse(verb, words.next())
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Command::Attack { .. } => "attack",
            Command::Search => "search",
            Command::Save => "save",
            Command::Load => "load",
            Command::Image => "image",
        }
    }
}

/// Published on every revision change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSignal {
    pub revision: u64,
    /// Enemy whose turn is waiting to be played, if any
    pub enemy_turn: Option<String>,
}

/// One row of the combat tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerRow {
    pub id: String,
    pub name: String,
    pub hit_points: HitPoints,
    pub armor_class: i32,
    pub is_player: bool,
    pub is_current: bool,
}

struct SessionInner {
    state: Arc<GameState>,
    revision: u64,
    log: GameLog,
    dice: Box<dyn Dice>,
    /// Revision the outstanding request was planned against
    pending: Option<u64>,
    scene_image: Option<String>,
}

/// Clears the busy flag when a request's future is dropped before it settles
///
/// The normal completion path clears `pending` itself, leaving nothing for
/// the guard to do. Must not be dropped while the session lock is held.
struct PendingRequest<'a> {
    session: &'a Session,
    /// Revision the request was planned against
    planned: u64,
    /// Revision holding a committed enemy outcome whose turn has not passed yet
    committed: Option<u64>,
}

impl<'a> PendingRequest<'a> {
    fn new(session: &'a Session, planned: u64) -> Self {
        Self {
            session,
            planned,
            committed: None,
        }
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        let mut inner = self.session.inner.lock();
        if inner.pending != Some(self.planned) {
            return;
        }
        warn!(revision = self.planned, "Request abandoned before it settled");
        inner.pending = None;

        match self.committed {
            Some(revision) if inner.revision == revision => {
                let state = inner.state.clone();
                let next = advance_turn(&state, &mut inner.log);
                self.session.install(&mut inner, next);
            }
            _ => self.session.publish(&inner),
        }
    }
}

pub struct Session {
    inner: Mutex<SessionInner>,
    gateway: Arc<dyn NarrativeGateway>,
    store: Arc<dyn SaveStore>,
    save_key: String,
    advance_delay: Duration,
    signal: watch::Sender<TurnSignal>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Session")
            .field("session_id", &inner.state.session_id)
            .field("revision", &inner.revision)
            .field("pending", &inner.pending)
            .field("save_key", &self.save_key)
            .finish()
    }
}

impl Session {
    /// Start a session on `state`, opening with the scene description
    pub fn new(
        state: GameState,
        dice: Box<dyn Dice>,
        gateway: Arc<dyn NarrativeGateway>,
        store: Arc<dyn SaveStore>,
    ) -> Self {
        let mut log = GameLog::new();
        log.narrative(state.scene.description.clone());

        let signal = TurnSignal {
            revision: 0,
            enemy_turn: enemy_turn_due(&state).map(str::to_string),
        };
        let (signal, _) = watch::channel(signal);

        info!(session_id = %state.session_id, "Session started");
        Self {
            inner: Mutex::new(SessionInner {
                state: Arc::new(state),
                revision: 0,
                log,
                dice,
                pending: None,
                scene_image: None,
            }),
            gateway,
            store,
            save_key: DEFAULT_SAVE_KEY.to_string(),
            advance_delay: DEFAULT_ADVANCE_DELAY,
            signal,
        }
    }

    pub fn with_save_key(mut self, key: impl Into<String>) -> Self {
        self.save_key = key.into();
        self
    }

    pub fn with_advance_delay(mut self, delay: Duration) -> Self {
        self.advance_delay = delay;
        self
    }

    /// Run one command to completion
    ///
    /// Refusals are reported in the log, not as errors. An `Err` means the
    /// command failed outright: unreadable weapon notation or a storage
    /// failure while saving.
    pub async fn handle(&self, command: Command) -> GameResult<()> {
        debug!(verb = command.verb(), "Handling command");
        match command {
            Command::Attack { target } => self.act(PlayerAction::Attack { target }).await,
            Command::Search => self.act(PlayerAction::Search).await,
            Command::Save => self.save().await,
            Command::Load => {
                self.load().await;
                Ok(())
            }
            Command::Image => {
                self.image().await;
                Ok(())
            }
        }
    }

    pub async fn attack(&self, target: Option<&str>) -> GameResult<()> {
        self.act(PlayerAction::Attack {
            target: target.map(str::to_string),
        })
        .await
    }

    pub async fn search(&self) -> GameResult<()> {
        self.act(PlayerAction::Search).await
    }

    async fn act(&self, action: PlayerAction) -> GameResult<()> {
        let (revision, pending) = {
            let mut inner = self.inner.lock();
            if inner.pending.is_some() {
                inner.log.system(BUSY_MESSAGE);
                return Ok(());
            }

            let state = inner.state.clone();
            let SessionInner { dice, log, .. } = &mut *inner;
            let plan = plan_player_action(&state, &action, &mut **dice, log);

            match plan {
                Err(e) => {
                    warn!(error = %e, "Action failed");
                    inner.log.system(format!("The action falters: {}", e));
                    return Err(e);
                }
                Ok(Plan::Rejected) => return Ok(()),
                Ok(Plan::Done(next)) => {
                    self.install(&mut inner, next);
                    return Ok(());
                }
                Ok(Plan::Narrate(pending)) => {
                    inner.pending = Some(inner.revision);
                    (inner.revision, pending)
                }
            }
        };

        let _request = PendingRequest::new(self, revision);
        let narrative = self.gateway.generate_narrative(&pending.prompt).await;

        let mut inner = self.inner.lock();
        if inner.revision != revision {
            debug!(revision, current = inner.revision, "Discarding stale narrative");
            return Ok(());
        }
        let state = inner.state.clone();
        let next = commit(&state, &pending.outcome, &narrative, &mut inner.log);
        inner.pending = None;
        self.install(&mut inner, next);
        Ok(())
    }

    /// Play the turn of `combatant_id` if it is still the enemy turn due
    ///
    /// Called by the turn scheduler. Stale calls (the turn already moved on,
    /// or a request is outstanding) do nothing.
    pub async fn on_combatant_turn_due(&self, combatant_id: &str) {
        let Some((revision, pending)) = self.plan_enemy(combatant_id) else {
            return;
        };

        let mut request = PendingRequest::new(self, revision);
        let narrative = self.gateway.generate_narrative(&pending.prompt).await;

        let revision = {
            let mut inner = self.inner.lock();
            if inner.revision != revision {
                debug!(
                    revision,
                    current = inner.revision,
                    "Discarding stale enemy narrative"
                );
                return;
            }
            let state = inner.state.clone();
            let next = commit(&state, &pending.outcome, &narrative, &mut inner.log);
            self.install(&mut inner, next);
            inner.revision
        };
        request.committed = Some(revision);

        tokio::time::sleep(self.advance_delay).await;

        let mut inner = self.inner.lock();
        if inner.revision != revision {
            return;
        }
        let state = inner.state.clone();
        let next = advance_turn(&state, &mut inner.log);
        inner.pending = None;
        self.install(&mut inner, next);
    }

    fn plan_enemy(&self, combatant_id: &str) -> Option<(u64, PendingOutcome)> {
        let mut inner = self.inner.lock();
        if inner.pending.is_some() {
            debug!(combatant = %combatant_id, "Enemy turn deferred, request outstanding");
            return None;
        }
        if enemy_turn_due(&inner.state) != Some(combatant_id) {
            debug!(combatant = %combatant_id, "Ignoring stale turn notification");
            return None;
        }

        let state = inner.state.clone();
        let SessionInner { dice, log, .. } = &mut *inner;
        match plan_enemy_turn(&state, combatant_id, &mut **dice, log) {
            EnemyPlan::Skip => {
                let next = advance_turn(&state, &mut inner.log);
                self.install(&mut inner, next);
                None
            }
            EnemyPlan::Narrate(pending) => {
                inner.pending = Some(inner.revision);
                Some((inner.revision, pending))
            }
        }
    }

    /// Write the current revision to the save store
    pub async fn save(&self) -> GameResult<()> {
        let state = self.inner.lock().state.clone();
        let result = save_snapshot(self.store.as_ref(), &self.save_key, &state).await;

        let mut inner = self.inner.lock();
        match result {
            Ok(()) => {
                info!(key = %self.save_key, "Game saved");
                inner.log.system("Game saved successfully.");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Save failed");
                inner.log.system("The game could not be saved.");
                Err(e)
            }
        }
    }

    /// Replace the current state with the saved one, if there is one
    ///
    /// Returns whether a snapshot was loaded. A missing or unreadable save
    /// leaves the current state alone.
    pub async fn load(&self) -> bool {
        let loaded = load_snapshot(self.store.as_ref(), &self.save_key).await;

        let mut inner = self.inner.lock();
        match loaded {
            Some(state) => {
                info!(session_id = %state.session_id, "Game loaded");
                inner.log.system("Game loaded.");
                inner.log.narrative(state.scene.description.clone());
                inner.pending = None;
                inner.scene_image = None;
                self.install(&mut inner, state);
                true
            }
            None => {
                inner.log.system("No saved game found.");
                false
            }
        }
    }

    /// Start over with a fresh campaign
    pub fn reset(&self) {
        let state = initial_state();
        let mut inner = self.inner.lock();
        info!(session_id = %state.session_id, "Session reset");
        inner.log.system("A new adventure begins.");
        inner.log.narrative(state.scene.description.clone());
        inner.pending = None;
        inner.scene_image = None;
        self.install(&mut inner, state);
    }

    /// Ask the gateway for a picture of the current scene
    pub async fn image(&self) {
        let (revision, prompt) = {
            let mut inner = self.inner.lock();
            if inner.pending.is_some() {
                inner.log.system(BUSY_MESSAGE);
                return;
            }
            inner.log.system("Visualizing the scene...");
            inner.pending = Some(inner.revision);
            (inner.revision, prompts::scene_image(&inner.state))
        };

        let _request = PendingRequest::new(self, revision);
        let image = self.gateway.generate_image(&prompt).await;

        let mut inner = self.inner.lock();
        if inner.revision != revision {
            debug!(revision, current = inner.revision, "Discarding stale image");
            return;
        }
        if image.is_none() {
            debug!("No scene image produced");
        }
        inner.scene_image = image;
        inner.pending = None;
        // An enemy turn held back by the request can go ahead now
        self.publish(&inner);
    }

    fn install(&self, inner: &mut SessionInner, next: GameState) {
        if let Err(e) = next.check_invariants() {
            warn!(error = %e, "Installed state breaks an invariant");
        }
        inner.state = Arc::new(next);
        inner.revision += 1;
        debug!(revision = inner.revision, "New revision");
        self.publish(inner);
    }

    fn publish(&self, inner: &SessionInner) {
        let enemy_turn = match inner.pending {
            Some(_) => None,
            None => enemy_turn_due(&inner.state).map(str::to_string),
        };
        self.signal.send_replace(TurnSignal {
            revision: inner.revision,
            enemy_turn,
        });
    }

    /// Watch revision changes and due enemy turns
    pub fn subscribe(&self) -> watch::Receiver<TurnSignal> {
        self.signal.subscribe()
    }

    /// The current revision of the game state
    pub fn snapshot(&self) -> Arc<GameState> {
        self.inner.lock().state.clone()
    }

    pub fn revision(&self) -> u64 {
        self.inner.lock().revision
    }

    pub fn is_busy(&self) -> bool {
        self.inner.lock().pending.is_some()
    }

    pub fn is_player_turn(&self) -> bool {
        self.inner.lock().state.is_player_turn()
    }

    pub fn in_combat(&self) -> bool {
        self.inner.lock().state.in_combat()
    }

    pub fn scene_image(&self) -> Option<String> {
        self.inner.lock().scene_image.clone()
    }

    /// Log entries with an id greater than `id`
    pub fn log_since(&self, id: u64) -> Vec<LogEntry> {
        self.inner.lock().log.since(id).to_vec()
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.inner.lock().log.entries().to_vec()
    }

    pub fn last_log_id(&self) -> u64 {
        self.inner.lock().log.last_id()
    }

    /// Combatants still in the fight, in initiative order
    pub fn tracker(&self) -> Vec<TrackerRow> {
        let state = self.snapshot();
        let current = state.scene.current_turn.as_deref();
        state
            .scene
            .active_combatants
            .iter()
            .filter_map(|id| state.combatant(id))
            .filter(|c| !c.is_defeated())
            .map(|c| TrackerRow {
                id: c.id().to_string(),
                name: c.name().to_string(),
                hit_points: *c.hit_points(),
                armor_class: c.armor_class(),
                is_player: c.is_player(),
                is_current: current == Some(c.id()),
            })
            .collect()
    }
}
