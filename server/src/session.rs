//! Game sessions: one board, one tick timer, one task.
//!
//! A session owns its [`GameState`] behind a `tokio::sync::RwLock`. The write
//! lock is held for exactly one tick: leave commands, spawning from the
//! matchmaking queue, AI top-up, the simulation pass and the leaderboard.
//! Connection workers and the AI take the read lock afterwards.

use crate::ai::AiController;
use crate::client_manager::{ClientManager, QueuedClient};
use crate::config::GameConfig;
use crate::game::{BoardView, GameState};
use crate::network::FrontMessage;
use crate::nicks::NickPool;
use crate::player::Controller;
use crate::{simulation, spawn};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{Direction, PlayerId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Requests from connection workers, drained at the start of each tick.
#[derive(Debug)]
pub enum SessionCommand {
    Leave { player_id: PlayerId },
}

/// Notifications from a session to one connection worker.
#[derive(Debug)]
pub enum SessionEvent {
    /// The client was placed on the board.
    Joined {
        player_id: PlayerId,
        session: SessionHandle,
    },
    /// A tick finished; the board may be read.
    Ticked { tick: u32 },
    /// The client's player is gone.
    GameOver { score: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Finished,
}

/// Cheap handle connection workers keep while their player is in a session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: u32,
    state: Arc<RwLock<GameState>>,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn state(&self) -> &Arc<RwLock<GameState>> {
        &self.state
    }

    /// Records a direction request under the read lock.
    pub async fn set_direction(&self, player_id: PlayerId, dir: Direction) -> bool {
        self.state.read().await.request_direction(player_id, dir)
    }

    /// Asks the session to remove the player at its next tick.
    pub fn leave(&self, player_id: PlayerId) {
        if self
            .commands
            .send(SessionCommand::Leave { player_id })
            .is_err()
        {
            debug!("Session {} already ended", self.id);
        }
    }
}

pub struct GameSession {
    id: u32,
    config: GameConfig,
    state: Arc<RwLock<GameState>>,
    commands_tx: mpsc::UnboundedSender<SessionCommand>,
    commands_rx: mpsc::UnboundedReceiver<SessionCommand>,
    clients: Arc<RwLock<ClientManager>>,
    front: mpsc::UnboundedSender<FrontMessage>,
    humans: HashMap<PlayerId, mpsc::UnboundedSender<SessionEvent>>,
    ai: AiController,
    nicks: NickPool,
    rng: StdRng,
}

impl GameSession {
    pub fn new(
        id: u32,
        config: GameConfig,
        clients: Arc<RwLock<ClientManager>>,
        front: mpsc::UnboundedSender<FrontMessage>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let mut rng = StdRng::from_entropy();
        let nicks = NickPool::new(&mut rng);
        Self {
            id,
            state: Arc::new(RwLock::new(GameState::new(config.clone()))),
            config,
            commands_tx,
            commands_rx,
            clients,
            front,
            humans: HashMap::new(),
            ai: AiController::new(),
            nicks,
            rng,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.id,
            state: Arc::clone(&self.state),
            commands: self.commands_tx.clone(),
        }
    }

    /// Ticks until the game is over, then tells the front.
    pub async fn run(mut self) {
        info!("Session {} started", self.id);
        let mut timer = interval(self.config.tick_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            timer.tick().await;
            if self.tick().await == SessionStatus::Finished {
                break;
            }
        }

        info!("Session {} finished", self.id);
        if self
            .front
            .send(FrontMessage::SessionEnded {
                session_id: self.id,
            })
            .is_err()
        {
            warn!("Front gone before session {} ended", self.id);
        }
    }

    /// Runs one tick and reports whether the session should keep going.
    pub async fn tick(&mut self) -> SessionStatus {
        let shared = Arc::clone(&self.state);
        let mut state = shared.write().await;
        state.begin_tick();

        while let Ok(command) = self.commands_rx.try_recv() {
            match command {
                SessionCommand::Leave { player_id } => {
                    if state.kill(player_id) {
                        info!("Player {} left session {}", player_id, self.id);
                    }
                    self.humans.remove(&player_id);
                }
            }
        }

        self.spawn_players(&mut state).await;

        let outcome = simulation::advance(&mut *state, self.config.spawn_grace);
        state.update_leaderboard();
        for &(id, score) in &outcome.deaths {
            self.ai.forget(id);
            if let Some(events) = self.humans.remove(&id) {
                // The connection may already be gone.
                let _ = events.send(SessionEvent::GameOver { score });
            }
        }

        let finished = if let Some(winner) = outcome.winner {
            info!("Player {} won session {}", winner, self.id);
            true
        } else if outcome.empty {
            true
        } else {
            self.humans.is_empty() && self.clients.read().await.queue_len() == 0
        };
        if finished {
            for (id, events) in self.humans.drain() {
                let score = state.player(id).map_or(0, |p| p.score);
                let _ = events.send(SessionEvent::GameOver { score });
            }
            return SessionStatus::Finished;
        }

        let tick = state.tick();
        drop(state);

        let mut gone = Vec::new();
        for (&id, events) in &self.humans {
            if events.send(SessionEvent::Ticked { tick }).is_err() {
                gone.push(id);
            }
        }
        for id in gone {
            self.humans.remove(&id);
            let _ = self.commands_tx.send(SessionCommand::Leave { player_id: id });
        }

        let state = shared.read().await;
        for id in state.player_ids() {
            if !state.player(id).is_some_and(|p| p.is_ai()) {
                continue;
            }
            if let Some(dir) = self.ai.choose_direction(&*state, id) {
                state.request_direction(id, dir);
            }
        }
        SessionStatus::Running
    }

    async fn spawn_players(&mut self, state: &mut GameState) {
        let free = self
            .config
            .max_players
            .saturating_sub(state.players().len());
        if free == 0 {
            return;
        }

        let queued = self.clients.write().await.dequeue(free);
        let ai_wanted = self
            .config
            .ai_players
            .saturating_sub(state.players().count(Controller::Ai))
            .min(free - queued.len());
        let mut points =
            spawn::find_spawn_points(&*state, queued.len() + ai_wanted, &mut self.rng).into_iter();

        let mut unplaced: Vec<QueuedClient> = Vec::new();
        for client in queued {
            let Some(at) = points.next() else {
                unplaced.push(client);
                continue;
            };
            let Some(id) = state.add_player(client.name.clone(), Controller::Human, at) else {
                unplaced.push(client);
                continue;
            };
            spawn::grant_territory(state, id, at.0, at.1);
            let joined = SessionEvent::Joined {
                player_id: id,
                session: self.handle(),
            };
            if client.events.send(joined).is_err() {
                state.kill(id);
            } else {
                self.humans.insert(id, client.events);
            }
        }
        if !unplaced.is_empty() {
            debug!(
                "Session {} has no room for {} queued clients",
                self.id,
                unplaced.len()
            );
            self.clients.write().await.requeue_front(unplaced);
        }

        for at in points {
            let Some(id) = state.add_player(self.nicks.next_nick(), Controller::Ai, at) else {
                break;
            };
            spawn::grant_territory(state, id, at.0, at.1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;

    fn config(ai_players: usize) -> GameConfig {
        GameConfig {
            width: 30,
            height: 30,
            tick_interval: Duration::from_millis(10),
            max_players: 4,
            ai_players,
            spawn_grace: 2,
        }
    }

    fn setup(
        ai_players: usize,
    ) -> (
        GameSession,
        Arc<RwLock<ClientManager>>,
        mpsc::UnboundedReceiver<FrontMessage>,
    ) {
        let clients = Arc::new(RwLock::new(ClientManager::new(8)));
        let (front_tx, front_rx) = mpsc::unbounded_channel();
        let session = GameSession::new(1, config(ai_players), Arc::clone(&clients), front_tx);
        (session, clients, front_rx)
    }

    async fn queue_client(
        clients: &Arc<RwLock<ClientManager>>,
        name: &str,
    ) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let mut manager = clients.write().await;
        let id = manager.add_client(addr, tx).unwrap();
        assert!(manager.enqueue(id, name.to_string()));
        rx
    }

    #[tokio::test]
    async fn test_queued_client_joins_and_ticks() {
        let (mut session, clients, _front) = setup(2);
        let mut events = queue_client(&clients, "ada").await;

        assert_eq!(session.tick().await, SessionStatus::Running);
        let player_id = match events.recv().await {
            Some(SessionEvent::Joined { player_id, session }) => {
                assert_eq!(session.id, 1);
                player_id
            }
            other => panic!("expected join, got {:?}", other),
        };
        assert!(matches!(
            events.recv().await,
            Some(SessionEvent::Ticked { tick: 1 })
        ));

        let state = session.state.read().await;
        let player = state.player(player_id).unwrap();
        assert_eq!(player.name, "ada");
        assert_eq!(player.score, 9);
        assert_eq!(state.players().count(Controller::Ai), 2);
        assert_eq!(state.accounted_cells(), 900);
        assert_eq!(clients.read().await.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_leave_removes_player_and_ends_session() {
        let (mut session, clients, _front) = setup(1);
        let mut events = queue_client(&clients, "ada").await;
        session.tick().await;
        let handle = match events.recv().await {
            Some(SessionEvent::Joined { player_id, session }) => {
                session.leave(player_id);
                session
            }
            other => panic!("expected join, got {:?}", other),
        };

        // No human left and nobody queued: the session stops.
        assert_eq!(session.tick().await, SessionStatus::Finished);
        let state = handle.state().read().await;
        assert_eq!(state.players().count(Controller::Human), 0);
    }

    #[tokio::test]
    async fn test_owning_every_cell_wins_the_session() {
        let clients = Arc::new(RwLock::new(ClientManager::new(8)));
        let (front_tx, _front_rx) = mpsc::unbounded_channel();
        let tiny = GameConfig {
            width: 3,
            height: 3,
            max_players: 1,
            spawn_grace: 0,
            ..config(0)
        };
        let mut session = GameSession::new(1, tiny, Arc::clone(&clients), front_tx);

        let (events_tx, mut events) = mpsc::unbounded_channel();
        let id = {
            let mut state = session.state.write().await;
            state.begin_tick();
            let id = state
                .add_player("ada".into(), Controller::Human, (1, 1))
                .unwrap();
            assert_eq!(spawn::grant_territory(&mut *state, id, 1, 1), 9);
            id
        };
        session.humans.insert(id, events_tx);

        assert_eq!(session.tick().await, SessionStatus::Finished);
        match events.recv().await {
            Some(SessionEvent::GameOver { score }) => assert_eq!(score, 9),
            other => panic!("expected game over, got {:?}", other),
        }
        assert!(session.humans.is_empty());
    }

    #[tokio::test]
    async fn test_ai_requests_direction_after_tick() {
        let (mut session, clients, _front) = setup(1);
        let _events = queue_client(&clients, "ada").await;
        session.tick().await;

        let state = session.state.read().await;
        let bot = state
            .players()
            .iter()
            .find(|p| p.is_ai())
            .expect("an AI player");
        assert_ne!(bot.requested_direction(), Direction::None);
    }

    #[tokio::test]
    async fn test_run_reports_end_to_front() {
        let (session, _clients, mut front) = setup(0);
        // Nobody queued: the first tick leaves an empty board.
        tokio::time::timeout(Duration::from_secs(2), session.run())
            .await
            .unwrap();
        assert!(matches!(
            front.recv().await,
            Some(FrontMessage::SessionEnded { session_id: 1 })
        ));
    }
}
