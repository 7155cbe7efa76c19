use super::{GameError, GameView, StrangerGame, Topic};
use crate::app_config::GameConfig;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub type SessionId = Uuid;

struct Session {
    game: StrangerGame,
    touched: Instant,
}

/// In-memory game sessions shared by all workers.
pub struct GameRegistry {
    sessions: DashMap<SessionId, Session>,
    topics: Arc<Vec<Topic>>,
    limits: GameConfig,
}

impl GameRegistry {
    pub fn new(topics: Vec<Topic>, limits: GameConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            topics: Arc::new(topics),
            limits,
        }
    }

    /// Builds a registry from the `[game]` config section.
    pub fn from_config(limits: GameConfig) -> Self {
        let topics = super::load_topics(&limits.topics_path);
        Self::new(topics, limits)
    }

    pub fn create(&self) -> (SessionId, GameView) {
        let id = Uuid::new_v4();
        let game = StrangerGame::new(self.topics.clone(), self.limits.clone());
        let view = game.view();
        self.sessions.insert(
            id,
            Session {
                game,
                touched: Instant::now(),
            },
        );
        log::debug!("Created stranger game {}", id);
        (id, view)
    }

    pub fn view(&self, id: &SessionId) -> Result<GameView, GameError> {
        self.update(id, |game| Ok(game.view()))
    }

    /// Runs `action` against a session and returns the resulting view.
    pub fn apply<F>(&self, id: &SessionId, action: F) -> Result<GameView, GameError>
    where
        F: FnOnce(&mut StrangerGame) -> Result<(), GameError>,
    {
        self.update(id, |game| {
            action(game)?;
            Ok(game.view())
        })
    }

    fn update<T, F>(&self, id: &SessionId, f: F) -> Result<T, GameError>
    where
        F: FnOnce(&mut StrangerGame) -> Result<T, GameError>,
    {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or(GameError::SessionNotFound)?;
        session.touched = Instant::now();
        f(&mut session.game)
    }

    pub fn remove(&self, id: &SessionId) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Drops sessions idle for longer than `max_idle`; returns how many.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        let now = Instant::now();
        self.sessions
            .retain(|_, session| now.duration_since(session.touched) < max_idle);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stranger::{default_topics, GameState};

    fn registry() -> GameRegistry {
        GameRegistry::new(default_topics(), GameConfig::default())
    }

    #[test]
    fn test_sessions_are_independent() {
        let registry = registry();
        let (a, _) = registry.create();
        let (b, _) = registry.create();

        registry.apply(&a, |g| g.set_players(6)).unwrap();
        let view_a = registry.apply(&a, |g| g.start()).unwrap();
        let view_b = registry.view(&b).unwrap();

        assert_eq!(view_a.state, GameState::Reveal);
        assert_eq!(view_a.num_players, 6);
        assert_eq!(view_b.state, GameState::Setup);
        assert_eq!(view_b.num_players, 4);
    }

    #[test]
    fn test_unknown_session() {
        let registry = registry();
        assert_eq!(
            registry.view(&Uuid::new_v4()),
            Err(GameError::SessionNotFound)
        );
    }

    #[test]
    fn test_prune_idle_sessions() {
        let registry = registry();
        registry.create();
        registry.create();
        assert_eq!(registry.prune_idle(Duration::from_secs(3600)), 0);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.prune_idle(Duration::ZERO), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_session() {
        let registry = registry();
        let (id, _) = registry.create();
        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
    }
}
