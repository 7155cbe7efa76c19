//! "Stranger among us" party game
//!
//! Players pass one phone around. Everyone but the stranger sees the same
//! secret topic; the group then discusses and tries to find the stranger.

mod registry;
mod topics;

pub use registry::{GameRegistry, SessionId};
pub use topics::{default_topics, load_topics, PoolStats, Topic, TopicPool};

use crate::app_config::GameConfig;
use derive_more::Display;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    Setup,
    Reveal,
    Discuss,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum GameError {
    #[display(fmt = "Player count must be between {} and {}", min, max)]
    InvalidPlayerCount { min: u32, max: u32 },
    #[display(fmt = "Action not allowed while the game is in {:?}", _0)]
    InvalidTransition(GameState),
    #[display(fmt = "No topics are available")]
    NoTopics,
    #[display(fmt = "Game session not found")]
    SessionNotFound,
}

impl std::error::Error for GameError {}

/// The answer revealed at the end of a round.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FinalResults {
    pub stranger: Option<u32>,
    pub topic: Option<Topic>,
}

#[derive(Clone, Debug)]
pub struct StrangerGame {
    limits: GameConfig,
    state: GameState,
    num_players: u32,
    current_player: u32,
    role_visible: bool,
    stranger: Option<u32>,
    topic: Option<Topic>,
    final_results: FinalResults,
    pool: TopicPool,
}

impl StrangerGame {
    pub fn new(topics: Arc<Vec<Topic>>, limits: GameConfig) -> Self {
        Self {
            num_players: limits.default_players,
            limits,
            state: GameState::Setup,
            current_player: 1,
            role_visible: false,
            stranger: None,
            topic: None,
            final_results: FinalResults::default(),
            pool: TopicPool::new(topics),
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn num_players(&self) -> u32 {
        self.num_players
    }

    pub fn current_player(&self) -> u32 {
        self.current_player
    }

    pub fn is_role_visible(&self) -> bool {
        self.role_visible
    }

    pub fn stranger(&self) -> Option<u32> {
        self.stranger
    }

    pub fn topic(&self) -> Option<&Topic> {
        self.topic.as_ref()
    }

    pub fn final_results(&self) -> &FinalResults {
        &self.final_results
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn is_current_player_stranger(&self) -> bool {
        self.stranger == Some(self.current_player)
    }

    fn require(&self, allowed: &[GameState]) -> Result<(), GameError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(GameError::InvalidTransition(self.state))
        }
    }

    pub fn set_players(&mut self, n: u32) -> Result<(), GameError> {
        self.require(&[GameState::Setup])?;
        if n < self.limits.min_players || n > self.limits.max_players {
            return Err(GameError::InvalidPlayerCount {
                min: self.limits.min_players,
                max: self.limits.max_players,
            });
        }
        self.num_players = n;
        Ok(())
    }

    /// Deals a new round. From `Setup` the topic deck starts fresh; from
    /// `End` ("same players, new topic") it keeps going.
    pub fn start(&mut self) -> Result<(), GameError> {
        self.require(&[GameState::Setup, GameState::End])?;
        if self.state == GameState::Setup {
            self.pool.reset();
        }

        let topic = self.pool.next_topic().ok_or(GameError::NoTopics)?;
        let stranger = rand::thread_rng().gen_range(1..=self.num_players);

        self.stranger = Some(stranger);
        self.topic = Some(topic);
        self.state = GameState::Reveal;
        self.current_player = 1;
        self.role_visible = false;
        Ok(())
    }

    pub fn reveal_role(&mut self) -> Result<(), GameError> {
        self.require(&[GameState::Reveal])?;
        self.role_visible = true;
        Ok(())
    }

    /// Hands the phone on. After the last player the secret is moved into
    /// the final results and cleared before discussion starts.
    pub fn next_player(&mut self) -> Result<(), GameError> {
        self.require(&[GameState::Reveal])?;
        self.role_visible = false;

        if self.current_player < self.num_players {
            self.current_player += 1;
        } else {
            self.final_results = FinalResults {
                stranger: self.stranger.take(),
                topic: self.topic.take(),
            };
            self.state = GameState::Discuss;
        }
        Ok(())
    }

    pub fn start_discussion(&mut self) -> Result<(), GameError> {
        self.require(&[GameState::Reveal, GameState::Discuss])?;
        self.role_visible = false;
        if self.stranger.is_some() || self.topic.is_some() {
            self.final_results = FinalResults {
                stranger: self.stranger.take(),
                topic: self.topic.take(),
            };
        }
        self.state = GameState::Discuss;
        Ok(())
    }

    pub fn end(&mut self) -> Result<(), GameError> {
        self.require(&[GameState::Discuss])?;
        self.state = GameState::End;
        Ok(())
    }

    /// Back to a fresh `Setup` with default settings.
    pub fn reset(&mut self) {
        self.state = GameState::Setup;
        self.num_players = self.limits.default_players;
        self.current_player = 1;
        self.role_visible = false;
        self.stranger = None;
        self.topic = None;
        self.final_results = FinalResults::default();
        self.pool.reset();
    }

    /// What the current holder of the phone may see.
    pub fn view(&self) -> GameView {
        let role = if self.state == GameState::Reveal && self.role_visible {
            if self.is_current_player_stranger() {
                Some(RoleView::Stranger)
            } else {
                self.topic.clone().map(|topic| RoleView::Insider { topic })
            }
        } else {
            None
        };

        GameView {
            state: self.state,
            num_players: self.num_players,
            current_player: self.current_player,
            role_visible: self.role_visible,
            role,
            final_results: (self.state == GameState::End).then(|| self.final_results.clone()),
            stats: self.pool.stats(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleView {
    Stranger,
    Insider { topic: Topic },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GameView {
    pub state: GameState,
    pub num_players: u32,
    pub current_player: u32,
    pub role_visible: bool,
    pub role: Option<RoleView>,
    pub final_results: Option<FinalResults>,
    pub stats: PoolStats,
}
