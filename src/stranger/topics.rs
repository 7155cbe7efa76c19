use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

static DEFAULT_TOPICS: &str = include_str!("../../data/stranger_topics.json");

/// A secret scene shown to every player except the stranger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic {
    pub image_url: String,
    pub description: String,
}

impl Topic {
    fn trimmed(self) -> Self {
        Self {
            image_url: self.image_url.trim().to_owned(),
            description: self.description.trim().to_owned(),
        }
    }
}

fn parse_topics(json: &str) -> Result<Vec<Topic>, serde_json::Error> {
    let topics: Vec<Topic> = serde_json::from_str(json)?;
    Ok(topics
        .into_iter()
        .map(Topic::trimmed)
        .filter(|t| !t.description.is_empty())
        .collect())
}

pub fn default_topics() -> Vec<Topic> {
    parse_topics(DEFAULT_TOPICS).unwrap_or_else(|e| {
        log::error!("Built-in stranger topics are malformed: {}", e);
        Vec::new()
    })
}

/// Topics from a JSON file, or the built-in list when `path` is empty,
/// unreadable or holds no usable topics.
pub fn load_topics(path: &str) -> Vec<Topic> {
    if path.is_empty() {
        return default_topics();
    }

    let loaded = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|json| parse_topics(&json).map_err(|e| e.to_string()));

    match loaded {
        Ok(topics) if !topics.is_empty() => {
            log::info!("Loaded {} stranger topics from {}", topics.len(), path);
            topics
        }
        Ok(_) => {
            log::warn!("{} has no stranger topics, using built-in list", path);
            default_topics()
        }
        Err(e) => {
            log::warn!("Failed to load stranger topics from {}: {}", path, e);
            default_topics()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub used: usize,
    pub remaining: usize,
}

/// Per-session topic deck. Topics are drawn without replacement until the
/// deck runs out, then it is refilled and reshuffled.
#[derive(Clone, Debug)]
pub struct TopicPool {
    all: Arc<Vec<Topic>>,
    available: Vec<Topic>,
    used: HashSet<String>,
}

impl TopicPool {
    pub fn new(all: Arc<Vec<Topic>>) -> Self {
        let mut pool = Self {
            all,
            available: Vec::new(),
            used: HashSet::new(),
        };
        pool.reset();
        pool
    }

    /// Refills and reshuffles the deck and forgets what was used.
    pub fn reset(&mut self) {
        self.available = self.all.as_ref().clone();
        self.used.clear();
        self.available.shuffle(&mut rand::thread_rng());
    }

    /// Draws the next topic. `None` only when there are no topics at all.
    pub fn next_topic(&mut self) -> Option<Topic> {
        if self.available.is_empty() {
            self.reset();
        }

        let topic = self.available.pop()?;
        self.used.insert(topic.image_url.clone());
        Some(topic)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total: self.all.len(),
            used: self.used.len(),
            remaining: self.available.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics(n: usize) -> Arc<Vec<Topic>> {
        Arc::new(
            (0..n)
                .map(|i| Topic {
                    image_url: format!("https://example.com/{}.png", i),
                    description: format!("scene {}", i),
                })
                .collect(),
        )
    }

    #[test]
    fn test_no_repeats_before_exhaustion() {
        let mut pool = TopicPool::new(topics(8));
        let mut seen = HashSet::new();
        for _ in 0..8 {
            let topic = pool.next_topic().unwrap();
            assert!(seen.insert(topic), "topic drawn twice before pool ran out");
        }
        assert_eq!(
            pool.stats(),
            PoolStats {
                total: 8,
                used: 8,
                remaining: 0
            }
        );
    }

    #[test]
    fn test_exhausted_pool_reshuffles() {
        let mut pool = TopicPool::new(topics(3));
        for _ in 0..3 {
            pool.next_topic().unwrap();
        }

        let next = pool.next_topic();
        assert!(next.is_some());
        let stats = pool.stats();
        assert_eq!(stats.used, 1);
        assert_eq!(stats.remaining, 2);
    }

    #[test]
    fn test_empty_pool_yields_none() {
        let mut pool = TopicPool::new(topics(0));
        assert_eq!(pool.next_topic(), None);
    }

    #[test]
    fn test_reset_restores_full_pool() {
        let mut pool = TopicPool::new(topics(5));
        pool.next_topic();
        pool.next_topic();
        pool.reset();
        assert_eq!(pool.stats().remaining, 5);
        assert_eq!(pool.stats().used, 0);
    }

    #[test]
    fn test_builtin_topics_parse() {
        let builtin = default_topics();
        assert!(builtin.len() >= 10);
        assert!(builtin.iter().all(|t| t.image_url.starts_with("https://")));
    }

    #[test]
    fn test_missing_file_falls_back_to_builtin() {
        assert_eq!(load_topics("/nonexistent/topics.json"), default_topics());
    }

    #[test]
    fn test_load_topics_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"image_url": " https://example.com/a.png ", "description": " Zoo "}}]"#
        )
        .unwrap();

        let loaded = load_topics(file.path().to_str().unwrap());
        assert_eq!(
            loaded,
            vec![Topic {
                image_url: "https://example.com/a.png".to_owned(),
                description: "Zoo".to_owned()
            }]
        );
    }
}
