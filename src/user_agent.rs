use std::path::Path;

use rand::seq::IndexedRandom;

use crate::{Error, Result};

/// User-Agent strings loaded once at startup, one per line.
#[derive(Debug, Clone)]
pub struct UserAgents {
    agents: Vec<String>,
}

impl UserAgents {
    /// Loads the list from a file. A missing, unreadable or empty file is an error, since the
    /// run can't do anything useful without agents to rotate through.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| Error::UserAgentFile {
                path: path.to_path_buf(),
                source,
            })?;
        let agents = Self::from_lines(&raw);
        if agents.is_empty() {
            return Err(Error::NoUserAgents);
        }
        Ok(agents)
    }

    /// Trims every line and drops the blank ones.
    pub fn from_lines(raw: &str) -> Self {
        let agents = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        Self { agents }
    }

    /// Returns a uniformly random agent.
    pub fn pick(&self) -> Result<&str> {
        self.agents
            .choose(&mut rand::rng())
            .map(String::as_str)
            .ok_or(Error::NoUserAgents)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
