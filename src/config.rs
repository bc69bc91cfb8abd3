use serde::Serialize;

/// Capacity handling for the non-adaptive strategies (hashing, fixed
/// partition, grid).
///
/// The focus strategy always enforces capacity at assignment time; the other
/// strategies historically did not, so overflow shows up only in the
/// feasibility check. `Enforced` reroutes over-capacity preferences through
/// the least-loaded fallback instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CapacityPolicy {
    /// Assign to the preferred server unconditionally (reference behavior)
    Unchecked,
    /// Reject full servers and fall back to the least-loaded one
    Enforced,
}

/// Simulation configuration
///
/// Built once per run and passed by reference into every component; nothing
/// reads configuration from global state.
#[derive(Debug, Clone, Serialize)]
pub struct SimConfig {
    /// Number of players in the snapshot
    pub player_count: usize,
    /// Number of servers to shard across
    pub server_count: usize,
    /// Map width in world units
    pub map_size_x: f32,
    /// Map height in world units
    pub map_size_y: f32,
    /// Maximum players a server hosts before it counts as full
    pub server_capacity: u32,
    /// How many nearby players each player observes (the neighbor count k)
    pub viewable_players: usize,
    /// Relative weight of forwarding cost vs hosting cost, in (0, 1]
    pub forward_weight: f32,
    /// Primary trial budget for the focus search
    pub number_of_tries: u32,
    /// Fixed random seed; `None` draws one from entropy
    pub seed: Option<u64>,
    /// Capacity handling for the non-adaptive strategies
    pub capacity_policy: CapacityPolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            player_count: 1000,
            server_count: 4,
            map_size_x: 1920.0,
            map_size_y: 1080.0,
            server_capacity: 300,
            viewable_players: 10,
            forward_weight: 0.5,
            number_of_tries: 15,
            seed: None,
            capacity_policy: CapacityPolicy::Unchecked,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("player_count must be at least 1")]
    NoPlayers,
    #[error("server_count must be at least 1")]
    NoServers,
    #[error("server_capacity must be at least 1")]
    ZeroCapacity,
    #[error("map size must be positive in both dimensions")]
    EmptyMap,
    #[error("viewable_players must be at least 1")]
    NoViewablePlayers,
    #[error("forward_weight must be in (0, 1], got {0}")]
    InvalidForwardWeight(f32),
    #[error("number_of_tries must be at least 1")]
    ZeroTries,
}

impl SimConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        read_env_usize("PLAYER_COUNT", &mut config.player_count);
        read_env_usize("SERVER_COUNT", &mut config.server_count);
        read_env_f32("MAP_SIZE_X", &mut config.map_size_x);
        read_env_f32("MAP_SIZE_Y", &mut config.map_size_y);
        read_env_u32("SERVER_CAPACITY", &mut config.server_capacity);
        read_env_usize("VIEWABLE_PLAYERS", &mut config.viewable_players);
        read_env_f32("FORWARD_WEIGHT", &mut config.forward_weight);
        read_env_u32("NUMBER_OF_TRIES", &mut config.number_of_tries);

        if let Ok(seed) = std::env::var("SEED") {
            if let Ok(parsed) = seed.parse::<u64>() {
                config.seed = Some(parsed);
            } else {
                tracing::warn!("Invalid SEED '{}', running unseeded", seed);
            }
        }

        if let Ok(enforce) = std::env::var("ENFORCE_CAPACITY") {
            match enforce.as_str() {
                "1" | "true" => config.capacity_policy = CapacityPolicy::Enforced,
                "0" | "false" => config.capacity_policy = CapacityPolicy::Unchecked,
                other => tracing::warn!("Invalid ENFORCE_CAPACITY '{}', using default", other),
            }
        }

        config
    }

    /// Validate configuration after loading
    ///
    /// Rejects anything that would make downstream arithmetic undefined
    /// (e.g. division by zero in the load-cost model).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.player_count == 0 {
            return Err(ConfigError::NoPlayers);
        }
        if self.server_count == 0 {
            return Err(ConfigError::NoServers);
        }
        if self.server_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.map_size_x <= 0.0 || self.map_size_y <= 0.0 {
            return Err(ConfigError::EmptyMap);
        }
        if self.viewable_players == 0 {
            return Err(ConfigError::NoViewablePlayers);
        }
        if self.forward_weight <= 0.0 || self.forward_weight > 1.0 {
            return Err(ConfigError::InvalidForwardWeight(self.forward_weight));
        }
        if self.number_of_tries == 0 {
            return Err(ConfigError::ZeroTries);
        }
        Ok(())
    }
}

fn read_env_usize(name: &str, target: &mut usize) {
    if let Ok(raw) = std::env::var(name) {
        if let Ok(parsed) = raw.parse::<usize>() {
            if parsed > 0 {
                *target = parsed;
            } else {
                tracing::warn!("{} must be > 0, using default", name);
            }
        } else {
            tracing::warn!("Invalid {} '{}', using default", name, raw);
        }
    }
}

fn read_env_u32(name: &str, target: &mut u32) {
    if let Ok(raw) = std::env::var(name) {
        if let Ok(parsed) = raw.parse::<u32>() {
            if parsed > 0 {
                *target = parsed;
            } else {
                tracing::warn!("{} must be > 0, using default", name);
            }
        } else {
            tracing::warn!("Invalid {} '{}', using default", name, raw);
        }
    }
}

fn read_env_f32(name: &str, target: &mut f32) {
    if let Ok(raw) = std::env::var(name) {
        if let Ok(parsed) = raw.parse::<f32>() {
            if parsed > 0.0 {
                *target = parsed;
            } else {
                tracing::warn!("{} must be > 0, using default", name);
            }
        } else {
            tracing::warn!("Invalid {} '{}', using default", name, raw);
        }
    }
}
