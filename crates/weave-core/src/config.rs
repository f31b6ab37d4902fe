//! Run configuration (spec §3 "Config").

/// Settings for one exploration run (many iterations of the same program
/// under different schedules).
#[derive(Debug, Clone)]
pub struct Config {
    pub strategy_id: String,
    pub seed: u64,
    pub fair_step_bound: u64,
    pub unfair_step_bound: u64,
    pub max_iterations: u64,
    pub check_collection_races: bool,
    pub check_atomic_races: bool,
    pub liveness_temperature_threshold: u32,
    /// Whether to collect per-iteration decision frequencies for the
    /// coverage report (spec §6), or keep only the final merged graph.
    pub record_decision_frequencies: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            strategy_id: "random".to_string(),
            seed: 0,
            fair_step_bound: 10_000,
            unfair_step_bound: 100_000,
            max_iterations: 1_000,
            check_collection_races: true,
            check_atomic_races: true,
            liveness_temperature_threshold: 150,
            record_decision_frequencies: true,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder { config: Config::default() }
    }
}

/// Fluent builder over `Config`, matching the teacher's preference for
/// explicit setter chains over a derive-macro builder crate.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn strategy(mut self, strategy_id: impl Into<String>) -> Self {
        self.config.strategy_id = strategy_id.into();
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn fair_step_bound(mut self, bound: u64) -> Self {
        self.config.fair_step_bound = bound;
        self
    }

    pub fn unfair_step_bound(mut self, bound: u64) -> Self {
        self.config.unfair_step_bound = bound;
        self
    }

    pub fn max_iterations(mut self, max: u64) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn check_collection_races(mut self, check: bool) -> Self {
        self.config.check_collection_races = check;
        self
    }

    pub fn check_atomic_races(mut self, check: bool) -> Self {
        self.config.check_atomic_races = check;
        self
    }

    pub fn liveness_temperature_threshold(mut self, threshold: u32) -> Self {
        self.config.liveness_temperature_threshold = threshold;
        self
    }

    pub fn record_decision_frequencies(mut self, record: bool) -> Self {
        self.config.record_decision_frequencies = record;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_random_with_sane_bounds() {
        let config = Config::default();
        assert_eq!(config.strategy_id, "random");
        assert!(config.fair_step_bound < config.unfair_step_bound);
    }

    #[test]
    fn builder_overrides_apply() {
        let config = Config::builder().strategy("exhaustive").seed(7).max_iterations(50).build();
        assert_eq!(config.strategy_id, "exhaustive");
        assert_eq!(config.seed, 7);
        assert_eq!(config.max_iterations, 50);
    }
}
