//! Run configuration (§6 "Configuration"). Every option has the default the
//! spec names; construct via [`EngineConfig::default`] and override with the
//! fluent `with_*` methods.

use std::time::Duration;

/// Options recognized by [`crate::engine::Engine::run`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard cap on step dispatches; 0 disables.
    pub max_steps: u64,
    /// Worker count; 0 selects sequential mode.
    pub parallelism: usize,
    /// Frontier admission capacity.
    pub queue_depth: usize,
    /// Max block time on a single `enqueue`.
    pub backpressure_timeout: Duration,
    /// Applied to a node invocation lacking its own policy timeout.
    pub default_node_timeout: Duration,
    /// Run-level deadline; zero disables.
    pub run_wall_clock_budget: Duration,
    /// Selects the replay harness instead of live execution.
    pub replay_mode: bool,
    /// Compare request hashes during replay; only meaningful with
    /// `replay_mode` set.
    pub strict_replay: bool,
    /// Commit an interleaved checkpoint after every N dispatches (sequential)
    /// or collector deliveries (concurrent); 0 disables interleaved commits.
    /// A run always commits one final checkpoint regardless of this setting.
    pub checkpoint_interval_steps: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 0,
            parallelism: 8,
            queue_depth: 1024,
            backpressure_timeout: Duration::from_secs(30),
            default_node_timeout: Duration::from_secs(30),
            run_wall_clock_budget: Duration::from_secs(10 * 60),
            replay_mode: false,
            strict_replay: true,
            checkpoint_interval_steps: 1,
        }
    }
}

impl EngineConfig {
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    pub fn with_backpressure_timeout(mut self, timeout: Duration) -> Self {
        self.backpressure_timeout = timeout;
        self
    }

    pub fn with_default_node_timeout(mut self, timeout: Duration) -> Self {
        self.default_node_timeout = timeout;
        self
    }

    pub fn with_run_wall_clock_budget(mut self, budget: Duration) -> Self {
        self.run_wall_clock_budget = budget;
        self
    }

    pub fn with_replay_mode(mut self, replay_mode: bool) -> Self {
        self.replay_mode = replay_mode;
        self
    }

    pub fn with_strict_replay(mut self, strict_replay: bool) -> Self {
        self.strict_replay = strict_replay;
        self
    }

    pub fn with_checkpoint_interval_steps(mut self, interval: u64) -> Self {
        self.checkpoint_interval_steps = interval;
        self
    }

    /// `true` when this config selects the sequential path (§4.5).
    pub fn is_sequential(&self) -> bool {
        self.parallelism == 0
    }
}
