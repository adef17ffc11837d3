//! # Command Core Constants
//!
//! Priority bands, defaults and environment variable names shared across the
//! lifecycle engine, the event bridge and the client façade.

/// Hook and listener priority bands.
///
/// Higher priorities run first. Registrations sharing a priority run in the
/// order they were added. `LATE` and below are the band used by engine-internal
/// listeners (the event bridge, batch capture hooks, request serializers), so
/// user-level hooks registered at `NORMAL` or `EARLY` are always observed first.
pub mod priority {
    /// Runs before everything else in the phase
    pub const FIRST: i32 = 1_000_000;
    /// Runs ahead of ordinary hooks
    pub const EARLY: i32 = 10_000;
    /// Default priority for user hooks
    pub const NORMAL: i32 = 0;
    /// Reserved band for engine-internal hooks
    pub const LATE: i32 = -10_000;
    /// Runs after everything else in the phase
    pub const LAST: i32 = -1_000_000;
}

/// Default configuration values
pub mod defaults {
    /// Maximum number of commands in flight during batch execution
    pub const POOL_SIZE: usize = 25;
    /// Capacity of the lifecycle event broadcast channel
    pub const EVENT_CHANNEL_CAPACITY: usize = 1000;
    /// Client name used when none is configured
    pub const CLIENT_NAME: &str = "service-client";
}

/// Environment variables read by configuration and logging
pub mod env {
    /// Prefix for configuration overrides (`COMMAND_CORE_POOL_SIZE`, ...)
    pub const CONFIG_PREFIX: &str = "COMMAND_CORE";
    /// Deployment environment (`development`, `test`, `production`)
    pub const ENVIRONMENT: &str = "COMMAND_CORE_ENV";
    /// Explicit `EnvFilter` directive overriding the environment default
    pub const LOG_FILTER: &str = "COMMAND_CORE_LOG";
    /// `json` switches the console layer to JSON lines
    pub const LOG_FORMAT: &str = "COMMAND_CORE_LOG_FORMAT";
}

/// Context keys written by bundled subscribers
pub mod context_keys {
    /// Microsecond timestamp recorded by the debug subscriber when a command starts
    pub const DEBUG_STARTED_AT: &str = "debug_started_at_us";
    /// Microsecond timestamp recorded by the debug subscriber when a phase starts
    pub const DEBUG_PHASE_STARTED_AT: &str = "debug_phase_started_at_us";
}
