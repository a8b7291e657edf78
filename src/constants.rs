//! Well-known identities and engine defaults.

/// Owning identity assigned to a job whose own owner cannot be resolved.
///
/// When a command references a resource that no longer exists, the job is
/// parented to this identity so its `Failed` event is still attributable.
///
/// # Examples
///
/// ```
/// use jobsync::SYSTEM_OWNER;
///
/// assert_eq!(SYSTEM_OWNER, "system");
/// ```
pub const SYSTEM_OWNER: &str = "system";

/// Default number of workers in the executor pool.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default capacity of the lifecycle event broadcast channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default configuration file looked up by [`EngineConfig::load`](crate::EngineConfig::load).
pub const DEFAULT_CONFIG_FILE: &str = ".jobsync.toml";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "JOBSYNC_";
