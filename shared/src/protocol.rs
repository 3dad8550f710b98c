/// Status endpoint polled by the dashboard UI
pub const STATUS_PATH: &str = "/api/status";

/// Candidate keys as they appear in the `results` object
pub const CANDIDATE_TAILSCALE: &str = "tailscale";
pub const CANDIDATE_LAN: &str = "lan";
pub const CANDIDATE_LOCALHOST: &str = "localhost";

/// Loopback address, always probed
pub const LOOPBACK_ADDR: &str = "127.0.0.1";

/// Environment variable selecting the listening port
pub const PORT_ENV: &str = "PORT";

/// Listening port used when neither the environment nor the config sets one
pub const DEFAULT_PORT: u16 = 3499;

/// Port value in the service catalog meaning "the dashboard's own port"
pub const SELF_PORT_SENTINEL: &str = "self";

/// Per-probe connect deadline
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 500;
