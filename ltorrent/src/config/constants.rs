/// Request granularity on the peer wire.
pub const BLOCK_SIZE: u32 = 16384;

/// Frames longer than this are treated as a protocol violation.
pub const MAX_MESSAGE_LENGTH: u32 = BLOCK_SIZE * 10;

pub const CONNECT_TIMEOUT_SECS: u64 = 10;
pub const READ_TIMEOUT_SECS: u64 = 30;
pub const MAX_CONNECT_ATTEMPTS: u32 = 3;
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Jitter slept before each connect attempt, in milliseconds.
pub const CONNECT_JITTER_MS: (u64, u64) = (100, 500);
/// Backoff slept between failed connect attempts, in milliseconds.
pub const CONNECT_BACKOFF_MS: (u64, u64) = (500, 1500);
/// Pause after a transient read/write failure in the session loop.
pub const FAILURE_PAUSE_MS: u64 = 500;

/// Idle seconds after which a keep-alive is sent.
pub const KEEPALIVE_INTERVAL_SECS: i64 = 120;

/// Seconds between supervisor progress ticks.
pub const PROGRESS_TICK_SECS: u64 = 5;
/// Seconds without a newly completed piece before re-announcing.
pub const STAGNATION_THRESHOLD_SECS: u64 = 30;

/// Peers asked from the tracker per announce.
pub const NUMWANT: u32 = 200;

/// Range the advertised client port is drawn from.
pub const CLIENT_PORT_RANGE: (u16, u16) = (10000, 60000);

pub const DHT_BOOTSTRAP_NODES: [&str; 3] = [
    "router.bittorrent.com:6881",
    "dht.transmissionbt.com:6881",
    "router.utorrent.com:6881",
];
pub const DHT_TIMEOUT_SECS: u64 = 3;
