use chrono::{DateTime, Local};

/// Our side of one peer conversation.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    /// The peer is choking us; no requests go out while true.
    pub choked: bool,
    /// We told the peer we are interested.
    pub interested: bool,
    /// Last successful send or receive; drives keep-alives.
    pub last_activity: DateTime<Local>,
    pub consecutive_failures: u32,
}

impl SessionStatus {
    pub fn new() -> Self {
        Self {
            choked: true,
            interested: false,
            last_activity: Local::now(),
            consecutive_failures: 0,
        }
    }

    /// Marks activity on the connection now.
    pub fn touch(&mut self) {
        self.last_activity = Local::now();
    }

    /// Seconds since the last successful send or receive.
    pub fn idle_seconds(&self) -> i64 {
        Local::now()
            .signed_duration_since(self.last_activity)
            .num_seconds()
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::new()
    }
}
