//! Hold/keepalive negotiation and the connect-retry backoff counter.

use std::time::Duration;

const CONNECT_RETRY_INITIAL: Duration = Duration::from_secs(60);
const CONNECT_RETRY_MAX: Duration = Duration::from_secs(3600);

/// Doubles on each failed outbound connect, capped at 3600s, and resets to
/// 60s after a successful connect.
#[derive(Debug, Clone, Copy)]
pub struct ConnectRetry {
    current: Duration,
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self { current: CONNECT_RETRY_INITIAL }
    }
}

impl ConnectRetry {
    pub fn delay(&self) -> Duration {
        self.current
    }

    pub fn backoff(&mut self) {
        self.current = (self.current * 2).min(CONNECT_RETRY_MAX);
    }

    pub fn reset(&mut self) {
        self.current = CONNECT_RETRY_INITIAL;
    }
}

/// The hold/keepalive pair negotiated from the two Open messages exchanged
/// on a session. A hold of zero disables both timers.
#[derive(Debug, Clone, Copy)]
pub struct NegotiatedTimers {
    pub hold: Duration,
    pub keepalive: Duration,
}

impl NegotiatedTimers {
    /// `effective hold = min(local_hold, remote_hold)`; keepalive is one
    /// third of that, unless the negotiated hold is zero.
    pub fn negotiate(local_hold: u16, remote_hold: u16) -> Self {
        let hold_secs = local_hold.min(remote_hold);
        if hold_secs == 0 {
            return Self { hold: Duration::ZERO, keepalive: Duration::ZERO };
        }
        let hold = Duration::from_secs(hold_secs as u64);
        Self { hold, keepalive: hold / 3 }
    }

    pub fn disabled(&self) -> bool {
        self.hold.is_zero()
    }
}
