use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_HOLD_SECONDS: u64 = 60;

/// Ownership of a seat's live holds, as seen by one caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldStatus {
    NoHold,
    OwnHold,
    ForeignHold,
}

impl HoldStatus {
    /// Any live key counts as contention. The caller's own key wins over
    /// other callers' keys.
    pub fn resolve<I, S>(live_tokens: I, caller: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen_any = false;
        for token in live_tokens {
            if token.as_ref() == caller {
                return HoldStatus::OwnHold;
            }
            seen_any = true;
        }

        if seen_any {
            HoldStatus::ForeignHold
        } else {
            HoldStatus::NoHold
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldPolicy {
    pub ttl_seconds: u64,
}

impl HoldPolicy {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for HoldPolicy {
    fn default() -> Self {
        Self { ttl_seconds: DEFAULT_HOLD_SECONDS }
    }
}
