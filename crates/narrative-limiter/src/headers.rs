//! Rate-limit response headers.
//!
//! Platforms spell these several ways; the first recognised spelling of each
//! field wins. Values that fail to parse are ignored.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const LIMIT_NAMES: [&str; 3] = ["x-ratelimit-limit", "x-rate-limit-limit", "ratelimit-limit"];
const REMAINING_NAMES: [&str; 3] = [
    "x-ratelimit-remaining",
    "x-rate-limit-remaining",
    "ratelimit-remaining",
];
const RESET_NAMES: [&str; 3] = ["x-ratelimit-reset", "x-rate-limit-reset", "ratelimit-reset"];

/// Reset values at or above this are Unix timestamps; smaller ones are deltas.
const EPOCH_THRESHOLD: u64 = 1_000_000_000;

/// Rate-limit information a server attached to a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitHeaders {
    /// Requests the server allows per window.
    pub limit: Option<u32>,
    /// Requests left in the server's current window.
    pub remaining: Option<u32>,
    /// Window reset, as a Unix timestamp or seconds from now.
    pub reset: Option<u64>,
}

impl RateLimitHeaders {
    /// Extract rate-limit fields from `(name, value)` header pairs.
    ///
    /// Names are matched case-insensitively.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut headers = Self::default();
        let mut ranks = [usize::MAX; 3];

        for (name, value) in pairs {
            let name = name.as_ref().to_ascii_lowercase();
            let value = value.as_ref().trim();
            let [limit_rank, remaining_rank, reset_rank] = &mut ranks;
            take(&mut headers.limit, limit_rank, &LIMIT_NAMES, &name, value);
            take(&mut headers.remaining, remaining_rank, &REMAINING_NAMES, &name, value);
            take(&mut headers.reset, reset_rank, &RESET_NAMES, &name, value);
        }
        headers
    }

    /// Whether no rate-limit field was present.
    pub const fn is_empty(&self) -> bool {
        self.limit.is_none() && self.remaining.is_none() && self.reset.is_none()
    }

    /// Time until the server's window resets, measured from `now_epoch_secs`.
    ///
    /// `None` when no reset was given or the reset is already in the past.
    pub fn reset_after(&self, now_epoch_secs: i64) -> Option<Duration> {
        let reset = self.reset?;
        let secs = if reset >= EPOCH_THRESHOLD {
            let now = u64::try_from(now_epoch_secs).unwrap_or(0);
            reset.checked_sub(now)?
        } else {
            reset
        };
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

/// Store `value` in `slot` if `name` is a better-ranked spelling than the
/// one already stored.
fn take<T: core::str::FromStr>(
    slot: &mut Option<T>,
    best_rank: &mut usize,
    names: &[&str],
    name: &str,
    value: &str,
) {
    let Some(rank) = names.iter().position(|candidate| *candidate == name) else {
        return;
    };
    if rank >= *best_rank {
        return;
    }
    if let Ok(parsed) = value.parse() {
        *slot = Some(parsed);
        *best_rank = rank;
    }
}
