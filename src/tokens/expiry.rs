//! Remaining-lifetime computation for stored tokens

use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::models::parse_timestamp;

/// Why a record's expiry cannot be computed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpiryError {
    #[error("Invalid date")]
    InvalidDate,
    #[error("Invalid expiry time")]
    InvalidDuration,
}

/// Lifetime of a token relative to a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expiry {
    Remaining { minutes: i64, seconds: i64 },
    Expired,
    Invalid(ExpiryError),
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiry::Remaining { minutes, seconds } => {
                write!(f, "{}m {}s remaining", minutes, seconds)
            }
            Expiry::Expired => f.write_str("Expired"),
            Expiry::Invalid(e) => write!(f, "{}", e),
        }
    }
}

/// Compute how long a token created at `created_at` and valid for
/// `expires_in` seconds has left at `now`.
///
/// A token whose expiry instant equals `now` is already expired.
pub fn remaining(created_at: &str, expires_in: i64, now: DateTime<Utc>) -> Expiry {
    let Some(created) = parse_timestamp(created_at) else {
        return Expiry::Invalid(ExpiryError::InvalidDate);
    };
    let Some(expires_at) = Duration::try_seconds(expires_in)
        .and_then(|validity| created.checked_add_signed(validity))
    else {
        return Expiry::Invalid(ExpiryError::InvalidDuration);
    };

    if expires_at <= now {
        return Expiry::Expired;
    }

    let seconds_left = (expires_at - now).num_milliseconds() / 1000;
    Expiry::Remaining {
        minutes: seconds_left / 60,
        seconds: seconds_left % 60,
    }
}
