//! Session credentials
//!
//! One `Credentials` value lives for the whole session. The refreshing
//! dispatcher rewrites its fields in place after every successful refresh, so
//! holders of the shared handle always see the current token.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// OAuth credentials of a wallet session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Token sent with every authenticated request
    pub access_token: String,

    /// Token exchanged for a new access token when the current one expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Key used by MAC-signed requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_key: Option<String>,

    /// Absolute expiry of `access_token`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,

    /// Lifetime of `access_token` in seconds, as issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

impl Credentials {
    /// Credentials holding only an access token
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            mac_key: None,
            valid_until: None,
            expires_in: None,
        }
    }

    /// Credentials as issued by the token endpoint at `issued_at`
    ///
    /// `valid_until` is derived from `expires_in` when the lifetime is
    /// positive.
    #[must_use]
    pub fn issued(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        mac_key: Option<String>,
        expires_in: Option<i64>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let valid_until = expires_in
            .filter(|seconds| *seconds > 0)
            .map(|seconds| issued_at + TimeDelta::seconds(seconds));

        Self { access_token: access_token.into(), refresh_token, mac_key, valid_until, expires_in }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    #[must_use]
    pub fn with_mac_key(mut self, mac_key: impl Into<String>) -> Self {
        self.mac_key = Some(mac_key.into());
        self
    }

    /// Whether these credentials were issued within `window` of `now`
    ///
    /// The issue time is inferred from the remaining lifetime: right after a
    /// refresh `valid_until - now` is still close to `expires_in`. Returns
    /// `false` when either field is missing.
    #[must_use]
    pub fn has_recently_refreshed(&self, window: Duration, now: DateTime<Utc>) -> bool {
        let (Some(valid_until), Some(expires_in)) = (self.valid_until, self.expires_in) else {
            return false;
        };

        let remaining_ms = (valid_until - now).num_milliseconds();
        let issued_ago_ms = expires_in.saturating_mul(1000).saturating_sub(remaining_ms);
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);

        issued_ago_ms.saturating_abs() < window_ms
    }

    /// Copy a refreshed credential set into this one
    ///
    /// `expires_in` is kept when the refreshed set does not carry a lifetime.
    pub fn update_from(&mut self, refreshed: &Self) {
        self.access_token.clone_from(&refreshed.access_token);
        self.mac_key.clone_from(&refreshed.mac_key);
        self.refresh_token.clone_from(&refreshed.refresh_token);
        self.valid_until = refreshed.valid_until;
        if refreshed.expires_in.is_some() {
            self.expires_in = refreshed.expires_in;
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("mac_key", &self.mac_key.as_ref().map(|_| "<redacted>"))
            .field("valid_until", &self.valid_until)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}
