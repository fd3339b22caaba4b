//! TTL classes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Selects the default time-to-live of a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheClass {
    Session,
    UserInfo,
    ProjectData,
    PartsData,
    #[default]
    Default,
}

impl CacheClass {
    /// Default TTL of the class.
    pub const fn ttl(self) -> Duration {
        match self {
            CacheClass::Session => Duration::from_secs(3600),
            CacheClass::UserInfo => Duration::from_secs(1800),
            CacheClass::ProjectData => Duration::from_secs(600),
            CacheClass::PartsData => Duration::from_secs(300),
            CacheClass::Default => Duration::from_secs(3600),
        }
    }

    /// Resolves a class by name. Unknown names fall back to `Default`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "session" => CacheClass::Session,
            "user_info" => CacheClass::UserInfo,
            "project_data" => CacheClass::ProjectData,
            "parts_data" => CacheClass::PartsData,
            _ => CacheClass::Default,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            CacheClass::Session => "session",
            CacheClass::UserInfo => "user_info",
            CacheClass::ProjectData => "project_data",
            CacheClass::PartsData => "parts_data",
            CacheClass::Default => "default",
        }
    }
}

/// How long a value written by `set` should live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// An explicit TTL, overriding any class.
    Ttl(Duration),
    /// The default TTL of a class.
    Class(CacheClass),
}

impl Expiry {
    pub fn ttl(self) -> Duration {
        match self {
            Expiry::Ttl(ttl) => ttl,
            Expiry::Class(class) => class.ttl(),
        }
    }
}

impl Default for Expiry {
    fn default() -> Self {
        Expiry::Class(CacheClass::Default)
    }
}

impl From<Duration> for Expiry {
    fn from(ttl: Duration) -> Self {
        Expiry::Ttl(ttl)
    }
}

impl From<CacheClass> for Expiry {
    fn from(class: CacheClass) -> Self {
        Expiry::Class(class)
    }
}
