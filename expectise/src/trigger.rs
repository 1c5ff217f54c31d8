// vim: tw=80
//! When markers are active, and for how long they live.

use std::env;

/// Condition deciding whether a marker intercepts calls.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Trigger {
    /// Always active.  Used by temporary markers.
    Always,
    /// Active only while the environment variable `key` equals `value`.  An
    /// unset variable reads as the empty string.
    Env {
        key: String,
        value: String,
    },
}

impl Trigger {
    pub fn env(key: impl Into<String>, value: impl Into<String>) -> Self {
        Trigger::Env { key: key.into(), value: value.into() }
    }

    /// Evaluate the trigger against the current process environment.
    pub fn is_met(&self) -> bool {
        match self {
            Trigger::Always => true,
            Trigger::Env { key, value } => {
                env::var(key).unwrap_or_default() == *value
            },
        }
    }
}

/// Lifespan of a marker.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Lifespan {
    /// Survives teardown.  Only its mock is reset.
    Permanent,
    /// Disabled and removed from the session at teardown.
    Temporary,
}
