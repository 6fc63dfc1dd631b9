//! Lifecycle phases of a tester instance.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle phase.
///
/// Phases are strictly ordered; an instance moves forward one phase at a
/// time and never revisits a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LifecyclePhase {
    /// Constructed, not yet configured.
    Created = 0,
    /// Configure hook running or finished.
    Configuring = 1,
    /// Init hook running or finished.
    Initializing = 2,
    /// Start hook running.
    Starting = 3,
    /// Started; messages may be dispatched.
    Running = 4,
    /// Stop hook running or finished.
    Stopping = 5,
    /// Deinit hook running.
    Deinitializing = 6,
    /// Terminal. End-of-life has been signalled.
    EndOfLife = 7,
}

impl LifecyclePhase {
    /// All phases in lifecycle order.
    pub const ALL: [LifecyclePhase; 8] = [
        LifecyclePhase::Created,
        LifecyclePhase::Configuring,
        LifecyclePhase::Initializing,
        LifecyclePhase::Starting,
        LifecyclePhase::Running,
        LifecyclePhase::Stopping,
        LifecyclePhase::Deinitializing,
        LifecyclePhase::EndOfLife,
    ];

    /// The phase that follows this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::Configuring),
            Self::Configuring => Some(Self::Initializing),
            Self::Initializing => Some(Self::Starting),
            Self::Starting => Some(Self::Running),
            Self::Running => Some(Self::Stopping),
            Self::Stopping => Some(Self::Deinitializing),
            Self::Deinitializing => Some(Self::EndOfLife),
            Self::EndOfLife => None,
        }
    }

    /// The phase an instance must be in before this phase can be entered.
    pub fn predecessor(self) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|phase| phase.next() == Some(self))
    }

    /// Whether entering this phase runs a user hook and reports "done".
    pub fn has_hook(self) -> bool {
        matches!(
            self,
            Self::Configuring
                | Self::Initializing
                | Self::Starting
                | Self::Stopping
                | Self::Deinitializing
        )
    }

    pub fn is_terminal(self) -> bool {
        self == Self::EndOfLife
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Configuring => "configuring",
            Self::Initializing => "initializing",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Deinitializing => "deinitializing",
            Self::EndOfLife => "end_of_life",
        }
    }
}

impl From<u8> for LifecyclePhase {
    fn from(v: u8) -> Self {
        match v {
            0 => LifecyclePhase::Created,
            1 => LifecyclePhase::Configuring,
            2 => LifecyclePhase::Initializing,
            3 => LifecyclePhase::Starting,
            4 => LifecyclePhase::Running,
            5 => LifecyclePhase::Stopping,
            6 => LifecyclePhase::Deinitializing,
            7 => LifecyclePhase::EndOfLife,
            _ => LifecyclePhase::Created,
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
