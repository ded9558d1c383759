//! Process roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The role a benchnet process plays in an experiment.
///
/// Roles determine which messages a process handles and what capability
/// profile it advertises during the discovery handshake:
///
/// - agents advertise their probers (active traffic/stimulus tools)
/// - monitors advertise their listeners (passive metric collectors)
/// - managers advertise the agents and monitors they have established
/// - players advertise the managers they have established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Manager,
    Agent,
    Monitor,
}

impl Role {
    /// Human-readable name, matching the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Player => "player",
            Role::Manager => "manager",
            Role::Agent => "agent",
            Role::Monitor => "monitor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "player" => Ok(Role::Player),
            "manager" => Ok(Role::Manager),
            "agent" => Ok(Role::Agent),
            "monitor" => Ok(Role::Monitor),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::Player, Role::Manager, Role::Agent, Role::Monitor] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("referee".parse::<Role>().is_err());
    }
}
