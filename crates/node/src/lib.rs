//! Component roles and the node runtime.
//!
//! One binary, four roles: the player drives experiments, managers turn
//! tasks into instruction fan-outs, agents run probers and monitors run
//! listeners. Every role shares the same [`component::Base`] handshake and
//! the event machinery from `benchnet-core`.

pub mod agent;
pub mod component;
pub mod config;
pub mod executor;
pub mod manager;
pub mod monitor;
pub mod player;
pub mod runtime;

pub use agent::Agent;
pub use component::{Base, InfoOutcome};
pub use config::{ConfigError, NodeConfig};
pub use executor::{Actuator, ExecutorError, ToolEntry, ToolManifest};
pub use manager::Manager;
pub use monitor::Monitor;
pub use player::Player;
pub use runtime::{build_handler, run, NodeError, STARTUP_GREETING_DELAY};
