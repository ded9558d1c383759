//! Wires one configured node together: role handler, event loop, message
//! server and delivery loop.

use crate::agent::Agent;
use crate::config::{ConfigError, NodeConfig};
use crate::executor::{ExecutorError, ToolManifest};
use crate::manager::Manager;
use crate::monitor::Monitor;
use crate::player::Player;
use benchnet_core::{Event, EventHandler, EventLoop};
use benchnet_network::{serve, DeliveryLoop, ServerError};
use benchnet_types::{Contact, Identity, Role};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Pause before the startup greeting, giving the contacts' servers a
/// moment to come up when a whole topology starts at once.
pub const STARTUP_GREETING_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Build the role handler the configuration asks for.
pub fn build_handler(config: &NodeConfig) -> Result<Box<dyn EventHandler>, NodeError> {
    let identity = Identity::local(
        config.node.url.clone(),
        config.node.uuid.clone(),
        config.node.role,
    );
    let manifest = match &config.tools.manifest {
        Some(path) => ToolManifest::load(path)?,
        None => ToolManifest::default(),
    };
    let handler: Box<dyn EventHandler> = match config.node.role {
        Role::Agent => Box::new(Agent::new(identity, manifest.probers)),
        Role::Monitor => Box::new(Monitor::new(identity, manifest.listeners)),
        Role::Manager => Box::new(Manager::new(identity)),
        Role::Player => {
            let catalog = config
                .descriptors
                .iter()
                .map(|entry| (entry.id.clone(), entry.path.clone()))
                .collect();
            Box::new(Player::new(identity, catalog))
        }
    };
    Ok(handler)
}

/// Run the node until its event loop stops or the server fails.
pub async fn run(config: NodeConfig) -> Result<(), NodeError> {
    let addr = config.listen_addr()?;
    let handler = build_handler(&config)?;
    let (event_loop, events, outbound) = EventLoop::new(handler);

    let contacts: Vec<Contact> = config
        .node
        .contacts
        .iter()
        .map(|address| Contact::from(address.as_str()))
        .collect();
    if !contacts.is_empty() {
        let greeter = events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(STARTUP_GREETING_DELAY).await;
            greeter.raise(Event::Greetings {
                contacts,
                hello: None,
            });
        });
    }

    info!(
        role = %config.node.role,
        uuid = %config.node.uuid,
        %addr,
        "node starting"
    );
    let delivery = tokio::spawn(DeliveryLoop::new(outbound).run());
    let mut server = tokio::spawn(serve(addr, events));

    let result = tokio::select! {
        _ = event_loop.run() => Ok(()),
        joined = &mut server => match joined {
            Ok(Err(err)) => Err(NodeError::Server(err)),
            _ => Ok(()),
        },
    };
    server.abort();
    delivery.abort();
    result
}
