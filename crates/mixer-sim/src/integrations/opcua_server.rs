//! OPC UA mirror of the simulated tank.
//!
//! Address space layout: `Objects/Mixer-Groups/<equipment>/<tag>`, one
//! read-only Double variable per tag and equipment instance, all refreshed
//! from the same snapshot.

use crate::runtime::RuntimeError;
use mixer_core::{ProcessSnapshot, StateExchange, Tag};
use mixer_io::{run_publisher, EquipmentSet};
use opcua::server::address_space::{AccessLevel, UserAccessLevel};
use opcua::server::config::{ServerEndpoint, ANONYMOUS_USER_TOKEN_ID};
use opcua::server::prelude::*;
use std::sync::{atomic::AtomicBool, Arc};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

const NAMESPACE_URI: &str = "OPC UA Simulation Server";
const GROUP_FOLDER: &str = "Mixer-Groups";

#[derive(Clone, Debug)]
pub struct OpcuaConfig {
    pub endpoint: String,
    pub update_interval: Duration,
    pub equipment: EquipmentSet,
    pub pki_dir: String,
    pub create_sample_keypair: bool,
}

impl Default for OpcuaConfig {
    fn default() -> Self {
        Self {
            endpoint: crate::runtime::DEFAULT_OPCUA_ENDPOINT.to_string(),
            update_interval: Duration::from_secs(1),
            equipment: EquipmentSet::default(),
            pki_dir: "./pki-server".to_string(),
            create_sample_keypair: true,
        }
    }
}

/// Starts the server and its update thread. The returned handle finishes
/// after `stop` is raised and the server has been aborted.
pub fn run_opcua(
    exchange: Arc<StateExchange>,
    stop: Arc<AtomicBool>,
    config: OpcuaConfig,
) -> Result<thread::JoinHandle<()>, RuntimeError> {
    let endpoint = parse_endpoint(&config.endpoint)
        .ok_or_else(|| RuntimeError::OpcuaEndpoint(config.endpoint.clone()))?;

    let anon_tokens = vec![ANONYMOUS_USER_TOKEN_ID.to_string()];
    let server_config = ServerBuilder::new()
        .application_name("Mixer Simulation Server")
        .application_uri("urn:mixer-sim:opcua")
        .product_uri("urn:mixer-sim:opcua")
        .create_sample_keypair(config.create_sample_keypair)
        .pki_dir(&config.pki_dir)
        .host_and_port(endpoint.host.clone(), endpoint.port)
        .endpoints(vec![(
            "none",
            ServerEndpoint::new_none(&endpoint.path, &anon_tokens),
        )])
        .discovery_urls(vec![endpoint.path.clone()])
        .config();

    let server = Server::new(server_config);
    let address_space = server.address_space();

    let nodes = {
        let mut space = address_space.write();
        let ns = space
            .register_namespace(NAMESPACE_URI)
            .unwrap_or_else(|_| space.default_namespace());
        let objects = NodeId::objects_folder_id();
        let folder_id = space
            .add_folder(GROUP_FOLDER, GROUP_FOLDER, &objects)
            .unwrap_or_else(|_| NodeId::objects_folder_id());

        let initial = exchange.read_state();
        let mut nodes = Vec::with_capacity(config.equipment.len() * Tag::ALL.len());
        for name in config.equipment.names() {
            let object_id = NodeId::new(ns, name.clone());
            ObjectBuilder::new(&object_id, name.as_str(), name.as_str())
                .organized_by(&folder_id)
                .insert(&mut space);

            let variables = Tag::ALL
                .iter()
                .map(|tag| {
                    let node_id = NodeId::new(ns, format!("{}.{}", name, tag.name()));
                    nodes.push((node_id.clone(), *tag));
                    VariableBuilder::new(&node_id, tag.name(), tag.name())
                        .data_type(DataTypeId::Double)
                        .value(initial.tags.get(*tag))
                        .access_level(AccessLevel::CURRENT_READ)
                        .user_access_level(UserAccessLevel::CURRENT_READ)
                        .build()
                })
                .collect::<Vec<_>>();
            space.add_variables(variables, &object_id);
        }

        info!(
            namespace = ns,
            equipment = config.equipment.len(),
            variables = nodes.len(),
            "OPC UA address space ready"
        );
        nodes
    };

    let server = Arc::new(opcua::sync::RwLock::new(server));
    let server_for_run = Arc::clone(&server);
    let address_for_updates = address_space.clone();

    let update_handle = thread::spawn(move || {
        let mut mirror = |snapshot: &ProcessSnapshot| {
            let now = DateTime::now();
            let mut space = address_for_updates.write();
            for (node_id, tag) in &nodes {
                space.set_variable_value(node_id, snapshot.tags.get(*tag), &now, &now);
            }
        };
        run_publisher(&exchange, &stop, config.update_interval, &mut mirror);

        warn!("OPC UA server stopping");
        server.write().abort();
    });

    thread::spawn(move || {
        Server::run_server(server_for_run);
    });

    Ok(update_handle)
}

#[derive(Debug, PartialEq, Eq)]
struct Endpoint {
    host: String,
    port: u16,
    path: String,
}

fn parse_endpoint(endpoint: &str) -> Option<Endpoint> {
    let without_scheme = endpoint.trim().strip_prefix("opc.tcp://")?;
    let (authority, path) = match without_scheme.find('/') {
        Some(pos) => without_scheme.split_at(pos),
        None => (without_scheme, "/"),
    };
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (host, port.parse::<u16>().ok()?),
        None => (authority, 4840),
    };
    if host.is_empty() {
        return None;
    }
    Some(Endpoint {
        host: host.to_string(),
        port,
        path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_endpoint() {
        assert_eq!(
            parse_endpoint("opc.tcp://0.0.0.0:4840/OPCUA-Server/"),
            Some(Endpoint {
                host: "0.0.0.0".into(),
                port: 4840,
                path: "/OPCUA-Server/".into(),
            })
        );
    }

    #[test]
    fn port_and_path_are_optional() {
        let ep = parse_endpoint("opc.tcp://mixer-host").unwrap();
        assert_eq!((ep.host.as_str(), ep.port, ep.path.as_str()), ("mixer-host", 4840, "/"));
    }

    #[test]
    fn rejects_foreign_schemes_and_bad_ports() {
        assert_eq!(parse_endpoint("http://0.0.0.0:4840/"), None);
        assert_eq!(parse_endpoint("opc.tcp://0.0.0.0:port/"), None);
        assert_eq!(parse_endpoint("opc.tcp://:4840/"), None);
    }
}
