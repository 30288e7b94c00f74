// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! OPC UA server mirroring tagged register addresses
//!
//! The server publishes one variable node per configured tag under a
//! `"<slave_name> Tags"` folder below the standard Objects folder. Node
//! identifiers are namespace-1 strings equal to the tag name; coils and
//! discrete inputs appear as Booleans, registers as UInt16.
//!
//! Two data paths connect the nodes to the register bank:
//!
//! - A 100 ms polling action snapshots every tagged address **under** the
//!   bank lock and then pushes the values into the address space outside
//!   it, driving subscription change notifications with a consistent
//!   snapshot per tick.
//! - Writable tags (Coil, HoldingRegister) carry a write setter that
//!   copies the incoming value into the bank under the bank lock.
//!   DiscreteInput and InputRegister nodes are read-only, so client
//!   writes to them never reach the bank.
//!
//! The endpoint is anonymous with no security policy — this is a
//! simulator, not a hardened server. The event loop runs on a dedicated
//! thread; `stop()` aborts the server and joins that thread.

use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use opcua::server::prelude::*;
use opcua::sync::{Mutex as OpcMutex, RwLock as OpcRwLock};

use crate::bank::RegisterBank;
use crate::config::{DeviceConfig, OpcUaConfig, TagConfig};

use super::tags::{self, TagValue, TagWriteError};

/// Interval of the periodic bank-to-node publish, in milliseconds.
pub const PUBLISH_INTERVAL_MS: u64 = 100;

impl From<TagValue> for Variant {
    fn from(value: TagValue) -> Self {
        match value {
            TagValue::Bit(bit) => Variant::Boolean(bit),
            TagValue::Word(word) => Variant::UInt16(word),
        }
    }
}

/// The OPC UA front-end. Construct, add tags, `start()`, later `stop()`.
pub struct PlcOpcUaServer {
    config: OpcUaConfig,
    folder_name: String,
    bank: Arc<RegisterBank>,
    tags: Vec<TagConfig>,
    server: Option<Arc<OpcRwLock<Server>>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl PlcOpcUaServer {
    pub fn new(config: &OpcUaConfig, device: &DeviceConfig, bank: Arc<RegisterBank>) -> Self {
        Self {
            config: config.clone(),
            folder_name: format!("{} Tags", device.slave_name),
            bank,
            tags: Vec::new(),
            server: None,
            thread: None,
        }
    }

    /// Register a tag. Must be called before [`start`](Self::start).
    pub fn add_tag(&mut self, tag: TagConfig) {
        info!("[OPC UA] Added tag: {}", tag.name);
        self.tags.push(tag);
    }

    /// Build the address space and launch the event-loop thread.
    ///
    /// ### Errors
    ///
    /// Fails when the configured port cannot be bound or the server
    /// configuration is rejected; the orchestrator treats this as a
    /// bring-up failure and exits with a non-zero code.
    pub fn start(&mut self) -> Result<()> {
        // Probe the endpoint before handing it to the library so that the
        // common bring-up failure (port already taken) is reported
        // synchronously instead of from inside the event-loop thread.
        let probe_addr = format!("{}:{}", self.config.listen, self.config.port);
        std::net::TcpListener::bind(&probe_addr)
            .with_context(|| format!("failed to bind OPC UA endpoint on {probe_addr}"))?;

        let mut server = ServerBuilder::new_anonymous(&self.config.server_name)
            .application_uri(&self.config.application_uri)
            .product_uri(&self.config.application_uri)
            .host_and_port(&self.config.listen, self.config.port)
            .discovery_urls(vec!["/".into()])
            .server()
            .ok_or_else(|| anyhow!("invalid OPC UA server configuration"))?;

        let address_space = server.address_space();
        let nodes = self.populate_address_space(&address_space)?;
        self.register_polling_action(&mut server, &address_space, nodes);

        let server = Arc::new(OpcRwLock::new(server));
        self.server = Some(Arc::clone(&server));

        let endpoint = self.config.endpoint_url();
        let thread = thread::Builder::new()
            .name("opcua-server".to_string())
            .spawn(move || {
                Server::run_server(server);
                info!("[OPC UA] Event loop exited");
            })
            .context("failed to spawn the OPC UA event-loop thread")?;
        self.thread = Some(thread);

        info!("[OPC UA] Server started on {endpoint}");
        Ok(())
    }

    /// Abort the server and join the event-loop thread. Idempotent.
    pub fn stop(&mut self) {
        if let Some(server) = self.server.take() {
            info!("[OPC UA] Stopping server");
            server.write().abort();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("[OPC UA] Event-loop thread panicked");
            }
            info!("[OPC UA] Server stopped");
        }
    }

    /// Create the tag folder and one variable node per tag. Returns the
    /// `(tag, node)` pairs the polling action publishes to.
    fn populate_address_space(
        &self,
        address_space: &Arc<OpcRwLock<AddressSpace>>,
    ) -> Result<Vec<(TagConfig, NodeId)>> {
        let mut address_space = address_space.write();

        let folder_id = address_space
            .add_folder(
                self.folder_name.as_str(),
                self.folder_name.as_str(),
                &NodeId::objects_folder_id(),
            )
            .map_err(|_| anyhow!("failed to create the tag folder"))?;
        info!("[OPC UA] Created folder '{}'", self.folder_name);

        let mut nodes = Vec::with_capacity(self.tags.len());
        for tag in &self.tags {
            // Namespace-1 string identifier equal to the tag name, so
            // clients address tags by name.
            let node_id = NodeId::new(1, tag.name.clone());

            let mut builder = VariableBuilder::new(&node_id, tag.name.as_str(), tag.name.as_str())
                .organized_by(&folder_id);
            builder = if tag.kind.is_bit() {
                builder.data_type(DataTypeId::Boolean).value(false)
            } else {
                builder.data_type(DataTypeId::UInt16).value(0u16)
            };
            if tag.kind.is_client_writable() {
                builder = builder
                    .writable()
                    .value_setter(Arc::new(OpcMutex::new(self.make_write_setter(tag))));
            }
            builder.insert(&mut address_space);

            nodes.push((tag.clone(), node_id));
        }
        Ok(nodes)
    }

    /// Setter invoked by the server when a client writes a tag node; the
    /// value is copied into the bank under the bank lock.
    fn make_write_setter(&self, tag: &TagConfig) -> impl AttributeSetter + Send {
        let bank = Arc::clone(&self.bank);
        let tag = tag.clone();
        AttrFnSetter::new(
            move |_node_id, _attribute_id, _index_range, data_value: DataValue| {
                let Some(variant) = data_value.value else {
                    return Err(StatusCode::BadTypeMismatch);
                };
                let value = match variant {
                    Variant::Boolean(bit) if tag.kind.is_bit() => TagValue::Bit(bit),
                    Variant::UInt16(word) if !tag.kind.is_bit() => TagValue::Word(word),
                    other => {
                        warn!(
                            "[OPC UA] Rejecting write to {}: unsupported value {:?}",
                            tag.name, other
                        );
                        return Err(StatusCode::BadTypeMismatch);
                    }
                };

                let mut table = bank.lock();
                match tags::write_tag(&mut table, &tag, value) {
                    Ok(()) => {
                        debug!("[OPC UA] Client wrote {:?} to tag {}", value, tag.name);
                        Ok(())
                    }
                    Err(TagWriteError::Bank(err)) => {
                        warn!("[OPC UA] Write to {} rejected: {err}", tag.name);
                        Err(StatusCode::BadOutOfRange)
                    }
                    Err(err) => {
                        warn!("[OPC UA] Write to {} rejected: {err}", tag.name);
                        Err(StatusCode::BadNotWritable)
                    }
                }
            },
        )
    }

    /// Publish the tagged registers into the address space every
    /// [`PUBLISH_INTERVAL_MS`]. The snapshot is taken under the bank lock;
    /// the node updates happen outside it.
    fn register_polling_action(
        &self,
        server: &mut Server,
        address_space: &Arc<OpcRwLock<AddressSpace>>,
        nodes: Vec<(TagConfig, NodeId)>,
    ) {
        let bank = Arc::clone(&self.bank);
        let address_space = Arc::clone(address_space);

        server.add_polling_action(PUBLISH_INTERVAL_MS, move || {
            let snapshot: Vec<(NodeId, Variant)> = {
                let table = bank.lock();
                nodes
                    .iter()
                    .filter_map(|(tag, node_id)| match tags::read_tag(&table, tag) {
                        Ok(value) => Some((node_id.clone(), value.into())),
                        Err(err) => {
                            warn!("[OPC UA] Skipping tag {}: {err}", tag.name);
                            None
                        }
                    })
                    .collect()
            };

            let now = DateTime::now();
            let mut address_space = address_space.write();
            for (node_id, value) in snapshot {
                address_space.set_variable_value(node_id, value, &now, &now);
            }
        });
    }
}

impl Drop for PlcOpcUaServer {
    fn drop(&mut self) {
        self.stop();
    }
}
