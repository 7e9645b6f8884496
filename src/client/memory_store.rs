//! In-memory store speaking the command subset the client emits

use std::collections::HashMap;

use parking_lot::Mutex;

use super::transport::Transport;
use crate::cluster::ClusterTopology;
use crate::config::ServerAddress;
use crate::router::Command;
use crate::utils::{ConnectionError, RespValue};

#[derive(Debug, Clone)]
enum Entry {
    Value(Vec<u8>),
    Tensor {
        dtype: String,
        shape: Vec<i64>,
        blob: Vec<u8>,
    },
    Model(Vec<u8>),
    Script(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RedirectKind {
    /// MOVED from every node except the target
    Moved,
    /// ASK from every node unless preceded by ASKING at the target
    Ask,
    /// MOVED from every node, including the target
    Endless,
}

/// Command received by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub node: ServerAddress,
    pub name: String,
    pub key: String,
    pub asking: bool,
}

#[derive(Default)]
struct State {
    entries: HashMap<Vec<u8>, Entry>,
    redirects: HashMap<Vec<u8>, (RedirectKind, ServerAddress)>,
    received: Vec<Received>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn ok() -> RespValue {
    RespValue::SimpleString("OK".to_string())
}

fn err(msg: &str) -> RespValue {
    RespValue::Error(msg.to_string())
}

fn bulk(data: impl Into<Vec<u8>>) -> RespValue {
    RespValue::BulkString(data.into())
}

fn text(arg: &[u8]) -> String {
    String::from_utf8_lossy(arg).into_owned()
}

/// Split `INPUTS a b OUTPUTS c` into its two lists
fn io_lists(args: &[Vec<u8>]) -> Option<(Vec<Vec<u8>>, Vec<Vec<u8>>)> {
    let inputs_at = args.iter().position(|a| a == b"INPUTS")?;
    let outputs_at = args.iter().position(|a| a == b"OUTPUTS")?;
    (inputs_at < outputs_at).then(|| {
        (
            args[inputs_at + 1..outputs_at].to_vec(),
            args[outputs_at + 1..].to_vec(),
        )
    })
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer MOVED for `key` from every node other than `target`
    pub fn move_key(&self, key: &str, target: ServerAddress) {
        self.add_redirect(key, RedirectKind::Moved, target);
    }

    /// Answer ASK for `key` unless the command arrives with ASKING at `target`
    pub fn ask_key(&self, key: &str, target: ServerAddress) {
        self.add_redirect(key, RedirectKind::Ask, target);
    }

    /// Answer MOVED for `key` everywhere
    pub fn redirect_forever(&self, key: &str, target: ServerAddress) {
        self.add_redirect(key, RedirectKind::Endless, target);
    }

    fn add_redirect(&self, key: &str, kind: RedirectKind, target: ServerAddress) {
        self.state
            .lock()
            .redirects
            .insert(key.as_bytes().to_vec(), (kind, target));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key.as_bytes())
    }

    /// Raw value stored with SET
    pub fn raw_value(&self, key: &str) -> Option<Vec<u8>> {
        match self.state.lock().entries.get(key.as_bytes()) {
            Some(Entry::Value(v)) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn insert_value(&self, key: &str, value: Vec<u8>) {
        self.state
            .lock()
            .entries
            .insert(key.as_bytes().to_vec(), Entry::Value(value));
    }

    pub fn received(&self) -> Vec<Received> {
        self.state.lock().received.clone()
    }

    /// Keys of the commands named `name`, in arrival order
    pub fn received_keys(&self, name: &str) -> Vec<String> {
        self.state
            .lock()
            .received
            .iter()
            .filter(|r| r.name == name)
            .map(|r| r.key.clone())
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.state
            .lock()
            .received
            .iter()
            .filter(|r| r.name == name)
            .count()
    }

    fn handle(&self, node: &ServerAddress, command: &Command, asking: bool) -> RespValue {
        let args = command.args_slice();
        let mut state = self.state.lock();
        state.received.push(Received {
            node: node.clone(),
            name: command.name().to_string(),
            key: command.key().to_string(),
            asking,
        });

        if let Some(key) = command.routing_key() {
            if let Some((kind, target)) = state.redirects.get(key).cloned() {
                let slot = ClusterTopology::slot_for_key(key);
                let redirect = match kind {
                    RedirectKind::Moved if *node != target => Some("MOVED"),
                    RedirectKind::Ask if !(asking && *node == target) => Some("ASK"),
                    RedirectKind::Endless => Some("MOVED"),
                    _ => None,
                };
                if let Some(kind) = redirect {
                    return err(&format!("{} {} {}", kind, slot, target));
                }
            }
        }

        let name = command.name().to_ascii_uppercase();
        let key = args.get(1).cloned().unwrap_or_default();
        let entries = &mut state.entries;
        match name.as_str() {
            "PING" => RespValue::SimpleString("PONG".to_string()),
            "EXISTS" => RespValue::Integer(entries.contains_key(&key) as i64),
            "DEL" => RespValue::Integer(entries.remove(&key).is_some() as i64),
            "SET" => match args.get(2) {
                Some(value) => {
                    entries.insert(key, Entry::Value(value.clone()));
                    ok()
                }
                None => err("ERR wrong number of arguments for 'set' command"),
            },
            "GET" => match entries.get(&key) {
                Some(Entry::Value(v)) => bulk(v.clone()),
                Some(_) => err("WRONGTYPE Operation against a key holding the wrong kind of value"),
                None => RespValue::Null,
            },
            "AI.TENSORSET" => {
                // key TYPE dims.. BLOB data
                let Some(blob_at) = args.iter().position(|a| a == b"BLOB").filter(|&at| at >= 3)
                else {
                    return err("ERR missing BLOB");
                };
                let (Some(dtype), Some(blob)) = (args.get(2), args.get(blob_at + 1)) else {
                    return err("ERR wrong number of arguments for 'AI.TENSORSET' command");
                };
                let shape: Option<Vec<i64>> = args[3..blob_at]
                    .iter()
                    .map(|d| text(d).parse().ok())
                    .collect();
                let Some(shape) = shape else {
                    return err("ERR invalid tensor dimension");
                };
                entries.insert(
                    key,
                    Entry::Tensor {
                        dtype: text(dtype),
                        shape,
                        blob: blob.clone(),
                    },
                );
                ok()
            }
            "AI.TENSORGET" => match entries.get(&key) {
                Some(Entry::Tensor { dtype, shape, blob }) => RespValue::Array(vec![
                    bulk("dtype"),
                    bulk(dtype.as_str()),
                    bulk("shape"),
                    RespValue::Array(shape.iter().map(|&d| RespValue::Integer(d)).collect()),
                    bulk("blob"),
                    bulk(blob.clone()),
                ]),
                Some(_) => err("WRONGTYPE Operation against a key holding the wrong kind of value"),
                None => err("ERR tensor key is empty"),
            },
            "AI.MODELSET" => match args.last() {
                Some(blob) if args.len() >= 6 => {
                    entries.insert(key, Entry::Model(blob.clone()));
                    ok()
                }
                _ => err("ERR wrong number of arguments for 'AI.MODELSET' command"),
            },
            "AI.MODELGET" => match entries.get(&key) {
                Some(Entry::Model(blob)) => bulk(blob.clone()),
                _ => err("ERR model key is empty"),
            },
            "AI.SCRIPTSET" => match args.get(4) {
                Some(source) => {
                    entries.insert(key, Entry::Script(text(source)));
                    ok()
                }
                None => err("ERR wrong number of arguments for 'AI.SCRIPTSET' command"),
            },
            "AI.SCRIPTGET" => match entries.get(&key) {
                Some(Entry::Script(source)) => bulk(source.as_str()),
                _ => err("ERR script key is empty"),
            },
            "AI.MODELRUN" | "AI.SCRIPTRUN" => {
                let runnable = match entries.get(&key) {
                    Some(Entry::Model(_)) => name == "AI.MODELRUN",
                    Some(Entry::Script(_)) => name == "AI.SCRIPTRUN",
                    _ => false,
                };
                if !runnable {
                    return match name.as_str() {
                        "AI.MODELRUN" => err("ERR model key is empty"),
                        _ => err("ERR script key is empty"),
                    };
                }
                let Some((inputs, outputs)) = io_lists(args) else {
                    return err("ERR INPUTS and OUTPUTS are required");
                };
                // Each output receives a copy of the first input
                let Some(first) = inputs.first().and_then(|k| entries.get(k)).cloned() else {
                    return err("ERR tensor key is empty");
                };
                for output in outputs {
                    entries.insert(output, first.clone());
                }
                ok()
            }
            "CLUSTER" => err("ERR This instance has cluster support disabled"),
            _ => err(&format!("ERR unknown command '{}'", name)),
        }
    }
}

impl Transport for MemoryStore {
    fn execute(&self, node: &ServerAddress, command: &Command) -> Result<RespValue, ConnectionError> {
        Ok(self.handle(node, command, false))
    }

    fn execute_asking(
        &self,
        node: &ServerAddress,
        command: &Command,
    ) -> Result<RespValue, ConnectionError> {
        Ok(self.handle(node, command, true))
    }
}
