//! Client facade
//!
//! Turns typed tensor, dataset, model and script operations into store
//! commands, routes them, follows cluster redirects and decodes replies.

use std::path::Path;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::namespace::{KeyClass, Namespace};
use super::poll::poll_until;
use super::raw_connection::ConnectionFactory;
use super::transport::{ConnectionPool, Transport};
use crate::config::ClientConfig;
use crate::dataset::DataSet;
use crate::router::{Command, ModelOptions, Router};
use crate::tensor::{HostArray, MemoryLayout, Tensor, TensorElement, TensorType};
use crate::utils::{ClientError, ClusterError, DecodeError, ProtocolError, RespValue, Result};

/// Connection to a Redis-compatible store with the RedisAI command family
///
/// Every operation takes `&self`; the client can be shared between threads.
/// Namespacing settings are read once at the start of each operation.
pub struct Client<T: Transport = ConnectionPool> {
    transport: T,
    router: RwLock<Router>,
    namespace: RwLock<Namespace>,
    max_redirects: u32,
}

impl Client<ConnectionPool> {
    /// Connect using `config`
    ///
    /// In cluster mode the topology is read from the first seed address
    /// that answers `CLUSTER NODES`.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let pool = ConnectionPool::new(ConnectionFactory::from_config(config));

        let router = if config.cluster_mode {
            discover_topology(&pool, config)?
        } else {
            // validate() guarantees one address
            let address = config.addresses[0].clone();
            pool.execute(&address, &Command::ping())?.into_result()?;
            Router::standalone(address)
        };

        info!(
            "Connected to {} ({} primaries)",
            if router.is_cluster() { "cluster" } else { "standalone server" },
            router.primaries().len()
        );
        Ok(Self::with_transport(router, pool, config))
    }
}

fn discover_topology(pool: &ConnectionPool, config: &ClientConfig) -> Result<Router> {
    for seed in &config.addresses {
        let reply = match pool.execute(seed, &Command::cluster_nodes()) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Seed {} unreachable: {}", seed, e);
                continue;
            }
        };
        match reply {
            RespValue::BulkString(data) => {
                let text = String::from_utf8_lossy(&data);
                let router = Router::from_cluster_nodes(&text)?;
                debug!("Discovered cluster topology from {}", seed);
                return Ok(router);
            }
            other => {
                warn!("Seed {} answered CLUSTER NODES with {}", seed, other.describe());
            }
        }
    }
    Err(ClusterError::NoReachableSeed.into())
}

/// Server error replies that mean the key is absent
fn is_missing_key(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("key is empty") || lower.contains("does not exist")
}

/// Missing-key reply about the model or script itself, not one of its tensors
fn is_missing_runnable(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    is_missing_key(&lower) && (lower.contains("model key") || lower.contains("script key"))
}

fn unexpected(command: &Command, reply: &RespValue) -> ClientError {
    ProtocolError::UnexpectedResponse {
        command: command.name().to_string(),
        actual: reply.describe(),
    }
    .into()
}

fn expect_ok(command: &Command, reply: RespValue) -> Result<()> {
    match reply {
        RespValue::SimpleString(s) if s == "OK" => Ok(()),
        other => Err(unexpected(command, &other)),
    }
}

/// Bulk payload, also accepting the chunked array form of large blobs
fn blob_payload(command: &Command, reply: RespValue) -> Result<Vec<u8>> {
    match reply {
        RespValue::BulkString(data) => Ok(data),
        RespValue::Array(chunks) => {
            let mut data = Vec::new();
            for chunk in &chunks {
                let bytes = chunk.as_bytes().ok_or_else(|| unexpected(command, chunk))?;
                data.extend_from_slice(bytes);
            }
            Ok(data)
        }
        other => Err(unexpected(command, &other)),
    }
}

/// Decode `[dtype, T, shape, [dims], blob, bytes]`
fn parse_tensor_reply(name: &str, command: &Command, reply: RespValue) -> Result<Tensor> {
    let items = match reply {
        RespValue::Array(items) => items,
        other => return Err(unexpected(command, &other)),
    };

    let mut ttype = None;
    let mut shape = None;
    let mut blob = None;
    let mut items = items.into_iter();
    while let (Some(label), Some(value)) = (items.next(), items.next()) {
        match label.as_str().map(str::to_ascii_lowercase).as_deref() {
            Some("dtype") => {
                let dtype = value.as_str().ok_or_else(|| unexpected(command, &value))?;
                ttype = Some(dtype.parse::<TensorType>()?);
            }
            Some("shape") => {
                let dims = value.as_array().ok_or_else(|| unexpected(command, &value))?;
                let dims: Vec<usize> = dims
                    .iter()
                    .map(|d| d.as_i64().and_then(|d| usize::try_from(d).ok()))
                    .collect::<Option<_>>()
                    .ok_or_else(|| unexpected(command, &value))?;
                shape = Some(dims);
            }
            Some("blob") => blob = value.into_bytes(),
            _ => {}
        }
    }

    match (ttype, shape, blob) {
        (Some(ttype), Some(shape), Some(blob)) => {
            Ok(Tensor::from_bytes(name, ttype, shape, blob)?)
        }
        _ => Err(ProtocolError::UnexpectedResponse {
            command: command.name().to_string(),
            actual: "reply without dtype, shape and blob".to_string(),
        }
        .into()),
    }
}

impl<T: Transport> Client<T> {
    /// Client over an existing transport and routing table
    pub fn with_transport(router: Router, transport: T, config: &ClientConfig) -> Self {
        Self {
            transport,
            router: RwLock::new(router),
            namespace: RwLock::new(Namespace::from_config(config)),
            max_redirects: config.max_redirects,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Current routing table
    pub fn router(&self) -> Router {
        self.router.read().clone()
    }

    fn physical_key(&self, logical: &str, class: KeyClass) -> String {
        self.namespace.read().build_key(logical, class)
    }

    /// Send a command to its owning node, following MOVED and ASK
    fn dispatch(&self, command: &Command) -> Result<RespValue> {
        let mut node = self.router.read().select(command)?;
        let mut asking = false;
        let mut redirects = 0;
        loop {
            let reply = if asking {
                self.transport.execute_asking(&node, command)?
            } else {
                self.transport.execute(&node, command)?
            };
            let Some(redirect) = reply.parse_redirect() else {
                return Ok(reply);
            };
            if redirects >= self.max_redirects {
                return Err(ProtocolError::TooManyRedirects {
                    key: command.key().to_string(),
                    last: reply.describe(),
                }
                .into());
            }
            redirects += 1;
            debug!(
                "{} {} redirected ({}) to {}:{}",
                command.name(),
                command.key(),
                if redirect.is_ask { "ASK" } else { "MOVED" },
                redirect.host,
                redirect.port
            );
            node = self.router.write().apply_redirect(&redirect);
            asking = redirect.is_ask;
        }
    }

    /// Dispatch and turn error replies into errors
    fn request(&self, command: &Command) -> Result<RespValue> {
        Ok(self.dispatch(command)?.into_result()?)
    }

    /// Dispatch a read whose error reply may mean the key is absent
    fn request_existing(&self, command: &Command) -> Result<RespValue> {
        match self.dispatch(command)? {
            RespValue::Error(e) if is_missing_key(&e) => {
                Err(ClientError::NotFound(command.key().to_string()))
            }
            reply => Ok(reply.into_result()?),
        }
    }

    /// Like `request_existing`, but only a missing model or script is `NotFound`
    ///
    /// A missing input tensor stays a server error so it is not reported
    /// under the model's key.
    fn request_run(&self, command: &Command) -> Result<RespValue> {
        match self.dispatch(command)? {
            RespValue::Error(e) if is_missing_runnable(&e) => {
                Err(ClientError::NotFound(command.key().to_string()))
            }
            reply => Ok(reply.into_result()?),
        }
    }

    /// PING every primary
    pub fn ping(&self) -> Result<()> {
        let command = Command::ping();
        for node in self.router.read().primaries() {
            match self.transport.execute(&node, &command)? {
                RespValue::SimpleString(s) if s == "PONG" => {}
                other => return Err(unexpected(&command, &other)),
            }
        }
        Ok(())
    }

    // Tensors

    /// Store `tensor` under its name
    pub fn put_tensor(&self, tensor: &Tensor) -> Result<()> {
        let key = self.physical_key(tensor.name(), KeyClass::Tensor);
        debug!("put_tensor {} {:?} {}", key, tensor.shape(), tensor.tensor_type());
        let command = Command::tensor_set(&key, tensor);
        expect_ok(&command, self.request(&command)?)
    }

    /// Store host data in either layout as tensor `key`
    pub fn put_tensor_host<E: TensorElement>(
        &self,
        key: &str,
        data: &HostArray<E>,
        dims: &[usize],
    ) -> Result<()> {
        let tensor = Tensor::from_host(key, data, dims.to_vec())?;
        self.put_tensor(&tensor)
    }

    /// Fetch tensor `key`; the result is named by the logical key
    pub fn get_tensor(&self, key: &str) -> Result<Tensor> {
        let physical = self.physical_key(key, KeyClass::Tensor);
        let command = Command::tensor_get(&physical);
        let reply = self.request_existing(&command)?;
        parse_tensor_reply(key, &command, reply)
    }

    /// Fetch tensor `key` into host memory of the requested layout
    ///
    /// The stored type must be `E` and the stored shape must equal `dims`.
    pub fn unpack_tensor<E: TensorElement>(
        &self,
        key: &str,
        dims: &[usize],
        layout: MemoryLayout,
    ) -> Result<HostArray<E>> {
        let tensor = self.get_tensor(key)?;
        if tensor.tensor_type() != E::TYPE {
            return Err(ClientError::tensor_type_mismatch(
                key,
                E::TYPE,
                tensor.tensor_type(),
            ));
        }
        if tensor.shape() != dims {
            return Err(ClientError::ShapeMismatch {
                key: key.to_string(),
                expected: dims.to_vec(),
                actual: tensor.shape().to_vec(),
            });
        }
        Ok(match layout {
            MemoryLayout::Contiguous => HostArray::Contiguous(tensor.to_vec()?),
            MemoryLayout::Nested => HostArray::Nested(tensor.to_nested()?),
        })
    }

    pub fn delete_tensor(&self, key: &str) -> Result<()> {
        self.delete(self.physical_key(key, KeyClass::Tensor))
    }

    /// Copy tensor `src` to `dest`; both names are namespaced
    pub fn copy_tensor(&self, src: &str, dest: &str) -> Result<()> {
        let tensor = self.get_tensor(src)?.renamed(dest);
        self.put_tensor(&tensor)
    }

    fn delete(&self, key: String) -> Result<()> {
        let command = Command::del(&key);
        match self.request(&command)? {
            RespValue::Integer(0) => Err(ClientError::NotFound(key)),
            RespValue::Integer(_) => Ok(()),
            other => Err(unexpected(&command, &other)),
        }
    }

    // Datasets

    /// Store `dataset` packed under its name
    pub fn put_dataset(&self, dataset: &DataSet) -> Result<()> {
        let key = self.physical_key(dataset.name(), KeyClass::Tensor);
        let packed = dataset.pack();
        debug!("put_dataset {} ({} bytes)", key, packed.len());
        let command = Command::set(&key, packed);
        expect_ok(&command, self.request(&command)?)
    }

    pub fn get_dataset(&self, name: &str) -> Result<DataSet> {
        let key = self.physical_key(name, KeyClass::Tensor);
        let command = Command::get(&key);
        match self.request(&command)? {
            RespValue::BulkString(data) => DataSet::unpack(&data),
            RespValue::Null => Err(ClientError::NotFound(key)),
            other => Err(unexpected(&command, &other)),
        }
    }

    pub fn delete_dataset(&self, name: &str) -> Result<()> {
        self.delete(self.physical_key(name, KeyClass::Tensor))
    }

    // Models

    pub fn set_model(&self, key: &str, model: &[u8], options: &ModelOptions) -> Result<()> {
        let key = self.physical_key(key, KeyClass::Model);
        debug!("set_model {} backend={} device={}", key, options.backend, options.device);
        let command = Command::model_set(&key, model, options);
        expect_ok(&command, self.request(&command)?)
    }

    pub fn set_model_from_file<P: AsRef<Path>>(
        &self,
        key: &str,
        path: P,
        options: &ModelOptions,
    ) -> Result<()> {
        let model = std::fs::read(path)?;
        self.set_model(key, &model, options)
    }

    pub fn get_model(&self, key: &str) -> Result<Vec<u8>> {
        let command = Command::model_get(&self.physical_key(key, KeyClass::Model));
        let reply = self.request_existing(&command)?;
        blob_payload(&command, reply)
    }

    /// Run model `key`; input and output names are tensor keys
    pub fn run_model<S: AsRef<str>>(&self, key: &str, inputs: &[S], outputs: &[S]) -> Result<()> {
        let (key, inputs, outputs) = {
            let ns = self.namespace.read();
            (
                ns.build_key(key, KeyClass::Model),
                tensor_keys(&ns, inputs),
                tensor_keys(&ns, outputs),
            )
        };
        let command = Command::model_run(&key, &inputs, &outputs);
        expect_ok(&command, self.request_run(&command)?)
    }

    // Scripts

    pub fn set_script(&self, key: &str, device: &str, script: &str) -> Result<()> {
        let key = self.physical_key(key, KeyClass::Model);
        debug!("set_script {} device={}", key, device);
        let command = Command::script_set(&key, device, script);
        expect_ok(&command, self.request(&command)?)
    }

    pub fn set_script_from_file<P: AsRef<Path>>(&self, key: &str, device: &str, path: P) -> Result<()> {
        let script = std::fs::read_to_string(path)?;
        self.set_script(key, device, &script)
    }

    pub fn get_script(&self, key: &str) -> Result<String> {
        let command = Command::script_get(&self.physical_key(key, KeyClass::Model));
        let reply = self.request_existing(&command)?;
        let source = blob_payload(&command, reply)?;
        String::from_utf8(source).map_err(|_| DecodeError::InvalidUtf8("script source").into())
    }

    pub fn run_script<S: AsRef<str>>(
        &self,
        key: &str,
        function: &str,
        inputs: &[S],
        outputs: &[S],
    ) -> Result<()> {
        let (key, inputs, outputs) = {
            let ns = self.namespace.read();
            (
                ns.build_key(key, KeyClass::Model),
                tensor_keys(&ns, inputs),
                tensor_keys(&ns, outputs),
            )
        };
        let command = Command::script_run(&key, function, &inputs, &outputs);
        expect_ok(&command, self.request_run(&command)?)
    }

    // Existence and polling

    /// Whether raw `key` exists; never prefixed
    pub fn key_exists(&self, key: &str) -> Result<bool> {
        let command = Command::exists(key);
        match self.request(&command)? {
            RespValue::Integer(n) => Ok(n > 0),
            other => Err(unexpected(&command, &other)),
        }
    }

    pub fn tensor_exists(&self, name: &str) -> Result<bool> {
        self.key_exists(&self.physical_key(name, KeyClass::Tensor))
    }

    pub fn dataset_exists(&self, name: &str) -> Result<bool> {
        self.key_exists(&self.physical_key(name, KeyClass::Tensor))
    }

    pub fn model_exists(&self, name: &str) -> Result<bool> {
        self.key_exists(&self.physical_key(name, KeyClass::Model))
    }

    /// Wait for raw `key`, at most `max_tries` checks `interval` apart
    pub fn poll_key(&self, key: &str, interval: Duration, max_tries: i32) -> Result<bool> {
        poll_until(interval, max_tries, || self.key_exists(key))
    }

    pub fn poll_tensor(&self, name: &str, interval: Duration, max_tries: i32) -> Result<bool> {
        let key = self.physical_key(name, KeyClass::Tensor);
        poll_until(interval, max_tries, || self.key_exists(&key))
    }

    pub fn poll_dataset(&self, name: &str, interval: Duration, max_tries: i32) -> Result<bool> {
        let key = self.physical_key(name, KeyClass::Tensor);
        poll_until(interval, max_tries, || self.key_exists(&key))
    }

    pub fn poll_model(&self, name: &str, interval: Duration, max_tries: i32) -> Result<bool> {
        let key = self.physical_key(name, KeyClass::Model);
        poll_until(interval, max_tries, || self.key_exists(&key))
    }

    // Ensemble namespacing

    pub fn use_tensor_ensemble_prefix(&self, enabled: bool) {
        self.namespace.write().set_tensor_prefix(enabled);
    }

    pub fn use_model_ensemble_prefix(&self, enabled: bool) {
        self.namespace.write().set_model_prefix(enabled);
    }

    /// Select the ensemble member whose keys subsequent calls address
    pub fn set_data_source(&self, source: &str) -> Result<()> {
        self.namespace.write().set_data_source(source)
    }

    pub fn data_source(&self) -> Option<String> {
        self.namespace.read().data_source().map(str::to_string)
    }
}

fn tensor_keys<S: AsRef<str>>(ns: &Namespace, names: &[S]) -> Vec<String> {
    names
        .iter()
        .map(|n| ns.build_key(n.as_ref(), KeyClass::Tensor))
        .collect()
}
