//! Store commands built from typed client operations
//!
//! A [`Command`] is the full argument list sent as a RESP array plus the
//! key used to pick a shard. Builders take physical (already prefixed) keys.

use crate::tensor::Tensor;

/// One store command and the key it is routed by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Vec<u8>>,
    routing_key: Option<Vec<u8>>,
}

/// Parameters carried verbatim into `AI.MODELSET`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelOptions {
    /// Backend identifier (TF, TORCH, ONNX, TFLITE)
    pub backend: String,
    /// Execution device (CPU, GPU, GPU:1)
    pub device: String,
    /// 0 disables batching
    pub batch_size: u32,
    /// Only sent when `batch_size` is non-zero
    pub min_batch_size: u32,
    /// Empty tags are omitted
    pub tag: String,
    /// Graph input node names (TF only)
    pub inputs: Vec<String>,
    /// Graph output node names (TF only)
    pub outputs: Vec<String>,
}

impl ModelOptions {
    pub fn new(backend: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            device: device.into(),
            ..Self::default()
        }
    }

    pub fn with_batching(mut self, batch_size: u32, min_batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self.min_batch_size = min_batch_size;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_nodes(mut self, inputs: Vec<String>, outputs: Vec<String>) -> Self {
        self.inputs = inputs;
        self.outputs = outputs;
        self
    }
}

impl Command {
    /// Command with no key; routed to any node
    pub fn unkeyed<A: AsRef<[u8]>>(args: &[A]) -> Self {
        Self {
            args: args.iter().map(|a| a.as_ref().to_vec()).collect(),
            routing_key: None,
        }
    }

    fn keyed(name: &str, key: &str) -> Self {
        Self {
            args: vec![name.as_bytes().to_vec(), key.as_bytes().to_vec()],
            routing_key: Some(key.as_bytes().to_vec()),
        }
    }

    fn arg(mut self, value: impl AsRef<[u8]>) -> Self {
        self.args.push(value.as_ref().to_vec());
        self
    }

    fn arg_owned(mut self, value: Vec<u8>) -> Self {
        self.args.push(value);
        self
    }

    fn args<I, A>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        self.args
            .extend(values.into_iter().map(|v| v.as_ref().to_vec()));
        self
    }

    pub fn ping() -> Self {
        Self::unkeyed(&["PING"])
    }

    pub fn cluster_nodes() -> Self {
        Self::unkeyed(&["CLUSTER", "NODES"])
    }

    pub fn asking() -> Self {
        Self::unkeyed(&["ASKING"])
    }

    /// `AI.TENSORSET key TYPE d1..dn BLOB data`
    pub fn tensor_set(key: &str, tensor: &Tensor) -> Self {
        let mut dim = itoa::Buffer::new();
        let mut cmd = Self::keyed("AI.TENSORSET", key).arg(tensor.tensor_type().as_str());
        for &d in tensor.shape() {
            cmd = cmd.arg(dim.format(d));
        }
        cmd.arg("BLOB").arg(tensor.data())
    }

    /// `AI.TENSORGET key META BLOB`
    pub fn tensor_get(key: &str) -> Self {
        Self::keyed("AI.TENSORGET", key).arg("META").arg("BLOB")
    }

    pub fn del(key: &str) -> Self {
        Self::keyed("DEL", key)
    }

    pub fn exists(key: &str) -> Self {
        Self::keyed("EXISTS", key)
    }

    /// `SET key value`, used for packed datasets
    pub fn set(key: &str, value: Vec<u8>) -> Self {
        Self::keyed("SET", key).arg_owned(value)
    }

    pub fn get(key: &str) -> Self {
        Self::keyed("GET", key)
    }

    /// `AI.MODELSET key BACKEND DEVICE [TAG t] [BATCHSIZE n [MINBATCHSIZE m]] [INPUTS..] [OUTPUTS..] BLOB model`
    pub fn model_set(key: &str, model: &[u8], options: &ModelOptions) -> Self {
        let mut num = itoa::Buffer::new();
        let mut cmd = Self::keyed("AI.MODELSET", key)
            .arg(&options.backend)
            .arg(&options.device);
        if !options.tag.is_empty() {
            cmd = cmd.arg("TAG").arg(&options.tag);
        }
        if options.batch_size > 0 {
            cmd = cmd.arg("BATCHSIZE").arg(num.format(options.batch_size));
            if options.min_batch_size > 0 {
                cmd = cmd
                    .arg("MINBATCHSIZE")
                    .arg(num.format(options.min_batch_size));
            }
        }
        if !options.inputs.is_empty() {
            cmd = cmd.arg("INPUTS").args(&options.inputs);
        }
        if !options.outputs.is_empty() {
            cmd = cmd.arg("OUTPUTS").args(&options.outputs);
        }
        cmd.arg("BLOB").arg(model)
    }

    pub fn model_get(key: &str) -> Self {
        Self::keyed("AI.MODELGET", key).arg("BLOB")
    }

    /// `AI.MODELRUN key INPUTS i.. OUTPUTS o..`
    pub fn model_run<S: AsRef<str>>(key: &str, inputs: &[S], outputs: &[S]) -> Self {
        Self::keyed("AI.MODELRUN", key)
            .arg("INPUTS")
            .args(inputs.iter().map(|s| s.as_ref()))
            .arg("OUTPUTS")
            .args(outputs.iter().map(|s| s.as_ref()))
    }

    /// `AI.SCRIPTSET key DEVICE SOURCE script`
    pub fn script_set(key: &str, device: &str, script: &str) -> Self {
        Self::keyed("AI.SCRIPTSET", key)
            .arg(device)
            .arg("SOURCE")
            .arg(script)
    }

    pub fn script_get(key: &str) -> Self {
        Self::keyed("AI.SCRIPTGET", key).arg("SOURCE")
    }

    /// `AI.SCRIPTRUN key fn INPUTS i.. OUTPUTS o..`
    pub fn script_run<S: AsRef<str>>(key: &str, function: &str, inputs: &[S], outputs: &[S]) -> Self {
        Self::keyed("AI.SCRIPTRUN", key)
            .arg(function)
            .arg("INPUTS")
            .args(inputs.iter().map(|s| s.as_ref()))
            .arg("OUTPUTS")
            .args(outputs.iter().map(|s| s.as_ref()))
    }

    pub fn args_slice(&self) -> &[Vec<u8>] {
        &self.args
    }

    pub fn routing_key(&self) -> Option<&[u8]> {
        self.routing_key.as_deref()
    }

    /// Command name, e.g. `AI.TENSORSET`
    pub fn name(&self) -> &str {
        self.args
            .first()
            .and_then(|a| std::str::from_utf8(a).ok())
            .unwrap_or("")
    }

    /// Key argument as text, for logs and errors
    pub fn key(&self) -> &str {
        self.args
            .get(1)
            .filter(|_| self.routing_key.is_some())
            .and_then(|a| std::str::from_utf8(a).ok())
            .unwrap_or("")
    }
}
