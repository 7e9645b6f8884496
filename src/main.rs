//! silc - command-line access to tensors, datasets and models
//!
//! Thin wrapper over the client library; every command prints JSON.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use tracing::{debug, error, Level};
use tracing_subscriber::FmtSubscriber;

use silc::config::{CliArgs, Command, KeyKind};
use silc::{Client, DataSet, MetadataValue, ModelOptions, Tensor, TensorType};

fn setup_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to set tracing subscriber");
    }
}

fn parse_values<T>(values: &[String]) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: Display,
{
    values
        .iter()
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("invalid value '{}': {}", v, e))
        })
        .collect()
}

fn build_tensor(name: &str, ttype: TensorType, dims: Vec<usize>, values: &[String]) -> Result<Tensor> {
    macro_rules! typed {
        ($ty:ty) => {
            Tensor::from_slice(name, &parse_values::<$ty>(values)?, dims)?
        };
    }
    Ok(match ttype {
        TensorType::Double => typed!(f64),
        TensorType::Float => typed!(f32),
        TensorType::Int64 => typed!(i64),
        TensorType::Int32 => typed!(i32),
        TensorType::Int16 => typed!(i16),
        TensorType::Int8 => typed!(i8),
        TensorType::UInt16 => typed!(u16),
        TensorType::UInt8 => typed!(u8),
    })
}

fn tensor_values(tensor: &Tensor) -> Result<Value> {
    Ok(match tensor.tensor_type() {
        TensorType::Double => json!(tensor.to_vec::<f64>()?),
        TensorType::Float => json!(tensor.to_vec::<f32>()?),
        TensorType::Int64 => json!(tensor.to_vec::<i64>()?),
        TensorType::Int32 => json!(tensor.to_vec::<i32>()?),
        TensorType::Int16 => json!(tensor.to_vec::<i16>()?),
        TensorType::Int8 => json!(tensor.to_vec::<i8>()?),
        TensorType::UInt16 => json!(tensor.to_vec::<u16>()?),
        TensorType::UInt8 => json!(tensor.to_vec::<u8>()?),
    })
}

fn tensor_summary(tensor: &Tensor) -> Value {
    json!({
        "name": tensor.name(),
        "type": tensor.tensor_type().as_str(),
        "shape": tensor.shape(),
    })
}

fn dataset_summary(dataset: &DataSet) -> Result<Value> {
    let tensors: Vec<Value> = dataset.tensors().iter().map(tensor_summary).collect();
    let mut metadata = serde_json::Map::new();
    for name in dataset.meta_names() {
        let values: Vec<Value> = dataset
            .get_meta(name)?
            .iter()
            .map(|field| match field.value() {
                MetadataValue::String(s) => json!(s),
                MetadataValue::Double(v) => json!(v),
                MetadataValue::Float(v) => json!(v),
                MetadataValue::Int64(v) => json!(v),
                MetadataValue::Int32(v) => json!(v),
                MetadataValue::UInt64(v) => json!(v),
                MetadataValue::UInt32(v) => json!(v),
                MetadataValue::Tensor(t) => tensor_summary(t),
            })
            .collect();
        metadata.insert(name.to_string(), Value::Array(values));
    }
    Ok(json!({
        "name": dataset.name(),
        "tensors": tensors,
        "metadata": metadata,
    }))
}

fn exists(client: &Client, key: &str, kind: KeyKind) -> silc::Result<bool> {
    match kind {
        KeyKind::Key => client.key_exists(key),
        KeyKind::Tensor => client.tensor_exists(key),
        KeyKind::Dataset => client.dataset_exists(key),
        KeyKind::Model => client.model_exists(key),
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse_args();
    setup_logging(args.verbose, args.quiet);

    let config = args
        .connection
        .to_client_config()
        .context("invalid client configuration")?;
    debug!(
        "Connecting to {:?} (cluster: {})",
        config.addresses.iter().map(|a| a.to_string()).collect::<Vec<_>>(),
        config.cluster_mode
    );
    let client = Client::connect(&config).context("failed to connect")?;

    let output = match args.command {
        Command::Ping => {
            client.ping()?;
            json!({ "ping": "PONG" })
        }
        Command::Exists { key, kind } => {
            let found = exists(&client, &key, kind)?;
            json!({ "key": key, "exists": found })
        }
        Command::Poll {
            key,
            kind,
            interval_ms,
            tries,
        } => {
            let interval = Duration::from_millis(interval_ms);
            let found = match kind {
                KeyKind::Key => client.poll_key(&key, interval, tries)?,
                KeyKind::Tensor => client.poll_tensor(&key, interval, tries)?,
                KeyKind::Dataset => client.poll_dataset(&key, interval, tries)?,
                KeyKind::Model => client.poll_model(&key, interval, tries)?,
            };
            if !found {
                bail!("'{}' did not appear after {} checks", key, tries.max(1));
            }
            json!({ "key": key, "exists": true })
        }
        Command::PutTensor {
            name,
            ttype,
            dims,
            values,
        } => {
            let ttype: TensorType = ttype.parse()?;
            let tensor = build_tensor(&name, ttype, dims, &values)?;
            client.put_tensor(&tensor)?;
            tensor_summary(&tensor)
        }
        Command::GetTensor { name } => {
            let tensor = client.get_tensor(&name)?;
            let mut value = tensor_summary(&tensor);
            value["values"] = tensor_values(&tensor)?;
            value
        }
        Command::DeleteTensor { name } => {
            client.delete_tensor(&name)?;
            json!({ "deleted": name })
        }
        Command::GetDataset { name } => dataset_summary(&client.get_dataset(&name)?)?,
        Command::SetModel {
            key,
            file,
            backend,
            device,
            batch_size,
            min_batch_size,
            tag,
            inputs,
            outputs,
        } => {
            let options = ModelOptions::new(backend, device)
                .with_batching(batch_size, min_batch_size)
                .with_tag(tag)
                .with_nodes(inputs, outputs);
            client
                .set_model_from_file(&key, &file, &options)
                .with_context(|| format!("failed to set model from {}", file.display()))?;
            json!({ "model": key })
        }
        Command::GetModel { key, out } => {
            let model = client.get_model(&key)?;
            if let Some(path) = &out {
                std::fs::write(path, &model)
                    .with_context(|| format!("failed to write model to {}", path.display()))?;
            }
            json!({
                "model": key,
                "bytes": model.len(),
                "file": out.map(|p| p.display().to_string()),
            })
        }
        Command::RunModel {
            key,
            inputs,
            outputs,
        } => {
            client.run_model(&key, &inputs, &outputs)?;
            json!({ "model": key, "outputs": outputs })
        }
        Command::SetScript { key, file, device } => {
            client
                .set_script_from_file(&key, &device, &file)
                .with_context(|| format!("failed to set script from {}", file.display()))?;
            json!({ "script": key })
        }
        Command::GetScript { key } => {
            let source = client.get_script(&key)?;
            json!({ "script": key, "source": source })
        }
        Command::RunScript {
            key,
            function,
            inputs,
            outputs,
        } => {
            client.run_script(&key, &function, &inputs, &outputs)?;
            json!({ "script": key, "function": function, "outputs": outputs })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
