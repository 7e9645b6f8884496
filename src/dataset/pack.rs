//! Packed dataset format
//!
//! ```text
//! u32  magic (0x53494C44, "SILD")
//! u16  version
//! u32  dataset name length, name bytes
//! u32  entry count
//! per entry:
//!   u8   kind (1 = tensor, 2 = metadata field)
//!   u32  member name length, member name bytes
//!   u64  offset into body
//!   u64  length
//! body: member encodings, concatenated in directory order
//! ```
//!
//! Tensors come first in insertion order, then each metadata name in
//! insertion order with its values in append order.

use super::set::DataSet;
use crate::metadata::MetadataField;
use crate::tensor::Tensor;
use crate::utils::wire::{put_str, put_u16, put_u32, put_u64, put_u8};
use crate::utils::{ClientError, DecodeError, Result, WireReader};

/// Packed dataset magic number
pub const DATASET_MAGIC: u32 = 0x5349_4C44;

/// Current packed format version
pub const DATASET_VERSION: u16 = 1;

/// Kind byte of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryKind {
    Tensor = 1,
    Metadata = 2,
}

impl EntryKind {
    fn from_u8(value: u8) -> std::result::Result<Self, DecodeError> {
        match value {
            1 => Ok(EntryKind::Tensor),
            2 => Ok(EntryKind::Metadata),
            other => Err(DecodeError::UnknownEntryKind(other)),
        }
    }
}

/// One directory record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub kind: EntryKind,
    pub name: String,
    pub offset: u64,
    pub length: u64,
}

impl DataSet {
    /// Serialize the whole dataset as a single object
    pub fn pack(&self) -> Vec<u8> {
        let mut directory = Vec::new();
        let mut body = Vec::new();

        let mut push = |kind: EntryKind, name: &str, encoded: &dyn Fn(&mut Vec<u8>)| {
            let offset = body.len() as u64;
            encoded(&mut body);
            directory.push(DirectoryEntry {
                kind,
                name: name.to_string(),
                offset,
                length: body.len() as u64 - offset,
            });
        };

        for tensor in self.tensors() {
            push(EntryKind::Tensor, tensor.name(), &|buf: &mut Vec<u8>| tensor.encode_into(buf));
        }
        for (name, fields) in self.metadata_lists() {
            for field in fields {
                push(EntryKind::Metadata, name, &|buf: &mut Vec<u8>| {
                    buf.extend_from_slice(&field.serialize())
                });
            }
        }

        let mut out = Vec::with_capacity(64 + body.len());
        put_u32(&mut out, DATASET_MAGIC);
        put_u16(&mut out, DATASET_VERSION);
        put_str(&mut out, self.name());
        put_u32(&mut out, directory.len() as u32);
        for entry in &directory {
            put_u8(&mut out, entry.kind as u8);
            put_str(&mut out, &entry.name);
            put_u64(&mut out, entry.offset);
            put_u64(&mut out, entry.length);
        }
        out.extend_from_slice(&body);
        out
    }

    /// Rebuild a dataset from [`DataSet::pack`] output
    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        let (name, directory, body) = read_directory(bytes)?;
        let mut dataset = DataSet::new(name);

        let mut expected_offset = 0u64;
        for entry in directory {
            if entry.offset != expected_offset {
                return Err(DecodeError::Corrupt(format!(
                    "entry '{}' starts at {}, expected {}",
                    entry.name, entry.offset, expected_offset
                ))
                .into());
            }
            let end = entry
                .offset
                .checked_add(entry.length)
                .filter(|&end| end <= body.len() as u64)
                .ok_or_else(|| DecodeError::EntryOutOfBounds {
                    name: entry.name.clone(),
                    offset: entry.offset,
                    length: entry.length,
                    body: body.len(),
                })?;
            expected_offset = end;

            let member = &body[entry.offset as usize..end as usize];
            match entry.kind {
                EntryKind::Tensor => {
                    let tensor = Tensor::decode(entry.name, member)?;
                    dataset.add_tensor(tensor).map_err(corrupt_dataset)?;
                }
                EntryKind::Metadata => {
                    let field = MetadataField::deserialize(entry.name, member)?;
                    dataset.add_metadata(field).map_err(corrupt_dataset)?;
                }
            }
        }

        if expected_offset != body.len() as u64 {
            return Err(DecodeError::TrailingBytes {
                what: "dataset body",
                count: body.len() - expected_offset as usize,
            }
            .into());
        }
        Ok(dataset)
    }
}

/// Structural violations found while rebuilding are corruption, not caller errors
fn corrupt_dataset(err: ClientError) -> ClientError {
    match err {
        ClientError::DuplicateTensor(name) => {
            DecodeError::Corrupt(format!("duplicate tensor '{}' in packed dataset", name)).into()
        }
        ClientError::TypeMismatch { key, expected, actual } => DecodeError::Corrupt(format!(
            "metadata '{}' mixes {} and {} values",
            key, actual, expected
        ))
        .into(),
        other => other,
    }
}

/// Parse header and directory, returning the body slice
pub fn read_directory(
    bytes: &[u8],
) -> std::result::Result<(String, Vec<DirectoryEntry>, &[u8]), DecodeError> {
    let mut reader = WireReader::new(bytes);

    let magic = reader.read_u32("dataset magic")?;
    if magic != DATASET_MAGIC {
        return Err(DecodeError::InvalidMagic {
            expected: DATASET_MAGIC,
            actual: magic,
        });
    }
    let version = reader.read_u16("dataset version")?;
    if version != DATASET_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let name = reader.read_str("dataset name")?;
    let count = reader.read_u32("dataset entry count")? as usize;

    // Smallest possible entry: kind + empty name + offset + length
    const MIN_ENTRY_LEN: usize = 1 + 4 + 8 + 8;
    if count.saturating_mul(MIN_ENTRY_LEN) > reader.remaining() {
        return Err(DecodeError::Truncated {
            what: "dataset directory",
            needed: count.saturating_mul(MIN_ENTRY_LEN),
            available: reader.remaining(),
        });
    }

    let mut directory = Vec::with_capacity(count);
    for _ in 0..count {
        let kind = EntryKind::from_u8(reader.read_u8("entry kind")?)?;
        let name = reader.read_str("entry name")?;
        let offset = reader.read_u64("entry offset")?;
        let length = reader.read_u64("entry length")?;
        directory.push(DirectoryEntry {
            kind,
            name,
            offset,
            length,
        });
    }

    let body_start = reader.position();
    Ok((name, directory, &bytes[body_start..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dataset() -> DataSet {
        let mut ds = DataSet::new("sim_step_7");
        ds.add_tensor_from_slice("u", &[1.0f64, 2.0, 3.0, 4.0], vec![2, 2]).unwrap();
        ds.add_tensor_from_slice("mask", &[1u8, 0, 1], vec![3]).unwrap();
        ds.add_meta_scalar("time", 0.25f64).unwrap();
        ds.add_meta_scalar("time", 0.5f64).unwrap();
        ds.add_meta_string("solver", "cg").unwrap();
        ds.add_metadata(MetadataField::new(
            "sensor",
            crate::metadata::MetadataValue::Tensor(
                Tensor::from_slice("sensor", &[7i32, 8], vec![2]).unwrap(),
            ),
        ))
        .unwrap();
        ds
    }

    #[test]
    fn test_single_tensor_dataset_10x5() {
        let values: Vec<f32> = (0..50).map(|i| (i % 7) as f32 * 1.5).collect();
        let tensor = Tensor::from_slice("temperature", &values, vec![10, 5]).unwrap();
        let decoded = Tensor::decode("temperature", &tensor.encode()).unwrap();
        assert_eq!(decoded, tensor);

        let mut ds = DataSet::new("ds1");
        ds.add_tensor(tensor.clone()).unwrap();
        let unpacked = DataSet::unpack(&ds.pack()).unwrap();
        assert_eq!(unpacked.name(), "ds1");
        let restored = unpacked.get_tensor("temperature").unwrap();
        assert_eq!(restored, &tensor);
        assert_eq!(restored.to_vec::<f32>().unwrap(), values);
    }

    #[test]
    fn test_pack_unpack_full_dataset() {
        let ds = sample_dataset();
        let unpacked = DataSet::unpack(&ds.pack()).unwrap();
        assert_eq!(unpacked, ds);
        assert_eq!(unpacked.tensor_names().collect::<Vec<_>>(), vec!["u", "mask"]);
        assert_eq!(unpacked.get_meta_scalars::<f64>("time").unwrap(), vec![0.25, 0.5]);
        assert_eq!(unpacked.get_meta_tensors("sensor").unwrap().len(), 1);
    }

    #[test]
    fn test_pack_is_deterministic() {
        assert_eq!(sample_dataset().pack(), sample_dataset().pack());
    }

    #[test]
    fn test_insertion_order_changes_bytes_not_content() {
        let mut a = DataSet::new("ds");
        a.add_tensor_from_slice("x", &[1i16], vec![1]).unwrap();
        a.add_tensor_from_slice("y", &[2i16], vec![1]).unwrap();
        let mut b = DataSet::new("ds");
        b.add_tensor_from_slice("y", &[2i16], vec![1]).unwrap();
        b.add_tensor_from_slice("x", &[1i16], vec![1]).unwrap();

        assert_ne!(a.pack(), b.pack());
        let (ua, ub) = (DataSet::unpack(&a.pack()).unwrap(), DataSet::unpack(&b.pack()).unwrap());
        for name in ["x", "y"] {
            assert_eq!(ua.get_tensor(name).unwrap(), ub.get_tensor(name).unwrap());
        }
    }

    #[test]
    fn test_empty_dataset() {
        let ds = DataSet::new("empty");
        let bytes = ds.pack();
        // magic + version + name + count
        assert_eq!(bytes.len(), 4 + 2 + 4 + 5 + 4);
        let (name, directory, body) = read_directory(&bytes).unwrap();
        assert_eq!(name, "empty");
        assert!(directory.is_empty());
        assert!(body.is_empty());
        assert_eq!(DataSet::unpack(&bytes).unwrap(), ds);
    }

    #[test]
    fn test_directory_records_kinds() {
        let bytes = sample_dataset().pack();
        let (_, directory, _) = read_directory(&bytes).unwrap();
        let kinds: Vec<EntryKind> = directory.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EntryKind::Tensor,
                EntryKind::Tensor,
                EntryKind::Metadata,
                EntryKind::Metadata,
                EntryKind::Metadata,
                EntryKind::Metadata,
            ]
        );
    }

    #[test]
    fn test_bad_magic_and_version() {
        let mut bytes = DataSet::new("d").pack();
        bytes[0] ^= 0xff;
        assert!(matches!(
            DataSet::unpack(&bytes),
            Err(ClientError::Decode(DecodeError::InvalidMagic { .. }))
        ));

        let mut bytes = DataSet::new("d").pack();
        bytes[4] = 9;
        assert!(matches!(
            DataSet::unpack(&bytes),
            Err(ClientError::Decode(DecodeError::UnsupportedVersion(9)))
        ));
    }

    #[test]
    fn test_truncated_body_detected() {
        let bytes = sample_dataset().pack();
        let err = DataSet::unpack(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Decode(DecodeError::EntryOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_duplicate_tensor_in_buffer_is_corrupt() {
        let mut ds = DataSet::new("d");
        ds.add_tensor_from_slice("a", &[1u8], vec![1]).unwrap();
        ds.add_tensor_from_slice("b", &[2u8], vec![1]).unwrap();
        let mut bytes = ds.pack();
        // Rename the second directory entry "b" -> "a" in place
        let entry = [EntryKind::Tensor as u8, 1, 0, 0, 0, b'b'];
        let pos = bytes
            .windows(entry.len())
            .position(|w| w == entry)
            .expect("directory entry for b");
        bytes[pos + entry.len() - 1] = b'a';
        assert!(matches!(
            DataSet::unpack(&bytes),
            Err(ClientError::Decode(DecodeError::Corrupt(_)))
        ));
    }

    #[test]
    fn test_tensor_metadata_with_other_name_roundtrips() {
        let mut ds = DataSet::new("ds");
        ds.add_metadata(MetadataField::new(
            "boundary",
            crate::metadata::MetadataValue::Tensor(
                Tensor::from_slice("left_edge", &[3u16, 4], vec![2]).unwrap(),
            ),
        ))
        .unwrap();
        assert_eq!(DataSet::unpack(&ds.pack()).unwrap(), ds);
    }
}
