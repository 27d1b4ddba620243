//! Subject+version Avro wire format.

use std::sync::Arc;

use apache_avro::types::Value;
use bytes::{Buf, BufMut, BytesMut};
use relay_types::AvroPayload;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::SchemaRegistryClient;
use crate::error::{AvroError, Result};
use crate::registry::{HttpRegistry, RegistryTransport};

/// First byte of every payload framed with subject and version.
pub const MAGIC_BYTE_SUBJECT_VERSION: u8 = 0x00;

/// Magic byte, subject length and version.
const HEADER_OVERHEAD: usize = 1 + 4 + 4;

/// Frame an Avro datum with its subject and version.
pub fn frame(subject: &str, version: u32, datum: &[u8]) -> Result<Vec<u8>> {
    let subject_len = u32::try_from(subject.len()).map_err(|_| {
        AvroError::WireFormat(format!("subject is too long: {} bytes", subject.len()))
    })?;

    let mut buf = BytesMut::with_capacity(HEADER_OVERHEAD + subject.len() + datum.len());
    buf.put_u8(MAGIC_BYTE_SUBJECT_VERSION);
    buf.put_u32(subject_len);
    buf.put_slice(subject.as_bytes());
    buf.put_u32(version);
    buf.put_slice(datum);

    Ok(buf.to_vec())
}

/// Split a framed payload into subject, version and the Avro datum.
pub fn unframe(mut bytes: &[u8]) -> Result<(String, u32, &[u8])> {
    if bytes.remaining() < 1 {
        return Err(AvroError::WireFormat("payload is empty".to_string()));
    }
    let magic = bytes.get_u8();
    if magic != MAGIC_BYTE_SUBJECT_VERSION {
        return Err(AvroError::WireFormat(format!(
            "unexpected magic byte {magic:#04x}, expected {MAGIC_BYTE_SUBJECT_VERSION:#04x}"
        )));
    }

    if bytes.remaining() < 4 {
        return Err(AvroError::WireFormat(
            "payload ends before the subject length".to_string(),
        ));
    }
    let subject_len = bytes.get_u32() as usize;
    if bytes.remaining() < subject_len {
        return Err(AvroError::WireFormat(format!(
            "payload ends inside the subject: need {subject_len} bytes, have {}",
            bytes.remaining()
        )));
    }
    let subject = std::str::from_utf8(&bytes[..subject_len])
        .map_err(|e| AvroError::WireFormat(format!("subject is not valid UTF-8: {e}")))?
        .to_string();
    bytes.advance(subject_len);

    if bytes.remaining() < 4 {
        return Err(AvroError::WireFormat(
            "payload ends before the schema version".to_string(),
        ));
    }
    let version = bytes.get_u32();

    Ok((subject, version, bytes))
}

/// Serializes values into the subject+version wire format.
///
/// The version is resolved through the registry client, so the first encode
/// of a subject costs a registry round trip and later ones are cache hits.
pub struct AvroWireEncoder<R = HttpRegistry> {
    registry: Arc<SchemaRegistryClient<R>>,
}

impl<R: RegistryTransport> AvroWireEncoder<R> {
    pub fn new(registry: Arc<SchemaRegistryClient<R>>) -> Self {
        Self { registry }
    }

    /// Encode any serde-serializable value with `schema`.
    pub fn encode<T: Serialize + ?Sized>(
        &self,
        subject: &str,
        schema: &apache_avro::Schema,
        value: &T,
    ) -> Result<Vec<u8>> {
        let value = apache_avro::to_value(value)?;
        let resolved = value.clone().resolve(schema)?;
        check_int_narrowing(&value, &resolved, "$")?;
        self.encode_value(subject, schema, resolved)
    }

    /// Encode an Avro value that already matches `schema`.
    pub fn encode_value(
        &self,
        subject: &str,
        schema: &apache_avro::Schema,
        value: Value,
    ) -> Result<Vec<u8>> {
        let version = self.registry.get_schema_version(subject, schema)?;
        let datum = apache_avro::to_avro_datum(schema, value)?;
        frame(subject, version, &datum)
    }

    pub fn registry(&self) -> &Arc<SchemaRegistryClient<R>> {
        &self.registry
    }
}

/// Fail when resolving squeezed a long into an int field it does not fit.
///
/// Schema resolution truncates such values instead of rejecting them.
fn check_int_narrowing(original: &Value, resolved: &Value, path: &str) -> Result<()> {
    match (original, resolved) {
        (Value::Union(_, original), Value::Union(_, resolved)) => {
            check_int_narrowing(original, resolved, path)
        }
        (_, Value::Union(_, resolved)) => check_int_narrowing(original, resolved, path),
        (Value::Long(n), Value::Int(i)) if *n != i64::from(*i) => Err(AvroError::InvalidPayload(
            format!("{path}: {n} does not fit into an Avro int"),
        )),
        (Value::Record(original), Value::Record(resolved)) => {
            for (name, resolved) in resolved {
                if let Some((_, original)) = original.iter().find(|(field, _)| field == name) {
                    check_int_narrowing(original, resolved, &format!("{path}.{name}"))?;
                }
            }
            Ok(())
        }
        (Value::Map(original), Value::Record(resolved)) => {
            for (name, resolved) in resolved {
                if let Some(original) = original.get(name) {
                    check_int_narrowing(original, resolved, &format!("{path}.{name}"))?;
                }
            }
            Ok(())
        }
        (Value::Map(original), Value::Map(resolved)) => {
            for (key, resolved) in resolved {
                if let Some(original) = original.get(key) {
                    check_int_narrowing(original, resolved, &format!("{path}.{key}"))?;
                }
            }
            Ok(())
        }
        (Value::Array(original), Value::Array(resolved)) => {
            for (index, (original, resolved)) in original.iter().zip(resolved).enumerate() {
                check_int_narrowing(original, resolved, &format!("{path}[{index}]"))?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Reads the subject+version wire format back.
pub struct AvroWireDecoder<R = HttpRegistry> {
    registry: Arc<SchemaRegistryClient<R>>,
}

impl<R: RegistryTransport> AvroWireDecoder<R> {
    pub fn new(registry: Arc<SchemaRegistryClient<R>>) -> Self {
        Self { registry }
    }

    /// Decode a framed payload with the schema registered for its
    /// `(subject, version)`.
    pub fn decode(&self, bytes: &[u8]) -> Result<AvroPayload> {
        let (subject, version, mut datum) = unframe(bytes)?;
        let schema = self.registry.get_schema(&subject, version)?;

        let value = apache_avro::from_avro_datum(&schema.definition, &mut datum, None)?;
        if !datum.is_empty() {
            return Err(AvroError::WireFormat(format!(
                "{} trailing bytes after the Avro datum",
                datum.len()
            )));
        }

        Ok(AvroPayload {
            subject,
            version,
            value,
        })
    }

    /// Decode a framed payload straight into a serde type.
    pub fn decode_into<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        let payload = self.decode(bytes)?;
        Ok(apache_avro::from_value(&payload.value)?)
    }
}
