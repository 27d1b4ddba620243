//! Outbound record type.

/// A record to be produced.
///
/// Records are immutable once built: the `with_*` builders consume the record
/// and return a new one, so a middleware that wants to change a record builds
/// its replacement and hands that to the continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    key: Vec<u8>,
    payload: Vec<u8>,
    partition: Option<i32>,
}

impl Record {
    /// Create a record for any partition with an empty key.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            key: Vec::new(),
            payload: payload.into(),
            partition: None,
        }
    }

    pub fn with_key(self, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            ..self
        }
    }

    pub fn with_payload(self, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            ..self
        }
    }

    /// Pin the record to a partition. `None` means any partition.
    pub fn with_partition(self, partition: Option<i32>) -> Self {
        Self { partition, ..self }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn partition(&self) -> Option<i32> {
        self.partition
    }
}
