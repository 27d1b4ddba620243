//! Caching schema registry client.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use relay_types::config::AvroSchemaConfig;

use crate::error::Result;
use crate::registry::{HttpRegistry, RegistryTransport};

/// A schema resolved from the registry.
#[derive(Debug, Clone)]
pub struct Schema {
    pub definition: apache_avro::Schema,
    pub subject: String,
    /// Registry version, always >= 1
    pub version: u32,
}

/// Process-lifetime cache of registry answers.
///
/// Entries are never evicted: a subject's version for a given definition and
/// the definition behind a `(subject, version)` pair do not change once the
/// registry has handed them out.
#[derive(Debug, Default)]
pub struct SchemaCache {
    versions: HashMap<String, u32>,
    fingerprints: HashMap<(String, String), u32>,
    schemas: HashMap<(String, u32), Arc<Schema>>,
}

impl SchemaCache {
    pub fn version(&self, subject: &str) -> Option<u32> {
        self.versions.get(subject).copied()
    }

    pub fn version_for(&self, subject: &str, schema: &apache_avro::Schema) -> Option<u32> {
        self.fingerprints
            .get(&(subject.to_string(), fingerprint(schema)))
            .copied()
    }

    pub fn schema(&self, subject: &str, version: u32) -> Option<Arc<Schema>> {
        self.schemas.get(&(subject.to_string(), version)).cloned()
    }

    fn insert_version(&mut self, subject: &str, definition: &apache_avro::Schema, version: u32) {
        self.versions.insert(subject.to_string(), version);
        self.fingerprints
            .insert((subject.to_string(), fingerprint(definition)), version);
        self.insert_schema(Schema {
            definition: definition.clone(),
            subject: subject.to_string(),
            version,
        });
    }

    fn insert_schema(&mut self, schema: Schema) -> Arc<Schema> {
        let key = (schema.subject.clone(), schema.version);
        let schema = Arc::new(schema);
        self.schemas.insert(key, Arc::clone(&schema));
        schema
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Schemas with the same parsing canonical form are the same schema.
fn fingerprint(schema: &apache_avro::Schema) -> String {
    schema.canonical_form()
}

/// Schema registry client with a lazily filled cache.
///
/// The cache lock is never held across a registry round trip, so two callers
/// asking for the same uncached subject at the same time may both hit the
/// registry. Both get the same answer; the second insert is a no-op in effect.
pub struct SchemaRegistryClient<R = HttpRegistry> {
    transport: R,
    cache: RwLock<SchemaCache>,
}

impl SchemaRegistryClient<HttpRegistry> {
    /// Create a client talking HTTP to the configured registry.
    pub fn connect(config: &AvroSchemaConfig) -> Result<Self> {
        Ok(Self::new(HttpRegistry::new(config)?))
    }
}

impl<R: RegistryTransport> SchemaRegistryClient<R> {
    pub fn new(transport: R) -> Self {
        Self {
            transport,
            cache: RwLock::new(SchemaCache::default()),
        }
    }

    /// Version `schema` is registered under for `subject`.
    ///
    /// Served from the cache once a subject has been resolved; registry
    /// failures are returned as is, there is no fallback version.
    pub fn get_schema_version(&self, subject: &str, schema: &apache_avro::Schema) -> Result<u32> {
        if let Some(version) = self.read_cache(|cache| cache.version(subject)) {
            tracing::trace!("Schema version cache hit for subject '{subject}': {version}");
            return Ok(version);
        }

        let version = self.transport.resolve_version(subject, schema)?;
        tracing::debug!("Resolved subject '{subject}' to version {version}");

        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert_version(subject, schema, version);

        Ok(version)
    }

    /// Schema registered for `subject` at `version`, fetched on first use.
    pub fn get_schema(&self, subject: &str, version: u32) -> Result<Arc<Schema>> {
        if let Some(schema) = self.read_cache(|cache| cache.schema(subject, version)) {
            return Ok(schema);
        }

        let definition = self.transport.fetch_schema(subject, version)?;
        tracing::debug!("Fetched schema for subject '{subject}' version {version}");

        let schema = self
            .cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert_schema(Schema {
                definition,
                subject: subject.to_string(),
                version,
            });

        Ok(schema)
    }

    /// Cached version of this exact definition under `subject`, if any.
    pub fn cached_version(&self, subject: &str, schema: &apache_avro::Schema) -> Option<u32> {
        self.read_cache(|cache| cache.version_for(subject, schema))
    }

    pub fn transport(&self) -> &R {
        &self.transport
    }

    fn read_cache<T>(&self, f: impl FnOnce(&SchemaCache) -> T) -> T {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        f(&*cache)
    }
}
