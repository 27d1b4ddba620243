//! Schema registry transport.
//!
//! The registry is an opaque resolver: this crate asks it which version a
//! schema has under a subject, and which schema a `(subject, version)` pair
//! names. Compatibility checks and evolution stay on the registry side.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use relay_types::config::{AvroSchemaConfig, BasicAuth};
use serde::Deserialize;

use crate::error::{AvroError, Result};

const SCHEMA_REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Round trips to an external schema registry.
pub trait RegistryTransport {
    /// Version under which `schema` is registered for `subject`.
    fn resolve_version(&self, subject: &str, schema: &apache_avro::Schema) -> Result<u32>;

    /// Schema registered for `subject` at `version`.
    fn fetch_schema(&self, subject: &str, version: u32) -> Result<apache_avro::Schema>;
}

impl<R: RegistryTransport + ?Sized> RegistryTransport for Box<R> {
    fn resolve_version(&self, subject: &str, schema: &apache_avro::Schema) -> Result<u32> {
        (**self).resolve_version(subject, schema)
    }

    fn fetch_schema(&self, subject: &str, version: u32) -> Result<apache_avro::Schema> {
        (**self).fetch_schema(subject, version)
    }
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: u32,
}

#[derive(Debug, Deserialize)]
struct SchemaResponse {
    schema: String,
}

/// Registry transport over the Confluent-compatible REST API.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: Client,
    base_url: Url,
    basic_auth: Option<BasicAuth>,
}

impl HttpRegistry {
    pub fn new(config: &AvroSchemaConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(AvroError::InvalidConfig(
                "schema registry url must not be empty".to_string(),
            ));
        }
        let base_url = Url::parse(&config.url).map_err(|e| {
            AvroError::InvalidConfig(format!("invalid schema registry url '{}': {e}", config.url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AvroError::InvalidConfig(format!(
                "schema registry url '{}' cannot carry a path",
                config.url
            )));
        }

        let options = &config.request_options;
        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| AvroError::InvalidConfig(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                AvroError::InvalidConfig(format!("invalid value for header '{name}': {e}"))
            })?;
            headers.insert(name, value);
        }

        if !config.ssl_verify {
            tracing::warn!(
                "TLS certificate verification is disabled for schema registry {}",
                config.url
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(
                options.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            ))
            .danger_accept_invalid_certs(!config.ssl_verify)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            basic_auth: options.basic_auth.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/subjects/{subject}/{tail..}` with every segment percent-encoded.
    fn subject_url(&self, subject: &str, tail: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("subjects")
                .push(subject)
                .extend(tail);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.basic_auth {
            Some(auth) => request.basic_auth(&auth.username, auth.password.as_ref()),
            None => request,
        }
    }

    fn check(subject: &str, url: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AvroError::UnknownSubject {
                subject: subject.to_string(),
            });
        }
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            tracing::debug!("Schema registry request to {url} failed with {status}");
            return Err(AvroError::Registry {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

impl RegistryTransport for HttpRegistry {
    fn resolve_version(&self, subject: &str, schema: &apache_avro::Schema) -> Result<u32> {
        let url = self.subject_url(subject, &[]);
        let definition =
            serde_json::to_string(schema).map_err(|e| AvroError::InvalidPayload(e.to_string()))?;
        let body = serde_json::json!({ "schema": definition }).to_string();

        tracing::debug!("Resolving schema version for subject '{subject}' at {url}");

        let response = self
            .authorize(self.client.post(url.clone()))
            .header(CONTENT_TYPE, SCHEMA_REGISTRY_CONTENT_TYPE)
            .body(body)
            .send()?;
        let response: VersionResponse = Self::check(subject, url.as_str(), response)?.json()?;

        Ok(response.version)
    }

    fn fetch_schema(&self, subject: &str, version: u32) -> Result<apache_avro::Schema> {
        let url = self.subject_url(subject, &["versions", &version.to_string()]);

        tracing::debug!("Fetching schema for subject '{subject}' version {version} at {url}");

        let response = self.authorize(self.client.get(url.clone())).send()?;
        let response: SchemaResponse = Self::check(subject, url.as_str(), response)?.json()?;

        Ok(apache_avro::Schema::parse_str(&response.schema)?)
    }
}
