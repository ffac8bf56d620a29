//! Store client
//!
//! Wraps the two RPC calls. `store` sends one property at a time and waits
//! for its response before sending the next, so response `i` always belongs
//! to request `i`. The whole call runs under a deadline measured from the
//! moment it starts.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use crate::cipher::{Cipher, SecretKey};
use crate::property::{Environment, Property, Query};
use crate::rpc::{Frame, FrameReader, FrameWriter, PropertySink};
use crate::value::TypedValue;
use crate::{Error, Result};

mod import;

pub use import::{flatten_toml, parse_toml_properties, read_toml_file};

/// Deadline applied to each Store call
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Client for a config store server.
///
/// Holds no connection between calls; every call dials the server.
#[derive(Clone)]
pub struct ConfigStoreClient {
    address: String,
    environment: Environment,
    cipher: Option<Arc<dyn Cipher>>,
    key: Option<SecretKey>,
    deadline: Duration,
}

impl std::fmt::Debug for ConfigStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStoreClient")
            .field("address", &self.address)
            .field("environment", &self.environment)
            .field("cipher", &self.cipher.is_some())
            .field("key", &self.key)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl ConfigStoreClient {
    pub fn new(address: impl Into<String>, environment: Environment) -> Self {
        Self {
            address: address.into(),
            environment,
            cipher: None,
            key: None,
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn with_cipher(mut self, cipher: Arc<dyn Cipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn set_key(&mut self, key: SecretKey) {
        self.key = Some(key);
    }

    pub fn set_key_from_hex(&mut self, hex_key: &str) -> Result<()> {
        self.key = Some(SecretKey::from_hex(hex_key)?);
        Ok(())
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Bind a section path for property construction and searches.
    pub fn section<S: Into<String>>(&self, path: impl IntoIterator<Item = S>) -> ConfigSection<'_> {
        ConfigSection {
            client: self,
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    /// A property in this client's environment
    pub fn new_property<S, V>(
        &self,
        section: impl IntoIterator<Item = S>,
        namespace: impl Into<String>,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Property
    where
        S: Into<String>,
        V: Into<TypedValue>,
    {
        Property::new(section, namespace, self.environment, key, values)
    }

    /// A secret property in this client's environment.
    ///
    /// Fails unless both a key and a cipher are configured.
    pub fn new_secret<S, V>(
        &self,
        section: impl IntoIterator<Item = S>,
        namespace: impl Into<String>,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Property>
    where
        S: Into<String>,
        V: Into<TypedValue>,
    {
        self.secret_parts()?;
        Ok(Property::secret(section, namespace, self.environment, key, values))
    }

    /// Store properties, returning the stored form of each, in order.
    pub async fn store(&self, properties: Vec<Property>) -> Result<Vec<Property>> {
        match tokio::time::timeout(self.deadline, self.store_inner(properties)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Store call exceeded deadline of {:?}", self.deadline);
                Err(Error::DeadlineExceeded(self.deadline))
            }
        }
    }

    async fn store_inner(&self, properties: Vec<Property>) -> Result<Vec<Property>> {
        let (mut reader, mut writer) = self.connect().await?;
        writer.send_frame(&Frame::open_store()).await?;

        let mut stored = Vec::with_capacity(properties.len());
        for mut property in properties {
            self.seal(&mut property)?;
            if let Err(e) = writer.send(property).await {
                tracing::warn!("Error sending: {}", e);
                return Err(e);
            }

            let mut response = match reader.next_frame().await? {
                Some(Frame::Property(p)) => p,
                Some(Frame::Close(status)) => {
                    status.into_result()?;
                    return Err(Error::Transport("stream closed before all responses arrived".to_string()));
                }
                Some(other) => return Err(unexpected(&other)),
                None => return Err(Error::Transport("connection closed before response".to_string())),
            };
            self.open(&mut response)?;
            stored.push(response);
        }

        writer.close().await?;
        read_trailing_status(&mut reader).await?;

        tracing::debug!(count = stored.len(), "Stored properties");
        Ok(stored)
    }

    /// Run a search and collect every streamed result.
    pub async fn search(&self, query: Query) -> Result<Vec<Property>> {
        let (mut reader, mut writer) = self.connect().await?;
        writer.send_frame(&Frame::open_search(query)).await?;
        writer.close().await?;

        let mut results = Vec::new();
        loop {
            match reader.next_frame().await? {
                Some(Frame::Property(mut p)) => {
                    self.open(&mut p)?;
                    results.push(p);
                }
                Some(Frame::Close(status)) => {
                    status.into_result()?;
                    break;
                }
                Some(other) => return Err(unexpected(&other)),
                None => return Err(Error::Transport("connection closed without status".to_string())),
            }
        }

        Ok(results)
    }

    /// Import a TOML config file (or `config.toml` inside a directory).
    ///
    /// Only `section.key` leaves are imported; they are stored with this
    /// client's environment and an empty namespace.
    pub async fn import_toml(&self, path: &Path) -> Result<Vec<Property>> {
        let table = read_toml_file(path)?;
        let properties = parse_toml_properties(&table, self.environment)?;
        tracing::info!("Found {} properties in {}", properties.len(), path.display());

        let stored = self.store(properties).await?;
        tracing::info!("Stored {} properties", stored.len());
        Ok(stored)
    }

    async fn connect(&self) -> Result<(FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>)> {
        let stream = TcpStream::connect(&self.address).await.map_err(|e| {
            tracing::warn!("Cannot connect to {}: {}", self.address, e);
            Error::Transport(format!("cannot connect to {}: {}", self.address, e))
        })?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        Ok((FrameReader::new(read_half), FrameWriter::new(write_half)))
    }

    fn secret_parts(&self) -> Result<(&dyn Cipher, &SecretKey)> {
        match (&self.cipher, &self.key) {
            (Some(cipher), Some(key)) => Ok((cipher.as_ref(), key)),
            _ => Err(Error::MissingSecretKey),
        }
    }

    /// Encrypt secret values before they leave the client.
    fn seal(&self, property: &mut Property) -> Result<()> {
        if !property.is_secret() {
            return Ok(());
        }
        let (cipher, key) = self.secret_parts()?;
        property.encrypt(cipher, key)
    }

    /// Decrypt secret values on receipt. Without a configured key the
    /// ciphertext is returned untouched.
    fn open(&self, property: &mut Property) -> Result<()> {
        if !property.is_secret() {
            return Ok(());
        }
        match self.secret_parts() {
            Ok((cipher, key)) => property.decrypt(cipher, key),
            Err(_) => {
                tracing::debug!(key = %property.key, "No secret key configured, leaving value encrypted");
                Ok(())
            }
        }
    }
}

async fn read_trailing_status(reader: &mut FrameReader<OwnedReadHalf>) -> Result<()> {
    match reader.next_frame().await? {
        Some(Frame::Close(status)) => status.into_result(),
        Some(other) => Err(unexpected(&other)),
        None => Err(Error::Transport("connection closed without status".to_string())),
    }
}

fn unexpected(frame: &Frame) -> Error {
    Error::Transport(format!("unexpected {} frame from server", frame.kind()))
}

/// A client bound to one section path.
#[derive(Debug, Clone)]
pub struct ConfigSection<'a> {
    client: &'a ConfigStoreClient,
    path: Vec<String>,
}

impl ConfigSection<'_> {
    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn new_property<V: Into<TypedValue>>(
        &self,
        namespace: impl Into<String>,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Property {
        self.client.new_property(self.path.clone(), namespace, key, values)
    }

    pub fn new_secret<V: Into<TypedValue>>(
        &self,
        namespace: impl Into<String>,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Property> {
        self.client.new_secret(self.path.clone(), namespace, key, values)
    }

    /// Search with the section path forced onto the query template.
    ///
    /// Storage does not match on sections, so results from other sections
    /// are dropped here. `query.limit` is applied after that filter; the
    /// server is asked for every match.
    pub async fn search(&self, mut query: Query) -> Result<Vec<Property>> {
        let limit = std::mem::take(&mut query.limit);
        query.property.get_or_insert_with(Property::default).section = self.path.clone();

        let mut results = self.client.search(query).await?;
        results.retain(|p| p.section == self.path);
        if limit > 0 {
            results.truncate(limit as usize);
        }
        Ok(results)
    }
}
