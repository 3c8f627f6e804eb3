//! Datasource connectors.
//!
//! The engine never reads or writes storage itself. It hands `{type:path}`
//! descriptors to an [`Extractor`] (source to table) or a [`Loader`] (table
//! to destination). Concrete file, database and remote connectors live
//! outside this crate and plug in through a [`ConnectorRegistry`].

use crate::error::ConnectorError;
use crate::query::ast::DataSource;
use crate::table::Table;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

/// Produces a table from a datasource descriptor
pub trait Extractor: Send + Sync {
    fn extract(&self, source: &DataSource) -> Result<Table, ConnectorError>;
}

/// Writes a table to a destination descriptor
pub trait Loader: Send + Sync {
    fn load(&self, table: &Table, destination: &DataSource) -> Result<(), ConnectorError>;
}

/// Known datasource types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Csv,
    Excel,
    Json,
    Xml,
    Html,
    MsSql,
    Sqlite,
    Images,
    Video,
    Gee,
}

impl SourceKind {
    /// Resolve a descriptor tag, accepting aliases and any letter case.
    pub fn from_tag(tag: &str) -> Result<Self, ConnectorError> {
        let kind = match tag.to_ascii_lowercase().as_str() {
            "csv" => SourceKind::Csv,
            "excel" => SourceKind::Excel,
            "json" => SourceKind::Json,
            "xml" => SourceKind::Xml,
            "html" => SourceKind::Html,
            "mssql" => SourceKind::MsSql,
            "sqlite" => SourceKind::Sqlite,
            "images" | "image" | "folder" => SourceKind::Images,
            "video" => SourceKind::Video,
            "gee" | "google_earth_engine" => SourceKind::Gee,
            _ => return Err(ConnectorError::UnsupportedType(tag.to_string())),
        };
        Ok(kind)
    }

    /// Canonical tag
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Csv => "csv",
            SourceKind::Excel => "excel",
            SourceKind::Json => "json",
            SourceKind::Xml => "xml",
            SourceKind::Html => "html",
            SourceKind::MsSql => "mssql",
            SourceKind::Sqlite => "sqlite",
            SourceKind::Images => "images",
            SourceKind::Video => "video",
            SourceKind::Gee => "gee",
        }
    }

    /// Media and remote-sensing sources are read-only.
    pub fn is_writable(&self) -> bool {
        !matches!(
            self,
            SourceKind::Images | SourceKind::Video | SourceKind::Gee
        )
    }
}

impl FromStr for SourceKind {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceKind::from_tag(s)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl DataSource {
    /// The datasource type named by the tag
    pub fn kind(&self) -> Result<SourceKind, ConnectorError> {
        SourceKind::from_tag(&self.tag)
    }
}

/// Dispatches descriptors to the connector registered for their type
#[derive(Default, Clone)]
pub struct ConnectorRegistry {
    extractors: HashMap<SourceKind, Arc<dyn Extractor>>,
    loaders: HashMap<SourceKind, Arc<dyn Loader>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one connector as both extractor and loader for `kind`.
    pub fn register<C>(&mut self, kind: SourceKind, connector: Arc<C>)
    where
        C: Extractor + Loader + 'static,
    {
        self.extractors.insert(kind, connector.clone());
        self.loaders.insert(kind, connector);
    }

    pub fn register_extractor(&mut self, kind: SourceKind, extractor: Arc<dyn Extractor>) {
        self.extractors.insert(kind, extractor);
    }

    pub fn register_loader(&mut self, kind: SourceKind, loader: Arc<dyn Loader>) {
        self.loaders.insert(kind, loader);
    }

    pub fn has_extractor(&self, kind: SourceKind) -> bool {
        self.extractors.contains_key(&kind)
    }

    pub fn has_loader(&self, kind: SourceKind) -> bool {
        self.loaders.contains_key(&kind)
    }
}

impl fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut extractors: Vec<_> = self.extractors.keys().map(SourceKind::as_str).collect();
        let mut loaders: Vec<_> = self.loaders.keys().map(SourceKind::as_str).collect();
        extractors.sort_unstable();
        loaders.sort_unstable();
        f.debug_struct("ConnectorRegistry")
            .field("extractors", &extractors)
            .field("loaders", &loaders)
            .finish()
    }
}

impl Extractor for ConnectorRegistry {
    fn extract(&self, source: &DataSource) -> Result<Table, ConnectorError> {
        let kind = source.kind()?;
        let extractor = self
            .extractors
            .get(&kind)
            .ok_or_else(|| ConnectorError::Unregistered(kind.to_string()))?;
        extractor.extract(source)
    }
}

impl Loader for ConnectorRegistry {
    fn load(&self, table: &Table, destination: &DataSource) -> Result<(), ConnectorError> {
        let kind = destination.kind()?;
        if !kind.is_writable() {
            return Err(ConnectorError::NotWritable(destination.tag.clone()));
        }
        let loader = self
            .loaders
            .get(&kind)
            .ok_or_else(|| ConnectorError::Unregistered(kind.to_string()))?;
        loader.load(table, destination)
    }
}

/// Thread-safe in-memory table store keyed by descriptor path.
///
/// Loading to a path replaces whatever table was stored there.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`MemoryConnector::insert`]
    pub fn with_table(self, path: impl Into<String>, table: Table) -> Result<Self, ConnectorError> {
        self.insert(path, table)?;
        Ok(self)
    }

    pub fn insert(&self, path: impl Into<String>, table: Table) -> Result<(), ConnectorError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| ConnectorError::LockPoisoned)?;
        tables.insert(path.into(), table);
        Ok(())
    }

    pub fn get(&self, path: &str) -> Result<Option<Table>, ConnectorError> {
        let tables = self.tables.read().map_err(|_| ConnectorError::LockPoisoned)?;
        Ok(tables.get(path).cloned())
    }

    pub fn remove(&self, path: &str) -> Result<Option<Table>, ConnectorError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| ConnectorError::LockPoisoned)?;
        Ok(tables.remove(path))
    }

    pub fn len(&self) -> Result<usize, ConnectorError> {
        let tables = self.tables.read().map_err(|_| ConnectorError::LockPoisoned)?;
        Ok(tables.len())
    }

    pub fn is_empty(&self) -> Result<bool, ConnectorError> {
        Ok(self.len()? == 0)
    }
}

impl Extractor for MemoryConnector {
    fn extract(&self, source: &DataSource) -> Result<Table, ConnectorError> {
        self.get(&source.path)?
            .ok_or_else(|| ConnectorError::NotFound(source.path.clone()))
    }
}

impl Loader for MemoryConnector {
    fn load(&self, table: &Table, destination: &DataSource) -> Result<(), ConnectorError> {
        self.insert(destination.path.clone(), table.clone())
    }
}
