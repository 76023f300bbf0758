use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{CoordinateMap, Domain, LoadDisplacement, COORDINATE, CORE, LOAD_DISPLACEMENT};
use crate::data::collection::ColumnCollection;
use crate::data::column::Column;
use crate::data::value::Metadata;
use crate::error::{Result, TascError};
use crate::ops::OpArgs;

/// Turns a base collection into a collection of one domain, validating the
/// domain arguments against its columns.
pub type DomainConstructor =
    Arc<dyn Fn(ColumnCollection, &OpArgs) -> Result<ColumnCollection> + Send + Sync>;

/// Name-keyed catalogue of domain constructors.
#[derive(Clone)]
pub struct DomainCollectionFactory {
    constructors: BTreeMap<String, DomainConstructor>,
}

impl fmt::Debug for DomainCollectionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainCollectionFactory")
            .field("domains", &self.available_domains())
            .finish()
    }
}

impl Default for DomainCollectionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainCollectionFactory {
    /// Factory that only knows `core`.
    pub fn new() -> Self {
        let mut factory = DomainCollectionFactory {
            constructors: BTreeMap::new(),
        };
        factory.register(CORE, |collection, _args| Ok(collection.into_core()));
        factory
    }

    /// Factory with `core`, `load_displacement` and `coordinate`.
    pub fn with_builtin() -> Self {
        let mut factory = Self::new();
        factory.register(LOAD_DISPLACEMENT, LoadDisplacement::construct);
        factory.register(COORDINATE, CoordinateMap::construct);
        factory
    }

    /// Register (or replace) the constructor for `domain`.
    pub fn register<F>(&mut self, domain: &str, constructor: F)
    where
        F: Fn(ColumnCollection, &OpArgs) -> Result<ColumnCollection> + Send + Sync + 'static,
    {
        if self.constructors.contains_key(domain) {
            log::debug!("replacing constructor for domain '{domain}'");
        }
        self.constructors
            .insert(domain.to_string(), Arc::new(constructor));
    }

    pub fn available_domains(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    pub fn is_registered(&self, domain: &str) -> bool {
        self.constructors.contains_key(domain)
    }

    /// Build a collection from parts and specialise it.
    pub fn create(
        &self,
        domain: &str,
        step: Vec<f64>,
        columns: Vec<Column>,
        metadata: Metadata,
        args: &OpArgs,
    ) -> Result<ColumnCollection> {
        let constructor = self.constructor(domain)?;
        constructor(ColumnCollection::new(step, columns, metadata)?, args)
    }

    /// Specialise a copy of `collection`; the source is left untouched.
    pub fn from_collection(
        &self,
        collection: &ColumnCollection,
        domain: &str,
        args: &OpArgs,
    ) -> Result<ColumnCollection> {
        let constructor = self.constructor(domain)?;
        log::debug!(
            "converting collection from '{}' to '{domain}'",
            collection.domain_name()
        );
        // Any previous payload is dropped before the new one is validated.
        constructor(collection.clone().with_domain(Domain::Core), args)
    }

    fn constructor(&self, domain: &str) -> Result<&DomainConstructor> {
        self.constructors
            .get(domain)
            .ok_or_else(|| TascError::UnknownDomain(domain.to_string()))
    }
}
