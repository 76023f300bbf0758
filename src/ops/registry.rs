use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use super::{OpArgs, OpOutput};
use crate::data::collection::ColumnCollection;
use crate::domains::{DomainCollectionFactory, CORE};
use crate::error::{Result, TascError};

/// Shared signature of every registered operation.
pub type OperationFn =
    Arc<dyn Fn(&ColumnCollection, &OpArgs) -> Result<OpOutput> + Send + Sync>;

/// Catalogue of `(domain, name) → operation`.
///
/// Every domain sees the `core` operations unless it registers the same
/// name itself; that shadowing applies to that one domain only.
#[derive(Clone, Default)]
pub struct OperationRegistry {
    operations: BTreeMap<String, BTreeMap<String, OperationFn>>,
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: BTreeMap<&str, Vec<&str>> = self
            .operations
            .iter()
            .map(|(d, ops)| (d.as_str(), ops.keys().map(String::as_str).collect()))
            .collect();
        f.debug_struct("OperationRegistry")
            .field("operations", &names)
            .finish()
    }
}

impl OperationRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in operation, converting domains through
    /// the built-in factory.
    pub fn with_builtin() -> Self {
        Self::with_factory(DomainCollectionFactory::with_builtin())
    }

    /// Registry with every built-in operation; `as_domain` converts through
    /// `factory`, so third-party domains registered there are reachable.
    pub fn with_factory(factory: DomainCollectionFactory) -> Self {
        let mut registry = Self::new();
        super::core::register(&mut registry, Arc::new(factory));
        super::load_displacement::register(&mut registry);
        super::coordinate::register(&mut registry);
        log::debug!(
            "built-in registry ready: {} domains",
            registry.operations.len()
        );
        registry
    }

    /// Register `f` under `(domain, name)`. Re-registration replaces the
    /// previous entry.
    pub fn register<F>(&mut self, domain: &str, name: &str, f: F)
    where
        F: Fn(&ColumnCollection, &OpArgs) -> Result<OpOutput> + Send + Sync + 'static,
    {
        self.insert(domain, name, Arc::new(f));
    }

    /// Register one function under `domain` and every domain in
    /// `shared_with`.
    pub fn register_shared<F>(&mut self, domain: &str, shared_with: &[&str], name: &str, f: F)
    where
        F: Fn(&ColumnCollection, &OpArgs) -> Result<OpOutput> + Send + Sync + 'static,
    {
        let op: OperationFn = Arc::new(f);
        self.insert(domain, name, op.clone());
        for other in shared_with {
            self.insert(other, name, op.clone());
        }
    }

    fn insert(&mut self, domain: &str, name: &str, op: OperationFn) {
        let previous = self
            .operations
            .entry(domain.to_string())
            .or_default()
            .insert(name.to_string(), op);
        if previous.is_some() {
            log::debug!("operation '{domain}.{name}' re-registered, last registration wins");
        } else {
            log::debug!("registered operation '{domain}.{name}'");
        }
    }

    /// Look `name` up in `domain`, then in `core`.
    pub fn resolve(&self, domain: &str, name: &str) -> Result<OperationFn> {
        self.operations
            .get(domain)
            .and_then(|ops| ops.get(name))
            .or_else(|| self.operations.get(CORE).and_then(|ops| ops.get(name)))
            .cloned()
            .ok_or_else(|| TascError::UnknownOperation {
                domain: domain.to_string(),
                name: name.to_string(),
            })
    }

    /// Whether `name` resolves for `domain`, counting the core fallback.
    pub fn contains(&self, domain: &str, name: &str) -> bool {
        self.resolve(domain, name).is_ok()
    }

    /// Sorted union of the domain's own names and the core names.
    pub fn list_operations(&self, domain: &str) -> Vec<String> {
        let mut names = BTreeSet::new();
        for d in [CORE, domain] {
            if let Some(ops) = self.operations.get(d) {
                names.extend(ops.keys().cloned());
            }
        }
        names.into_iter().collect()
    }

    /// Domains with at least one registered operation.
    pub fn domains(&self) -> Vec<&str> {
        self.operations.keys().map(String::as_str).collect()
    }
}
