use std::collections::BTreeSet;

use super::core::{combine, search};
use super::{OpArgs, OpOutput, OperationRegistry};
use crate::data::collection::{ColumnCollection, Row};
use crate::data::column::Column;
use crate::data::value::{Cell, Value};
use crate::error::{Result, TascError};

// ---------------------------------------------------------------------------
// CollectionOps – chain over one collection
// ---------------------------------------------------------------------------

/// A chain bound to one collection snapshot.
///
/// The active domain is always the bound collection's domain. Every step
/// consumes the proxy and returns the next one, so a failed step leaves
/// nothing to continue from; the caller's own collection was cloned when
/// the chain started and is never touched.
#[derive(Debug, Clone)]
pub struct CollectionOps<'r> {
    registry: &'r OperationRegistry,
    collection: ColumnCollection,
}

/// Result of one chained call.
#[derive(Debug)]
pub enum ChainStep<'r> {
    Ops(CollectionOps<'r>),
    List(CollectionListOps<'r>),
    Value(Value),
}

impl<'r> CollectionOps<'r> {
    pub fn new(registry: &'r OperationRegistry, collection: ColumnCollection) -> Self {
        CollectionOps {
            registry,
            collection,
        }
    }

    pub fn domain(&self) -> &str {
        self.collection.domain_name()
    }

    /// Peek at the bound snapshot without ending the chain.
    pub fn collection(&self) -> &ColumnCollection {
        &self.collection
    }

    /// Resolve `name` for the active domain and run it.
    pub fn invoke(self, name: &str, args: OpArgs) -> Result<ChainStep<'r>> {
        let op = self.registry.resolve(self.domain(), name)?;
        log::debug!("chain step '{}.{name}' on {} rows", self.domain(), self.collection.len());
        let registry = self.registry;
        Ok(match op(&self.collection, &args)? {
            OpOutput::Collection(collection) => ChainStep::Ops(CollectionOps::new(registry, collection)),
            OpOutput::Collections(items) => ChainStep::List(CollectionListOps::new(registry, items)),
            OpOutput::Value(value) => ChainStep::Value(value),
        })
    }

    /// Run an operation that must return a collection.
    pub fn call(self, name: &str, args: OpArgs) -> Result<Self> {
        match self.invoke(name, args)? {
            ChainStep::Ops(ops) => Ok(ops),
            other => Err(unexpected(name, "a collection", &other)),
        }
    }

    /// Run an operation that must return a terminal value.
    pub fn value(self, name: &str, args: OpArgs) -> Result<Value> {
        match self.invoke(name, args)? {
            ChainStep::Value(value) => Ok(value),
            other => Err(unexpected(name, "a value", &other)),
        }
    }

    /// Run an operation that must split the collection.
    pub fn split(self, name: &str, args: OpArgs) -> Result<CollectionListOps<'r>> {
        match self.invoke(name, args)? {
            ChainStep::List(list) => Ok(list),
            other => Err(unexpected(name, "a list of collections", &other)),
        }
    }

    /// Convert to another domain through the registered `as_domain`
    /// operation; `args` carries the domain arguments.
    pub fn as_domain(self, domain: &str, args: OpArgs) -> Result<Self> {
        let mut args = args;
        args.named.insert("domain".to_string(), Value::from(domain));
        self.call("as_domain", args)
    }

    /// Apply a closure to the snapshot.
    pub fn pipe<F>(self, f: F) -> Result<Self>
    where
        F: FnOnce(ColumnCollection) -> Result<ColumnCollection>,
    {
        let registry = self.registry;
        Ok(CollectionOps::new(registry, f(self.collection)?))
    }

    /// Keep the rows for which `condition` holds.
    pub fn search_by_condition<P>(self, condition: P) -> Result<Self>
    where
        P: Fn(&Row) -> bool,
    {
        self.pipe(|c| search::search_by_condition(&c, condition))
    }

    /// Combine two numeric columns element-wise into `result_column`.
    pub fn custom_combine<F>(
        self,
        column1: &str,
        column2: &str,
        result_column: &str,
        combine: F,
    ) -> Result<Self>
    where
        F: Fn(f64, f64) -> f64,
    {
        self.pipe(|c| combine::custom_combine(&c, column1, column2, result_column, combine))
    }

    /// Log the snapshot shape at debug level and continue.
    pub fn debug(self, message: &str) -> Self {
        log::debug!(
            "{message}: domain={} rows={} columns={:?}",
            self.domain(),
            self.collection.len(),
            self.collection.column_names()
        );
        self
    }

    pub fn available_operations(&self) -> Vec<String> {
        self.registry.list_operations(self.domain())
    }

    pub fn end(self) -> ColumnCollection {
        self.collection
    }
}

fn unexpected(operation: &str, expected: &'static str, found: &ChainStep<'_>) -> TascError {
    TascError::UnexpectedOutput {
        operation: operation.to_string(),
        expected,
        found: match found {
            ChainStep::Ops(_) => "a collection",
            ChainStep::List(_) => "a list of collections",
            ChainStep::Value(_) => "a value",
        },
    }
}

// ---------------------------------------------------------------------------
// CollectionListOps – chain over a split
// ---------------------------------------------------------------------------

/// A chain over several collections, produced by splitting operations.
#[derive(Debug, Clone)]
pub struct CollectionListOps<'r> {
    registry: &'r OperationRegistry,
    items: Vec<ColumnCollection>,
}

impl<'r> CollectionListOps<'r> {
    pub fn new(registry: &'r OperationRegistry, items: Vec<ColumnCollection>) -> Self {
        CollectionListOps { registry, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Continue a chain on one element.
    pub fn get(&self, index: usize) -> Result<CollectionOps<'r>> {
        let item = self.items.get(index).ok_or_else(|| {
            TascError::invalid(format!("index {index} is out of range for {} collections", self.items.len()))
        })?;
        Ok(CollectionOps::new(self.registry, item.clone()))
    }

    /// Run `name` on every element; each must return a collection.
    pub fn map(self, name: &str, args: OpArgs) -> Result<Self> {
        let registry = self.registry;
        let items = self
            .items
            .into_iter()
            .map(|item| {
                CollectionOps::new(registry, item)
                    .call(name, args.clone())
                    .map(CollectionOps::end)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CollectionListOps::new(registry, items))
    }

    /// Run a value-returning operation on every element.
    pub fn map_values(self, name: &str, args: OpArgs) -> Result<Vec<Value>> {
        let registry = self.registry;
        self.items
            .into_iter()
            .map(|item| CollectionOps::new(registry, item).value(name, args.clone()))
            .collect()
    }

    pub fn filter<P>(self, predicate: P) -> Self
    where
        P: Fn(&ColumnCollection) -> bool,
    {
        let registry = self.registry;
        let items = self.items.into_iter().filter(|c| predicate(c)).collect();
        CollectionListOps::new(registry, items)
    }

    /// Stack every element row-wise.
    ///
    /// The result uses the first element's metadata and domain; columns are
    /// the union in first-seen order, padded with missing values where an
    /// element lacks one.
    pub fn concat(self) -> Result<CollectionOps<'r>> {
        let registry = self.registry;
        let Some(first) = self.items.first() else {
            return Err(TascError::EmptyData("collection list".to_string()));
        };

        let mut names: Vec<String> = Vec::new();
        let mut seen = BTreeSet::new();
        for item in &self.items {
            for name in item.column_names() {
                if seen.insert(name.to_string()) {
                    names.push(name.to_string());
                }
            }
        }

        let step: Vec<f64> = self.items.iter().flat_map(|c| c.step().iter().copied()).collect();
        let mut columns = Vec::with_capacity(names.len());
        for name in &names {
            let mut values: Vec<Cell> = Vec::with_capacity(step.len());
            let mut template: Option<&Column> = None;
            for item in &self.items {
                match item.columns().iter().find(|c| c.name() == name) {
                    Some(col) => {
                        template.get_or_insert(col);
                        values.extend(col.values().iter().cloned());
                    }
                    None => values.extend(std::iter::repeat(None).take(item.len())),
                }
            }
            let column = match template {
                Some(t) => t.with_values(values),
                None => Column::new(name.clone(), values),
            };
            columns.push(column);
        }

        let combined = ColumnCollection::new(step, columns, first.metadata().clone())?
            .with_domain(first.domain().clone());
        Ok(CollectionOps::new(registry, combined))
    }

    /// Convert every element to `domain`.
    pub fn as_domain(self, domain: &str, args: OpArgs) -> Result<Self> {
        let registry = self.registry;
        let items = self
            .items
            .into_iter()
            .map(|item| {
                CollectionOps::new(registry, item)
                    .as_domain(domain, args.clone())
                    .map(CollectionOps::end)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CollectionListOps::new(registry, items))
    }

    pub fn end_all(self) -> Vec<ColumnCollection> {
        self.items
    }
}

// ---------------------------------------------------------------------------
// Entry points on the collection
// ---------------------------------------------------------------------------

impl ColumnCollection {
    /// Start a chain on a copy of this collection.
    pub fn ops<'r>(&self, registry: &'r OperationRegistry) -> CollectionOps<'r> {
        CollectionOps::new(registry, self.clone())
    }

    /// Start a chain that takes ownership of this collection.
    pub fn into_ops(self, registry: &OperationRegistry) -> CollectionOps<'_> {
        CollectionOps::new(registry, self)
    }
}
