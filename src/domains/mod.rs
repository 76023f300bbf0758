//! Domain specialisations of a collection.
//!
//! A domain-specialised collection is an ordinary [`ColumnCollection`] whose
//! [`Domain`] payload names the columns (or per-column side tables) the
//! domain relies on. Payloads are validated once, when the domain is
//! attached; later column removal is not re-checked.

pub mod coordinate;
pub mod factory;
pub mod load_displacement;

use crate::data::collection::ColumnCollection;
use crate::data::value::Metadata;

pub use coordinate::{Coordinate, CoordinateMap};
pub use factory::{DomainCollectionFactory, DomainConstructor};
pub use load_displacement::LoadDisplacement;

pub const CORE: &str = "core";
pub const LOAD_DISPLACEMENT: &str = "load_displacement";
pub const COORDINATE: &str = "coordinate";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Domain {
    #[default]
    Core,
    LoadDisplacement(LoadDisplacement),
    Coordinate(CoordinateMap),
    /// A domain registered by a third party; `attributes` holds whatever
    /// its constructor recorded.
    Custom { name: String, attributes: Metadata },
}

impl Domain {
    pub fn name(&self) -> &str {
        match self {
            Domain::Core => CORE,
            Domain::LoadDisplacement(_) => LOAD_DISPLACEMENT,
            Domain::Coordinate(_) => COORDINATE,
            Domain::Custom { name, .. } => name,
        }
    }

    pub(crate) fn rename_column(&mut self, old: &str, new: &str) {
        match self {
            Domain::LoadDisplacement(ld) => {
                if ld.load_column == old {
                    ld.load_column = new.to_string();
                }
                if ld.displacement_column == old {
                    ld.displacement_column = new.to_string();
                }
            }
            Domain::Coordinate(map) => map.rename_column(old, new),
            Domain::Core | Domain::Custom { .. } => {}
        }
    }
}

impl ColumnCollection {
    /// Tag the collection with a third-party domain.
    pub fn into_custom_domain(self, name: impl Into<String>, attributes: Metadata) -> Self {
        self.with_domain(Domain::Custom {
            name: name.into(),
            attributes,
        })
    }

    /// Drop any domain payload.
    pub fn into_core(self) -> Self {
        self.with_domain(Domain::Core)
    }

    /// Keep the domain payload only as far as its columns survived a column
    /// subset: coordinate entries of dropped columns are pruned, and a
    /// load-displacement payload that lost a column falls back to core.
    pub(crate) fn reconcile_domain(self) -> Self {
        let domain = match self.domain().clone() {
            Domain::LoadDisplacement(ld) if ld.validate(&self).is_err() => {
                log::debug!(
                    "'{}' / '{}' no longer present, result falls back to core",
                    ld.load_column,
                    ld.displacement_column
                );
                Domain::Core
            }
            Domain::Coordinate(mut map) => {
                map.retain(|column| self.contains(column));
                Domain::Coordinate(map)
            }
            other => other,
        };
        self.with_domain(domain)
    }
}
