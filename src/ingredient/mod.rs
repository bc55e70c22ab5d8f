//! Catalog and recipe-scoped ingredient entities.
//!
//! Catalog entities ([`Fermentable`], [`Hop`], [`Yeast`]) describe an
//! ingredient's intrinsic properties and are frozen after construction.
//! Recipe-scoped entities ([`RecipeFermentable`], [`RecipeHop`]) own a copy of
//! their catalog entity plus the quantities a recipe adds, and are produced
//! through the catalog entity's `create` factory.

mod fermentable;
mod hop;
mod yeast;

pub use fermentable::{Fermentable, FermentableSnapshot, FermentableType, RecipeFermentable, RecipeFermentableSnapshot};
pub use hop::{Hop, HopForm, HopPurpose, HopSnapshot, RecipeHop, RecipeHopSnapshot};
pub use yeast::{Yeast, YeastSnapshot, YeastType};

use crate::error::RecipeError;
use crate::measurement::Measurement;

/// Read-only capability shared by every ingredient entity.
pub trait Ingredient {
    /// Display name.
    fn name(&self) -> &str;

    /// Free-form description, if the ingredient carries one.
    fn description(&self) -> Option<&str> {
        None
    }

    /// One-line human readable summary.
    fn summary(&self) -> String;
}

/// Reject negative weights and times.
pub(crate) fn non_negative(field: &'static str, measurement: Measurement) -> Result<Measurement, RecipeError> {
    if measurement.amount() < 0.0 {
        return Err(RecipeError::InvalidValue {
            field,
            message: format!("must not be negative, got {measurement}"),
        });
    }
    Ok(measurement)
}

/// Input for enumerated fields: either the symbolic name or its ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    /// Symbolic name, e.g. `"grain"`.
    Name(String),
    /// Ordinal index into the enumeration's canonical names.
    Ordinal(usize),
}

impl From<&str> for Choice {
    fn from(name: &str) -> Self {
        Choice::Name(name.to_string())
    }
}

impl From<String> for Choice {
    fn from(name: String) -> Self {
        Choice::Name(name)
    }
}

impl From<usize> for Choice {
    fn from(ordinal: usize) -> Self {
        Choice::Ordinal(ordinal)
    }
}

/// Declares a closed enumeration with canonical names, ordinal access and
/// strict parsing through [`Choice`].
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Canonical names, in ordinal order.
            pub const NAMES: &'static [&'static str] = &[$($label),+];

            const VARIANTS: &'static [$name] = &[$($name::$variant),+];

            /// Canonical name.
            pub fn as_str(&self) -> &'static str {
                Self::NAMES[self.ordinal()]
            }

            /// Ordinal index.
            pub fn ordinal(&self) -> usize {
                *self as usize
            }

            /// Resolve a name or ordinal, rejecting anything outside the set.
            pub fn resolve(choice: impl Into<$crate::ingredient::Choice>) -> Result<Self, $crate::error::InvalidEnumValue> {
                match choice.into() {
                    $crate::ingredient::Choice::Name(name) => name.parse(),
                    $crate::ingredient::Choice::Ordinal(index) => Self::VARIANTS
                        .get(index)
                        .copied()
                        .ok_or_else(|| $crate::error::InvalidEnumValue {
                            kind: $kind,
                            value: index.to_string(),
                            expected: Self::NAMES,
                        }),
                }
            }
        }

        impl From<$name> for $crate::ingredient::Choice {
            fn from(value: $name) -> Self {
                $crate::ingredient::Choice::Ordinal(value.ordinal())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::InvalidEnumValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                Self::NAMES
                    .iter()
                    .position(|name| name.eq_ignore_ascii_case(wanted))
                    .map(|index| Self::VARIANTS[index])
                    .ok_or_else(|| $crate::error::InvalidEnumValue {
                        kind: $kind,
                        value: s.to_string(),
                        expected: Self::NAMES,
                    })
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let name = <String as serde::Deserialize>::deserialize(deserializer)?;
                name.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use named_enum;
