//! Named entities an expression may reference.
//!
//! The table is static and read-only, so it is shared freely between threads:
//!
//! - unary functions: `sin`, `cos`, `tan`, `sqrt`, `log`, `exp`, `abs`
//! - binary functions: `pow`
//! - constants: `pi`, `e`
//!
//! Names are case-sensitive and are matched through the `strum` derived
//! `FromStr` implementations.

use std::str::FromStr;

use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// A single-argument function applied with standard `f64` semantics.
///
/// Domain violations are not errors: `sqrt(-1)` is NaN and `log(0)` is `-inf`,
/// exactly what the underlying `f64` methods return.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum UnaryFn {
    Sin,
    Cos,
    Tan,
    Sqrt,
    /// Natural logarithm
    Log,
    Exp,
    Abs,
}

impl UnaryFn {
    #[inline]
    pub fn apply(self, arg: f64) -> f64 {
        match self {
            UnaryFn::Sin => arg.sin(),
            UnaryFn::Cos => arg.cos(),
            UnaryFn::Tan => arg.tan(),
            UnaryFn::Sqrt => arg.sqrt(),
            UnaryFn::Log => arg.ln(),
            UnaryFn::Exp => arg.exp(),
            UnaryFn::Abs => arg.abs(),
        }
    }
}

/// A two-argument function callable by name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryFn {
    Pow,
}

impl BinaryFn {
    #[inline]
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryFn::Pow => lhs.powf(rhs),
        }
    }
}

/// A constant resolved by name at compile time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum NamedConstant {
    Pi,
    E,
}

impl NamedConstant {
    #[inline]
    pub fn value(self) -> f64 {
        match self {
            NamedConstant::Pi => std::f64::consts::PI,
            NamedConstant::E => std::f64::consts::E,
        }
    }
}

/// What an identifier token resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    /// The free variable `x`
    Variable,
    Constant(NamedConstant),
    Unary(UnaryFn),
    Binary(BinaryFn),
}

impl Entity {
    /// Number of call arguments, or `None` for entities that are not callable.
    pub fn arity(self) -> Option<usize> {
        match self {
            Entity::Unary(_) => Some(1),
            Entity::Binary(_) => Some(2),
            Entity::Variable | Entity::Constant(_) => None,
        }
    }
}

/// Name of the single free variable.
pub const VARIABLE: &str = "x";

/// Resolves an identifier against the named-entity table.
///
/// Returns `None` for identifiers the evaluator does not know.
pub fn lookup(name: &str) -> Option<Entity> {
    if name == VARIABLE {
        return Some(Entity::Variable);
    }
    if let Ok(constant) = NamedConstant::from_str(name) {
        return Some(Entity::Constant(constant));
    }
    if let Ok(func) = UnaryFn::from_str(name) {
        return Some(Entity::Unary(func));
    }
    BinaryFn::from_str(name).ok().map(Entity::Binary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_lookup_known_names() {
        assert_eq!(lookup("x"), Some(Entity::Variable));
        assert_eq!(lookup("pi"), Some(Entity::Constant(NamedConstant::Pi)));
        assert_eq!(lookup("e"), Some(Entity::Constant(NamedConstant::E)));
        assert_eq!(lookup("sqrt"), Some(Entity::Unary(UnaryFn::Sqrt)));
        assert_eq!(lookup("log"), Some(Entity::Unary(UnaryFn::Log)));
        assert_eq!(lookup("pow"), Some(Entity::Binary(BinaryFn::Pow)));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        assert_eq!(lookup("Sin"), None);
        assert_eq!(lookup("PI"), None);
        assert_eq!(lookup("X"), None);
        assert_eq!(lookup("ln"), None);
        assert_eq!(lookup("y"), None);
    }

    #[test]
    fn test_every_name_round_trips() {
        for func in UnaryFn::iter() {
            assert_eq!(lookup(func.into()), Some(Entity::Unary(func)));
        }
        for constant in NamedConstant::iter() {
            assert_eq!(lookup(&constant.to_string()), Some(Entity::Constant(constant)));
        }
    }

    #[test]
    fn test_domain_errors_are_values() {
        assert!(UnaryFn::Sqrt.apply(-1.0).is_nan());
        assert_eq!(UnaryFn::Log.apply(0.0), f64::NEG_INFINITY);
        assert!(UnaryFn::Log.apply(-1.0).is_nan());
        assert_eq!(BinaryFn::Pow.apply(2.0, 10.0), 1024.0);
        assert_eq!(UnaryFn::Abs.apply(-2.5), 2.5);
    }

    #[test]
    fn test_arity() {
        assert_eq!(Entity::Unary(UnaryFn::Sin).arity(), Some(1));
        assert_eq!(Entity::Binary(BinaryFn::Pow).arity(), Some(2));
        assert_eq!(Entity::Variable.arity(), None);
    }
}
