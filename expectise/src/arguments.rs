// vim: tw=80
//! Argument matchers.
//!
//! Matching is exact equality only.  Positional arguments are a typed tuple;
//! keyword arguments are a type-erased map for callables that take named
//! options.

use std::{
    any::Any,
    collections::btree_map::{self, BTreeMap},
    fmt::{self, Debug},
};

use pretty_assertions::Comparison;

use crate::{Identity, MockError, Result};

/// A type-erased value that can be compared with another of the same type.
pub trait Argument: Any + Debug {
    #[doc(hidden)]
    fn as_any(&self) -> &dyn Any;

    /// Equality across the type erasure.  Values of different types are
    /// never equal.
    fn eq_argument(&self, other: &dyn Argument) -> bool;
}

impl<T: Any + Debug + PartialEq> Argument for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_argument(&self, other: &dyn Argument) -> bool {
        other.as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

/// Keyword arguments of a single call, ordered by name.
#[derive(Default)]
pub struct Keywords(BTreeMap<String, Box<dyn Argument>>);

impl Keywords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](#method.insert).
    pub fn with<V: Argument>(mut self, name: &str, value: V) -> Self {
        self.insert(name, value);
        self
    }

    /// Set the argument `name`, replacing any previous value.
    pub fn insert<V: Argument>(&mut self, name: &str, value: V) {
        self.0.insert(name.to_owned(), Box::new(value));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Argument> {
        self.0.get(name).map(|b| &**b)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Box<dyn Argument>> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Debug for Keywords {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl PartialEq for Keywords {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() &&
            self.0.iter().zip(other.0.iter()).all(|((lk, lv), (rk, rv))| {
                lk == rk && lv.eq_argument(&**rv)
            })
    }
}

/// Build a [`Keywords`] map from `name = value` pairs.
///
/// # Examples
/// ```
/// # use expectise::*;
/// let kw = kwargs!{ timeout = 5u64, verbose = true };
/// assert_eq!(kw.len(), 2);
/// assert!(kw.get("timeout").is_some());
/// ```
#[macro_export]
macro_rules! kwargs {
    () => {
        $crate::Keywords::new()
    };
    ($( $name:ident = $value:expr ),+ $(,)?) => {
        $crate::Keywords::new()
            $( .with(::std::stringify!($name), $value) )+
    };
}

/// The complete argument list of one call, receiver excluded.
#[derive(Debug, PartialEq)]
pub struct Arguments<A> {
    pub positional: A,
    pub keyword: Keywords,
}

impl<A> Arguments<A> {
    pub fn new(positional: A, keyword: Keywords) -> Self {
        Arguments { positional, keyword }
    }

    /// Arguments with no keywords at all.
    pub fn positional(positional: A) -> Self {
        Arguments::new(positional, Keywords::new())
    }
}

impl<A: Debug + PartialEq> Arguments<A> {
    /// Check that `actual` equals these expected arguments.
    ///
    /// Positional arguments are checked before keyword arguments.  The error
    /// carries a line diff of whichever part differs.
    pub fn verify(&self, identity: &Identity, actual: &Arguments<A>)
        -> Result<()>
    {
        if self.positional != actual.positional {
            return Err(mismatch(identity, "positional", &self.positional,
                                &actual.positional));
        }
        if self.keyword != actual.keyword {
            return Err(mismatch(identity, "keyword", &self.keyword,
                                &actual.keyword));
        }
        Ok(())
    }
}

fn mismatch<T>(identity: &Identity, what: &str, expected: &T, actual: &T)
    -> MockError
    where T: Debug + ?Sized
{
    MockError::expectation(format!(
        "`{identity}` called with unexpected {what} arguments:\n\n{}",
        Comparison::new(expected, actual)
    ))
}
