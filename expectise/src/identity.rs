// vim: tw=80
//! Stable identities for mockable callables.
//!
//! Markers are indexed by [`Identity`], never by the callable's current
//! behavior, so a callable can be swapped between its original body, a
//! placeholder and an override without ever losing track of its records.

use std::{
    cmp::Ordering,
    fmt::{self, Display},
    hash::{Hash, Hasher},
};

/// The calling convention of a mockable callable.
///
/// The attribute macros pick the variant from the signature; nothing is
/// inferred at runtime.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Kind {
    /// A free function, owned by its module.
    Function,
    /// A method taking `self` in some form.  The receiver never takes part in
    /// argument matching.
    Method,
    /// An associated function without a receiver.
    Associated,
    /// A property-like accessor: `&self` and nothing else.
    Getter,
}

impl Kind {
    /// Does a call to this kind of callable carry an implicit receiver?
    pub fn has_receiver(self) -> bool {
        matches!(self, Kind::Method | Kind::Getter)
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Kind::Function => "function",
            Kind::Method => "method",
            Kind::Associated => "associated function",
            Kind::Getter => "getter",
        };
        f.write_str(s)
    }
}

/// Whatever a callable is attached to: a module for free functions, a type for
/// everything declared in an `impl` block.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Owner {
    /// Full module path, as given by `module_path!()`.
    Module(String),
    /// Full type path, as given by `std::any::type_name`.
    Type(String),
}

impl Owner {
    pub fn path(&self) -> &str {
        match self {
            Owner::Module(p) | Owner::Type(p) => p,
        }
    }

    /// Last path segment, without generic arguments.
    pub fn name(&self) -> &str {
        let path = self.path();
        let path = path.split('<').next().unwrap_or(path);
        path.rsplit("::").next().unwrap_or(path)
    }
}

/// A stable, unique key for one mockable callable.
///
/// Two identities are equal when they share their owner and name.  The
/// [`Kind`] is carried along for diagnostics only.
#[derive(Clone, Debug)]
pub struct Identity {
    owner: Owner,
    name: String,
    kind: Kind,
}

impl Identity {
    /// Identity of a free function defined in `module`.
    pub fn function(module: &str, name: &str) -> Self {
        Identity {
            owner: Owner::Module(module.to_owned()),
            name: name.to_owned(),
            kind: Kind::Function,
        }
    }

    /// Identity of an item declared in an `impl` block of `owner`, which is
    /// the full path of the type.
    pub fn method(owner: &str, name: &str, kind: Kind) -> Self {
        Identity {
            owner: Owner::Type(owner.to_owned()),
            name: name.to_owned(),
            kind,
        }
    }

    /// Derive an identity from the defining module and a qualified name.
    ///
    /// A qualified name without any `::` denotes a function owned by the
    /// module.  Otherwise everything before the last segment names the type
    /// that owns it, relative to `module`.
    ///
    /// # Examples
    /// ```
    /// # use expectise::*;
    /// let id = Identity::resolve("app::api", "SomeApi::get", Kind::Method);
    /// assert_eq!(id.to_string(), "app::api::SomeApi::get");
    /// assert_eq!(id.owner(), &Owner::Type("app::api::SomeApi".to_owned()));
    ///
    /// let id = Identity::resolve("app::util", "add", Kind::Function);
    /// assert_eq!(id.owner(), &Owner::Module("app::util".to_owned()));
    /// ```
    pub fn resolve(module: &str, qualname: &str, kind: Kind) -> Self {
        match qualname.rsplit_once("::") {
            Some((ty, name)) => {
                let owner = format!("{module}::{ty}");
                Identity::method(&owner, name, kind)
            },
            None => Identity {
                owner: Owner::Module(module.to_owned()),
                name: qualname.to_owned(),
                kind,
            },
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// The owner's short name, as used in diagnostics.
    pub fn owner_name(&self) -> &str {
        self.owner.name()
    }

    /// Does `name` designate this identity?
    ///
    /// Either the full qualified path, or any trailing run of whole path
    /// segments, such as `SomeApi::get`, matches.
    pub fn answers_to(&self, name: &str) -> bool {
        let full = self.to_string();
        full == name ||
            full.strip_suffix(name)
                .is_some_and(|head| head.ends_with("::"))
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}::{}", self.owner.path(), self.name)
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.name == other.name
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        self.name.hash(state);
    }
}

impl PartialOrd for Identity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.owner.cmp(&other.owner)
            .then_with(|| self.name.cmp(&other.name))
    }
}
