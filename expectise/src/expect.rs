// vim: tw=80
//! The expectation builder.

use std::{any::Any, fmt, marker::PhantomData};

use crate::{
    session::ReferenceMode,
    Hook,
    Identity,
    Keywords,
    Mock,
    MockError,
    Raise,
    Result,
    Session,
};

/// Declares one expected call of a mocked callable.
///
/// Creating an `Expect` opens a new slot in the callable's mock.  The builder
/// methods then refine that slot.  Misuse, such as scripting two return
/// values for the same call, panics like a failed assertion.
///
/// # Examples
/// ```
/// # use expectise::*;
/// #[mockable]
/// fn fetch(key: &str) -> Option<u32> {
///     Some(key.len() as u32)
/// }
///
/// let _expectations = Expectations::new();
/// mock(fetch_hook());
/// Expect::new(fetch_hook()).to_receive(("answer".to_owned(),))
///     .and_return(Some(42));
/// Expect::new(fetch_hook()).and_return(None);
/// assert_eq!(fetch("answer"), Some(42));
/// assert_eq!(fetch("anything"), None);
/// ```
#[must_use = "an `Expect` statement should script an outcome"]
pub struct Expect<A: 'static, R: 'static> {
    identity: Identity,
    _types: PhantomData<fn(A) -> R>,
}

impl<A: 'static, R: 'static> Expect<A, R> {
    /// Expect one more call of the callable behind `hook`.
    ///
    /// # Panics
    ///
    /// Panics if the callable is not currently mocked.
    pub fn new(hook: Hook<A, R>) -> Self {
        Self::try_new(hook).unwrap_or_else(|e| panic!("{}", e))
    }

    /// Non-panicking version of [`new`](#method.new).
    pub fn try_new(hook: Hook<A, R>) -> Result<Self> {
        hook.ensure_registered()?;
        let identity = hook.identity();
        Session::with(|session| {
            session.use_mode(ReferenceMode::Hook)?;
            Self::open(session, &identity)
        })?;
        Ok(Self::from_identity(identity))
    }

    /// Expect one more call of the callable that answers to `name`.
    ///
    /// Any trailing run of whole path segments of the callable's qualified
    /// name will do, as long as no other mocked callable answers to it.  A
    /// test must use either names or hooks, not both.
    ///
    /// # Panics
    ///
    /// Panics if no mocked callable, or more than one, answers to `name`.
    pub fn named(name: &str) -> Self {
        Self::try_named(name).unwrap_or_else(|e| panic!("{}", e))
    }

    /// Non-panicking version of [`named`](#method.named).
    pub fn try_named(name: &str) -> Result<Self> {
        let identity = Session::with(|session| {
            session.use_mode(ReferenceMode::Name)?;
            let identity = session.resolve_name(name)?;
            Self::open(session, &identity)?;
            Ok::<_, MockError>(identity)
        })?;
        Ok(Self::from_identity(identity))
    }

    fn from_identity(identity: Identity) -> Self {
        Expect { identity, _types: PhantomData }
    }

    fn open(session: &mut Session, identity: &Identity) -> Result<()> {
        let marker = session.lookup::<A, R>(identity)?;
        if !marker.is_enabled() && !marker.is_disabled() {
            // The environment may have changed since registration
            marker.enable();
        }
        if !marker.is_enabled() {
            return Err(MockError::environment(format!(
                "Callable `{identity}` is not mocked in the current \
                 environment, so this instantiation is not allowed. It was \
                 either explicitly disabled, or its trigger does not hold."
            )));
        }
        marker.mock_mut().open_new_slot();
        Ok(())
    }

    /// The callable this statement is about.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    fn update<F>(&mut self, f: F) -> &mut Self
        where F: FnOnce(&mut Mock<A, R>) -> Result<()>
    {
        let r = Session::with(|session| {
            f(session.lookup::<A, R>(&self.identity)?.mock_mut())
        });
        if let Err(e) = r {
            panic!("{}", e);
        }
        self
    }

    /// Require the call to receive exactly these positional arguments, and
    /// no keyword arguments.
    ///
    /// `args` is always a tuple, with reference arguments in their owned
    /// form: a `&str` argument is matched by a `String`.
    pub fn to_receive(&mut self, args: A) -> &mut Self {
        self.update(|mock| mock.set_argument_matcher(args, Keywords::new()))
    }

    /// Like [`to_receive`](#method.to_receive), with keyword arguments too.
    pub fn to_receive_with(&mut self, args: A, keyword: Keywords)
        -> &mut Self
    {
        self.update(|mock| mock.set_argument_matcher(args, keyword))
    }

    pub fn to_return(&mut self, value: R) -> &mut Self {
        self.update(|mock| mock.set_return_value(value))
    }

    /// Alias for [`to_return`](#method.to_return).
    pub fn and_return(&mut self, value: R) -> &mut Self {
        self.to_return(value)
    }

    /// Make the call fail with `error`.  Any error type that converts into
    /// the callable's own error type will do.
    pub fn to_raise<E>(&mut self, error: E) -> &mut Self
        where R: Raise<E>
    {
        self.update(|mock| mock.set_exception(error))
    }

    /// Alias for [`to_raise`](#method.to_raise).
    pub fn and_raise<E>(&mut self, error: E) -> &mut Self
        where R: Raise<E>
    {
        self.to_raise(error)
    }

    /// Make the call panic with `payload`, for callables that cannot return
    /// an error.
    pub fn to_panic<P: Any + Send>(&mut self, payload: P) -> &mut Self {
        self.update(|mock| mock.set_panic(payload))
    }

    /// Alias for [`to_panic`](#method.to_panic).
    pub fn and_panic<P: Any + Send>(&mut self, payload: P) -> &mut Self {
        self.to_panic(payload)
    }
}

impl<A: 'static, R: 'static> fmt::Debug for Expect<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Expect").field("identity", &self.identity).finish()
    }
}
