// vim: tw=80
//! Environment-conditional call expectations for unit tests.
//!
//! Expectise lets a test replace selected functions and methods with
//! scripted behavior, without changing the code that calls them.  A callable
//! is marked as mocked with [`#[mock_if]`](macro@mock_if), which mocks it
//! permanently whenever an environment variable has a given value, or with
//! [`#[mockable]`](macro@mockable), which lets a test mock it on demand with
//! [`mock`].
//!
//! Once a callable is mocked, every call to it fails until the test declares
//! what should happen with an [`Expect`] statement.  At the end of the test,
//! Expectise checks that every declared call was actually performed.
//!
//! # User Guide
//!
//! * [`Getting started`](#getting-started)
//! * [`Return values and errors`](#return-values-and-errors)
//! * [`Matching arguments`](#matching-arguments)
//! * [`Call counts`](#call-counts)
//! * [`Methods`](#methods)
//! * [`Mocking on demand`](#mocking-on-demand)
//! * [`Disabling mocks`](#disabling-mocks)
//! * [`Verification`](#verification)
//! * [`Referencing callables by name`](#referencing-callables-by-name)
//! * [`Logging`](#logging)
//!
//! ## Getting Started
//! ```
//! use expectise::*;
//!
//! #[mock_if("EXPECTISE_GUIDE_ENV", "test")]
//! fn add(a: i32, b: i32) -> i32 {
//!     a + b
//! }
//!
//! std::env::set_var("EXPECTISE_GUIDE_ENV", "test");
//! let _expectations = Expectations::new();
//! Expect::new(add_hook()).to_receive((1, 2)).and_return(3);
//! assert_eq!(add(1, 2), 3);
//! ```
//!
//! The attribute generates a companion function, `add_hook`, that returns the
//! [`Hook`] through which tests designate `add`.  While the environment
//! variable does not hold the value, `add` behaves exactly as written.
//!
//! ## Return values and errors
//!
//! Every `Expect` statement must script an outcome.  [`to_return`] and its
//! alias [`and_return`] give the value to return.  [`to_raise`] makes a
//! fallible callable return an error: any value that converts into the
//! callable's error type will do.  Callables that cannot return an error can
//! still be scripted to panic, with [`to_panic`].
//!
//! ```
//! # use expectise::*;
//! # #[derive(Debug, PartialEq)]
//! # pub struct MathError(String);
//! # impl From<&str> for MathError {
//! #     fn from(s: &str) -> Self { MathError(s.to_owned()) }
//! # }
//! #[mock_if("EXPECTISE_GUIDE_RAISE", "test")]
//! fn square(a: i32) -> Result<i32, MathError> {
//!     Ok(a * a)
//! }
//!
//! std::env::set_var("EXPECTISE_GUIDE_RAISE", "test");
//! let _expectations = Expectations::new();
//! Expect::new(square_hook()).to_raise("overflow");
//! assert_eq!(square(1 << 20), Err(MathError("overflow".to_owned())));
//! ```
//!
//! Calling a mocked callable whose statement has no outcome is an
//! [`EnvironmentError`](MockError::Environment), as is calling it with no
//! statement at all.
//!
//! ## Matching arguments
//!
//! [`to_receive`] requires the call to receive exactly the given arguments,
//! as a tuple.  Reference arguments are matched by their owned form: a `&str`
//! argument is matched by a `String`, and a `&[u8]` by a `Vec<u8>`.  The
//! receiver of a method never takes part in matching.  A statement without
//! `to_receive` accepts any arguments.
//!
//! A mismatch is an [`ExpectationError`](MockError::Expectation) that shows a
//! diff of the expected and actual arguments.
//!
//! Callables that emulate keyword arguments can be matched on those too,
//! with [`to_receive_with`] and the [`kwargs!`] macro.  Positional arguments
//! are compared first.
//!
//! ## Call counts
//!
//! Each `Expect` statement stands for exactly one call.  Statements on the
//! same callable are consumed in the order they were declared, whatever their
//! arguments.  A call beyond the last statement is an `ExpectationError`.
//!
//! ```
//! # use expectise::*;
//! #[mock_if("EXPECTISE_GUIDE_COUNT", "test")]
//! fn next_id() -> u64 {
//!     unimplemented!()
//! }
//!
//! std::env::set_var("EXPECTISE_GUIDE_COUNT", "test");
//! let _expectations = Expectations::new();
//! Expect::new(next_id_hook()).and_return(1);
//! Expect::new(next_id_hook()).and_return(2);
//! assert_eq!(next_id(), 1);
//! assert_eq!(next_id(), 2);
//! assert!(next_id_hook().try_call(|| ()).is_err());
//! ```
//!
//! ## Methods
//!
//! Methods and associated functions are hooked through their `impl` block,
//! which must carry `#[mockable]` as well.  Only the annotated methods are
//! hooked.  Their hooks are associated functions of the type.
//!
//! ```
//! # use expectise::*;
//! pub struct Api {
//!     base: String,
//! }
//!
//! #[mockable]
//! impl Api {
//!     #[mock_if("EXPECTISE_GUIDE_API", "test")]
//!     pub fn get(&self, path: &str) -> Result<String, String> {
//!         Err(format!("no network to reach {}{}", self.base, path))
//!     }
//!
//!     #[mock_if("EXPECTISE_GUIDE_API", "test", getter)]
//!     pub fn version(&self) -> u32 {
//!         1
//!     }
//! }
//!
//! std::env::set_var("EXPECTISE_GUIDE_API", "test");
//! let _expectations = Expectations::new();
//! let api = Api { base: "https://example.com".to_owned() };
//! Expect::new(Api::get_hook()).to_receive(("/users".to_owned(),))
//!     .and_return(Ok("[]".to_owned()));
//! Expect::new(Api::version_hook()).and_return(2);
//! assert_eq!(api.get("/users"), Ok("[]".to_owned()));
//! assert_eq!(api.version(), 2);
//! ```
//!
//! ## Mocking on demand
//!
//! A callable marked `#[mockable]` behaves normally until a test calls
//! [`mock`] on its hook.  The mock lasts until the end of the test.
//!
//! ```
//! # use expectise::*;
//! #[mockable]
//! fn now() -> u64 {
//!     42
//! }
//!
//! {
//!     let _expectations = Expectations::new();
//!     mock(now_hook());
//!     Expect::new(now_hook()).and_return(0);
//!     assert_eq!(now(), 0);
//! }
//! assert_eq!(now(), 42);
//! ```
//!
//! ## Disabling mocks
//!
//! [`disable_mock`] restores the original behavior of a mocked callable, for
//! a test that exercises the real thing.  The callable stays disabled, even
//! across tests, until it is mocked again with [`mock`].
//!
//! ```
//! # use expectise::*;
//! #[mock_if("EXPECTISE_GUIDE_DISABLE", "test")]
//! fn double(x: u32) -> u32 {
//!     2 * x
//! }
//!
//! std::env::set_var("EXPECTISE_GUIDE_DISABLE", "test");
//! let _expectations = Expectations::new();
//! Expect::new(double_hook()).and_return(0);
//! assert_eq!(double(2), 0);
//! disable_mock(double_hook()).unwrap();
//! assert_eq!(double(2), 4);
//! ```
//!
//! ## Verification
//!
//! The [`Expectations`] guard verifies the test's expectations when it drops,
//! and fails the test if some declared calls never happened.  When the test
//! is already failing, it only cleans up, so the original failure is never
//! masked.  [`Expectations::verify`] does the same thing explicitly.
//!
//! ```should_panic
//! # use expectise::*;
//! #[mock_if("EXPECTISE_GUIDE_VERIFY", "test")]
//! fn ping() -> bool {
//!     true
//! }
//!
//! std::env::set_var("EXPECTISE_GUIDE_VERIFY", "test");
//! let _expectations = Expectations::new();
//! Expect::new(ping_hook()).and_return(false);
//! // Panics with: `rust_out::ping` still expected to be called 1 time(s).
//! ```
//!
//! Test bodies that return a `Result` can use [`expectations`] instead, which
//! gives priority to the body's own error.  Test harness integrations can
//! call [`tear_down`] directly.
//!
//! Between tests, permanent mocks stay in place but forget their statements,
//! while mocks declared with [`mock`] go away.  Each test thread has its own
//! mocks, so tests may run in parallel.
//!
//! ## Referencing callables by name
//!
//! [`Expect::named`] designates a callable by its name instead of its hook.
//! Any trailing part of the qualified name will do, such as `Api::get`, as
//! long as it designates a single mocked callable.  A test must reference all
//! its callables the same way.
//!
//! ## Logging
//!
//! Expectise emits [`tracing`](https://docs.rs/tracing) events: `debug` when a
//! mock is registered, enabled, disabled or torn down, and `trace` for every
//! intercepted call.  It never installs a subscriber.
//!
//! [`and_return`]: Expect::and_return
//! [`to_panic`]: Expect::to_panic
//! [`to_raise`]: Expect::to_raise
//! [`to_receive_with`]: Expect::to_receive_with
//! [`to_receive`]: Expect::to_receive
//! [`to_return`]: Expect::to_return

use std::thread;

extern crate self as expectise;

mod arguments;
mod error;
mod expect;
mod hook;
mod identity;
mod marker;
mod mock;
mod session;
mod trigger;

pub use expectise_derive::{mock_if, mockable};

pub use crate::{
    arguments::{Argument, Arguments, Keywords},
    error::{ErrorKind, MockError, Result},
    expect::Expect,
    hook::{Hook, HookCell, Intercept},
    identity::{Identity, Kind, Owner},
    marker::{AnyMarker, Marker},
    mock::{Mock, Outcome, Raise},
    session::{tear_down_after, ReferenceMode, Session},
    trigger::{Lifespan, Trigger},
};

/// Mock `hook`'s callable until the end of the test.
///
/// This also lifts an explicit [`disable_mock`].  Mocking a callable twice is
/// harmless.
///
/// # Panics
///
/// Panics if another callable with the same identity but a different
/// signature is already registered.
pub fn mock<A: 'static, R: 'static>(hook: Hook<A, R>) {
    let r = hook.ensure_registered().and_then(|_| Session::with(|session| {
        session.register(hook, Trigger::Always, Lifespan::Temporary)
            .map(Marker::redeclare)
    }));
    if let Err(e) = r {
        panic!("{}", e);
    }
}

/// Restore the original behavior of `hook`'s callable.
///
/// The callable stays disabled until it is mocked again with [`mock`], even
/// after teardown.
pub fn disable_mock<A: 'static, R: 'static>(hook: Hook<A, R>) -> Result<()> {
    hook.ensure_registered()?;
    let identity = hook.identity();
    Session::with(|session| {
        if !session.contains(&identity) {
            return Err(MockError::value(format!(
                "Callable `{identity}` was never mocked, so it cannot be \
                 disabled."
            )));
        }
        session.lookup::<A, R>(&identity)?.disable(true);
        Ok(())
    })
}

/// Verify the current thread's expectations, and reset its mocks.
///
/// Permanent mocks forget their statements and are re-armed according to
/// the current environment.  Temporary mocks are removed.  Cleanup happens
/// even when verification fails.
pub fn tear_down() -> Result<()> {
    Session::with(Session::tear_down)
}

/// Run a test body, then verify the expectations it declared.
///
/// An error returned by `body` takes priority over unmet expectations.  If
/// `body` panics, the session is still torn down before the panic goes on.
///
/// # Examples
/// ```
/// # use expectise::*;
/// #[mockable]
/// fn load(key: &str) -> Result<String, MockError> {
///     Ok(key.to_uppercase())
/// }
///
/// let r = expectations(|| {
///     mock(load_hook());
///     Expect::new(load_hook()).and_return(Ok("X".to_owned()));
///     assert_eq!(load("x")?, "X");
///     Ok::<_, MockError>(())
/// });
/// assert!(r.is_ok());
/// ```
pub fn expectations<F, T, E>(body: F) -> std::result::Result<T, E>
    where F: FnOnce() -> std::result::Result<T, E>,
          E: From<MockError>
{
    let mut guard = Expectations::new();
    let outcome = body();
    guard.armed = false;
    tear_down_after(outcome)
}

/// Scope guard for the expectations of one test.
///
/// Dropping the guard tears the session down, and panics if some declared
/// calls never happened.  If the thread is already panicking it only cleans
/// up.
#[derive(Debug)]
#[must_use = "the expectations are verified when the guard drops"]
pub struct Expectations {
    armed: bool,
}

impl Expectations {
    pub fn new() -> Self {
        Expectations { armed: true }
    }

    /// Verify now, returning the result instead of panicking.
    pub fn verify(mut self) -> Result<()> {
        self.armed = false;
        tear_down()
    }
}

impl Default for Expectations {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Expectations {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let r = tear_down();
        if let Err(e) = r {
            if !thread::panicking() {
                panic!("{}", e);
            }
        }
    }
}
