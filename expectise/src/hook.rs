// vim: tw=80
//! Indirection cells.
//!
//! Every mockable callable consults its own [`HookCell`] before running its
//! body.  Markers and mocks never patch the callable itself: they swap what
//! the cell holds.  The cells are thread-local, so each test thread has its own
//! view of which callables are mocked.

use std::{
    cell::{OnceCell, RefCell},
    fmt::Debug,
    rc::Rc,
    thread::LocalKey,
};

use crate::{
    mock::Queue,
    Arguments,
    Identity,
    Keywords,
    Lifespan,
    MockError,
    Result,
    Session,
    Trigger,
};

/// What a hook currently routes calls to.
pub(crate) enum Binding<A, R> {
    /// A permanent callable that no session knows about yet.
    Unregistered,
    /// The callable's own body.
    Original,
    /// Refuse every call: the callable is mocked but nothing is expected.
    Placeholder,
    /// Consume the next slot of a mock.
    Override(Rc<RefCell<Queue<A, R>>>),
}

impl<A, R> Clone for Binding<A, R> {
    fn clone(&self) -> Self {
        match self {
            Binding::Unregistered => Binding::Unregistered,
            Binding::Original => Binding::Original,
            Binding::Placeholder => Binding::Placeholder,
            Binding::Override(q) => Binding::Override(Rc::clone(q)),
        }
    }
}

/// Storage behind one mockable callable.
///
/// Place it in a `thread_local!` and reach it through a [`Hook`].  The
/// attribute macros do this for you.
pub struct HookCell<A, R> {
    binding: RefCell<Binding<A, R>>,
    /// Set for callables declared permanently mocked.
    trigger: Option<Trigger>,
    identity: OnceCell<Identity>,
}

impl<A, R> HookCell<A, R> {
    /// A callable that may be mocked on demand with [`mock`](crate::mock).
    pub fn new() -> Self {
        HookCell {
            binding: RefCell::new(Binding::Original),
            trigger: None,
            identity: OnceCell::new(),
        }
    }

    /// A callable that is permanently mocked whenever `trigger` holds.
    pub fn permanent(trigger: Trigger) -> Self {
        HookCell {
            binding: RefCell::new(Binding::Unregistered),
            trigger: Some(trigger),
            identity: OnceCell::new(),
        }
    }
}

impl<A, R> Default for HookCell<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

/// The result of consulting a hook.
#[derive(Debug, Eq, PartialEq)]
#[must_use]
pub enum Intercept<R> {
    /// Not mocked: run the callable's own body.
    Proceed,
    /// Mocked: the scripted result of the call.
    Return(R),
}

/// A handle to the [`HookCell`] of one callable.
///
/// This is the "callable reference" accepted by [`Expect`](crate::Expect),
/// [`mock`](crate::mock) and [`disable_mock`](crate::disable_mock).
///
/// # Examples
///
/// Declaring a hook by hand, which is what `#[mockable]` generates:
/// ```
/// # use expectise::*;
/// thread_local! {
///     static LOAD: HookCell<(u32,), String> = HookCell::new();
/// }
///
/// fn load_hook() -> Hook<(u32,), String> {
///     Hook::new(&LOAD, || Identity::function(module_path!(), "load"))
/// }
///
/// fn load(id: u32) -> String {
///     if let Intercept::Return(r) = load_hook().call(|| (id,)) {
///         return r;
///     }
///     format!("record {id}")
/// }
///
/// let _expectations = Expectations::new();
/// mock(load_hook());
/// Expect::new(load_hook()).to_receive((7,)).and_return("mocked".to_owned());
/// assert_eq!(load(7), "mocked");
/// ```
pub struct Hook<A: 'static, R: 'static> {
    cell: &'static LocalKey<HookCell<A, R>>,
    identify: fn() -> Identity,
}

impl<A: 'static, R: 'static> Clone for Hook<A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: 'static, R: 'static> Copy for Hook<A, R> {}

impl<A: 'static, R: 'static> Hook<A, R> {
    /// `identify` is only evaluated once per thread.
    pub fn new(cell: &'static LocalKey<HookCell<A, R>>,
               identify: fn() -> Identity) -> Self
    {
        Hook { cell, identify }
    }

    pub fn identity(&self) -> Identity {
        self.cell.with(|c| c.identity.get_or_init(self.identify).clone())
    }

    /// The trigger of a permanently mocked callable.
    pub fn trigger(&self) -> Option<Trigger> {
        self.cell.with(|c| c.trigger.clone())
    }

    /// Does any call currently run the callable's own body?
    pub fn is_original(&self) -> bool {
        self.cell.with(|c| {
            matches!(*c.binding.borrow(),
                     Binding::Original | Binding::Unregistered)
        })
    }

    pub(crate) fn binding(&self) -> Binding<A, R> {
        self.cell.with(|c| c.binding.borrow().clone())
    }

    pub(crate) fn install(&self, binding: Binding<A, R>) {
        // The cell may already be gone while thread-locals are destroyed.
        let _ = self.cell.try_with(|c| *c.binding.borrow_mut() = binding);
    }

    /// Put the hook back in the state it had before any session saw it.
    pub(crate) fn release(&self) {
        let _ = self.cell.try_with(|c| {
            *c.binding.borrow_mut() = if c.trigger.is_some() {
                Binding::Unregistered
            } else {
                Binding::Original
            };
        });
    }

    /// Register a permanently mocked callable with the current session, the
    /// first time it is touched on this thread.
    pub(crate) fn ensure_registered(&self) -> Result<()> {
        if !matches!(self.binding(), Binding::Unregistered) {
            return Ok(());
        }
        let Some(trigger) = self.trigger() else {
            return Ok(());
        };
        let hook = *self;
        Session::with(move |session| {
            session.register(hook, trigger, Lifespan::Permanent)
                .map(|marker| marker.enable())
        })
    }
}

impl<A: Debug + PartialEq + 'static, R: 'static> Hook<A, R> {
    /// Consult the hook on behalf of a call with positional arguments only.
    ///
    /// `args` is only evaluated when the callable is mocked.
    ///
    /// # Panics
    ///
    /// Panics with the [`MockError`] message when the call contradicts the
    /// test's expectations.
    pub fn call<F>(&self, args: F) -> Intercept<R>
        where F: FnOnce() -> A
    {
        self.call_with(|| Arguments::positional(args()))
    }

    /// Like [`call`](#method.call), for callables with keyword arguments.
    pub fn call_with<F>(&self, args: F) -> Intercept<R>
        where F: FnOnce() -> Arguments<A>
    {
        match self.try_call_with(args) {
            Ok(i) => i,
            Err(e) => panic!("{}", e),
        }
    }

    /// Non-panicking version of [`call`](#method.call).
    pub fn try_call<F>(&self, args: F) -> Result<Intercept<R>>
        where F: FnOnce() -> A
    {
        self.try_call_with(|| Arguments::positional(args()))
    }

    /// Non-panicking version of [`call_with`](#method.call_with).
    pub fn try_call_with<F>(&self, args: F) -> Result<Intercept<R>>
        where F: FnOnce() -> Arguments<A>
    {
        self.ensure_registered()?;
        match self.binding() {
            Binding::Unregistered | Binding::Original => Ok(Intercept::Proceed),
            Binding::Placeholder => Err(MockError::environment(format!(
                "Callable `{}` is marked as mocked, and will raise errors if \
                 called without using an `Expect` statement to define its \
                 mocked behavior.",
                self.identity()
            ))),
            Binding::Override(queue) => {
                let outcome = queue.borrow_mut().invoke(args())?;
                Ok(Intercept::Return(outcome.play()))
            }
        }
    }

    /// Shorthand for [`call_with`](#method.call_with).
    pub fn call_kw<F>(&self, args: F, keyword: Keywords) -> Intercept<R>
        where F: FnOnce() -> A
    {
        self.call_with(|| Arguments::new(args(), keyword))
    }
}
