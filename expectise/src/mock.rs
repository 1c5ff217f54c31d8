// vim: tw=80
//! The call expectation queue of a single mocked callable.

use std::{
    any::Any,
    cell::RefCell,
    fmt::Debug,
    panic,
    rc::Rc,
};

use crate::{
    hook::Binding,
    Arguments,
    Hook,
    Identity,
    Keywords,
    MockError,
    Result,
};

/// Conversion from an error value into a callable's return type.
///
/// This is what lets [`to_raise`](crate::Expect::to_raise) script an error for
/// any fallible callable: the scripted call returns `Err(error.into())`.
pub trait Raise<E> {
    fn raise(error: E) -> Self;
}

impl<T, E, X> Raise<X> for std::result::Result<T, E>
    where X: Into<E>
{
    fn raise(error: X) -> Self {
        Err(error.into())
    }
}

/// What a scripted call does once its arguments have been accepted.
pub enum Outcome<R> {
    /// Return a value.
    Return(R),
    /// Return an error value, built by [`Raise`].
    Raise(R),
    /// Unwind, for callables that have no error channel.
    Panic(Box<dyn FnOnce()>),
}

impl<R> Outcome<R> {
    /// Play the outcome, returning the callable's value or unwinding.
    pub fn play(self) -> R {
        match self {
            Outcome::Return(r) | Outcome::Raise(r) => r,
            Outcome::Panic(f) => {
                f();
                unreachable!("a scripted panic returned")
            }
        }
    }
}

/// One expected call: its optional argument matcher and its scripted outcome.
pub(crate) struct Slot<A, R> {
    arguments: Option<Arguments<A>>,
    outcome: Option<Outcome<R>>,
}

impl<A, R> Slot<A, R> {
    fn has_argument_matcher(&self) -> bool {
        self.arguments.is_some()
    }
}

impl<A, R> Default for Slot<A, R> {
    fn default() -> Self {
        Slot { arguments: None, outcome: None }
    }
}

/// The slots and counters of one callable.  Shared between the [`Mock`] and
/// the override it installs in the hook.
pub(crate) struct Queue<A, R> {
    identity: Identity,
    slots: Vec<Slot<A, R>>,
    performed: usize,
}

impl<A, R> Queue<A, R> {
    fn new(identity: Identity) -> Self {
        Queue { identity, slots: Vec::new(), performed: 0 }
    }

    fn last_slot(&mut self) -> Result<&mut Slot<A, R>> {
        let identity = &self.identity;
        self.slots.last_mut().ok_or_else(|| MockError::environment(format!(
            "No `Expect` statement is open for callable `{identity}`."
        )))
    }

    fn set_outcome(&mut self, outcome: Outcome<R>) -> Result<()> {
        let identity = self.identity.clone();
        let slot = self.last_slot()?;
        match &slot.outcome {
            Some(Outcome::Return(_)) => Err(MockError::environment(format!(
                "Return value already set for this `Expect` statement on \
                 callable `{identity}`."
            ))),
            Some(_) => Err(MockError::environment(format!(
                "Execution error already set for this `Expect` statement on \
                 callable `{identity}`."
            ))),
            None => {
                slot.outcome = Some(outcome);
                Ok(())
            }
        }
    }
}

impl<A: Debug + PartialEq, R> Queue<A, R> {
    /// Consume the next slot on behalf of an actual call.
    pub(crate) fn invoke(&mut self, actual: Arguments<A>)
        -> Result<Outcome<R>>
    {
        self.performed += 1;
        let expected = self.slots.len();
        tracing::trace!(identity = %self.identity, call = self.performed,
                        expected, "intercepted call");
        if self.performed > expected {
            return Err(MockError::expectation(format!(
                "`{}` is expected to be called {} time(s) only.",
                self.identity, expected
            )));
        }
        let slot = &mut self.slots[self.performed - 1];
        let Some(outcome) = slot.outcome.take() else {
            return Err(MockError::environment(format!(
                "Incomplete `Expect` statement for callable `{}`.  Make sure \
                 the mock is properly set up by defining the expected return \
                 value or execution error.",
                self.identity
            )));
        };
        if let Some(arguments) = &slot.arguments {
            arguments.verify(&self.identity, &actual)?;
        }
        Ok(outcome)
    }
}

/// The ordered expectations of one mocked callable.
///
/// Slots are consumed strictly in the order they were opened, whatever their
/// argument matchers say.  That lets a test script different behavior for the
/// first, second and third call, with identical or varying arguments.
pub struct Mock<A: 'static, R: 'static> {
    hook: Hook<A, R>,
    queue: Rc<RefCell<Queue<A, R>>>,
}

impl<A: 'static, R: 'static> Mock<A, R> {
    pub(crate) fn new(hook: Hook<A, R>) -> Self {
        let queue = Rc::new(RefCell::new(Queue::new(hook.identity())));
        Mock { hook, queue }
    }

    /// How many calls have been declared.
    pub fn expected(&self) -> usize {
        self.queue.borrow().slots.len()
    }

    /// How many calls have been received.
    pub fn performed(&self) -> usize {
        self.queue.borrow().performed
    }

    /// Forget every slot and zero the call counter.
    pub fn reset(&mut self) {
        let mut queue = self.queue.borrow_mut();
        queue.slots.clear();
        queue.performed = 0;
    }

    /// Append an empty slot, and make sure calls are routed through this
    /// queue.
    pub fn open_new_slot(&mut self) {
        self.queue.borrow_mut().slots.push(Slot::default());
        self.hook.install(Binding::Override(Rc::clone(&self.queue)));
    }

    /// Require the last slot's call to receive exactly these arguments.
    pub fn set_argument_matcher(&mut self, positional: A, keyword: Keywords)
        -> Result<()>
    {
        let mut queue = self.queue.borrow_mut();
        let identity = queue.identity.clone();
        let slot = queue.last_slot()?;
        if slot.has_argument_matcher() {
            return Err(MockError::environment(format!(
                "Arguments check already set for this `Expect` statement on \
                 callable `{identity}`."
            )));
        }
        slot.arguments = Some(Arguments::new(positional, keyword));
        Ok(())
    }

    pub fn set_return_value(&mut self, value: R) -> Result<()> {
        self.queue.borrow_mut().set_outcome(Outcome::Return(value))
    }

    /// Script the last slot's call to fail with `error`.
    pub fn set_exception<E>(&mut self, error: E) -> Result<()>
        where R: Raise<E>
    {
        self.queue.borrow_mut().set_outcome(Outcome::Raise(R::raise(error)))
    }

    /// Script the last slot's call to panic with `payload`.
    pub fn set_panic<P: Any + Send>(&mut self, payload: P) -> Result<()> {
        let f = Box::new(move || panic::panic_any(payload));
        self.queue.borrow_mut().set_outcome(Outcome::Panic(f))
    }
}

impl<A: Debug + PartialEq + 'static, R: 'static> Mock<A, R> {
    /// Simulate one call to the mocked callable.
    pub fn invoke(&self, positional: A, keyword: Keywords)
        -> Result<Outcome<R>>
    {
        self.queue.borrow_mut().invoke(Arguments::new(positional, keyword))
    }
}
