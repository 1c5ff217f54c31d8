// vim: tw=80
//! Per-callable mocking records.

use std::fmt::Debug;

use downcast::{downcast, Any};

use crate::{
    hook::Binding,
    Hook,
    Identity,
    Lifespan,
    Mock,
    Trigger,
};

/// The record a session keeps for one mockable callable.
///
/// A marker decides whether its callable is intercepted at all.  While it is
/// enabled, calls that no `Expect` statement accounts for are refused.
pub struct Marker<A: 'static, R: 'static> {
    hook: Hook<A, R>,
    identity: Identity,
    trigger: Trigger,
    lifespan: Lifespan,
    enabled: bool,
    /// Set by an explicit [`disable_mock`](crate::disable_mock).
    disabled: bool,
    /// Set by [`mock`](crate::mock): active whatever the trigger says, until
    /// the next reset.
    forced: bool,
    mock: Mock<A, R>,
}

impl<A: 'static, R: 'static> Marker<A, R> {
    /// Create a marker.  The hook is left untouched until the marker is
    /// enabled.
    pub fn new(hook: Hook<A, R>, trigger: Trigger, lifespan: Lifespan) -> Self
    {
        Marker {
            hook,
            identity: hook.identity(),
            trigger,
            lifespan,
            enabled: false,
            disabled: false,
            forced: false,
            mock: Mock::new(hook),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn lifespan(&self) -> Lifespan {
        self.lifespan
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn mock(&self) -> &Mock<A, R> {
        &self.mock
    }

    pub fn mock_mut(&mut self) -> &mut Mock<A, R> {
        &mut self.mock
    }

    /// Number of declared calls that have not been performed yet.
    pub fn shortfall(&self) -> usize {
        self.mock.expected().saturating_sub(self.mock.performed())
    }

    /// Install the placeholder if the marker was mocked for the current test
    /// or the trigger currently holds, and restore the original otherwise.
    ///
    /// Enabling an enabled marker is a no-op, so whatever `Expect` statements
    /// already installed stays in place.
    pub fn enable(&mut self) {
        if !self.disabled && (self.forced || self.trigger.is_met()) {
            if !self.enabled {
                tracing::debug!(identity = %self.identity, "enabling mock");
                self.hook.install(Binding::Placeholder);
                self.enabled = true;
            }
        } else {
            self.hook.install(Binding::Original);
            self.enabled = false;
        }
    }

    /// Restore the original callable.  An `explicit` disable sticks until
    /// the callable is mocked again.
    pub fn disable(&mut self, explicit: bool) {
        tracing::debug!(identity = %self.identity, explicit, "disabling mock");
        self.hook.install(Binding::Original);
        self.enabled = false;
        if explicit {
            self.disabled = true;
        }
    }

    /// Mock the callable until the next reset, lifting any explicit disable
    /// and ignoring the trigger.
    pub fn redeclare(&mut self) {
        self.disabled = false;
        self.forced = true;
        self.enable();
    }

    /// Drop all expectations, forget any `mock` of the current test, and
    /// re-evaluate the trigger.
    pub fn reset(&mut self) {
        tracing::trace!(identity = %self.identity, "resetting mock");
        self.mock.reset();
        self.forced = false;
        self.enabled = false;
        self.enable();
    }

    /// Hand the hook back, as if no session had ever seen it.
    pub fn release(&mut self) {
        self.enabled = false;
        self.hook.release();
    }
}

/// A [`Marker`] with its signature erased, so a session can hold markers of
/// every callable in one map.
pub trait AnyMarker: Any {
    fn identity(&self) -> &Identity;
    fn lifespan(&self) -> Lifespan;
    fn is_enabled(&self) -> bool;
    fn is_disabled(&self) -> bool;
    fn expected(&self) -> usize;
    fn performed(&self) -> usize;
    fn shortfall(&self) -> usize;
    fn enable(&mut self);
    fn disable(&mut self, explicit: bool);
    fn redeclare(&mut self);
    fn reset(&mut self);
    fn release(&mut self);
}

downcast!(dyn AnyMarker);

impl<A: 'static, R: 'static> AnyMarker for Marker<A, R> {
    fn identity(&self) -> &Identity {
        Marker::identity(self)
    }

    fn lifespan(&self) -> Lifespan {
        Marker::lifespan(self)
    }

    fn is_enabled(&self) -> bool {
        Marker::is_enabled(self)
    }

    fn is_disabled(&self) -> bool {
        Marker::is_disabled(self)
    }

    fn expected(&self) -> usize {
        self.mock.expected()
    }

    fn performed(&self) -> usize {
        self.mock.performed()
    }

    fn shortfall(&self) -> usize {
        Marker::shortfall(self)
    }

    fn enable(&mut self) {
        Marker::enable(self)
    }

    fn disable(&mut self, explicit: bool) {
        Marker::disable(self, explicit)
    }

    fn redeclare(&mut self) {
        Marker::redeclare(self)
    }

    fn reset(&mut self) {
        Marker::reset(self)
    }

    fn release(&mut self) {
        Marker::release(self)
    }
}

impl<A: 'static, R: 'static> Debug for Marker<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Marker")
            .field("identity", &self.identity)
            .field("trigger", &self.trigger)
            .field("lifespan", &self.lifespan)
            .field("enabled", &self.enabled)
            .field("disabled", &self.disabled)
            .field("forced", &self.forced)
            .field("expected", &self.mock.expected())
            .field("performed", &self.mock.performed())
            .finish()
    }
}

#[cfg(test)]
mod t {
    use std::env;

    use super::*;
    use crate::{HookCell, Intercept, Kind};

    thread_local! {
        static FETCH: HookCell<(u8,), u8> = HookCell::new();
    }

    fn fetch_hook() -> Hook<(u8,), u8> {
        Hook::new(&FETCH, || Identity::function("app", "fetch"))
    }

    fn marker(trigger: Trigger) -> Marker<(u8,), u8> {
        Marker::new(fetch_hook(), trigger, Lifespan::Temporary)
    }

    #[test]
    fn new_leaves_the_hook_alone() {
        let m = marker(Trigger::Always);
        assert!(!m.is_enabled());
        assert!(fetch_hook().is_original());
    }

    #[test]
    fn enable_is_idempotent() {
        let mut m = marker(Trigger::Always);
        m.enable();
        m.mock_mut().open_new_slot();
        m.mock_mut().set_return_value(3).unwrap();
        m.enable();
        assert_eq!(fetch_hook().call(|| (1,)), Intercept::Return(3));
    }

    #[test]
    fn unmet_trigger() {
        let key = "EXPECTISE_MARKER_T_UNMET_TRIGGER";
        let mut m = marker(Trigger::env(key, "test"));
        m.enable();
        assert!(!m.is_enabled());
        assert!(fetch_hook().is_original());
        env::set_var(key, "test");
        m.enable();
        assert!(m.is_enabled());
        assert!(!fetch_hook().is_original());
        env::set_var(key, "prod");
        m.reset();
        assert!(!m.is_enabled());
        assert!(fetch_hook().is_original());
        env::remove_var(key);
    }

    #[test]
    fn explicit_disable_sticks() {
        let mut m = marker(Trigger::Always);
        m.enable();
        m.disable(true);
        assert!(m.is_disabled());
        m.enable();
        assert!(!m.is_enabled());
        m.reset();
        assert!(!m.is_enabled());
        m.redeclare();
        assert!(m.is_enabled());
        assert!(!m.is_disabled());
    }

    #[test]
    fn redeclare_overrides_the_trigger_until_reset() {
        let key = "EXPECTISE_MARKER_T_REDECLARE_UNSET";
        let mut m = marker(Trigger::env(key, "test"));
        m.enable();
        assert!(!m.is_enabled());
        m.redeclare();
        assert!(m.is_enabled());
        assert!(fetch_hook().try_call(|| (1,)).is_err());
        m.reset();
        assert!(!m.is_enabled());
        assert!(fetch_hook().is_original());
    }

    #[test]
    fn shortfall() {
        let mut m = marker(Trigger::Always);
        m.enable();
        for v in [1, 2, 3] {
            m.mock_mut().open_new_slot();
            m.mock_mut().set_return_value(v).unwrap();
        }
        assert_eq!(fetch_hook().call(|| (0,)), Intercept::Return(1));
        assert_eq!(m.shortfall(), 2);
        m.reset();
        assert_eq!(m.shortfall(), 0);
        // Reset on an enabled marker goes back to the placeholder
        assert!(fetch_hook().try_call(|| (0,)).is_err());
    }

    #[test]
    fn downcast() {
        let b: Box<dyn AnyMarker> = Box::new(marker(Trigger::Always));
        assert!(b.downcast_ref::<Marker<(u8,), u8>>().is_ok());
        assert!(b.downcast_ref::<Marker<(u16,), u8>>().is_err());
        assert_eq!(b.identity().kind(), Kind::Function);
    }
}
