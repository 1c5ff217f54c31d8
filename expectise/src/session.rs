// vim: tw=80
//! The per-thread registry of markers.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt::{Debug, Display},
};

use crate::{
    marker::AnyMarker,
    Hook,
    Identity,
    Lifespan,
    Marker,
    MockError,
    Result,
    Trigger,
};

/// How `Expect` statements designate their callable during a session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReferenceMode {
    /// Through a [`Hook`].
    Hook,
    /// Through a textual name, resolved against the registered identities.
    Name,
}

/// Every marker known to the current thread, indexed by identity.
#[derive(Default)]
pub struct Session {
    markers: BTreeMap<Identity, Box<dyn AnyMarker>>,
    mode: Option<ReferenceMode>,
}

thread_local! {
    static CURRENT: RefCell<Session> = RefCell::new(Session::default());
}

impl Session {
    /// Run `f` with the current thread's session.
    ///
    /// # Panics
    ///
    /// Panics if called reentrantly.
    pub fn with<F, T>(f: F) -> T
        where F: FnOnce(&mut Session) -> T
    {
        CURRENT.with(|s| f(&mut s.borrow_mut()))
    }

    /// Register `hook`, or return the marker it already has.
    ///
    /// Registering twice never resets anything.
    pub fn register<A, R>(&mut self, hook: Hook<A, R>, trigger: Trigger,
                          lifespan: Lifespan) -> Result<&mut Marker<A, R>>
        where A: 'static, R: 'static
    {
        let identity = hook.identity();
        let marker = self.markers.entry(identity.clone())
            .or_insert_with(|| {
                tracing::debug!(identity = %identity, ?lifespan,
                                "registering mock");
                Box::new(Marker::new(hook, trigger, lifespan))
                    as Box<dyn AnyMarker>
            });
        marker.downcast_mut::<Marker<A, R>>().map_err(|_| {
            MockError::environment(format!(
                "Callable `{identity}` is already registered with a different \
                 signature."
            ))
        })
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.markers.contains_key(identity)
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Iterate over the registered identities, in order.
    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.markers.keys()
    }

    pub fn mode(&self) -> Option<ReferenceMode> {
        self.mode
    }

    /// The marker of `identity`, with its signature erased.
    pub fn lookup_dyn(&mut self, identity: &Identity)
        -> Result<&mut (dyn AnyMarker + 'static)>
    {
        match self.markers.get_mut(identity) {
            Some(m) => Ok(&mut **m),
            None => Err(not_registered(identity)),
        }
    }

    /// The marker of `identity`.
    pub fn lookup<A, R>(&mut self, identity: &Identity)
        -> Result<&mut Marker<A, R>>
        where A: 'static, R: 'static
    {
        self.lookup_dyn(identity)?
            .downcast_mut::<Marker<A, R>>()
            .map_err(|_| MockError::environment(format!(
                "Callable `{identity}` is registered with a different \
                 signature."
            )))
    }

    /// Find the single registered identity that answers to `name`.
    pub fn resolve_name(&self, name: &str) -> Result<Identity> {
        let mut found = self.markers.keys().filter(|i| i.answers_to(name));
        match (found.next(), found.next()) {
            (Some(identity), None) => Ok(identity.clone()),
            (None, _) => Err(not_registered(name)),
            (Some(first), Some(second)) => Err(MockError::value(format!(
                "Callable name `{name}` is ambiguous: it designates both \
                 `{first}` and `{second}`.  Use a more qualified name, or \
                 reference the callable through its hook."
            ))),
        }
    }

    /// The marker of the callable designated by `name`.
    pub fn lookup_named<A, R>(&mut self, name: &str)
        -> Result<&mut Marker<A, R>>
        where A: 'static, R: 'static
    {
        let identity = self.resolve_name(name)?;
        self.lookup(&identity)
    }

    /// Record how an `Expect` statement designated its callable.  A session
    /// sticks to the first mode it sees, until teardown.
    pub fn use_mode(&mut self, mode: ReferenceMode) -> Result<()> {
        match self.mode {
            None => {
                self.mode = Some(mode);
                Ok(())
            },
            Some(current) if current == mode => Ok(()),
            Some(current) => Err(MockError::value(format!(
                "`Expect` statements must designate callables consistently \
                 within a test: this test already uses {} references, and \
                 cannot switch to {} references.",
                mode_name(current), mode_name(mode)
            ))),
        }
    }

    /// Verify every expectation and return to a clean state.
    ///
    /// Permanent markers are reset.  Temporary markers are disabled and
    /// forgotten.  All of that happens even when verification fails.
    pub fn tear_down(&mut self) -> Result<()> {
        let mut unmet = Vec::new();
        let mut expired = Vec::new();
        for (identity, marker) in self.markers.iter_mut() {
            let gap = marker.shortfall();
            if gap > 0 {
                unmet.push(format!(
                    "`{identity}` still expected to be called {gap} time(s)."
                ));
            }
            match marker.lifespan() {
                Lifespan::Permanent => marker.reset(),
                Lifespan::Temporary => {
                    marker.disable(false);
                    expired.push(identity.clone());
                }
            }
        }
        for identity in expired {
            self.markers.remove(&identity);
        }
        self.mode = None;
        tracing::debug!(unmet = unmet.len(), "tore down expectations");
        if unmet.is_empty() {
            Ok(())
        } else {
            Err(MockError::expectation(unmet.join("\n")))
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for marker in self.markers.values_mut() {
            marker.release();
        }
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("markers", &self.markers.keys().collect::<Vec<_>>())
            .field("mode", &self.mode)
            .finish()
    }
}

fn mode_name(mode: ReferenceMode) -> &'static str {
    match mode {
        ReferenceMode::Hook => "hook",
        ReferenceMode::Name => "name",
    }
}

pub(crate) fn not_registered(callable: impl Display) -> MockError {
    MockError::environment(format!(
        "Callable `{callable}` is not marked as mocked, so this instantiation \
         is not allowed. Check that the right environment variables are set, \
         and that the callable is marked as mocked with the `#[mock_if]` \
         attribute, or through a standalone `mock` statement."
    ))
}

/// Run `body`, then tear the current session down.
///
/// An error from `body` takes priority over any teardown error, but teardown
/// happens either way.
pub fn tear_down_after<T, E>(outcome: std::result::Result<T, E>)
    -> std::result::Result<T, E>
    where E: From<MockError>
{
    let verdict = Session::with(Session::tear_down);
    let value = outcome?;
    verdict.map_err(E::from)?;
    Ok(value)
}

#[cfg(test)]
mod t {
    use super::*;
    use crate::{ErrorKind, HookCell, Kind};

    thread_local! {
        static OPEN: HookCell<(String,), bool> = HookCell::new();
        static CLOSE: HookCell<(), ()> = HookCell::new();
        static OPEN2: HookCell<(String,), bool> = HookCell::new();
        static OPEN_U8: HookCell<(u8,), bool> = HookCell::new();
    }

    fn open_hook() -> Hook<(String,), bool> {
        Hook::new(&OPEN, || Identity::resolve("app::fs", "File::open",
                                              Kind::Associated))
    }

    fn close_hook() -> Hook<(), ()> {
        Hook::new(&CLOSE, || Identity::resolve("app::fs", "File::close",
                                               Kind::Method))
    }

    fn other_open_hook() -> Hook<(String,), bool> {
        Hook::new(&OPEN2, || Identity::resolve("app::net", "File::open",
                                               Kind::Associated))
    }

    #[test]
    fn register_is_idempotent() {
        let mut s = Session::default();
        let m = s.register(open_hook(), Trigger::Always, Lifespan::Temporary)
            .unwrap();
        m.enable();
        m.mock_mut().open_new_slot();
        let m = s.register(open_hook(), Trigger::Always, Lifespan::Permanent)
            .unwrap();
        assert_eq!(m.mock().expected(), 1);
        assert_eq!(m.lifespan(), Lifespan::Temporary);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn register_with_another_signature() {
        let mut s = Session::default();
        s.register(open_hook(), Trigger::Always, Lifespan::Temporary)
            .unwrap();
        let hook = Hook::new(&OPEN_U8, || Identity::resolve("app::fs",
            "File::open", Kind::Associated));
        let e = s.register(hook, Trigger::Always, Lifespan::Temporary)
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Environment);
    }

    #[test]
    fn lookup_unregistered() {
        let mut s = Session::default();
        let e = s.lookup::<(), ()>(&close_hook().identity()).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Environment);
        assert!(e.message().starts_with(
            "Callable `app::fs::File::close` is not marked as mocked"));
    }

    #[test]
    fn resolve_name() {
        let mut s = Session::default();
        s.register(open_hook(), Trigger::Always, Lifespan::Temporary)
            .unwrap();
        s.register(close_hook(), Trigger::Always, Lifespan::Temporary)
            .unwrap();
        assert_eq!(s.resolve_name("File::close").unwrap(),
                   close_hook().identity());
        assert_eq!(s.resolve_name("open").unwrap(), open_hook().identity());
        let e = s.resolve_name("File::seek").unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Environment);

        s.register(other_open_hook(), Trigger::Always, Lifespan::Temporary)
            .unwrap();
        let e = s.resolve_name("File::open").unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Value);
        assert!(e.message().contains("ambiguous"));
        assert_eq!(s.resolve_name("net::File::open").unwrap(),
                   other_open_hook().identity());
    }

    #[test]
    fn modes_cannot_be_mixed() {
        let mut s = Session::default();
        s.use_mode(ReferenceMode::Name).unwrap();
        s.use_mode(ReferenceMode::Name).unwrap();
        let e = s.use_mode(ReferenceMode::Hook).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Value);
        s.tear_down().unwrap();
        assert_eq!(s.mode(), None);
        s.use_mode(ReferenceMode::Hook).unwrap();
    }

    #[test]
    fn tear_down_reports_every_shortfall() {
        let mut s = Session::default();
        for hook in [open_hook(), other_open_hook()] {
            let m = s.register(hook, Trigger::Always, Lifespan::Temporary)
                .unwrap();
            m.enable();
            m.mock_mut().open_new_slot();
            m.mock_mut().set_return_value(true).unwrap();
        }
        let m = s.register(close_hook(), Trigger::Always, Lifespan::Permanent)
            .unwrap();
        m.enable();
        m.mock_mut().open_new_slot();
        m.mock_mut().open_new_slot();
        assert_eq!(open_hook().call(|| ("a".to_owned(),)),
                   crate::Intercept::Return(true));

        let e = s.tear_down().unwrap_err();
        assert_eq!(e, MockError::expectation(
            "`app::fs::File::close` still expected to be called 2 time(s).\n\
             `app::net::File::open` still expected to be called 1 time(s)."));
        // Temporary markers are gone, permanent ones are reset
        assert_eq!(s.len(), 1);
        assert!(open_hook().is_original());
        assert!(other_open_hook().is_original());
        assert!(!close_hook().is_original());
        assert!(s.tear_down().is_ok());
    }

    #[test]
    fn drop_releases_hooks() {
        let mut s = Session::default();
        s.register(close_hook(), Trigger::Always, Lifespan::Permanent)
            .unwrap()
            .enable();
        assert!(!close_hook().is_original());
        drop(s);
        assert!(close_hook().is_original());
    }

    #[test]
    fn body_error_takes_priority() {
        Session::with(|s| {
            let m = s.register(close_hook(), Trigger::Always,
                               Lifespan::Temporary).unwrap();
            m.enable();
            m.mock_mut().open_new_slot();
        });
        let r: std::result::Result<(), MockError> =
            tear_down_after(Err(MockError::value("body failed")));
        assert_eq!(r.unwrap_err(), MockError::value("body failed"));
        // Teardown still happened
        assert!(Session::with(|s| s.is_empty()));
    }
}
