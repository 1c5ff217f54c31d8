// vim: tw=80
//! Permanent and temporary mocks across teardown, and explicit disabling.

use std::env;

use expectise::*;

#[mockable]
fn roll() -> u8 {
    4
}

#[mock_if("EXPECTISE_TEST_LIFESPANS", "test")]
fn flip() -> bool {
    true
}

#[mock_if("EXPECTISE_TEST_LIFESPANS_UNSET", "test")]
fn shout(word: &str) -> String {
    word.to_uppercase()
}

fn setup() {
    env::set_var("EXPECTISE_TEST_LIFESPANS", "test");
}

#[test]
fn mockable_is_original_until_mocked() {
    assert_eq!(roll(), 4);
    let e = Expect::try_new(roll_hook()).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Environment);
    assert!(e.message().starts_with(
        "Callable `lifespans::roll` is not marked as mocked"));
    tear_down().unwrap();
}

#[test]
fn temporary_mock_is_restored() {
    {
        let _expectations = Expectations::new();
        mock(roll_hook());
        assert!(roll_hook().try_call(|| ()).is_err());
        Expect::new(roll_hook()).and_return(6);
        assert_eq!(roll(), 6);
    }
    assert_eq!(roll(), 4);
    assert!(Session::with(|s| !s.contains(&roll_hook().identity())));
}

#[test]
fn mock_twice_keeps_expectations() {
    let _expectations = Expectations::new();
    mock(roll_hook());
    Expect::new(roll_hook()).and_return(1);
    mock(roll_hook());
    assert_eq!(roll(), 1);
}

#[test]
fn permanent_mock_is_reset() {
    setup();
    {
        let _expectations = Expectations::new();
        Expect::new(flip_hook()).and_return(false);
        assert!(!flip());
    }
    Session::with(|s| {
        let identity = flip_hook().identity();
        assert!(s.contains(&identity));
        let marker = s.lookup_dyn(&identity).unwrap();
        assert_eq!(marker.lifespan(), Lifespan::Permanent);
        assert_eq!((marker.expected(), marker.performed()), (0, 0));
        assert!(marker.is_enabled());
    });
    let e = flip_hook().try_call(|| ()).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Environment);
}

#[test]
fn never_mocked_cannot_be_disabled() {
    let e = disable_mock(roll_hook()).unwrap_err();
    assert_eq!(e, MockError::value(
        "Callable `lifespans::roll` was never mocked, so it cannot be \
         disabled."));
}

#[test]
fn explicit_disable_survives_teardown() {
    setup();
    disable_mock(flip_hook()).unwrap();
    assert!(flip());
    tear_down().unwrap();
    assert!(flip());
    let e = Expect::try_new(flip_hook()).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Environment);
    tear_down().unwrap();

    // Only a new declaration lifts it
    mock(flip_hook());
    Expect::new(flip_hook()).and_return(false);
    assert!(!flip());
    tear_down().unwrap();
    assert!(flip_hook().try_call(|| ()).is_err());
}

#[test]
fn disable_temporary_mock() {
    let _expectations = Expectations::new();
    mock(roll_hook());
    disable_mock(roll_hook()).unwrap();
    assert_eq!(roll(), 4);
}

#[test]
fn register_is_idempotent() {
    setup();
    Session::with(|s| {
        for _ in 0..2 {
            s.register(flip_hook(), Trigger::env("EXPECTISE_TEST_LIFESPANS",
                                                 "test"),
                       Lifespan::Permanent)
                .unwrap()
                .enable();
        }
    });
    Expect::new(flip_hook()).and_return(false);
    Session::with(|s| {
        let marker = s.register(flip_hook(), Trigger::Always,
                                Lifespan::Temporary).unwrap();
        assert_eq!(marker.lifespan(), Lifespan::Permanent);
        assert_eq!(marker.mock().expected(), 1);
        assert_eq!(s.len(), 1);
    });
    assert!(!flip());
    tear_down().unwrap();
}

#[test]
fn mock_ignores_an_unmet_trigger() {
    assert_eq!(shout("hi"), "HI");
    mock(shout_hook());
    let e = shout_hook().try_call(|| ("hi".to_owned(),)).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Environment);
    assert!(e.message().contains("is marked as mocked"));
    Expect::new(shout_hook()).to_receive(("hi".to_owned(),))
        .and_return("mocked".to_owned());
    assert_eq!(shout("hi"), "mocked");
    tear_down().unwrap();

    // Only for the current test: the trigger decides again afterwards
    assert_eq!(shout("hi"), "HI");
    let e = Expect::try_new(shout_hook()).unwrap_err();
    assert!(e.message().contains("is not mocked in the current environment"));
    tear_down().unwrap();
}
