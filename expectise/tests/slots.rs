// vim: tw=80
//! Expectation slots are consumed in declaration order.

use std::env;

use expectise::*;

#[derive(Debug, PartialEq)]
pub struct MathError(String);

impl From<&str> for MathError {
    fn from(s: &str) -> Self {
        MathError(s.to_owned())
    }
}

#[mock_if("EXPECTISE_TEST_SLOTS", "test")]
fn square(a: i32) -> Result<i32, MathError> {
    Ok(a * a)
}

#[mock_if("EXPECTISE_TEST_SLOTS", "test")]
fn describe(name: &str, tags: &[u8]) -> String {
    format!("{name}: {tags:?}")
}

#[mock_if("EXPECTISE_TEST_SLOTS", "test")]
fn beep() {
    println!("beep");
}

fn setup() {
    env::set_var("EXPECTISE_TEST_SLOTS", "test");
}

#[test]
fn return_then_raise() {
    setup();
    let _expectations = Expectations::new();
    Expect::new(square_hook()).and_return(Ok(4));
    Expect::new(square_hook()).and_raise(MathError("boom".to_owned()));
    assert_eq!(square(2), Ok(4));
    assert_eq!(square(2), Err(MathError("boom".to_owned())));
}

#[test]
fn raise_converts_the_error() {
    setup();
    let _expectations = Expectations::new();
    Expect::new(square_hook()).to_raise("boom");
    assert_eq!(square(7), Err(MathError("boom".to_owned())));
}

#[test]
fn any_arguments() {
    setup();
    let _expectations = Expectations::new();
    for _ in 0..3 {
        Expect::new(square_hook()).and_return(Ok(0));
    }
    assert_eq!(square(1), Ok(0));
    assert_eq!(square(-1), Ok(0));
    assert_eq!(square(i32::MAX), Ok(0));
}

#[test]
fn matchers_do_not_reorder_slots() {
    setup();
    Expect::new(square_hook()).to_receive((2,)).and_return(Ok(4));
    Expect::new(square_hook()).to_receive((3,)).and_return(Ok(9));
    let e = square_hook().try_call(|| (3,)).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Expectation);
    assert_eq!(square(3), Ok(9));
    tear_down().unwrap();
}

#[test]
fn mismatch_shows_a_diff() {
    setup();
    Expect::new(describe_hook())
        .to_receive(("bob".to_owned(), vec![1, 2]))
        .and_return(String::new());
    let e = describe_hook()
        .try_call(|| ("alice".to_owned(), vec![1, 2]))
        .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Expectation);
    let msg = e.message();
    assert!(msg.starts_with("`slots::describe` called with unexpected \
                             positional arguments:"));
    assert!(msg.contains("bob"));
    assert!(msg.contains("alice"));
    tear_down().unwrap();
}

#[test]
#[should_panic(expected = "called with unexpected positional arguments")]
fn mismatch_panics_at_the_call_site() {
    setup();
    let _expectations = Expectations::new();
    Expect::new(square_hook()).to_receive((2,)).and_return(Ok(4));
    let _ = square(3);
}

#[test]
fn reference_arguments() {
    setup();
    let _expectations = Expectations::new();
    Expect::new(describe_hook())
        .to_receive(("bob".to_owned(), vec![7]))
        .and_return("mocked".to_owned());
    assert_eq!(describe("bob", &[7]), "mocked");
}

#[test]
fn unit_return() {
    setup();
    let _expectations = Expectations::new();
    Expect::new(beep_hook()).to_return(());
    beep();
}

#[test]
#[should_panic(expected = "scripted failure")]
fn scripted_panic() {
    setup();
    let _expectations = Expectations::new();
    Expect::new(beep_hook()).to_panic("scripted failure");
    beep();
}

#[test]
fn incomplete_statement() {
    setup();
    let _ = Expect::new(square_hook());
    let e = square_hook().try_call(|| (1,)).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Environment);
    assert_eq!(e.message(),
        "Incomplete `Expect` statement for callable `slots::square`.  Make \
         sure the mock is properly set up by defining the expected return \
         value or execution error.");
    tear_down().unwrap();
}

#[test]
#[should_panic(expected = "EnvironmentError: Arguments check already set")]
fn arguments_set_twice() {
    setup();
    Expect::new(square_hook()).to_receive((1,)).to_receive((2,));
}

#[test]
#[should_panic(expected = "EnvironmentError: Execution error already set")]
fn raise_then_return() {
    setup();
    Expect::new(square_hook()).to_raise("boom").to_return(Ok(1));
}
