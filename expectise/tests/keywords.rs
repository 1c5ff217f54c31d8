// vim: tw=80
//! Hand-written hooks for callables that take named options.

use expectise::*;

thread_local! {
    static CONNECT: HookCell<(String,), Result<u16, String>> =
        HookCell::permanent(Trigger::Always);
}

fn connect_hook() -> Hook<(String,), Result<u16, String>> {
    Hook::new(&CONNECT, || Identity::function(module_path!(), "connect"))
}

fn connect(host: &str, timeout: Option<u64>, retries: u8)
    -> Result<u16, String>
{
    let args = || {
        Arguments::new((host.to_owned(),), kwargs!{
            timeout = timeout,
            retries = retries,
        })
    };
    if let Intercept::Return(r) = connect_hook().call_with(args) {
        return r;
    }
    Err(format!("no route to {host}"))
}

#[test]
fn matching_keywords() {
    let _expectations = Expectations::new();
    Expect::new(connect_hook())
        .to_receive_with(("db".to_owned(),),
                         kwargs!{ retries = 3u8, timeout = Some(5u64) })
        .and_return(Ok(5432));
    assert_eq!(connect("db", Some(5), 3), Ok(5432));
}

#[test]
fn mismatched_keywords() {
    Expect::new(connect_hook())
        .to_receive_with(("db".to_owned(),),
                         kwargs!{ timeout = Some(5u64), retries = 3u8 })
        .and_return(Ok(5432));
    let e = connect_hook()
        .try_call_with(|| Arguments::new(("db".to_owned(),),
                                         kwargs!{ timeout = None::<u64>,
                                                  retries = 3u8 }))
        .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Expectation);
    assert!(e.message().starts_with(
        "`keywords::connect` called with unexpected keyword arguments:"));
    tear_down().unwrap();
}

#[test]
fn positional_arguments_are_checked_first() {
    Expect::new(connect_hook())
        .to_receive_with(("db".to_owned(),), kwargs!{ timeout = Some(5u64) })
        .and_return(Ok(5432));
    let e = connect_hook()
        .try_call_with(|| Arguments::new(("cache".to_owned(),),
                                         kwargs!{ timeout = None::<u64> }))
        .unwrap_err();
    assert!(e.message().contains("unexpected positional arguments"));
    tear_down().unwrap();
}

#[test]
fn keyword_types_must_agree() {
    Expect::new(connect_hook())
        .to_receive_with(("db".to_owned(),), kwargs!{ retries = 3u32 })
        .and_return(Ok(1));
    let e = connect_hook()
        .try_call_with(|| Arguments::new(("db".to_owned(),),
                                         kwargs!{ retries = 3u8 }))
        .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Expectation);
    tear_down().unwrap();
}

#[test]
fn positional_only_matcher_rejects_keywords() {
    let _expectations = Expectations::new();
    Expect::new(connect_hook()).to_receive(("db".to_owned(),))
        .and_return(Ok(1));
    let r = connect_hook().try_call_with(|| {
        Arguments::new(("db".to_owned(),), kwargs!{ retries = 1u8 })
    });
    assert!(r.is_err());
}

#[test]
fn call_kw_shorthand() {
    let _expectations = Expectations::new();
    Expect::new(connect_hook())
        .to_receive_with(("db".to_owned(),), kwargs!{ retries = 2u8 })
        .and_return(Err("refused".to_owned()));
    let r = connect_hook().call_kw(|| ("db".to_owned(),),
                                   kwargs!{ retries = 2u8 });
    assert_eq!(r, Intercept::Return(Err("refused".to_owned())));
}
