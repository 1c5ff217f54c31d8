// vim: tw=80
//! Proc Macros for use with Expectise
//!
//! You probably don't want to use this crate directly.  Instead, you use its
//! reexports via the [`expectise`](../expectise/index.html) crate.

extern crate proc_macro;

use proc_macro2::{Group, Span, TokenStream, TokenTree};
use quote::{format_ident, quote, ToTokens};
use syn::{
    parse::{ParseStream, Parser},
    parse_quote,
    spanned::Spanned,
    Attribute,
    Block,
    Error,
    FnArg,
    Ident,
    ImplItem,
    ImplItemFn,
    Item,
    ItemFn,
    ItemImpl,
    LitStr,
    Meta,
    Pat,
    ReturnType,
    Signature,
    Token,
    Type,
    Visibility,
};

mod decoration;
use crate::decoration::{Callable, Decoration, Owner};

/// Which attribute is being expanded
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Annotation {
    MockIf,
    Mockable
}

impl Annotation {
    fn name(self) -> &'static str {
        match self {
            Annotation::MockIf => "mock_if",
            Annotation::Mockable => "mockable"
        }
    }

    /// Identify one of our attributes, however its path is spelled.
    fn of(attr: &Attribute) -> Option<Self> {
        let last = attr.path().segments.last()?;
        if last.ident == "mock_if" {
            Some(Annotation::MockIf)
        } else if last.ident == "mockable" {
            Some(Annotation::Mockable)
        } else {
            None
        }
    }
}

/// Arguments of one attribute
#[derive(Debug, Default)]
struct Attrs {
    /// Environment variable and value that activate a permanent mock
    trigger: Option<(LitStr, LitStr)>,
    getter: bool
}

impl Attrs {
    fn parse(annotation: Annotation, ts: TokenStream) -> syn::Result<Self> {
        let parser = |input: ParseStream| {
            let trigger = if annotation == Annotation::MockIf {
                let key: LitStr = input.parse()?;
                input.parse::<Token![,]>()?;
                let value: LitStr = input.parse()?;
                if !input.is_empty() {
                    input.parse::<Token![,]>()?;
                }
                Some((key, value))
            } else {
                None
            };
            let mut getter = false;
            if !input.is_empty() {
                let flag: Ident = input.parse()?;
                if flag != "getter" {
                    return Err(Error::new(flag.span(),
                        "unknown option: the only option is `getter`"));
                }
                getter = true;
                input.parse::<Option<Token![,]>>()?;
            }
            Ok(Attrs { trigger, getter })
        };
        parser.parse2(ts)
    }

    /// Parse an attribute found on a method of a `#[mockable]` impl block.
    fn from_attribute(annotation: Annotation, attr: &Attribute)
        -> syn::Result<Self>
    {
        match &attr.meta {
            Meta::Path(_) => Attrs::parse(annotation, TokenStream::new()),
            Meta::List(l) => Attrs::parse(annotation, l.tokens.clone()),
            Meta::NameValue(nv) => Err(Error::new(nv.span(),
                "expected a parenthesized argument list"))
        }
    }
}

fn hook_fn(owner: Owner, attrs: &Attrs, callable: Callable)
    -> syn::Result<TokenStream>
{
    let decoration = Decoration::strip(owner, &callable.sig, attrs.getter)?;
    Ok(decoration.add(callable, attrs.trigger.as_ref()))
}

/// Hook every method of `item_impl` that carries one of our attributes.
fn hook_impl(mut item_impl: ItemImpl) -> syn::Result<TokenStream> {
    if let Some((_, path, _)) = &item_impl.trait_ {
        return Err(Error::new(path.span(),
            "trait implementations cannot be hooked, because they cannot \
             hold the companion hook functions"));
    }
    if !item_impl.generics.params.is_empty() ||
        item_impl.generics.where_clause.is_some()
    {
        return Err(Error::new(item_impl.generics.span(),
            "generic impl blocks cannot be hooked"));
    }
    let self_ty = item_impl.self_ty.as_ref().clone();
    let mut items = Vec::new();
    for item in std::mem::take(&mut item_impl.items) {
        let mut f = match item {
            ImplItem::Fn(f) => f,
            other => {
                items.push(other.into_token_stream());
                continue;
            }
        };
        let mut annotation = None;
        let mut error = None;
        f.attrs.retain(|attr| match Annotation::of(attr) {
            Some(a) if annotation.is_none() => {
                annotation = Some(Attrs::from_attribute(a, attr));
                false
            },
            Some(a) => {
                error = Some(Error::new(attr.span(), format!(
                    "`{}` must be the only hooking attribute of a method",
                    a.name())));
                false
            },
            None => true
        });
        if let Some(e) = error {
            return Err(e);
        }
        match annotation {
            Some(attrs) => {
                let attrs = attrs?;
                items.push(hook_fn(Owner::Type(&self_ty), &attrs,
                                   Callable::from(f))?);
            },
            None => items.push(f.into_token_stream())
        }
    }
    let ItemImpl { attrs, defaultness, unsafety, impl_token, self_ty, .. } =
        item_impl;
    Ok(quote!(
        #(#attrs)*
        #defaultness #unsafety #impl_token #self_ty {
            #(#items)*
        }
    ))
}

fn do_hook(annotation: Annotation, attrs: TokenStream, input: TokenStream)
    -> syn::Result<TokenStream>
{
    let item: Item = syn::parse2(input)?;
    match item {
        Item::Fn(f) => {
            let attrs = Attrs::parse(annotation, attrs)?;
            hook_fn(Owner::Module, &attrs, Callable::from(f))
        },
        Item::Impl(i) if annotation == Annotation::Mockable => {
            if !attrs.is_empty() {
                return Err(Error::new(attrs.span(),
                    "`#[mockable]` takes no arguments on an impl block: \
                     annotate its methods instead"));
            }
            hook_impl(i)
        },
        Item::Impl(i) => Err(Error::new(i.impl_token.span(),
            "`#[mock_if]` applies to single functions: put it on the methods \
             of an impl block marked `#[mockable]`")),
        other => Err(Error::new(other.span(), format!(
            "`#[{}]` can only be applied to functions and impl blocks",
            annotation.name())))
    }
}

/// Mock a function permanently, whenever an environment variable has a
/// given value.
///
/// The environment is read every time the mock is armed: the first time the
/// function is touched on a thread, then at every teardown.  While the
/// variable does not hold the value, the function behaves normally.
///
/// The attribute takes the variable's name, the value, and optionally the
/// `getter` flag for accessors taking `&self` and nothing else.  It also
/// defines a companion function, named after the original with a `_hook`
/// suffix, that returns the function's [`Hook`].
///
/// Methods are hooked by putting `#[mockable]` on their `impl` block as well.
/// Trait implementations and generic functions are not supported.
///
/// # Examples
///
/// ```
/// # use expectise::*;
/// #[mock_if("EXPECTISE_DOC_ENV", "test")]
/// fn add(a: i32, b: i32) -> i32 {
///     a + b
/// }
///
/// std::env::set_var("EXPECTISE_DOC_ENV", "test");
/// let _expectations = Expectations::new();
/// Expect::new(add_hook()).to_receive((1, 2)).and_return(4);
/// assert_eq!(add(1, 2), 4);
/// ```
///
/// Methods, including getters:
/// ```
/// # use expectise::*;
/// pub struct Thermometer {
///     celsius: f64
/// }
///
/// #[mockable]
/// impl Thermometer {
///     #[mock_if("EXPECTISE_DOC_THERMO", "test", getter)]
///     pub fn celsius(&self) -> f64 {
///         self.celsius
///     }
///
///     #[mock_if("EXPECTISE_DOC_THERMO", "test")]
///     pub fn calibrate(&mut self, offset: f64) -> Result<(), String> {
///         self.celsius += offset;
///         Ok(())
///     }
/// }
///
/// std::env::set_var("EXPECTISE_DOC_THERMO", "test");
/// let _expectations = Expectations::new();
/// let mut t = Thermometer { celsius: 20.0 };
/// Expect::new(Thermometer::celsius_hook()).and_return(-40.0);
/// Expect::new(Thermometer::calibrate_hook()).to_receive((1.5,))
///     .and_raise("out of range");
/// assert_eq!(t.celsius(), -40.0);
/// assert_eq!(t.calibrate(1.5), Err("out of range".to_owned()));
/// ```
///
/// [`Hook`]: ../expectise/struct.Hook.html
#[proc_macro_attribute]
pub fn mock_if(attrs: proc_macro::TokenStream, input: proc_macro::TokenStream)
    -> proc_macro::TokenStream
{
    do_hook(Annotation::MockIf, attrs.into(), input.into())
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

/// Make a function mockable on demand, with [`mock`].
///
/// Until `mock` is called on its hook, the function behaves normally.  Like
/// [`macro@mock_if`], it defines a companion `_hook` function, and accepts the
/// `getter` flag.
///
/// On an `impl` block, `#[mockable]` hooks the methods that carry
/// `#[mockable]` or `#[mock_if]` themselves, and leaves the others alone.
///
/// # Examples
///
/// ```
/// # use expectise::*;
/// pub struct Repo;
///
/// #[mockable]
/// impl Repo {
///     #[mockable]
///     pub fn open(path: &str) -> Option<Repo> {
///         std::path::Path::new(path).exists().then_some(Repo)
///     }
/// }
///
/// let _expectations = Expectations::new();
/// mock(Repo::open_hook());
/// Expect::new(Repo::open_hook()).to_receive(("/nowhere".to_owned(),))
///     .and_return(Some(Repo));
/// assert!(Repo::open("/nowhere").is_some());
/// ```
///
/// [`mock`]: ../expectise/fn.mock.html
#[proc_macro_attribute]
pub fn mockable(attrs: proc_macro::TokenStream, input: proc_macro::TokenStream)
    -> proc_macro::TokenStream
{
    do_hook(Annotation::Mockable, attrs.into(), input.into())
        .unwrap_or_else(Error::into_compile_error)
        .into()
}
