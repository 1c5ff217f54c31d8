// vim: tw=80
//! Classification and rewriting of hooked functions.
use super::*;

/// Calling convention of a hooked function, as read from its signature.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Kind {
    Function,
    Method,
    Associated,
    Getter
}

impl Kind {
    fn path(self) -> TokenStream {
        match self {
            Kind::Function => quote!(::expectise::Kind::Function),
            Kind::Method => quote!(::expectise::Kind::Method),
            Kind::Associated => quote!(::expectise::Kind::Associated),
            Kind::Getter => quote!(::expectise::Kind::Getter),
        }
    }
}

/// Where the hooked function is declared.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Owner<'a> {
    /// A module: the function is free.
    Module,
    /// An inherent `impl` block of this type.
    Type(&'a Type)
}

/// A function about to be hooked, in whichever form it was declared.
pub(crate) struct Callable {
    pub attrs: Vec<Attribute>,
    pub vis: Visibility,
    pub sig: Signature,
    pub block: Block
}

impl From<ItemFn> for Callable {
    fn from(f: ItemFn) -> Self {
        Callable { attrs: f.attrs, vis: f.vis, sig: f.sig, block: *f.block }
    }
}

impl From<ImplItemFn> for Callable {
    fn from(f: ImplItemFn) -> Self {
        Callable { attrs: f.attrs, vis: f.vis, sig: f.sig, block: f.block }
    }
}

/// Everything the generated code needs to know about a hooked function.
pub(crate) struct Decoration<'a> {
    owner: Owner<'a>,
    ident: Ident,
    kind: Kind,
    /// Owned types of the arguments, receiver excluded
    argty: Vec<Type>,
    /// Expressions producing an owned copy of each argument
    argexprs: Vec<TokenStream>,
    output: Type
}

impl<'a> Decoration<'a> {
    /// Classify `sig` and compute the argument tuple it is matched with.
    pub(crate) fn strip(owner: Owner<'a>, sig: &Signature, getter: bool)
        -> syn::Result<Self>
    {
        if let Some(t) = &sig.asyncness {
            return Err(Error::new(t.span(),
                "async functions cannot be hooked"));
        }
        if let Some(t) = &sig.constness {
            return Err(Error::new(t.span(),
                "const functions cannot be hooked"));
        }
        if !sig.generics.params.is_empty() || sig.generics.where_clause.is_some()
        {
            return Err(Error::new(sig.generics.span(),
                "generic functions cannot be hooked"));
        }
        if let Some(v) = &sig.variadic {
            return Err(Error::new(v.span(),
                "variadic functions cannot be hooked"));
        }

        let mut receiver = None;
        let mut argty = Vec::new();
        let mut argexprs = Vec::new();
        for fn_arg in sig.inputs.iter() {
            match fn_arg {
                FnArg::Receiver(r) => receiver = Some(r),
                FnArg::Typed(pt) => {
                    let ident = arg_ident(&pt.pat)?;
                    let (ty, expr) = match pt.ty.as_ref() {
                        Type::Reference(r) => {
                            let elem = owned_type(owner, &r.elem)?;
                            (parse_quote!(
                                <#elem as ::std::borrow::ToOwned>::Owned
                            ), quote!(::std::borrow::ToOwned::to_owned(&*#ident)))
                        },
                        ty => (owned_type(owner, ty)?,
                               quote!(::std::clone::Clone::clone(&#ident)))
                    };
                    argty.push(ty);
                    argexprs.push(expr);
                }
            }
        }

        let output = match &sig.output {
            ReturnType::Default => parse_quote!(()),
            ReturnType::Type(_, ty) => match ty.as_ref() {
                Type::Never(_) => {
                    return Err(Error::new(ty.span(),
                        "diverging functions cannot be hooked"));
                },
                ty => owned_type(owner, ty)?
            }
        };

        let kind = match (owner, receiver) {
            (_, Some(r)) if getter => {
                if r.reference.is_none() || r.mutability.is_some() ||
                    r.colon_token.is_some() || !argty.is_empty() ||
                    matches!(sig.output, ReturnType::Default)
                {
                    return Err(Error::new(sig.span(),
                        "a getter must take `&self` and no other argument, \
                         and return a value"));
                }
                Kind::Getter
            },
            (_, None) if getter => {
                return Err(Error::new(sig.span(),
                    "a getter must take `&self` and no other argument, and \
                     return a value"));
            },
            (Owner::Module, Some(r)) => {
                return Err(Error::new(r.span(),
                    "methods are hooked through their `impl` block: put \
                     `#[mockable]` on the `impl` block as well"));
            },
            (Owner::Type(_), Some(_)) => Kind::Method,
            (Owner::Type(_), None) => Kind::Associated,
            (Owner::Module, None) => Kind::Function
        };

        Ok(Decoration {
            owner,
            ident: sig.ident.clone(),
            kind,
            argty,
            argexprs,
            output
        })
    }

    pub(crate) fn kind(&self) -> Kind {
        self.kind
    }

    /// Name of the companion function returning the hook: eg "add" =>
    /// "add_hook"
    pub(crate) fn hook_ident(&self) -> Ident {
        format_ident!("{}_hook", self.ident)
    }

    /// Re-emit `callable` so that it consults its hook first, followed by
    /// the companion function that builds the hook.
    ///
    /// `trigger` is the environment variable and value of a permanently
    /// mocked function.
    pub(crate) fn add(&self, callable: Callable,
                      trigger: Option<&(LitStr, LitStr)>) -> TokenStream
    {
        let Callable { attrs, vis, sig, block } = callable;
        let hook_ident = self.hook_ident();
        let name = self.ident.to_string();
        let argty = &self.argty;
        let argexprs = &self.argexprs;
        let output = &self.output;
        let args = quote!((#(#argty,)*));
        let hook_call = match self.owner {
            Owner::Module => quote!(#hook_ident()),
            Owner::Type(_) => quote!(Self::#hook_ident())
        };
        let identity = match self.owner {
            Owner::Module => quote!(
                ::expectise::Identity::function(::std::module_path!(), #name)
            ),
            Owner::Type(_) => {
                let kind = self.kind.path();
                quote!(::expectise::Identity::method(
                    ::std::any::type_name::<Self>(), #name, #kind))
            }
        };
        let cell = match trigger {
            Some((key, value)) => quote!(
                ::expectise::HookCell::permanent(
                    ::expectise::Trigger::env(#key, #value))
            ),
            None => quote!(::expectise::HookCell::new())
        };
        let doc = format!("Hook of `{name}`, for use in `Expect` statements.");
        quote!(
            #(#attrs)*
            #vis #sig {
                if let ::expectise::Intercept::Return(__expectise_r) =
                    #hook_call.call(|| (#(#argexprs,)*))
                {
                    return __expectise_r;
                }
                #block
            }

            #[doc = #doc]
            #vis fn #hook_ident() -> ::expectise::Hook<#args, #output> {
                ::std::thread_local! {
                    static HOOK: ::expectise::HookCell<#args, #output> = #cell;
                }
                ::expectise::Hook::new(&HOOK, || #identity)
            }
        )
    }
}

fn arg_ident(pat: &Pat) -> syn::Result<&Ident> {
    match pat {
        Pat::Ident(pi) => {
            if let Some(r) = &pi.by_ref {
                return Err(Error::new(r.span(),
                    "by-reference argument bindings cannot be hooked"));
            }
            if let Some((_at, subpat)) = &pi.subpat {
                return Err(Error::new(subpat.span(),
                    "subpattern bindings cannot be hooked"));
            }
            Ok(&pi.ident)
        },
        _ => Err(Error::new(pat.span(),
            "hooked functions must have named arguments"))
    }
}

/// Check that `ty` can be stored in a hook, replacing `Self` with the owner
/// type.
fn owned_type(owner: Owner, ty: &Type) -> syn::Result<Type> {
    if let Type::ImplTrait(_) = ty {
        return Err(Error::new(ty.span(),
            "`impl Trait` types cannot be hooked"));
    }
    let ts = match owner {
        Owner::Module => {
            if let Some(span) = find_self(ty.to_token_stream()) {
                return Err(Error::new(span,
                    "`Self` can only be used by functions hooked through \
                     their `impl` block"));
            }
            ty.to_token_stream()
        },
        Owner::Type(self_ty) => deselfify(ty.to_token_stream(), self_ty)
    };
    if let Some(span) = find_borrow(ts.clone()) {
        return Err(Error::new(span,
            "hooked functions can only take and return 'static types, apart \
             from top-level reference arguments"));
    }
    syn::parse2(ts)
}

fn find_self(ts: TokenStream) -> Option<Span> {
    ts.into_iter().find_map(|tt| match tt {
        TokenTree::Ident(i) if i == "Self" => Some(i.span()),
        TokenTree::Group(g) => find_self(g.stream()),
        _ => None
    })
}

/// Replace every `Self` with `self_ty`
fn deselfify(ts: TokenStream, self_ty: &Type) -> TokenStream {
    ts.into_iter().map(|tt| match tt {
        TokenTree::Ident(i) if i == "Self" => self_ty.to_token_stream(),
        TokenTree::Group(g) => {
            let mut ng = Group::new(g.delimiter(), deselfify(g.stream(),
                                                             self_ty));
            ng.set_span(g.span());
            TokenTree::Group(ng).into()
        },
        tt => tt.into()
    }).collect()
}

/// Find any reference or lifetime that isn't 'static
fn find_borrow(ts: TokenStream) -> Option<Span> {
    let tokens: Vec<TokenTree> = ts.into_iter().collect();
    let is_static = |i: usize| {
        matches!(tokens.get(i), Some(TokenTree::Ident(id)) if id == "static")
    };
    for (i, tt) in tokens.iter().enumerate() {
        match tt {
            TokenTree::Punct(p) if p.as_char() == '&' => {
                let lifetime = matches!(tokens.get(i + 1),
                    Some(TokenTree::Punct(q)) if q.as_char() == '\'');
                if !lifetime || !is_static(i + 2) {
                    return Some(p.span());
                }
            },
            TokenTree::Punct(p) if p.as_char() == '\'' => {
                if !is_static(i + 1) {
                    return Some(p.span());
                }
            },
            TokenTree::Group(g) => {
                if let Some(span) = find_borrow(g.stream()) {
                    return Some(span);
                }
            },
            _ => ()
        }
    }
    None
}
