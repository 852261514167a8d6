//! Convention scanning for service-registry
//!
//! `#[provider]` turns an inherent `impl` block into a `Provider`:
//!
//! - `create_*` methods become lazily invoked factories keyed by their return
//!   type. Parameters are resolved from the scope when the factory first runs.
//! - `configure_*` methods taking `&ServiceRegistration` first become
//!   registration actions, run once while the scope is built.
//! - every other method is left alone.
//!
//! # Example
//!
//! ```rust,ignore
//! use service_registry::{provider, Scope, ServiceRegistration};
//! use std::sync::Arc;
//!
//! struct Config { url: String }
//! struct Client { url: String }
//! trait Transport: Send + Sync {}
//! impl Transport for Client {}
//!
//! struct ClientServices;
//!
//! #[provider]
//! impl ClientServices {
//!     #[expose(dyn Transport)]
//!     fn create_client(&self, config: Arc<Config>) -> Client {
//!         Client { url: config.url.clone() }
//!     }
//!
//!     fn configure_banner(&self, registration: &ServiceRegistration<'_>, client: Arc<Client>) {
//!         println!("client at {}", client.url);
//!     }
//! }
//!
//! let scope = Scope::builder()
//!     .instance(Config { url: "https://repo.example.com".into() })
//!     .provider(ClientServices)
//!     .build()?;
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::punctuated::Punctuated;
use syn::{
    FnArg, GenericArgument, ImplItem, ImplItemFn, ItemImpl, PathArguments, ReturnType, Token,
    Type, parse_macro_input,
};

const FACTORY_PREFIX: &str = "create_";
const ACTION_PREFIX: &str = "configure_";

/// Generate a `Provider` implementation from naming conventions.
///
/// # Factories
///
/// A method named `create_<service>` with a `&self` receiver (or none) is a
/// factory. Accepted return types are `T`, `Arc<T>`, `Result<T, E>` and
/// `Result<Arc<T>, E>`; errors are wrapped in `RegistryError::CreationFailed`.
/// Parameters must be dependency types: `Arc<T>`, `Option<Arc<T>>`,
/// `Vec<Arc<T>>` or `Factory<T>`.
///
/// `#[expose(dyn A, dyn B)]` additionally binds the created service under
/// the listed supertypes.
///
/// # Registration actions
///
/// A method named `configure_<anything>` whose first parameter is
/// `&ServiceRegistration` is a registration action; further parameters are
/// dependencies. It returns `()` or `Result<(), E>` with
/// `E: Into<RegistryError>`.
#[proc_macro_attribute]
pub fn provider(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[provider] takes no arguments",
        )
        .to_compile_error()
        .into();
    }

    let mut input = parse_macro_input!(item as ItemImpl);
    match expand_provider(&mut input) {
        Ok(provider_impl) => quote! {
            #input
            #provider_impl
        }
        .into(),
        Err(err) => {
            let err = err.to_compile_error();
            quote! {
                #input
                #err
            }
            .into()
        }
    }
}

fn expand_provider(input: &mut ItemImpl) -> syn::Result<TokenStream2> {
    if let Some((_, path, _)) = &input.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[provider] must be placed on an inherent impl block",
        ));
    }

    let self_ty = input.self_ty.clone();
    let owner = quote!(#self_ty).to_string().replace(' ', "");

    let mut factories = Vec::new();
    let mut actions = Vec::new();

    for item in &mut input.items {
        let ImplItem::Fn(method) = item else {
            continue;
        };
        let name = method.sig.ident.to_string();

        if name.starts_with(FACTORY_PREFIX) {
            let exposed = take_exposed(method)?;
            factories.push(factory_descriptor(method, &owner, &exposed)?);
        } else if name.starts_with(ACTION_PREFIX) && takes_registration(method) {
            actions.push(registration_action(method, &owner)?);
        }
    }

    let (impl_generics, _, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::service_registry::Provider for #self_ty #where_clause {
            fn factories(
                self: ::std::sync::Arc<Self>,
            ) -> ::std::vec::Vec<::service_registry::FactoryDescriptor> {
                let _ = &self;
                ::std::vec![#(#factories),*]
            }

            fn actions(
                self: ::std::sync::Arc<Self>,
            ) -> ::std::vec::Vec<::service_registry::RegistrationAction> {
                let _ = &self;
                ::std::vec![#(#actions),*]
            }
        }
    })
}

/// Remove `#[expose(..)]` from the method and return the listed types
fn take_exposed(method: &mut ImplItemFn) -> syn::Result<Vec<Type>> {
    let mut exposed = Vec::new();
    let mut kept = Vec::with_capacity(method.attrs.len());

    for attr in method.attrs.drain(..) {
        if attr.path().is_ident("expose") {
            let types = attr.parse_args_with(Punctuated::<Type, Token![,]>::parse_terminated)?;
            exposed.extend(types);
        } else {
            kept.push(attr);
        }
    }

    method.attrs = kept;
    Ok(exposed)
}

/// How a method is invoked from the generated closure
enum Receiver {
    /// `&self`: called on a captured `Arc<Self>`
    Shared,
    /// Associated function
    None,
}

fn receiver_of(method: &ImplItemFn) -> syn::Result<Receiver> {
    match method.sig.receiver() {
        None => Ok(Receiver::None),
        Some(receiver) if receiver.reference.is_some() && receiver.mutability.is_none() => {
            Ok(Receiver::Shared)
        }
        Some(receiver) => Err(syn::Error::new_spanned(
            receiver,
            "provider methods must take `&self` or no receiver",
        )),
    }
}

fn reject_generics(method: &ImplItemFn) -> syn::Result<()> {
    if method.sig.generics.params.is_empty() {
        Ok(())
    } else {
        Err(syn::Error::new_spanned(
            &method.sig.generics,
            "provider methods cannot be generic",
        ))
    }
}

/// Parameter types after the receiver
fn typed_params(method: &ImplItemFn) -> Vec<&Type> {
    method
        .sig
        .inputs
        .iter()
        .filter_map(|arg| match arg {
            FnArg::Typed(pat) => Some(&*pat.ty),
            FnArg::Receiver(_) => None,
        })
        .collect()
}

fn takes_registration(method: &ImplItemFn) -> bool {
    match typed_params(method).first() {
        Some(Type::Reference(reference)) => {
            last_segment_is(&reference.elem, "ServiceRegistration")
        }
        _ => false,
    }
}

fn last_segment_is(ty: &Type, name: &str) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == name),
        _ => false,
    }
}

/// First type argument of `Name<..>`, matching on the last path segment
fn type_argument<'a>(ty: &'a Type, name: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != name {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}

/// Build the call expression and the `(__arg0, ..): (A0, ..)` closure parameter
fn invocation(
    method: &ImplItemFn,
    dependencies: &[&Type],
    leading: Option<TokenStream2>,
) -> syn::Result<(TokenStream2, TokenStream2, TokenStream2)> {
    for ty in dependencies {
        if matches!(ty, Type::Reference(_) | Type::ImplTrait(_)) {
            return Err(syn::Error::new_spanned(
                ty,
                "dependencies must be owned: Arc<T>, Option<Arc<T>>, Vec<Arc<T>> or Factory<T>",
            ));
        }
    }

    let ident = &method.sig.ident;
    let args: Vec<_> = (0..dependencies.len())
        .map(|i| format_ident!("__arg{}", i))
        .collect();
    let leading: Vec<_> = leading.into_iter().collect();

    let (capture, call) = match receiver_of(method)? {
        Receiver::Shared => (
            quote!(let __this = ::std::sync::Arc::clone(&self);),
            quote!(__this.#ident(#(#leading,)* #(#args),*)),
        ),
        Receiver::None => (quote!(), quote!(Self::#ident(#(#leading,)* #(#args),*))),
    };
    let param = quote!((#(#args,)*): (#(#dependencies,)*));

    Ok((capture, param, call))
}

fn factory_descriptor(method: &ImplItemFn, owner: &str, exposed: &[Type]) -> syn::Result<TokenStream2> {
    reject_generics(method)?;

    let ReturnType::Type(_, output) = &method.sig.output else {
        return Err(syn::Error::new_spanned(
            &method.sig,
            "create_* methods must return the service they create",
        ));
    };

    let (produced, fallible) = match type_argument(output, "Result") {
        Some(ok) => (ok, true),
        None => (&**output, false),
    };
    let (service, shared) = match type_argument(produced, "Arc") {
        Some(inner) => (inner, true),
        None => (produced, false),
    };

    let name = format!("{}::{}", owner, method.sig.ident);
    let dependencies = typed_params(method);
    let (capture, param, call) = invocation(method, &dependencies, None)?;

    let body = if fallible {
        quote! {
            #call.map_err(|__err| {
                ::service_registry::RegistryError::creation_failed::<#service>(__err)
            })
        }
    } else {
        quote!(::std::result::Result::Ok(#call))
    };

    let constructor = if shared {
        quote!(from_arc)
    } else {
        quote!(new)
    };

    Ok(quote! {
        {
            #capture
            ::service_registry::FactoryDescriptor::#constructor::<#service, _, _>(
                #name,
                move |#param| #body,
            )
            #(.exposed_as::<#exposed, #service, _>(|__value| __value))*
        }
    })
}

fn registration_action(method: &ImplItemFn, owner: &str) -> syn::Result<TokenStream2> {
    reject_generics(method)?;

    let name = format!("{}::{}", owner, method.sig.ident);
    let params = typed_params(method);
    let dependencies = &params[1..];
    let (capture, param, call) = invocation(method, dependencies, Some(quote!(__registration)))?;

    let body = match &method.sig.output {
        ReturnType::Default => quote! {
            #call;
            ::std::result::Result::Ok(())
        },
        ReturnType::Type(..) => quote! {
            #call.map_err(::std::convert::Into::into)
        },
    };

    Ok(quote! {
        {
            #capture
            ::service_registry::RegistrationAction::with_dependencies(
                #name,
                move |__registration: &::service_registry::ServiceRegistration<'_>, #param| {
                    #body
                },
            )
        }
    })
}
