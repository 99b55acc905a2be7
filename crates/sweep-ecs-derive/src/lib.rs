//! Derive macro for Sweep ECS components.
//!
//! `#[derive(Component)]` opts a type into being stored in a `World`.
//! Add `#[component(deferred)]` to have `World::register` give the type a
//! pool that buffers removals until it is flushed.
//!
//! ```ignore
//! #[derive(Component)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Component)]
//! #[component(deferred)]
//! struct Projectile { ttl: u32 }
//! ```

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, DeriveInput, Meta};

/// Read `#[component(...)]` options. Returns whether `deferred` was given.
fn parse_options(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut deferred = false;

    for attr in attrs {
        if !attr.path().is_ident("component") {
            continue;
        }
        let Meta::List(_) = &attr.meta else {
            return Err(syn::Error::new_spanned(
                attr,
                "expected `#[component(deferred)]`",
            ));
        };
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("deferred") {
                deferred = true;
                Ok(())
            } else {
                Err(meta.error("unknown component option; the only option is `deferred`"))
            }
        })?;
    }

    Ok(deferred)
}

/// Derive `sweep_ecs::Component`.
#[proc_macro_derive(Component, attributes(component))]
pub fn derive_component(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);

    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let deferred = parse_options(&input.attrs)?;

    if let syn::Data::Union(data) = &input.data {
        return Err(syn::Error::new_spanned(
            data.union_token,
            "unions cannot derive Component; use a struct or enum instead",
        ));
    }

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::sweep_ecs::Component for #name #ty_generics #where_clause {
            const DEFERRED: bool = #deferred;
        }
    })
}
