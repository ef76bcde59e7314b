//! Pacebench Macros
//!
//! Procedural macros for suite and setup registration.
//!
//! ## Macros
//!
//! - `#[pacebench::suite]` - Register a suite declaration function
//! - `#[pacebench::setup]` - Register hooks and options shared by every suite

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{FnArg, ItemFn, parse_macro_input};

mod attr {
    use syn::meta::ParseNestedMeta;

    /// Get the attribute name as a string
    pub fn name(meta: &ParseNestedMeta) -> String {
        meta.path
            .get_ident()
            .map(|i| i.to_string())
            .unwrap_or_default()
    }

    /// Parse a string literal attribute: `attr = "value"`
    pub fn string(meta: &ParseNestedMeta) -> syn::Result<String> {
        let value: syn::LitStr = meta.value()?.parse()?;
        Ok(value.value())
    }

    /// Create an unknown attribute error
    pub fn unknown(meta: &ParseNestedMeta, name: &str) -> syn::Error {
        meta.error(format!("unknown attribute: {}", name))
    }
}

/// Register a suite
///
/// The function receives the suite root and declares describes, tests and
/// hooks on it. The suite is named after the function unless `name` is given.
///
/// # Example
///
/// ```ignore
/// #[pacebench::suite]
/// fn parsing(rt: &mut Runtime) {
///     rt.describe("json", |rt| {
///         rt.test("small document", |ctx| ctx.measure(|| parse(SMALL)));
///     });
/// }
///
/// #[pacebench::suite(name = "string formatting")]
/// fn formatting(rt: &mut Runtime) { ... }
/// ```
#[proc_macro_attribute]
pub fn suite(args: TokenStream, item: TokenStream) -> TokenStream {
    let args = TokenStream2::from(args);
    let func = parse_macro_input!(item as ItemFn);

    register_impl(Registration::Suite, args, func)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Register a setup
///
/// Setups run on the suite root before the suite's own declarations, so the
/// hooks and options they add apply to every test. All registered setups
/// are applied unless the command line selects some with `--setup`.
///
/// # Example
///
/// ```ignore
/// #[pacebench::setup]
/// fn quiet_allocator(rt: &mut Runtime) {
///     rt.before_each(|| reset_arena());
/// }
/// ```
#[proc_macro_attribute]
pub fn setup(args: TokenStream, item: TokenStream) -> TokenStream {
    let args = TokenStream2::from(args);
    let func = parse_macro_input!(item as ItemFn);

    register_impl(Registration::Setup, args, func)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

#[derive(Clone, Copy)]
enum Registration {
    Suite,
    Setup,
}

fn register_impl(
    kind: Registration,
    args: TokenStream2,
    func: ItemFn,
) -> Result<TokenStream2, syn::Error> {
    validate_signature(&func)?;

    let mut name = None;
    let parser = syn::meta::parser(|meta| {
        let key = attr::name(&meta);
        match key.as_str() {
            "name" => name = Some(attr::string(&meta)?),
            _ => return Err(attr::unknown(&meta, &key)),
        }
        Ok(())
    });
    syn::parse::Parser::parse2(parser, args)?;

    let fn_name = &func.sig.ident;
    let name = name.unwrap_or_else(|| fn_name.to_string());

    let def = match kind {
        Registration::Suite => quote! {
            ::pacebench::SuiteDef {
                name: #name,
                declare: #fn_name,
                file: file!(),
                line: line!(),
                module_path: module_path!(),
            }
        },
        Registration::Setup => quote! {
            ::pacebench::SetupDef {
                name: #name,
                declare: #fn_name,
                file: file!(),
                line: line!(),
            }
        },
    };

    Ok(quote! {
        #func

        ::pacebench::internal::inventory::submit! {
            #def
        }
    })
}

fn validate_signature(func: &ItemFn) -> Result<(), syn::Error> {
    let sig = &func.sig;
    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "declaration functions cannot be async; use `ctx.measure_async` inside a test",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "declaration functions cannot be generic",
        ));
    }
    if sig.inputs.len() != 1 || matches!(sig.inputs.first(), Some(FnArg::Receiver(_))) {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "expected a single `&mut Runtime` parameter",
        ));
    }
    if let syn::ReturnType::Type(_, ty) = &sig.output {
        return Err(syn::Error::new_spanned(
            ty,
            "declaration functions must not return a value",
        ));
    }
    Ok(())
}
