//! Wrapper generation for registered methods.
//!
//! Turns a [`Registry`] into Rust source containing:
//!
//! - a `MethodId` enum listing every method, with its worker assignment
//! - one `{Method}Result` struct per method, one field per declared return
//! - one `async fn {method}(dispatcher, ...)` per method that marshals its
//!   arguments into a named map and forwards to [`Dispatcher::call`]
//!
//! The generated code refers to `::statbridge_core` and `::serde` by absolute
//! path and is meant to be `include!`d from a build script's `OUT_DIR`.
//! Output depends only on registry order, so the same registry always
//! produces byte-identical source.
//!
//! [`Dispatcher::call`]: statbridge_core::Dispatcher::call

mod naming;

use std::collections::HashMap;

use proc_macro2::TokenStream;
use quote::quote;
use statbridge_core::{MethodDescriptor, ParamKind, ParamSpec, Registry, ReturnKind};

pub use naming::{method_fn_name, pascal_case, snake_case};

/// First line of every generated file.
pub const GENERATED_HEADER: &str = "// @generated by statbridge-codegen from the method registry. Do not edit.\n";

/// Errors raised while generating wrappers.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("method id '{method_id}' cannot be turned into an identifier: {reason}")]
    InvalidMethodId {
        method_id: String,
        reason: &'static str,
    },

    #[error("'{name}' of '{method_id}' cannot be turned into an identifier: {reason}")]
    InvalidName {
        method_id: String,
        name: String,
        reason: &'static str,
    },

    #[error("'{first}' and '{second}' both map to the generated name `{ident}`")]
    Collision {
        ident: String,
        first: String,
        second: String,
    },

    #[error("generated code failed to parse: {0}")]
    Syntax(String),

    #[error(transparent)]
    Registry(#[from] statbridge_core::Error),
}

pub type Result<T> = std::result::Result<T, GenerateError>;

/// Generate wrapper source for every method in `registry`.
pub fn generate(registry: &Registry) -> Result<String> {
    let tokens = generate_tokens(registry)?;
    syn::parse2::<syn::File>(tokens.clone()).map_err(|e| GenerateError::Syntax(e.to_string()))?;

    let mut source = String::from(GENERATED_HEADER);
    source.push_str(&tokens.to_string());
    source.push('\n');
    Ok(source)
}

/// Same as [`generate`] without the header and parse check.
pub fn generate_tokens(registry: &Registry) -> Result<TokenStream> {
    check_names(registry)?;

    let method_enum = method_id_enum(registry);
    let items = registry.methods().iter().map(|m| {
        let result = result_struct(m);
        let wrapper = wrapper_fn(m);
        quote! { #result #wrapper }
    });

    Ok(quote! {
        #method_enum
        #(#items)*
    })
}

/// Every generated name must be unique in its namespace: function names and
/// result struct names across methods, field and argument names within one.
fn check_names(registry: &Registry) -> Result<()> {
    let mut fns: HashMap<String, &str> = HashMap::new();
    let mut types: HashMap<String, &str> = HashMap::new();

    for method in registry.methods() {
        let id = method.method_id.as_str();
        naming::check_method_id(id).map_err(|reason| GenerateError::InvalidMethodId {
            method_id: id.to_string(),
            reason,
        })?;

        claim(&mut fns, method_fn_name(id), id)?;
        claim(&mut types, result_type_name(id), id)?;

        // locals of the generated wrapper body
        let mut args: HashMap<String, &str> = ["dispatcher", "args", "payload", "value"]
            .into_iter()
            .map(|local| (local.to_string(), "(wrapper local)"))
            .collect();
        for param in &method.params {
            claim(&mut args, field_name(id, &param.name)?, &param.name)?;
        }

        let mut fields: HashMap<String, &str> = HashMap::new();
        for ret in &method.returns {
            claim(&mut fields, field_name(id, &ret.name)?, &ret.name)?;
        }
    }
    Ok(())
}

fn field_name(method_id: &str, name: &str) -> Result<String> {
    let snake = snake_case(name);
    naming::check_field_name(&snake).map_err(|reason| GenerateError::InvalidName {
        method_id: method_id.to_string(),
        name: name.to_string(),
        reason,
    })?;
    Ok(snake)
}

fn claim<'a>(seen: &mut HashMap<String, &'a str>, ident: String, owner: &'a str) -> Result<()> {
    if let Some(first) = seen.get(&ident) {
        return Err(GenerateError::Collision {
            ident,
            first: first.to_string(),
            second: owner.to_string(),
        });
    }
    seen.insert(ident, owner);
    Ok(())
}

fn result_type_name(method_id: &str) -> String {
    format!("{}Result", pascal_case(method_id))
}

fn method_id_enum(registry: &Registry) -> TokenStream {
    let count = registry.len();
    let variants: Vec<_> = registry
        .methods()
        .iter()
        .map(|m| naming::ident(&pascal_case(&m.method_id)))
        .collect();
    let ids = registry.methods().iter().map(|m| m.method_id.as_str());
    let ids2 = ids.clone();
    let workers = registry.methods().iter().map(|m| m.worker_id);

    quote! {
        /// Every registered method.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum MethodId {
            #(#variants,)*
        }

        impl MethodId {
            /// All methods in registry order.
            pub const ALL: [MethodId; #count] = [#(MethodId::#variants,)*];

            /// Registry id, as sent over the wire.
            pub const fn as_str(self) -> &'static str {
                match self {
                    #(MethodId::#variants => #ids,)*
                }
            }

            /// Worker that owns this method.
            pub const fn worker_id(self) -> u8 {
                match self {
                    #(MethodId::#variants => #workers,)*
                }
            }
        }

        impl ::std::fmt::Display for MethodId {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for MethodId {
            type Err = ::statbridge_core::Error;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s {
                    #(#ids2 => Ok(MethodId::#variants),)*
                    other => Err(::statbridge_core::Error::UnknownMethod(other.to_string())),
                }
            }
        }
    }
}

fn result_struct(method: &MethodDescriptor) -> TokenStream {
    let name = naming::ident(&result_type_name(&method.method_id));
    let doc = format!(" Result fields of `{}`.", method.method_id);
    let fields = method.returns.iter().map(|ret| {
        let field = naming::ident(&snake_case(&ret.name));
        let wire = ret.name.as_str();
        let ty = return_type(ret.kind);
        quote! {
            #[serde(rename = #wire)]
            pub #field: #ty,
        }
    });

    quote! {
        #[doc = #doc]
        #[derive(Debug, Clone, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
        pub struct #name {
            #(#fields)*
        }
    }
}

fn wrapper_fn(method: &MethodDescriptor) -> TokenStream {
    let id = method.method_id.as_str();
    let fn_name = naming::ident(&method_fn_name(id));
    let result = naming::ident(&result_type_name(id));
    let worker = method.worker_id;

    let mut doc = vec![format!(" Call `{}` on worker {}.", id, worker)];
    if !method.params.is_empty() {
        doc.push(String::new());
        for p in &method.params {
            let optional = if p.optional { ", optional" } else { "" };
            doc.push(format!(" - `{}`: {}{}", p.name, p.kind, optional));
        }
    }

    let args = method.params.iter().map(|p| {
        let arg = naming::ident(&snake_case(&p.name));
        let ty = param_type(p);
        quote! { #arg: #ty }
    });
    let inserts = method.params.iter().map(insert_arg);

    quote! {
        #(#[doc = #doc])*
        pub async fn #fn_name<B: ::statbridge_core::Backend>(
            dispatcher: &::statbridge_core::Dispatcher<B>,
            #(#args,)*
        ) -> ::statbridge_core::Result<#result> {
            #[allow(unused_mut)]
            let mut args = ::statbridge_core::Args::new();
            #(#inserts)*
            let payload = dispatcher.call(#worker, #id, args).await?;
            ::statbridge_core::decode(#id, payload)
        }
    }
}

fn insert_arg(param: &ParamSpec) -> TokenStream {
    let arg = naming::ident(&snake_case(&param.name));
    let wire = param.name.as_str();
    if param.optional {
        quote! {
            if let Some(value) = #arg {
                args.insert(#wire.to_string(), ::serde_json::to_value(value)?);
            }
        }
    } else {
        quote! {
            args.insert(#wire.to_string(), ::serde_json::to_value(#arg)?);
        }
    }
}

fn param_type(param: &ParamSpec) -> TokenStream {
    let ty = match param.kind {
        ParamKind::Number => quote! { f64 },
        ParamKind::NumberVector => quote! { &[f64] },
        ParamKind::NumberMatrix => quote! { &[Vec<f64>] },
        ParamKind::NumberVectorOrMatrix => quote! { &::statbridge_core::Samples },
        ParamKind::StringVector => quote! { &[String] },
        ParamKind::StringOrNumberVector => quote! { &[::statbridge_core::Level] },
        ParamKind::String => quote! { &str },
        ParamKind::Boolean => quote! { bool },
        ParamKind::NullableNumberVector => quote! { &[Option<f64>] },
    };
    if param.optional {
        quote! { Option<#ty> }
    } else {
        ty
    }
}

fn return_type(kind: ReturnKind) -> TokenStream {
    match kind {
        ReturnKind::Number => quote! { f64 },
        ReturnKind::Boolean => quote! { bool },
        ReturnKind::String => quote! { String },
        ReturnKind::NumberVector => quote! { Vec<f64> },
        ReturnKind::NumberMatrix => quote! { Vec<Vec<f64>> },
        ReturnKind::Interval => quote! { ::statbridge_core::Interval },
        ReturnKind::Json => quote! { ::serde_json::Value },
    }
}

/// Ident of the generated wrapper for `method_id`, for callers that splice it.
pub fn wrapper_ident(method_id: &str) -> proc_macro2::Ident {
    naming::ident(&method_fn_name(method_id))
}
