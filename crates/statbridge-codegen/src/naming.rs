//! Mechanical identifier transforms.
//!
//! Method ids are `snake_case` or `kebab-case`; parameter and return names
//! are `camelCase`. Functions and fields become `snake_case`, types and enum
//! variants `PascalCase`.

use proc_macro2::{Ident, Span};

/// Check a method id is made of ASCII words joined by `_` or `-`.
pub fn check_method_id(method_id: &str) -> Result<(), &'static str> {
    let first = method_id.chars().next().ok_or("empty identifier")?;
    if !first.is_ascii_alphabetic() {
        return Err("must start with an ASCII letter");
    }
    if !method_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err("only ASCII letters, digits, '_' and '-' are allowed");
    }
    if method_id.split(['_', '-']).any(str::is_empty) {
        return Err("empty word between separators");
    }
    Ok(())
}

/// Check a snake-cased parameter or return name can be emitted as an
/// identifier, raw or not.
pub fn check_field_name(name: &str) -> Result<(), &'static str> {
    let first = name.chars().next().ok_or("empty identifier")?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err("must start with an ASCII letter or '_'");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("only ASCII letters, digits, '_' and '-' are allowed");
    }
    if matches!(name, "_" | "self" | "super" | "crate" | "Self") {
        return Err("reserved identifier");
    }
    Ok(())
}

/// `two-sample_t_test` -> `two_sample_t_test`
pub fn method_fn_name(method_id: &str) -> String {
    method_id
        .split(['_', '-'])
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// `two_sample_t_test` -> `TwoSampleTTest`
pub fn pascal_case(method_id: &str) -> String {
    method_id
        .split(['_', '-'])
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect()
}

/// `adjustedPValues` -> `adjusted_p_values`, `meanCI` -> `mean_ci`,
/// `factorAStatistic` -> `factor_a_statistic`
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '-' {
            out.push('_');
            continue;
        }
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_lower)
            {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// Identifier for generated code, raw when the name is a Rust keyword.
pub fn ident(name: &str) -> Ident {
    if syn::parse_str::<Ident>(name).is_ok() {
        Ident::new(name, Span::call_site())
    } else {
        Ident::new_raw(name, Span::call_site())
    }
}
