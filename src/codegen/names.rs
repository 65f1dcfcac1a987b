//! Name Resolution
//!
//! Maps contract names onto generated identifiers: TypeScript type names,
//! module file names, OpenAPI component keys, and REST resource paths.

use super::config::NamingConfig;

/// Convert a contract name to a PascalCase type name, respecting acronyms.
///
/// Names without separators are assumed to be PascalCase already and are
/// preserved (first letter upper-cased).
pub fn to_pascal_case(s: &str, naming: &NamingConfig) -> String {
    let cleaned = s.replace('.', "_");

    if !cleaned.contains(['_', '-', ' ']) {
        let mut chars = cleaned.chars();
        return match chars.next() {
            None => String::new(),
            Some(first) => first.to_uppercase().chain(chars).collect(),
        };
    }

    let mut result = String::with_capacity(cleaned.len());
    let mut capitalize_next = true;
    let mut current_word = String::new();

    for c in cleaned.chars() {
        if c == '_' || c == '-' || c == ' ' {
            if !current_word.is_empty() {
                result.push_str(&case_word(&current_word, naming));
                current_word.clear();
            }
            capitalize_next = true;
        } else if capitalize_next {
            current_word.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            current_word.push(c);
        }
    }

    if !current_word.is_empty() {
        result.push_str(&case_word(&current_word, naming));
    }

    result
}

/// Apply casing to a word, preserving acronyms
fn case_word(word: &str, naming: &NamingConfig) -> String {
    let upper = word.to_uppercase();

    if naming.acronyms.contains(&upper) {
        return upper;
    }

    if naming.preserve_screaming_case && word.len() > 1 && word.chars().all(|c| c.is_ascii_uppercase()) {
        return word.to_string();
    }

    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => {
            let mut result = first.to_uppercase().to_string();
            for c in chars {
                result.push(c.to_ascii_lowercase());
            }
            result
        }
    }
}

/// `TaskCreate` -> `task-create`, `user_profile` -> `user-profile`
pub fn to_kebab_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower_or_digit = false;
    for c in s.chars() {
        if c == '_' || c == ' ' || c == '-' || c == '.' {
            if !out.ends_with('-') && !out.is_empty() {
                out.push('-');
            }
            prev_lower_or_digit = false;
        } else if c.is_ascii_uppercase() {
            if prev_lower_or_digit && !out.ends_with('-') {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower_or_digit = false;
        } else {
            out.push(c);
            prev_lower_or_digit = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out.trim_matches('-').to_string()
}

/// Collection path for a contract, e.g. `Task` -> `/tasks`, `Category` -> `/categories`
pub fn resource_path(name: &str) -> String {
    let kebab = to_kebab_case(name);
    format!("/{}", pluralize(&kebab))
}

fn pluralize(word: &str) -> String {
    if word.ends_with("ss") || word.ends_with('x') || word.ends_with("ch") || word.ends_with("sh") {
        return format!("{}es", word);
    }
    if word.ends_with('s') {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{}ies", stem);
        }
    }
    format!("{}s", word)
}

/// Whether `s` can be used unquoted as a TypeScript property name
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Property key as it appears in a TypeScript object type
pub fn property_key(s: &str) -> String {
    if is_identifier(s) {
        s.to_string()
    } else {
        serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
    }
}

/// OpenAPI component key for a contract version
pub fn component_key(name: &str, version: &str) -> String {
    format!("{}_{}", name, version)
}
