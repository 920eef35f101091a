//! Environment variable interpolation for config files.
//!
//! Supports `${VAR}`, `${VAR:-default}` and the `$$` escape for a literal
//! dollar sign. The unbraced `$VAR` form is intentionally not recognized
//! so strftime-style values survive untouched.

use regex::Regex;
use std::env;
use std::sync::LazyLock;

static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("Invalid interpolation pattern")
});

/// Interpolate environment variables in `input`.
///
/// Missing variables are accumulated so a broken config reports every
/// problem at once. An empty variable with a `:-` default uses the default.
pub fn interpolate(input: &str) -> Result<String, Vec<String>> {
    let mut errors = Vec::new();

    let text = VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            if &caps[0] == "$$" {
                return "$".to_string();
            }

            let name = &caps[1];
            let default = caps.get(2).map(|m| m.as_str());

            match env::var(name) {
                Ok(value) if value.is_empty() && default.is_some() => {
                    default.unwrap_or("").to_string()
                }
                Ok(value) => value,
                Err(_) => match default {
                    Some(fallback) => fallback.to_string(),
                    None => {
                        errors.push(format!("environment variable '{name}' is not set"));
                        caps[0].to_string()
                    }
                },
            }
        })
        .to_string();

    if errors.is_empty() { Ok(text) } else { Err(errors) }
}
