//! YAML config loading: `${NAME}` env expansion, parsing, and structural
//! validation. Owned by the CLI per SPEC_FULL's configuration contract —
//! the core crates only see the already-validated, already-normalized
//! `Config` tree.

use std::path::Path;

use chaintap_core::config::Config;
use chaintap_core::ChaintapError;

pub fn load_config(path: &Path) -> Result<Config, ChaintapError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ChaintapError::config(format!("reading config file {}: {e}", path.display()))
    })?;

    let expanded = expand_env(&raw)?;

    let mut config: Config = serde_yaml::from_str(&expanded)
        .map_err(|e| ChaintapError::config(format!("parsing YAML: {e}")))?;

    config.validate()?;
    config.normalize();
    Ok(config)
}

/// Expands every `${NAME}` occurrence against the process environment.
/// An undefined name is a configuration error naming the variable.
fn expand_env(input: &str) -> Result<String, ChaintapError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // No closing brace: treat the rest literally.
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let name = &after[..end];
        let value = std::env::var(name)
            .map_err(|_| ChaintapError::config(format!("undefined environment variable ${{{name}}}")))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_variable() {
        std::env::set_var("CHAINTAP_TEST_VAR", "0xdeadbeef");
        let result = expand_env("address: ${CHAINTAP_TEST_VAR}").unwrap();
        assert_eq!(result, "address: 0xdeadbeef");
        std::env::remove_var("CHAINTAP_TEST_VAR");
    }

    #[test]
    fn errors_on_undefined_variable() {
        std::env::remove_var("CHAINTAP_DEFINITELY_UNSET");
        let result = expand_env("key: ${CHAINTAP_DEFINITELY_UNSET}");
        assert!(result.is_err());
    }

    #[test]
    fn passes_through_text_without_placeholders() {
        let result = expand_env("chain: ethereum\n").unwrap();
        assert_eq!(result, "chain: ethereum\n");
    }
}
