//! Manifest template rendering.
//!
//! Performs placeholder substitution over ecosystem manifest templates.
//! Placeholders are single-brace tokens such as `{version}` or `{sha256_1}`;
//! everything outside a placeholder passes through byte-for-byte, since the
//! rendered output is machine-parsed package syntax (YAML, Ruby, nuspec,
//! shell) where incidental formatting changes break consumers.
//!
//! Rendering is all-or-nothing: a template that references a placeholder
//! with no mapping fails without producing output.

use std::collections::BTreeMap;

use thiserror::Error;

/// Mapping from placeholder name to substitution value.
pub type PlaceholderMap = BTreeMap<String, String>;

/// Errors from template rendering.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    /// A placeholder appeared in the template with no entry in the map.
    #[error("unresolved placeholder '{0}' in template")]
    UnresolvedPlaceholder(String),
}

/// Renders `template`, replacing every `{name}` token with its mapped value.
///
/// A `{` that is not followed by a well-formed placeholder (ASCII
/// alphanumerics and underscores, then `}`) is treated as literal text.
/// A well-formed placeholder missing from `values` fails the whole render
/// with [`TemplateError::UnresolvedPlaceholder`] naming the token.
pub fn render(template: &str, values: &PlaceholderMap) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        match parse_placeholder(after) {
            Some((name, consumed)) => {
                let value = values
                    .get(name)
                    .ok_or_else(|| TemplateError::UnresolvedPlaceholder(name.to_string()))?;
                out.push_str(value);
                rest = &after[consumed..];
            }
            None => {
                // Literal brace: shell `$var`-style text and odd syntax pass through.
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}

/// Parses a placeholder body at the start of `input`.
///
/// Returns the placeholder name and the number of bytes consumed including
/// the closing brace, or `None` if no well-formed placeholder starts here.
fn parse_placeholder(input: &str) -> Option<(&str, usize)> {
    let end = input.find('}')?;
    let name = &input[..end];
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return None;
    }
    Some((name, end + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> PlaceholderMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_version_and_digest() {
        let values = map(&[("version", "1.2.3"), ("sha256", "abc123")]);
        let out = render("Version: {version}, SHA256: {sha256}", &values).unwrap();
        assert_eq!(out, "Version: 1.2.3, SHA256: abc123");
    }

    #[test]
    fn numbered_digests_fill_in_supply_order() {
        let values = map(&[("sha256_1", "first"), ("sha256_2", "second")]);
        let out = render("{sha256_1} / {sha256_2}", &values).unwrap();
        assert_eq!(out, "first / second");
    }

    #[test]
    fn unknown_placeholder_fails_naming_the_token() {
        let values = map(&[("version", "1.2.3")]);
        let err = render("v{version} sum {sha512}", &values).unwrap_err();
        assert_eq!(err, TemplateError::UnresolvedPlaceholder("sha512".to_string()));
    }

    #[test]
    fn rendering_is_idempotent_once_placeholders_are_gone() {
        let values = map(&[("version", "1.2.3"), ("sha256", "abc123")]);
        let once = render("Version: {version}, SHA256: {sha256}", &values).unwrap();
        let twice = render(&once, &values).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn surrounding_text_passes_through_unchanged() {
        let values = map(&[("version", "0.9.0")]);
        let template = "  indented:\n\t{version}\t\n  trailing  ";
        assert_eq!(render(template, &values).unwrap(), "  indented:\n\t0.9.0\t\n  trailing  ");
    }

    #[test]
    fn malformed_braces_are_literal() {
        let values = map(&[("version", "1.0.0")]);
        assert_eq!(render("if (x) { y(); }", &values).unwrap(), "if (x) { y(); }");
        assert_eq!(render("open { brace", &values).unwrap(), "open { brace");
        assert_eq!(render("{{version}}", &values).unwrap(), "{1.0.0}");
        assert_eq!(render("{bad name}", &values).unwrap(), "{bad name}");
    }

    #[test]
    fn repeated_placeholders_are_all_replaced() {
        let values = map(&[("version", "2.0.0")]);
        let out = render("{version}-{version}", &values).unwrap();
        assert_eq!(out, "2.0.0-2.0.0");
    }
}
