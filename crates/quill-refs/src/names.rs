//! Ref name validation following git-style conventions.
//!
//! Ref names double as relative paths in the filesystem backend, so these
//! rules also keep a name from escaping the store's base directory.
//!
//! Valid names:
//! - are non-empty
//! - contain no whitespace, control characters, `~`, `^`, `:`, `?`, `*`,
//!   `[` or `\`
//! - contain no `..` and no `@{`
//! - do not end with `.lock`
//! - are `/`-separated components, each non-empty and not starting with `.`

use crate::error::{RefError, Result};

/// Characters that are forbidden anywhere in a ref name.
const FORBIDDEN_CHARS: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

const FORBIDDEN_SEQUENCES: &[&str] = &["..", "@{"];

/// Validate a ref name such as `HEAD` or `refs/heads/main`.
///
/// # Examples
///
/// ```
/// use quill_refs::names::validate_ref_name;
///
/// assert!(validate_ref_name("refs/heads/main").is_ok());
/// assert!(validate_ref_name("HEAD").is_ok());
/// assert!(validate_ref_name("").is_err());
/// assert!(validate_ref_name("refs/../../etc/passwd").is_err());
/// ```
pub fn validate_ref_name(name: &str) -> Result<()> {
    let reject = |reason: String| {
        Err(RefError::InvalidRefName {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return reject("ref name must not be empty".into());
    }
    if let Some(ch) = name
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_CHARS.contains(c))
    {
        return reject(format!("contains forbidden character: {ch:?}"));
    }
    if let Some(seq) = FORBIDDEN_SEQUENCES.iter().find(|s| name.contains(**s)) {
        return reject(format!("must not contain {seq:?}"));
    }
    if name.ends_with(".lock") {
        return reject("must not end with '.lock'".into());
    }
    for component in name.split('/') {
        if component.is_empty() {
            return reject("path components must not be empty".into());
        }
        if component.starts_with('.') {
            return reject(format!("component must not start with '.': {component:?}"));
        }
    }
    Ok(())
}
