//! Filename sanitizing.
//!
//! Host display names may contain characters that are not valid in file or
//! folder names on common filesystems. Each such character becomes `_`.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Characters replaced by [`sanitize_file_name`].
pub const FORBIDDEN_CHARS: &[char] = &['\\', '/', ':', ';', '?', '!', '<', '>', '"', '|', '*'];

/// Replacement for every forbidden character.
pub const REPLACEMENT: &str = "_";

static FORBIDDEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:;?!<>"|*]"#).expect("static pattern is valid"));

/// Replace every forbidden character of `name` with `_`.
///
/// Idempotent: the replacement is not itself forbidden.
pub fn sanitize_file_name(name: &str) -> Cow<'_, str> {
    FORBIDDEN.replace_all(name, REPLACEMENT)
}
