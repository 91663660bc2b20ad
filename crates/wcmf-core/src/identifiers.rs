//! SQL identifier quoting and naming helpers.

/// Quote a SQL identifier using ANSI double-quoting.
///
/// Embedded double-quotes are doubled, so any input is safe.
///
/// ```
/// use wcmf_core::quote_ident;
///
/// assert_eq!(quote_ident("wcmf_book"), "\"wcmf_book\"");
/// assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
/// ```
#[inline]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a SQL identifier using MySQL backtick quoting.
///
/// ```
/// use wcmf_core::quote_ident_mysql;
///
/// assert_eq!(quote_ident_mysql("wcmf_book"), "`wcmf_book`");
/// assert_eq!(quote_ident_mysql("a`b"), "`a``b`");
/// ```
#[inline]
pub fn quote_ident_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Check whether `name` is a plain identifier (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// Schema validation uses this to reject table and column names that would
/// only work quoted.
pub fn is_simple_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Derive a storage name from a type or attribute name.
///
/// `ChapterSection` becomes `chapter_section`; names that already are
/// snake case pass through.
pub fn to_storage_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
            out.push(c);
        }
    }
    out
}
