//! Resource path normalization.
//!
//! Every path this engine stores or compares is in canonical form: no
//! leading or trailing slash, no empty segments, no `.` segments. The root
//! collection is the empty string.

/// Normalize a resource path to canonical form.
///
/// # Examples
///
/// ```
/// use davacl_core::util::uri::normalize_path;
///
/// assert_eq!(normalize_path("/principals/alice/"), "principals/alice");
/// assert_eq!(normalize_path("principals//alice"), "principals/alice");
/// assert_eq!(normalize_path("/"), "");
/// ```
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalize a client-submitted href to a canonical resource path.
///
/// Absolute URLs lose their scheme and authority, then `base_uri` is
/// stripped when the remaining path starts with it.
///
/// # Examples
///
/// ```
/// use davacl_core::util::uri::normalize_href;
///
/// assert_eq!(
///     normalize_href("https://dav.example.com/dav/principals/bob", "/dav/"),
///     "principals/bob"
/// );
/// assert_eq!(normalize_href("/dav/principals/bob/", "/dav"), "principals/bob");
/// assert_eq!(normalize_href("principals/bob", "/"), "principals/bob");
/// ```
pub fn normalize_href(href: &str, base_uri: &str) -> String {
    let path = match href.split_once("://") {
        Some((_scheme, rest)) => rest.find('/').map_or("", |idx| &rest[idx..]),
        None => href,
    };
    let path = normalize_path(path);
    let base = normalize_path(base_uri);
    if base.is_empty() {
        return path;
    }
    if path == base {
        return String::new();
    }
    match path.strip_prefix(&base) {
        Some(rest) if rest.starts_with('/') => rest[1..].to_string(),
        _ => path,
    }
}

/// Parent of a canonical path, or `None` for the root.
///
/// # Examples
///
/// ```
/// use davacl_core::util::uri::parent_path;
///
/// assert_eq!(parent_path("calendars/alice/work"), Some("calendars/alice"));
/// assert_eq!(parent_path("doc.txt"), Some(""));
/// assert_eq!(parent_path(""), None);
/// ```
pub fn parent_path(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Some(path.rsplit_once('/').map_or("", |(parent, _)| parent))
}

/// The path itself followed by every ancestor up to and including the root.
pub fn self_and_ancestors(path: &str) -> Vec<String> {
    let mut chain = vec![path.to_string()];
    let mut current = path;
    while let Some(parent) = parent_path(current) {
        chain.push(parent.to_string());
        current = parent;
    }
    chain
}

/// Join a canonical parent path and a child name.
pub fn join(parent: &str, name: &str) -> String {
    let name = normalize_path(name);
    if parent.is_empty() {
        name
    } else {
        format!("{parent}/{name}")
    }
}
