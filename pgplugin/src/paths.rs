//! Asset path normalization.
//!
//! Game asset paths are case-insensitive, backslash-separated and relative
//! to the data directory. Mesh paths are keyed with a `meshes\` prefix and
//! texture paths with a `textures\` prefix, while records store both without
//! the prefix.

use std::sync::OnceLock;

use regex::Regex;

/// Prefix of mesh paths inside the data directory.
pub const MESH_PREFIX: &str = "meshes\\";

/// Prefix of texture paths inside the data directory.
pub const TEXTURE_PREFIX: &str = "textures\\";

/// Pattern: `<stem>_<0|1>.<ext>`
///
/// - Group 1: everything before the weight suffix
/// - Group 2: weight digit
/// - Group 3: extension including the dot
fn weight_variant_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.*)_([01])(\.[^.\\]+)$").unwrap())
}

/// Lowercase, unify separators and drop leading separators.
fn canonical(path: &str) -> String {
    path.trim()
        .replace('/', "\\")
        .trim_start_matches('\\')
        .to_lowercase()
}

/// Strip `prefix` from the start of `path`, ignoring ASCII case.
pub fn strip_prefix_ci<'a>(path: &'a str, prefix: &str) -> &'a str {
    match path.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &path[prefix.len()..],
        _ => path,
    }
}

/// Normalize a mesh path to the `meshes\...` lowercase form.
///
/// Returns an empty string for an empty or blank path.
pub fn normalize_mesh_path(path: &str) -> String {
    let path = canonical(path);
    if path.is_empty() || path.starts_with(MESH_PREFIX) {
        path
    } else {
        format!("{}{}", MESH_PREFIX, path)
    }
}

/// Normalize a texture slot to the `textures\...` lowercase form.
///
/// Empty slots stay empty.
pub fn normalize_texture_path(path: &str) -> String {
    let path = canonical(path);
    if path.is_empty() || path.starts_with(TEXTURE_PREFIX) {
        path
    } else {
        format!("{}{}", TEXTURE_PREFIX, path)
    }
}

/// The `_0`/`_1` sibling of a weight-variant mesh path.
///
/// `armor\cuirass_0.nif` maps to `armor\cuirass_1.nif` and back. Paths
/// without a weight suffix yield `None`.
pub fn weight_variant_sibling(path: &str) -> Option<String> {
    let caps = weight_variant_pattern().captures(path)?;
    let flipped = if &caps[2] == "0" { "1" } else { "0" };
    Some(format!("{}_{}{}", &caps[1], flipped, &caps[3]))
}

/// File name without directories or extension.
pub fn file_stem(path: &str) -> &str {
    let name = path.rsplit(&['\\', '/'][..]).next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..dot],
    }
}
