//! Module-name path algebra
//!
//! Module names are `/`-separated, extensionless and free of relative markers
//! (`components/button`). They are derived from file paths at build time and
//! recombined with relative specifiers at run time, so both sides share these
//! helpers.

/// Script extensions stripped from module names, longest first
pub const SOURCE_EXTENSIONS: &[&str] = &[".tsx", ".jsx", ".mjs", ".ts", ".js"];

/// Normalize a module name
///
/// Backslashes become `/`, `.`/`..`/empty segments are dropped and a known
/// script extension is stripped from the last segment.
pub fn normalize_module_name(name: &str) -> String {
    let unified = name.replace('\\', "/");
    let mut segments: Vec<&str> = unified
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();

    if let Some(last) = segments.last_mut() {
        for ext in SOURCE_EXTENSIONS {
            if let Some(stem) = last.strip_suffix(ext) {
                if !stem.is_empty() {
                    *last = stem;
                }
                break;
            }
        }
    }

    segments.join("/")
}

/// Combine a base module path with a relative specifier
///
/// Counts the `../` tokens in `relative` (k). When `base` has no more than k
/// segments the result is just the normalized `relative`; otherwise the last k
/// segments of `base` are dropped and `relative` is appended.
///
/// ```text
/// sum_path("a/b/c", "../x")  == "a/b/x"
/// sum_path("a", "../../x")   == "x"
/// sum_path("", "./button")   == "button"
/// ```
pub fn sum_path(base: &str, relative: &str) -> String {
    let back = relative.matches("../").count();
    let segments: Vec<&str> = base.split('/').collect();

    if segments.len() <= back {
        return normalize_module_name(relative);
    }

    if base.is_empty() {
        return normalize_module_name(relative);
    }

    let kept = &segments[..segments.len() - back];
    normalize_module_name(&format!("{}/{}", kept.join("/"), relative))
}

/// Everything before the last `/` of a module name ("" for top-level names)
pub fn dirname(module_name: &str) -> &str {
    match module_name.rfind('/') {
        Some(pos) => &module_name[..pos],
        None => "",
    }
}

/// `package/module` address of a module
pub fn full_module_name(package_name: &str, module_name: &str) -> String {
    format!("{}/{}", package_name, module_name)
}
