pub const SCHEME: &str = "disk:";
pub const ROOT: &str = "disk:/";

/// Drops the `disk:` scheme and any leading separators, leaving a path that
/// can be joined under another remote path.
pub fn strip_path(path: &str) -> String {
    let rest = path.strip_prefix(SCHEME).unwrap_or(path);
    rest.trim_start_matches(['/', '\\']).to_string()
}

/// Canonical `disk:/a/b` form. `.` and empty segments are dropped and `..`
/// never climbs above the root.
pub fn normalize_path(path: &str) -> String {
    let stripped = strip_path(path);
    let mut parts: Vec<&str> = Vec::new();
    for segment in stripped.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("{ROOT}{}", parts.join("/"))
}
