//! String conversion utilities for Windows API

/// Convert a Rust string to a null-terminated Windows wide string (UTF-16)
pub fn string_to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Convert Windows wide string (UTF-16) to Rust string, stopping at the first null
pub fn wide_to_string(wide: &[u16]) -> String {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..len])
}

/// Extract filename from full path
pub fn extract_filename(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

/// Case-insensitive image name comparison where the `.exe` suffix is optional
/// on either side, so `explorer` matches `Explorer.EXE`.
pub fn image_name_matches(candidate: &str, wanted: &str) -> bool {
    fn stem(name: &str) -> String {
        let lower = extract_filename(name.trim()).to_lowercase();
        match lower.strip_suffix(".exe") {
            Some(stem) => stem.to_string(),
            None => lower,
        }
    }
    let wanted = stem(wanted);
    !wanted.is_empty() && stem(candidate) == wanted
}
