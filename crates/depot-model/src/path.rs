//! Path normalization helpers.
//!
//! Every path entering the core is normalized to a leading-slash,
//! no-trailing-slash form so that NFC keys, promotion accounting, and
//! transfer calls all agree on identity.

/// Normalize a content path: leading slash, single separators, no trailing
/// slash (except for the root itself).
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if out.len() > 1 {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

/// The final segment of a path, if any.
pub fn file_name(path: &str) -> Option<&str> {
    path.rsplit('/').find(|s| !s.is_empty())
}

/// Join a parent path and a child segment, normalized.
pub fn join(parent: &str, child: &str) -> String {
    normalize(&format!("{parent}/{child}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_forms() {
        assert_eq!(normalize("a/b/c"), "/a/b/c");
        assert_eq!(normalize("/a//b/"), "/a/b");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn file_name_of_nested_path() {
        assert_eq!(file_name("/a/b/maven-metadata.xml"), Some("maven-metadata.xml"));
        assert_eq!(file_name("/"), None);
    }

    #[test]
    fn join_normalizes() {
        assert_eq!(join("/a/b", "c"), "/a/b/c");
        assert_eq!(join("/a/b/", "/c"), "/a/b/c");
    }
}
