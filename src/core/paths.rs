//! POSIX-style helpers for remote paths.
//!
//! Remote paths always start with `/`. `..` never climbs above the root.

/// Collapse repeated separators, `.` and `..` segments.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

pub fn join(base: &str, child: &str) -> String {
    normalize(&format!("{}/{}", base, child))
}

/// Split into `(parent, name)`. The root has an empty name.
pub fn split_parent(path: &str) -> (String, String) {
    let normalized = normalize(path);
    match normalized.rfind('/') {
        Some(0) => ("/".to_string(), normalized[1..].to_string()),
        Some(idx) => (
            normalized[..idx].to_string(),
            normalized[idx + 1..].to_string(),
        ),
        None => ("/".to_string(), normalized),
    }
}

pub fn components(path: &str) -> Vec<String> {
    normalize(path)
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn is_root(path: &str) -> bool {
    normalize(path) == "/"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("a//b/"), "/a/b");
        assert_eq!(normalize("/a/./b/../c"), "/a/c");
        assert_eq!(normalize("/../../x"), "/x");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", "docs"), "/docs");
        assert_eq!(join("/a1/a2/", "/a3"), "/a1/a2/a3");
    }

    #[test]
    fn test_split_parent() {
        assert_eq!(
            split_parent("/a1/a2/9384.img"),
            ("/a1/a2".to_string(), "9384.img".to_string())
        );
        assert_eq!(split_parent("/file"), ("/".to_string(), "file".to_string()));
        assert_eq!(split_parent("/"), ("/".to_string(), String::new()));
    }

    #[test]
    fn test_components() {
        assert_eq!(components("/a1/a2//a3/"), vec!["a1", "a2", "a3"]);
        assert!(components("/").is_empty());
        assert!(is_root("//"));
    }
}
