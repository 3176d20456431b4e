//! URL helper functions

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left alone by `url_encode`, like `encodeURIComponent`
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Prefix a site path with the base path
///
/// # Examples
/// ```ignore
/// relative_url("/blog", "/css/style.css") // -> "/blog/css/style.css"
/// ```
pub fn relative_url(baseurl: &str, path: &str) -> String {
    if is_external(path) {
        return path.to_string();
    }
    let root = baseurl.trim_end_matches('/');
    let root = if root.is_empty() || root.starts_with('/') {
        root.to_string()
    } else {
        format!("/{}", root)
    };
    let path = path.trim_start_matches('/');
    format!("{}/{}", root, path)
}

/// Generate a full URL including the domain
///
/// # Examples
/// ```ignore
/// absolute_url("https://example.com", "/blog", "/about/") // -> "https://example.com/blog/about/"
/// ```
pub fn absolute_url(url: &str, baseurl: &str, path: &str) -> String {
    if is_external(path) {
        return path.to_string();
    }
    format!("{}{}", url.trim_end_matches('/'), relative_url(baseurl, path))
}

/// Percent-encode a URL component
pub fn url_encode(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

fn is_external(path: &str) -> bool {
    path.starts_with("http://")
        || path.starts_with("https://")
        || path.starts_with("//")
        || path.starts_with("mailto:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_url() {
        assert_eq!(relative_url("/blog/", "/css/style.css"), "/blog/css/style.css");
        assert_eq!(relative_url("blog", "about/"), "/blog/about/");
        assert_eq!(relative_url("", "/about/"), "/about/");
        assert_eq!(relative_url("", ""), "/");
        assert_eq!(
            relative_url("/blog", "https://other.org/x"),
            "https://other.org/x"
        );
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(
            absolute_url("https://example.com/", "/blog", "/about/"),
            "https://example.com/blog/about/"
        );
        assert_eq!(absolute_url("https://example.com", "", "/"), "https://example.com/");
    }

    #[test]
    fn test_url_encode() {
        assert_eq!(url_encode("a b&c"), "a%20b%26c");
        assert_eq!(url_encode("file-name_1.txt"), "file-name_1.txt");
    }
}
