use crate::url::CanonicalUrl;
use crate::UrlError;
use url::Url;

/// Normalizes a raw reference into a [`CanonicalUrl`]
///
/// # Normalization Steps
///
/// 1. Reject empty input
/// 2. Resolve against `base` when given, otherwise parse as absolute
/// 3. Require an http or https scheme and a host
/// 4. Lowercase the host (the `url` crate already does this for http(s))
/// 5. Normalize percent-encoding in the path:
///    - Decode escapes of unreserved characters (`A-Z a-z 0-9 - . _ ~`)
///    - Uppercase the hex digits of every other escape
/// 6. Remove trailing slashes from the path (the root `/` is kept)
/// 7. Remove the fragment
///
/// Path and query case is preserved, and so is the query itself.
/// Normalizing an already canonical URL returns the same value.
///
/// # Arguments
///
/// * `raw` - The reference as found in markup or configuration
/// * `base` - The URL of the document the reference appeared in
///
/// # Returns
///
/// * `Ok(CanonicalUrl)` - Normalized URL
/// * `Err(UrlError)` - The reference is not a usable http(s) URL
///
/// # Examples
///
/// ```
/// use tidewalk::url::normalize_url;
/// use url::Url;
///
/// let base = Url::parse("https://EXAMPLE.com/guide/").unwrap();
/// let url = normalize_url("../page/#intro", Some(&base)).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/page");
/// ```
pub fn normalize_url(raw: &str, base: Option<&Url>) -> Result<CanonicalUrl, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Parse("empty reference".to_string()));
    }

    let mut url = match base {
        Some(base) => base.join(raw),
        None => Url::parse(raw),
    }
    .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => return Err(UrlError::MissingHost),
    };
    let lowered = host.to_lowercase();
    if lowered != host {
        url.set_host(Some(&lowered))
            .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;
    }

    let path = normalize_path(url.path());
    url.set_path(&path);

    url.set_fragment(None);

    Ok(CanonicalUrl(url))
}

/// Normalizes percent-encoding and strips trailing slashes from a path
fn normalize_path(path: &str) -> String {
    let decoded = normalize_percent_encoding(path);

    let trimmed = decoded.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Decodes escapes of unreserved characters and uppercases the rest
fn normalize_percent_encoding(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                let decoded = hi * 16 + lo;
                if is_unreserved(decoded) {
                    out.push(decoded as char);
                } else {
                    out.push('%');
                    out.push(bytes[i + 1].to_ascii_uppercase() as char);
                    out.push(bytes[i + 2].to_ascii_uppercase() as char);
                }
                i += 3;
                continue;
            }
        }

        // Paths from `Url` are ASCII, but stay correct for any UTF-8 input
        let ch = input[i..].chars().next().unwrap_or('\u{FFFD}');
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}
