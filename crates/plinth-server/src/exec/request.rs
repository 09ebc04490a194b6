//! Mock request object handed to handler code.

use std::collections::HashMap;

/// An immutable request snapshot.
///
/// Query parameters and cookies are parsed once at construction; the body is
/// opportunistically decoded as JSON and left `None` otherwise. Header names
/// are lowercased so lookups behave like the HTTP header tables handlers
/// expect.
#[derive(Debug, Clone)]
pub struct MockRequest {
    /// HTTP method, as received
    pub method: String,
    /// Full request URL (path plus query)
    pub url: String,
    /// Path component only
    pub path: String,
    /// Header map with lowercased names
    pub headers: HashMap<String, String>,
    /// Decoded query parameters (last occurrence wins)
    pub query: HashMap<String, String>,
    /// JSON-decoded request body, when the bytes parse as JSON
    pub body: Option<serde_json::Value>,
    /// Cookies split out of the `cookie` header
    pub cookies: HashMap<String, String>,
}

impl MockRequest {
    /// Build a request from raw parts.
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        headers: HashMap<String, String>,
        body: Option<&[u8]>,
    ) -> Self {
        let url = url.into();
        let headers: HashMap<String, String> = headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();

        let (path, query) = parse_url(&url);
        let cookies = parse_cookies(headers.get("cookie").map(String::as_str));
        let body = body.and_then(|bytes| serde_json::from_slice(bytes).ok());

        Self {
            method: method.into(),
            url,
            path,
            headers,
            query,
            body,
            cookies,
        }
    }

    /// Look up a header by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Split a request URL into its path and decoded query parameters.
fn parse_url(raw: &str) -> (String, HashMap<String, String>) {
    // Request URLs are path-relative; a dummy origin makes them absolute for
    // the parser.
    match url::Url::parse("http://localhost").and_then(|base| base.join(raw)) {
        Ok(parsed) => {
            let query = parsed
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            (parsed.path().to_string(), query)
        }
        Err(_) => (raw.to_string(), HashMap::new()),
    }
}

fn parse_cookies(header: Option<&str>) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    let Some(header) = header else {
        return cookies;
    };
    for pair in header.split(';') {
        if let Some((name, value)) = pair.split_once('=') {
            cookies.insert(name.trim().to_string(), value.trim().to_string());
        }
    }
    cookies
}
