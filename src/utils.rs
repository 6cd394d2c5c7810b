//! Utility functions for composing URLs and route paths
//!
//! Origins, endpoint paths and page routes are configured by hand and
//! routinely disagree about leading and trailing slashes. These helpers
//! normalise them before they are joined or compared.

/// Strip one leading and one trailing occurrence of `symbol`.
///
/// # Example
/// ```
/// use local_auth::utils::trim_with_symbol;
///
/// assert_eq!(trim_with_symbol("/login/", "/"), "login");
/// assert_eq!(trim_with_symbol("/", "/"), "");
/// ```
#[must_use]
pub fn trim_with_symbol<'a>(s: &'a str, symbol: &str) -> &'a str {
    trim_end_with_symbol(trim_start_with_symbol(s, symbol), symbol)
}

/// Strip one leading occurrence of `symbol`.
#[inline]
#[must_use]
pub fn trim_start_with_symbol<'a>(s: &'a str, symbol: &str) -> &'a str {
    s.strip_prefix(symbol).unwrap_or(s)
}

/// Strip one trailing occurrence of `symbol`.
#[inline]
#[must_use]
pub fn trim_end_with_symbol<'a>(s: &'a str, symbol: &str) -> &'a str {
    s.strip_suffix(symbol).unwrap_or(s)
}

/// Join an API origin and an endpoint path with exactly one `/` between them.
///
/// # Example
/// ```
/// use local_auth::utils::join_url;
///
/// assert_eq!(join_url("https://api.example.com/", "/users/me"), "https://api.example.com/users/me");
/// assert_eq!(join_url("/", "auth/signIn"), "/auth/signIn");
/// ```
#[must_use]
pub fn join_url(origin: &str, path: &str) -> String {
    format!(
        "{}/{}",
        trim_with_symbol(origin, "/"),
        trim_start_with_symbol(path, "/")
    )
}

/// Normalise a route so it has exactly one leading `/`.
#[must_use]
pub fn absolute_route(route: &str) -> String {
    format!("/{}", trim_start_with_symbol(route, "/"))
}

/// Compare two routes ignoring one leading and trailing `/`.
#[must_use]
pub fn same_route(a: &str, b: &str) -> bool {
    trim_with_symbol(a, "/") == trim_with_symbol(b, "/")
}
