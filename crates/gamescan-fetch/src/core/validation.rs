/// Returns `true` if the HTTP status code indicates a redirect.
///
/// # Examples
///
/// ```
/// use gamescan_fetch::is_redirect;
///
/// assert!(is_redirect(301));
/// assert!(!is_redirect(206));
/// ```
pub fn is_redirect(status: u16) -> bool { matches!(status, 301 | 302 | 303 | 307 | 308) }

/// Decides from a probe response whether the resource can be fetched in ranges.
///
/// A server supports ranges when it answers a capped ranged `GET` with
/// `206 Partial Content`, or with any non-redirect success status while
/// advertising `Accept-Ranges: bytes`.
///
/// # Examples
///
/// ```
/// use gamescan_fetch::supports_ranges;
///
/// assert!(supports_ranges(206, None));
/// assert!(supports_ranges(200, Some("bytes")));
/// assert!(!supports_ranges(200, Some("none")));
/// assert!(!supports_ranges(302, Some("bytes")));
/// ```
pub fn supports_ranges(status: u16, accept_ranges: Option<&str>) -> bool {
    if status == 206 {
        return true;
    }
    let advertised = accept_ranges.is_some_and(|value| value.trim().eq_ignore_ascii_case("bytes"));
    (200..300).contains(&status) && !is_redirect(status) && advertised
}
