use http::{HeaderName, HeaderValue};
use mallard_core::{MultiHeaderMap, Request};

/// `X-Mallard-SimpleCache-TTL` — integer seconds; declares cacheability and
/// lifetime.
pub static TTL: HeaderName = HeaderName::from_static("x-mallard-simplecache-ttl");
/// `X-Mallard-SimpleCache-ForceRefresh` — `true`/`false`; bypass the read,
/// still write.
pub static FORCE_REFRESH: HeaderName =
    HeaderName::from_static("x-mallard-simplecache-forcerefresh");
/// `X-Mallard-SimpleCache-Disable` — `true`/`false`; bypass the cache
/// entirely. Wins over the other two directives.
pub static DISABLE: HeaderName = HeaderName::from_static("x-mallard-simplecache-disable");

/// A directive header's value failed to parse as its declared type. This
/// indicates a caller bug (a malformed `TTL`/`ForceRefresh`/`Disable`
/// header), not a runtime condition the middleware can recover from.
#[derive(thiserror::Error, Debug)]
pub enum DirectiveError {
    /// The value was not valid UTF-8 / ASCII.
    #[error("directive header {header} is not a valid header value: {source}")]
    NotAString {
        /// The offending header name.
        header: &'static str,
        /// The underlying conversion error.
        #[source]
        source: http::header::ToStrError,
    },
    /// `TTL`'s value did not parse as an unsigned integer of seconds.
    #[error("TTL header value {0:?} is not a valid integer number of seconds")]
    InvalidTtl(String),
    /// `ForceRefresh`/`Disable`'s value did not parse as a boolean.
    #[error("{header} header value {value:?} is not \"true\" or \"false\"")]
    InvalidBool {
        /// The offending header name.
        header: &'static str,
        /// The value that failed to parse.
        value: String,
    },
}

/// The cache directives parsed from a request, with defaults applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directives {
    /// Bypass the cache entirely; set when `Disable=true` was present.
    pub disable: bool,
    /// Do not read the cache; still write to it if cacheable.
    pub force_refresh: bool,
    /// Whether a `TTL` was present at all.
    pub cacheable: bool,
    /// The declared lifetime, in seconds, if `cacheable`.
    pub ttl_seconds: u64,
}

fn last_value(headers: &MultiHeaderMap, name: &HeaderName) -> Option<Result<String, DirectiveError>> {
    headers.get_last(name).map(|value: &HeaderValue| {
        value.to_str().map(str::to_string).map_err(|source| DirectiveError::NotAString {
            header: name.as_str(),
            source,
        })
    })
}

fn parse_bool(header: &'static str, value: String) -> Result<bool, DirectiveError> {
    match value.as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(DirectiveError::InvalidBool { header, value }),
    }
}

/// Parses and strips the directive headers from `request`, applying the
/// last-value-wins rule for multi-valued headers. Directive headers are
/// always removed from the request before it is forwarded, regardless of
/// the outcome, so they never leak to the network.
pub fn take_directives(request: &mut Request) -> Result<Directives, DirectiveError> {
    let disable_raw = last_value(request.headers(), &DISABLE).transpose()?;
    let force_refresh_raw = last_value(request.headers(), &FORCE_REFRESH).transpose()?;
    let ttl_raw = last_value(request.headers(), &TTL).transpose()?;

    request.headers_mut().remove(&DISABLE);
    request.headers_mut().remove(&FORCE_REFRESH);
    request.headers_mut().remove(&TTL);

    let disable = match disable_raw {
        Some(raw) => parse_bool(DISABLE.as_str(), raw)?,
        None => false,
    };
    let force_refresh = match force_refresh_raw {
        Some(raw) => parse_bool(FORCE_REFRESH.as_str(), raw)?,
        None => false,
    };
    let (cacheable, ttl_seconds) = match ttl_raw {
        Some(raw) => {
            let seconds =
                raw.parse::<u64>().map_err(|_| DirectiveError::InvalidTtl(raw.clone()))?;
            (true, seconds)
        }
        None => (false, 0),
    };

    Ok(Directives { disable, force_refresh, cacheable, ttl_seconds })
}
