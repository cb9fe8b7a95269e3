use http::header::AUTHORIZATION;
use http::HeaderName;
use mallard_core::Request;
use sha2::{Digest, Sha256};

/// Derives a stable cache key from a request.
pub trait KeyProvider: Send + Sync {
    /// Computes the cache key for `request`.
    fn key(&self, request: &Request) -> String;
}

/// Keys purely on the serialized request URI.
#[derive(Debug, Clone, Copy, Default)]
pub struct UriKeyProvider;

impl KeyProvider for UriKeyProvider {
    fn key(&self, request: &Request) -> String {
        request.uri().to_string()
    }
}

/// Keys on the URI plus the uppercase hex SHA-256 of the Authorization
/// header's parameter value, preventing cross-user cache reuse when
/// credentials differ between otherwise-identical requests.
///
/// If no Authorization header is present, or its value has no parameter
/// component, this behaves exactly like [`UriKeyProvider`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthHashKeyProvider;

impl KeyProvider for AuthHashKeyProvider {
    fn key(&self, request: &Request) -> String {
        let uri = request.uri().to_string();
        let auth_header: HeaderName = AUTHORIZATION;
        let parameter = request
            .headers()
            .get_last(&auth_header)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| raw.split_once(' '))
            .map(|(_scheme, parameter)| parameter)
            .filter(|parameter| !parameter.is_empty());

        match parameter {
            Some(parameter) => {
                let digest = Sha256::digest(parameter.as_bytes());
                format!("{uri}{}", hex::encode_upper(digest))
            }
            None => uri,
        }
    }
}
