//! TCP URI parsing.

use crate::error::{CourierError, Result};

/// Parse `tcp://<host>:<port>`.
///
/// An empty host (`tcp://:6000`) means "any address" and is valid.
///
/// # Example
///
/// ```
/// use courier::uri::parse_tcp_uri;
///
/// let (host, port) = parse_tcp_uri("tcp://127.0.0.1:6000").unwrap();
/// assert_eq!(host, "127.0.0.1");
/// assert_eq!(port, 6000);
/// ```
pub fn parse_tcp_uri(uri: &str) -> Result<(String, u16)> {
    let bad = || {
        CourierError::BadUri(format!(
            "Expected URI on the form tcp://<host>:<port>, but got '{uri}'."
        ))
    };

    let rest = uri.strip_prefix("tcp://").ok_or_else(bad)?;
    let (host, port) = rest.rsplit_once(':').ok_or_else(bad)?;
    let port = port.parse::<u16>().map_err(|_| bad())?;

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_and_port() {
        assert_eq!(
            parse_tcp_uri("tcp://127.0.0.1:6000").unwrap(),
            ("127.0.0.1".to_string(), 6000)
        );
    }

    #[test]
    fn parse_any_address() {
        assert_eq!(parse_tcp_uri("tcp://:6000").unwrap(), (String::new(), 6000));
    }

    #[test]
    fn reject_bad_scheme() {
        let err = parse_tcp_uri("foo://127.0.0.1:6000").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected URI on the form tcp://<host>:<port>, but got \
             'foo://127.0.0.1:6000'."
        );
    }

    #[test]
    fn reject_missing_colon_before_port() {
        let err = parse_tcp_uri("tcp://127.0.0.1 6000").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected URI on the form tcp://<host>:<port>, but got \
             'tcp://127.0.0.1 6000'."
        );
    }

    #[test]
    fn reject_non_numeric_port() {
        assert!(parse_tcp_uri("tcp://localhost:abc").is_err());
    }
}
