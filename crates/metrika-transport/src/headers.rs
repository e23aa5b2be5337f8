//! Header names and values shared by the agent and the server.

/// Hex HMAC-SHA256 of the plain JSON body (requests) or of
/// content-type + path + query (responses).
pub const HASH_HEADER: &str = "HashSHA256";

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Marks an RSA-encrypted body.
pub const CONTENT_TYPE_ENCRYPTED: &str = "application/octet-stream";

pub const ENCODING_GZIP: &str = "gzip";

/// Batch endpoint path.
pub const UPDATES_PATH: &str = "/updates/";

/// True when an `Accept-Encoding` value admits gzip.
pub fn accepts_gzip(accept_encoding: &str) -> bool {
    accept_encoding
        .split(',')
        .map(|part| part.split(';').next().unwrap_or("").trim())
        .any(|coding| coding.eq_ignore_ascii_case(ENCODING_GZIP) || coding == "*")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_encoding_matching() {
        assert!(accepts_gzip("gzip"));
        assert!(accepts_gzip("deflate, gzip;q=0.5"));
        assert!(accepts_gzip("*"));
        assert!(!accepts_gzip("deflate, br"));
        assert!(!accepts_gzip(""));
    }
}
