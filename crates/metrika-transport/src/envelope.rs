//! Envelope sealing (agent) and opening (server).
//!
//! An [`Envelope`] is one encoded batch plus the header values that tell the
//! receiver how to undo the encoding. At most one transform is applied:
//!
//! | agent has         | body                | headers                          |
//! |-------------------|---------------------|----------------------------------|
//! | public key        | RSA(json)           | `Content-Type: octet-stream`     |
//! | gzip negotiated   | gzip(json)          | `Content-Encoding: gzip`         |
//! | neither           | json                | `HashSHA256` if a secret is set  |

use bytes::Bytes;
use metrika_core::{Metric, Snapshot};

use crate::codec;
use crate::crypto::{DecryptionKey, EncryptionKey};
use crate::error::TransportError;
use crate::gzip;
use crate::headers::{CONTENT_TYPE_ENCRYPTED, CONTENT_TYPE_JSON, ENCODING_GZIP};
use crate::signing;

/// What the receiving server was found to support.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub gzip: bool,
}

/// An encoded batch ready for any transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub body: Bytes,
    pub content_type: String,
    pub content_encoding: Option<String>,
    pub signature: Option<String>,
}

impl Envelope {
    /// Plain JSON envelope with no transform and no signature.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            content_type: CONTENT_TYPE_JSON.to_string(),
            content_encoding: None,
            signature: None,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.content_type
            .split(';')
            .next()
            .is_some_and(|ct| ct.trim().eq_ignore_ascii_case(CONTENT_TYPE_ENCRYPTED))
    }

    pub fn is_gzip(&self) -> bool {
        self.content_encoding
            .as_deref()
            .is_some_and(|ce| ce.trim().eq_ignore_ascii_case(ENCODING_GZIP))
    }
}

/// Agent-side batch encoder.
#[derive(Debug, Clone, Default)]
pub struct Sealer {
    secret: Option<String>,
    public_key: Option<EncryptionKey>,
    capabilities: Capabilities,
}

impl Sealer {
    pub fn new(secret: Option<String>, public_key: Option<EncryptionKey>) -> Self {
        Self {
            secret,
            public_key,
            capabilities: Capabilities::default(),
        }
    }

    /// Use the result of capability negotiation.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn seal(&self, snapshot: &Snapshot) -> Result<Envelope, TransportError> {
        let json = codec::encode_snapshot(snapshot)?;

        if let Some(key) = &self.public_key {
            return Ok(Envelope {
                body: key.encrypt(&json)?.into(),
                content_type: CONTENT_TYPE_ENCRYPTED.to_string(),
                content_encoding: None,
                signature: None,
            });
        }

        if self.capabilities.gzip {
            return Ok(Envelope {
                body: gzip::compress(&json)?.into(),
                content_type: CONTENT_TYPE_JSON.to_string(),
                content_encoding: Some(ENCODING_GZIP.to_string()),
                signature: None,
            });
        }

        let signature = self
            .secret
            .as_deref()
            .map(|secret| signing::sign(secret, &json));
        Ok(Envelope {
            signature,
            ..Envelope::json(json)
        })
    }
}

/// Server-side batch decoder, shared by the HTTP and gRPC surfaces.
#[derive(Debug, Clone, Default)]
pub struct Opener {
    secret: Option<String>,
    private_key: Option<DecryptionKey>,
}

impl Opener {
    pub fn new(secret: Option<String>, private_key: Option<DecryptionKey>) -> Self {
        Self {
            secret,
            private_key,
        }
    }

    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    /// Undo the envelope's transforms, check its signature, and decode the
    /// records.
    ///
    /// With a secret configured, an unsigned plain-JSON batch is rejected.
    /// Encrypted or compressed batches are accepted unsigned because the
    /// agent never signs those.
    pub fn open(&self, envelope: &Envelope) -> Result<Vec<Metric>, TransportError> {
        let mut body = envelope.body.to_vec();
        let mut transformed = false;

        if envelope.is_encrypted() {
            let key = self.private_key.as_ref().ok_or_else(|| {
                TransportError::Key("encrypted batch received but no private key is configured".into())
            })?;
            body = key.decrypt(&body)?;
            transformed = true;
        }

        if envelope.is_gzip() {
            body = gzip::decompress(&body)?;
            transformed = true;
        }

        if let Some(secret) = &self.secret {
            match envelope.signature.as_deref().filter(|s| !s.is_empty()) {
                Some(signature) => signing::verify(secret, &body, signature)?,
                None if !transformed => {
                    return Err(TransportError::Signature("missing signature".into()));
                }
                None => {}
            }
        }

        codec::decode_batch(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::tests::key_pair;

    fn snapshot() -> Snapshot {
        vec![Metric::counter("PollCount", 5), Metric::gauge("Alloc", 123.4)]
            .into_iter()
            .collect()
    }

    #[test]
    fn plain_unsigned() {
        let envelope = Sealer::default().seal(&snapshot()).unwrap();
        assert_eq!(envelope.content_type, CONTENT_TYPE_JSON);
        assert!(envelope.content_encoding.is_none());
        assert!(envelope.signature.is_none());
        assert_eq!(Opener::default().open(&envelope).unwrap().len(), 2);
    }

    #[test]
    fn plain_signed_with_secret() {
        let sealer = Sealer::new(Some("k".into()), None);
        let envelope = sealer.seal(&snapshot()).unwrap();
        let signature = envelope.signature.clone().unwrap();
        assert_eq!(signature, signing::sign("k", &envelope.body));

        let opener = Opener::new(Some("k".into()), None);
        let metrics = opener.open(&envelope).unwrap();
        assert_eq!(metrics[0], Metric::gauge("Alloc", 123.4));
        assert_eq!(metrics[1], Metric::counter("PollCount", 5));
    }

    #[test]
    fn wrong_secret_rejected() {
        let envelope = Sealer::new(Some("k".into()), None).seal(&snapshot()).unwrap();
        let err = Opener::new(Some("other".into()), None).open(&envelope).unwrap_err();
        assert!(matches!(err, TransportError::Signature(_)));
    }

    #[test]
    fn unsigned_plain_batch_rejected_when_secret_configured() {
        let envelope = Sealer::default().seal(&snapshot()).unwrap();
        let err = Opener::new(Some("k".into()), None).open(&envelope).unwrap_err();
        assert!(err.is_rejection());
    }

    #[test]
    fn gzip_skips_signature() {
        let sealer =
            Sealer::new(Some("k".into()), None).with_capabilities(Capabilities { gzip: true });
        let envelope = sealer.seal(&snapshot()).unwrap();
        assert!(envelope.is_gzip());
        assert!(envelope.signature.is_none());
        assert_eq!(
            Opener::new(Some("k".into()), None).open(&envelope).unwrap().len(),
            2
        );
    }

    #[test]
    fn encryption_wins_over_gzip() {
        let (public, private) = key_pair();
        let sealer = Sealer::new(Some("k".into()), Some(public))
            .with_capabilities(Capabilities { gzip: true });
        let envelope = sealer.seal(&snapshot()).unwrap();
        assert!(envelope.is_encrypted());
        assert!(!envelope.is_gzip());
        assert!(envelope.signature.is_none());

        let opener = Opener::new(Some("k".into()), Some(private));
        assert_eq!(opener.open(&envelope).unwrap().len(), 2);
    }

    #[test]
    fn encrypted_batch_without_private_key_rejected() {
        let (public, _) = key_pair();
        let envelope = Sealer::new(None, Some(public)).seal(&snapshot()).unwrap();
        let err = Opener::default().open(&envelope).unwrap_err();
        assert!(matches!(err, TransportError::Key(_)));
    }

    #[test]
    fn corrupt_gzip_rejected() {
        let envelope = Envelope {
            content_encoding: Some("gzip".into()),
            ..Envelope::json(&b"not gzip"[..])
        };
        assert!(Opener::default().open(&envelope).unwrap_err().is_rejection());
    }
}
