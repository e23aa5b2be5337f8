//! JSON batch codec: a snapshot travels as an array of records ordered by id.

use metrika_core::{Metric, Snapshot};

use crate::error::TransportError;

pub fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>, TransportError> {
    let records: Vec<&Metric> = snapshot.iter().collect();
    serde_json::to_vec(&records).map_err(|e| TransportError::Encode(e.to_string()))
}

/// Decode a batch body, validating every record.
pub fn decode_batch(body: &[u8]) -> Result<Vec<Metric>, TransportError> {
    serde_json::from_slice(body).map_err(|e| TransportError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_records_in_id_order() {
        let snapshot: Snapshot = vec![Metric::gauge("b", 1.5), Metric::counter("a", 2)]
            .into_iter()
            .collect();
        let body = encode_snapshot(&snapshot).unwrap();
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            r#"[{"id":"a","type":"counter","delta":2},{"id":"b","type":"gauge","value":1.5}]"#
        );
    }

    #[test]
    fn invalid_record_fails_whole_batch() {
        let body = br#"[{"id":"a","type":"counter","delta":2},{"id":"b","type":"gauge"}]"#;
        let err = decode_batch(body).unwrap_err();
        assert!(err.is_rejection());
    }

    #[test]
    fn non_array_body_rejected() {
        assert!(decode_batch(br#"{"id":"a","type":"counter","delta":2}"#).is_err());
    }
}
