//! Generated protobuf types and gRPC service stubs for `metrika.Metrics`
//! (`proto/metrika.proto`), plus conversions to the core metric types.

use metrika_core::{Metric, MetricError, MetricRecord};

tonic::include_proto!("metrika");

impl From<Metric> for MetricMessage {
    fn from(metric: Metric) -> Self {
        let record = MetricRecord::from(metric);
        Self {
            id: record.id,
            kind: record.kind,
            delta: record.delta,
            value: record.value,
        }
    }
}

impl TryFrom<MetricMessage> for Metric {
    type Error = MetricError;

    fn try_from(msg: MetricMessage) -> Result<Self, Self::Error> {
        Metric::try_from(MetricRecord {
            id: msg.id,
            kind: msg.kind,
            delta: msg.delta,
            value: msg.value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_conversion_validates_like_json() {
        let msg = MetricMessage::from(Metric::gauge("Alloc", 123.4));
        assert_eq!(msg.value, Some(123.4));
        assert_eq!(Metric::try_from(msg).unwrap(), Metric::gauge("Alloc", 123.4));

        let nan = MetricMessage {
            id: "Bad".into(),
            kind: "gauge".into(),
            delta: None,
            value: Some(f64::NAN),
        };
        assert_eq!(
            Metric::try_from(nan),
            Err(MetricError::NonFiniteValue("Bad".into()))
        );
    }
}
