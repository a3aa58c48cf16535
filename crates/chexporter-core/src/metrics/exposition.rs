//! Text exposition of a finished scrape.

use std::collections::HashMap;

use prometheus::{Encoder, TextEncoder};
use tracing::warn;

use super::sink::MetricSample;

/// Content type of the text exposition format.
pub const TEXT_CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Error type for text encoding.
#[derive(Debug)]
pub enum EncodeError {
    /// The Prometheus encoder rejected a family.
    Encoder(String),
    /// Encoded output was not UTF-8.
    Utf8(String),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::Encoder(msg) => write!(f, "encoding failed: {}", msg),
            EncodeError::Utf8(msg) => write!(f, "encoded output is not UTF-8: {}", msg),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Folds families sharing a name into the first one seen.
///
/// Order of first appearance is kept. A family whose type differs from the
/// first one with the same name is dropped. Empty families are dropped.
pub fn merge_families(samples: Vec<MetricSample>) -> Vec<MetricSample> {
    let mut merged: Vec<MetricSample> = Vec::with_capacity(samples.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for family in samples {
        if family.get_metric().is_empty() {
            continue;
        }
        match index.get(family.get_name()) {
            Some(&i) => {
                let target = &mut merged[i];
                if target.get_field_type() != family.get_field_type() {
                    warn!(
                        metric = family.get_name(),
                        "dropping samples with conflicting metric type"
                    );
                    continue;
                }
                for metric in family.get_metric() {
                    target.mut_metric().push(metric.clone());
                }
            }
            None => {
                index.insert(family.get_name().to_string(), merged.len());
                merged.push(family);
            }
        }
    }

    merged
}

/// Renders samples in the Prometheus text format.
pub fn encode_text(samples: Vec<MetricSample>) -> Result<String, EncodeError> {
    let families = merge_families(samples);
    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(&families, &mut buf)
        .map_err(|e| EncodeError::Encoder(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| EncodeError::Utf8(e.to_string()))
}
