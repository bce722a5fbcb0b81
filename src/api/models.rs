use serde::Serialize;
use serde_json::{Map, Value};

use crate::classifier::ClassifierOutput;

/// A validated check request. Built by the extractor in [`crate::api::extract`].
#[derive(Debug, Clone, PartialEq)]
pub struct CheckRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub prediction: String,
    pub probability: f64,
    pub whitelisted: bool,
    pub features: Map<String, Value>,
}

impl From<ClassifierOutput> for CheckResponse {
    fn from(output: ClassifierOutput) -> Self {
        CheckResponse {
            prediction: output.verdict,
            probability: output.probability,
            // Any note marks an allow-listed URL, whatever it says.
            whitelisted: output.note.is_some(),
            features: output.features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn note_presence_sets_whitelisted() {
        let mut output = ClassifierOutput {
            verdict: "aman".into(),
            probability: 0.0,
            note: Some(json!("")),
            features: Map::new(),
        };
        assert!(CheckResponse::from(output.clone()).whitelisted);

        output.note = None;
        assert!(!CheckResponse::from(output).whitelisted);
    }

    #[test]
    fn serializes_canonical_fields() {
        let response = CheckResponse {
            prediction: "phishing".into(),
            probability: 0.9,
            whitelisted: false,
            features: Map::new(),
        };
        assert_eq!(
            serde_json::to_value(response).unwrap(),
            json!({"prediction": "phishing", "probability": 0.9, "whitelisted": false, "features": {}})
        );
    }
}
