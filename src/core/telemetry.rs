use crate::core::normalize::cell_text;
pub use crate::domain::model::is_truthy;
use crate::domain::model::{Batch, Outcome, ResultRecord};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub mean_latency_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyRow {
    pub filename: String,
    pub model_id: String,
    pub latency_seconds: f64,
    pub succeeded: bool,
}

fn has_result(record: &ResultRecord) -> bool {
    record.outcome.payload().map(is_truthy).unwrap_or(false)
}

pub fn summarize(batch: &Batch) -> Summary {
    let total = batch.len();
    let succeeded = batch.iter().filter(|r| has_result(r)).count();
    let failed = batch.iter().filter(|r| !r.outcome.is_success()).count();
    let mean_latency_seconds = if total == 0 {
        0.0
    } else {
        batch.iter().map(|r| r.latency_seconds).sum::<f64>() / total as f64
    };

    Summary {
        total,
        succeeded,
        failed,
        mean_latency_seconds,
    }
}

fn key_values(fields: &serde_json::Map<String, Value>) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{} = {}", key, cell_text(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_payload(payload: &Value) -> String {
    match payload {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let fields = match item {
                    Value::Object(fields) => key_values(fields),
                    other => cell_text(other),
                };
                format!("Item {}: {}", idx + 1, fields)
            })
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(fields) => key_values(fields),
        scalar => cell_text(scalar),
    }
}

/// One human-readable line per record. Successes without a usable result
/// are left out, like the page's insight list.
pub fn digest(batch: &Batch) -> Vec<String> {
    batch
        .iter()
        .filter_map(|record| match &record.outcome {
            Outcome::Success(payload) if is_truthy(payload) => {
                Some(format!("{}: {}", record.filename, describe_payload(payload)))
            }
            Outcome::Success(_) => None,
            Outcome::Failure(message) => {
                Some(format!("{}: Error = {}", record.filename, message))
            }
        })
        .collect()
}

pub fn latency_rows(batch: &Batch) -> Vec<LatencyRow> {
    batch
        .iter()
        .map(|record| LatencyRow {
            filename: record.filename.clone(),
            model_id: record.model_id.clone(),
            latency_seconds: record.latency_seconds,
            succeeded: has_result(record),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(name: &str, outcome: Outcome, latency: f64) -> ResultRecord {
        ResultRecord::new(name, "m", outcome, latency)
    }

    #[test]
    fn test_summarize_empty_batch() {
        let summary = summarize(&Batch::new());
        assert_eq!(
            summary,
            Summary {
                total: 0,
                succeeded: 0,
                failed: 0,
                mean_latency_seconds: 0.0
            }
        );
    }

    #[test]
    fn test_summarize_counts_one_failure() {
        let batch = Batch::from(vec![
            record("1.png", Outcome::Success(json!({"a": 1})), 1.0),
            record("2.png", Outcome::Failure("timeout".into()), 2.0),
            record("3.png", Outcome::Success(json!([1])), 3.0),
        ]);
        let summary = summarize(&batch);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert!((summary.mean_latency_seconds - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_falsy_payloads_are_neither_succeeded_nor_failed() {
        let batch = Batch::from(vec![
            record("null.png", Outcome::Success(Value::Null), 0.1),
            record("zero.png", Outcome::Success(json!(0)), 0.1),
            record("blank.png", Outcome::Success(json!("")), 0.1),
            record("empty.png", Outcome::Success(json!({})), 0.1),
        ]);
        let summary = summarize(&batch);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_digest_lines() {
        let batch = Batch::from(vec![
            record(
                "inv.png",
                Outcome::Success(json!([{"sku": "A1", "qty": 2}, {"sku": "B2", "qty": 1}])),
                1.0,
            ),
            record(
                "id.png",
                Outcome::Success(json!({"name": "Ada", "tags": ["x"]})),
                1.0,
            ),
            record("note.png", Outcome::Success(json!("handwritten")), 1.0),
            record("skip.png", Outcome::Success(json!(false)), 1.0),
            record("bad.png", Outcome::Failure("Network error: refused".into()), 1.0),
        ]);

        assert_eq!(
            digest(&batch),
            vec![
                "inv.png: Item 1: sku = A1, qty = 2; Item 2: sku = B2, qty = 1".to_string(),
                "id.png: name = Ada, tags = [\"x\"]".to_string(),
                "note.png: handwritten".to_string(),
                "bad.png: Error = Network error: refused".to_string(),
            ]
        );
    }

    #[test]
    fn test_latency_rows_follow_batch_order() {
        let batch = Batch::from(vec![
            record("b.png", Outcome::Success(json!({"k": 1})), 0.75),
            record("a.png", Outcome::Failure("x".into()), 0.25),
        ]);
        let rows = latency_rows(&batch);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].filename, "b.png");
        assert!(rows[0].succeeded);
        assert_eq!(rows[1].latency_seconds, 0.25);
        assert!(!rows[1].succeeded);
    }
}
