//! Decoding the workflow engine's response into display text.
//!
//! The engine has answered in different shapes across versions:
//!
//! | Shape | Text taken from |
//! |-------|-----------------|
//! | `{"answer": "…"}` | `answer` |
//! | `{"data": {"outputs": {"text": "…"}}}` | `data.outputs.text` |
//! | anything else | pretty-printed JSON of the whole body |
//!
//! The known shapes are matched exhaustively; an unknown shape still renders.
//! The received body is kept alongside the decoded shape, so run metadata
//! (`workflow_run_id`, `data.status`, token counts) is never lost.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

/// The part of a response the display text comes from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ResultShape {
    /// Chat-style completion.
    Answer { answer: String },
    /// Blocking workflow run (`/workflows/run`).
    Outputs { data: RunData },
    /// No known shape; rendered as pretty JSON.
    #[serde(skip_deserializing)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunData {
    pub outputs: RunOutputs,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunOutputs {
    pub text: String,
}

/// A workflow response: the body as received plus its decoded shape.
///
/// Serialises as the received body, unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowResult {
    shape: ResultShape,
    raw: Value,
}

impl WorkflowResult {
    /// Decode a raw response body. Never fails: unknown shapes become [`ResultShape::Unknown`].
    pub fn from_value(value: Value) -> Self {
        let shape = ResultShape::deserialize(&value).unwrap_or(ResultShape::Unknown);
        if shape == ResultShape::Unknown {
            warn!("Unrecognised workflow response shape; showing raw JSON");
        }
        Self { shape, raw: value }
    }

    pub fn shape(&self) -> &ResultShape {
        &self.shape
    }

    /// The body exactly as the engine sent it.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    /// True when no known shape matched.
    pub fn is_fallback(&self) -> bool {
        matches!(self.shape, ResultShape::Unknown)
    }

    /// The text to show the user.
    pub fn display_text(&self) -> String {
        match &self.shape {
            ResultShape::Answer { answer } => answer.clone(),
            ResultShape::Outputs { data } => data.outputs.text.clone(),
            ResultShape::Unknown => {
                serde_json::to_string_pretty(&self.raw).unwrap_or_else(|_| self.raw.to_string())
            }
        }
    }
}

impl Serialize for WorkflowResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_run_body() -> Value {
        json!({
            "workflow_run_id": "wr-1",
            "task_id": "t-1",
            "data": {
                "id": "wr-1",
                "workflow_id": "wf-9",
                "status": "succeeded",
                "outputs": { "text": "## Summary\n- item" },
                "error": null,
                "elapsed_time": 3.2,
                "total_tokens": 812,
                "total_steps": 4,
                "created_at": 1_705_407_629,
                "finished_at": 1_727_807_631
            }
        })
    }

    #[test]
    fn answer_shape() {
        let r = WorkflowResult::from_value(json!({ "answer": "X" }));
        assert_eq!(r.shape(), &ResultShape::Answer { answer: "X".into() });
        assert_eq!(r.display_text(), "X");
    }

    #[test]
    fn outputs_shape() {
        let r = WorkflowResult::from_value(json!({ "data": { "outputs": { "text": "X" } } }));
        assert!(matches!(r.shape(), ResultShape::Outputs { .. }));
        assert_eq!(r.display_text(), "X");
    }

    #[test]
    fn full_dify_run_response() {
        let r = WorkflowResult::from_value(full_run_body());
        assert_eq!(r.display_text(), "## Summary\n- item");
        assert!(!r.is_fallback());
    }

    #[test]
    fn unknown_shape_is_pretty_printed() {
        let r = WorkflowResult::from_value(json!({ "foo": "bar" }));
        assert!(r.is_fallback());
        assert_eq!(r.display_text(), "{\n  \"foo\": \"bar\"\n}");
    }

    #[test]
    fn near_miss_shapes_fall_back() {
        // Non-string answer and outputs without `text` are not known shapes.
        assert!(WorkflowResult::from_value(json!({ "answer": null })).is_fallback());
        assert!(
            WorkflowResult::from_value(json!({ "data": { "outputs": { "result": "x" } } }))
                .is_fallback()
        );
        assert!(WorkflowResult::from_value(json!("just a string")).is_fallback());
        assert!(WorkflowResult::from_value(Value::Null).is_fallback());
    }

    #[test]
    fn serialises_back_to_received_body() {
        for body in [json!({ "answer": "X", "conversation_id": "c-1" }), full_run_body()] {
            let r = WorkflowResult::from_value(body.clone());
            assert_eq!(serde_json::to_value(&r).unwrap(), body);
            assert_eq!(r.raw(), &body);
        }
        let r = WorkflowResult::from_value(full_run_body());
        assert_eq!(r.raw()["data"]["total_tokens"], 812);
        assert_eq!(r.into_raw()["workflow_run_id"], "wr-1");
    }
}
