//! Locate and parse the evaluation object inside the model's reply.
//!
//! Models often wrap the JSON in prose or markdown fences. The span taken is
//! the first `{` through the last `}` of the reply, inclusive; anything
//! outside it is ignored.

use crate::error::GradeError;
use crate::output::Evaluation;
use serde_json::Value;

/// Extract the first top-level JSON object from `reply` and parse it.
///
/// No schema checks are applied; see [`parse_evaluation`] for that.
pub fn extract_json_object(reply: &str) -> Result<Value, GradeError> {
    let start = reply
        .find('{')
        .ok_or_else(|| GradeError::InvalidModelResponse("no JSON object in reply".into()))?;
    let end = reply
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| GradeError::InvalidModelResponse("unterminated JSON object".into()))?;

    let span = &reply[start..=end];
    let value: Value = serde_json::from_str(span)
        .map_err(|e| GradeError::InvalidModelResponse(format!("reply is not valid JSON: {e}")))?;

    if value.is_object() {
        Ok(value)
    } else {
        Err(GradeError::InvalidModelResponse("reply is not a JSON object".into()))
    }
}

/// Extract, parse and validate the evaluation in one step.
pub fn parse_evaluation(reply: &str) -> Result<Evaluation, GradeError> {
    Evaluation::from_value(extract_json_object(reply)?)
}
