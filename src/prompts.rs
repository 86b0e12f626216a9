//! Prompts for LLM-based assignment grading.
//!
//! Every prompt lives here so the grading persona and the reply schema can
//! be changed in exactly one place, and so tests can inspect them without a
//! model.
//!
//! Prompt construction is pure: identical inputs always produce
//! byte-identical text. Inputs are interpolated verbatim, without escaping.

use crate::grade::Assignment;
use crate::model::{ChatMessage, Conversation};

/// System prompt describing the grading persona and the exact JSON schema
/// the reply must follow.
pub const SYSTEM_PROMPT: &str = r#"You are an experienced, fair and rigorous teacher grading a student's written assignment.

Read the assignment instructions and grading criteria carefully, then evaluate the submission against them.

Reply with a single JSON object and nothing else, following exactly this schema:

{
  "score": "<grade, e.g. \"15/20\" or a number>",
  "feedback": "<a detailed analysis of the submission, several sentences>",
  "strengths": ["<strength>", "..."],
  "weaknesses": ["<area to improve>", "..."],
  "detailed_corrections": [
    {
      "original": "<excerpt from the submission>",
      "correction": "<corrected version>",
      "explanation": "<why the correction is needed>"
    }
  ]
}

Rules:
- "score" and "feedback" are mandatory.
- "strengths" and "weaknesses" are arrays of short strings.
- "detailed_corrections" may be an empty array when nothing needs correcting.
- Do NOT wrap the JSON in markdown fences.
- Do NOT add commentary before or after the JSON object."#;

/// Build the user instruction embedding the assignment details and the
/// extracted submission text.
pub fn user_prompt(assignment: &Assignment, document_text: &str) -> String {
    format!(
        "Assignment title: {title}\n\
         Subject: {subject}\n\
         \n\
         Instructions:\n{instructions}\n\
         \n\
         Grading criteria:\n{criteria}\n\
         \n\
         Student submission:\n\"\"\"\n{text}\n\"\"\"\n\
         \n\
         Grade this submission and reply with the JSON object described in your instructions.",
        title = assignment.title,
        subject = assignment.subject,
        instructions = assignment.instructions,
        criteria = assignment.criteria,
        text = document_text,
    )
}

/// Build the two-message conversation sent to the model.
pub fn build_conversation(assignment: &Assignment, document_text: &str) -> Conversation {
    Conversation::new(vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(user_prompt(assignment, document_text)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    fn assignment() -> Assignment {
        Assignment {
            title: "Essay 1".into(),
            subject: "History".into(),
            instructions: "Discuss the causes of WW1".into(),
            criteria: "Argument, sources, style".into(),
        }
    }

    #[test]
    fn conversation_has_system_then_user() {
        let conv = build_conversation(&assignment(), "The war began in 1914.");
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0].role, Role::System);
        assert_eq!(conv.messages[1].role, Role::User);
        assert_eq!(conv.messages[0].content, SYSTEM_PROMPT);
    }

    #[test]
    fn user_prompt_embeds_all_inputs_verbatim() {
        let a = assignment();
        let text = "The war began in 1914 {not json}.";
        let prompt = user_prompt(&a, text);
        for needle in [&a.title, &a.subject, &a.instructions, &a.criteria] {
            assert!(prompt.contains(needle.as_str()), "missing {needle}");
        }
        assert!(prompt.contains(text));
    }

    #[test]
    fn prompt_is_deterministic() {
        let a = build_conversation(&assignment(), "same text here");
        let b = build_conversation(&assignment(), "same text here");
        assert_eq!(a, b);
    }

    #[test]
    fn system_prompt_names_required_fields() {
        for field in ["\"score\"", "\"feedback\"", "\"strengths\"", "\"weaknesses\""] {
            assert!(SYSTEM_PROMPT.contains(field), "missing {field}");
        }
    }
}
