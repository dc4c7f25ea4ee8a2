//! crates/admissions_chat_core/src/prompts.rs
//!
//! Builds the prompts for the two language model invocations a turn makes:
//! the knowledge-grounded reply and the escalation judgment. The history
//! window sizes are fixed policy, named here so they are testable.

use crate::domain::{HistoryEntry, KnowledgeEntry};
use std::fmt::Write;

/// How many trailing history turns the reply generation sees.
pub const GENERATION_HISTORY_WINDOW: usize = 10;

/// How many trailing history turns the escalation judgment sees.
pub const JUDGMENT_HISTORY_WINDOW: usize = 5;

const SYSTEM_PROMPT_GUIDELINES: &str = "You are a helpful AI assistant for Havana College, a modern educational institution in London. You help students with questions about courses, admissions, fees, and general university information.

IMPORTANT GUIDELINES:
- Always be helpful, professional, and friendly
- Use the knowledge base information provided below to answer questions accurately
- If you don't have specific information in the knowledge base, politely say so and suggest they contact the admissions office
- For complex queries that might need human attention, suggest escalation
- For booking requests or detailed personal consultation needs, suggest booking a call
- Keep responses concise but informative
- Always cite your sources when using knowledge base information

";

/// Generate the system prompt, embedding each retrieved knowledge entry.
pub fn system_prompt(relevant_entries: &[KnowledgeEntry]) -> String {
    let mut prompt = SYSTEM_PROMPT_GUIDELINES.to_string();

    if !relevant_entries.is_empty() {
        prompt.push_str("\n\nKNOWLEDGE BASE INFORMATION:\n");
        for (index, entry) in relevant_entries.iter().enumerate() {
            let _ = write!(
                prompt,
                "\n{}. {} (ID: {})\n{}\n",
                index + 1,
                entry.title,
                entry.id,
                entry.text
            );
        }
        prompt.push_str(
            "\nPlease reference the appropriate knowledge base entries when answering questions.\n",
        );
    }

    prompt
}

/// Generate the structured-analysis prompt for the escalation judgment.
///
/// Renders the last [`JUDGMENT_HISTORY_WINDOW`] turns as `"{role}: {content}"`
/// lines and instructs the model to answer with JSON only.
pub fn escalation_prompt(user_message: &str, history: &[HistoryEntry]) -> String {
    let window_start = history.len().saturating_sub(JUDGMENT_HISTORY_WINDOW);
    let history_context = history[window_start..]
        .iter()
        .map(|entry| format!("{}: {}", entry.role.as_str(), entry.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an AI assistant helping to analyze student support conversations for escalation needs.

Analyze the following conversation context and latest user message to determine if the situation requires escalation to human support.

CONVERSATION HISTORY (last {JUDGMENT_HISTORY_WINDOW} messages):
{history_context}

LATEST USER MESSAGE:
{user_message}

Consider these factors for escalation:
1. Student expressions of frustration, anger, or dissatisfaction
2. Complex issues that may require human expertise
3. Complaints about services or processes
4. Requests that seem beyond AI capabilities
5. Technical problems that haven't been resolved
6. Urgent or time-sensitive matters
7. Emotional distress or personal situations
8. Requests for human contact or speaking to someone

IMPORTANT: Only suggest escalation if there are genuine signs of need for human intervention. Don't escalate for simple questions that can be handled by AI.

Respond in JSON format only:
{{
  "escalationNeeded": boolean,
  "confidence": number (0-1),
  "reasons": ["reason1", "reason2"],
  "suggestedResponse": "Brief suggestion for next steps"
}}"#
    )
}

/// Generate the prompt for the one-off chat title call made for a chat's
/// first student message.
pub fn chat_title_prompt(user_message: &str) -> String {
    format!(
        r#"Generate a short, descriptive title (maximum 6 words) for a student support chat that starts with the following message. Respond with the title only, no quotes or punctuation around it.

MESSAGE:
{user_message}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{KnowledgeEntry, TurnRole};

    fn entry(id: &str, title: &str, text: &str) -> KnowledgeEntry {
        KnowledgeEntry {
            id: id.to_string(),
            title: title.to_string(),
            keywords: vec![],
            text: text.to_string(),
        }
    }

    #[test]
    fn system_prompt_embeds_entries_with_index_and_id() {
        let entries = vec![
            entry("kb-fees", "Tuition Fees", "Fees are 9,250 GBP per year."),
            entry("kb-terms", "Term Dates", "The autumn term starts in September."),
        ];
        let prompt = system_prompt(&entries);
        assert!(prompt.contains("1. Tuition Fees (ID: kb-fees)\nFees are 9,250 GBP per year."));
        assert!(prompt.contains("2. Term Dates (ID: kb-terms)"));
    }

    #[test]
    fn system_prompt_without_entries_has_no_kb_section() {
        let prompt = system_prompt(&[]);
        assert!(!prompt.contains("KNOWLEDGE BASE INFORMATION"));
    }

    #[test]
    fn escalation_prompt_renders_last_five_turns() {
        let history: Vec<HistoryEntry> = (0..8)
            .map(|i| HistoryEntry::new(TurnRole::Student, format!("message {i}")))
            .collect();
        let prompt = escalation_prompt("latest", &history);
        assert!(!prompt.contains("student: message 2"));
        assert!(prompt.contains("student: message 3"));
        assert!(prompt.contains("student: message 7"));
        assert!(prompt.contains("LATEST USER MESSAGE:\nlatest"));
    }

    #[test]
    fn escalation_prompt_demands_json_shape() {
        let prompt = escalation_prompt("hello", &[]);
        assert!(prompt.contains("\"escalationNeeded\": boolean"));
        assert!(prompt.contains("\"confidence\": number (0-1)"));
    }
}
