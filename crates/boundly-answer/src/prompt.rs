//! Chat prompt for a question and its retrieved context.

use boundly_core::types::RetrievedResult;

use crate::llm::{ChatMessage, Role};

pub const SYSTEM_PROMPT: &str = "You are BoundLy, a meticulous immigration-law specialist.
Answer ONLY about H-1B eligibility.
Cite sources with [[source:<file>]] markers.
Always respond in valid JSON. Your JSON must contain at least these keys:
  - \"decision\": \"yes\", \"no\", or \"unknown\"
  - \"explanation\": a thorough rationale
  - \"citations\": a list of source filenames
If you are unsure, set \"decision\": \"unknown\" and explain why.";

/// Worked examples, as `(question, answer JSON)` pairs.
pub const WORKED_EXAMPLES: [(&str, &str); 2] = [
    (
        "Does a BA in Computer Science qualify for an H-1B specialty occupation?",
        r#"{"decision":"yes","explanation":"A BS in Computer Science meets the specialty occupation requirement when the role demands advanced CS knowledge (see Case001.pdf)","citations":["Case001.pdf"]}"#,
    ),
    (
        "Is a BA in Psychology sufficient for an H-1B specialty occupation in clinical psychology?",
        r#"{"decision":"no","explanation":"A BA in Psychology alone does not satisfy the specialized clinical licensure or advanced degree typically required (see Case002.pdf)","citations":["Case002.pdf"]}"#,
    ),
];

/// System message, worked examples, the question verbatim, then the
/// retrieved context in rank order.
pub fn build_messages(question: &str, chunks: &[RetrievedResult]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(3 + 2 * WORKED_EXAMPLES.len());
    messages.push(ChatMessage::new(Role::System, SYSTEM_PROMPT));
    for (q, a) in WORKED_EXAMPLES {
        messages.push(ChatMessage::new(Role::User, q));
        messages.push(ChatMessage::new(Role::Assistant, a));
    }
    messages.push(ChatMessage::new(Role::User, question));
    messages.push(ChatMessage::new(Role::Assistant, format!("Context:\n{}", render_context(chunks))));
    messages
}

fn render_context(chunks: &[RetrievedResult]) -> String {
    chunks
        .iter()
        .map(|c| format!("[[source:{}]]\n{}", c.source, c.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, source: &str, content: &str) -> RetrievedResult {
        RetrievedResult { doc_id: id.into(), content: content.into(), source: source.into(), score: 1.0 }
    }

    #[test]
    fn message_order_and_roles() {
        let msgs = build_messages("Is wage level I enough?", &[]);
        let roles: Vec<Role> = msgs.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert!(msgs[0].content.starts_with("You are BoundLy"));
        assert_eq!(msgs[5].content, "Is wage level I enough?");
        assert_eq!(msgs[6].content, "Context:\n");
    }

    #[test]
    fn context_keeps_rank_order() {
        let chunks = [result("b", "Case002.pdf", "second"), result("a", "Case001.pdf", "first")];
        let msgs = build_messages("q", &chunks);
        assert_eq!(
            msgs.last().unwrap().content,
            "Context:\n[[source:Case002.pdf]]\nsecond\n\n[[source:Case001.pdf]]\nfirst"
        );
    }

    #[test]
    fn assembly_is_deterministic() {
        let chunks = [result("a", "Case001.pdf", "BS in Computer Science")];
        assert_eq!(build_messages("q", &chunks), build_messages("q", &chunks));
    }

    #[test]
    fn worked_examples_are_valid_json() {
        for (_, answer) in WORKED_EXAMPLES {
            let v: serde_json::Value = serde_json::from_str(answer).unwrap();
            assert!(v["decision"].is_string());
        }
    }
}
