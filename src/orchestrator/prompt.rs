use std::fmt::Write;

use crate::event_bus::Citation;
use crate::message::Message;

/// Assemble the generation prompt for one chat turn.
///
/// With citations: the model is instructed to answer only from the numbered
/// snippets, cite inline with bracketed marker numbers, and decline rather
/// than fabricate when the context is insufficient. Without citations: the
/// model may use general knowledge but must decline if it cannot answer.
pub fn build_messages(user_message: &str, citations: &[Citation]) -> Vec<Message> {
    if citations.is_empty() {
        return vec![
            Message::system(
                "You are a helpful assistant. No reference documents are available \
                 for this question. Answer from general knowledge when you can, and \
                 say plainly that you cannot answer when you are not confident. \
                 Do not invent citations or sources.",
            ),
            Message::user(user_message),
        ];
    }

    let mut context = String::new();
    for citation in citations {
        let _ = writeln!(context, "[{}] {}", citation.marker, citation.text);
    }

    vec![
        Message::system(
            "You are a helpful assistant. Answer the question using ONLY the \
             numbered snippets below. Cite supporting snippets inline with their \
             bracketed number, e.g. [1]. If the snippets do not contain enough \
             information, say so and decline instead of guessing; never fabricate \
             a citation.",
        ),
        Message::user(&format!(
            "Snippets:\n{context}\nQuestion: {user_message}"
        )),
    ]
}
