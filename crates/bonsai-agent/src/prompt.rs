//! Prompt construction for grounded answers.

use bonsai_core::types::{Message, SearchResult};

/// Render retrieved chunks as the knowledge block, in rank order,
/// separated by blank lines.
pub fn knowledge_text(chunks: &[SearchResult]) -> String {
    chunks
        .iter()
        .map(|c| {
            format!(
                "タイトル: {}\nカテゴリ: {}\n要約: {}\n本文: {}",
                c.title, c.category, c.summary, c.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn user_prompt(question: &str, chunks: &[SearchResult]) -> String {
    format!(
        "ユーザーの質問: {}\n\n参照できるナレッジ:\n{}",
        question,
        knowledge_text(chunks)
    )
}

/// System instruction followed by the user turn.
pub fn build_messages(system_prompt: &str, question: &str, chunks: &[SearchResult]) -> Vec<Message> {
    vec![
        Message::system(system_prompt),
        Message::user(user_prompt(question, chunks)),
    ]
}

/// Append the fixed signature after a blank line.
pub fn sign(answer: &str, signature: &str) -> String {
    if signature.is_empty() {
        return answer.trim().to_string();
    }
    format!("{}\n\n{}", answer.trim(), signature)
}
