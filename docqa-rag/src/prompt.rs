//! Prompt assembly for the supported answering modes.

use docqa_model::ChatMessage;
use serde::{Deserialize, Serialize};

use crate::document::SearchResult;

/// Marks the start of the cited chunk ids in a source-attributed answer.
pub const SOURCES_DELIMITER: &str = "\nSOURCES:";

/// Placed between retrieved chunk texts in raw-context prompts.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Placed between the retrieved context and the question.
pub const QUERY_SEPARATOR: &str = "\n\n-----\n\n";

pub const RAW_CONTEXT_RULES: &str = "You are a helpful assistant who helps with answering questions based on the provided information. If the information cannot be found in the text provided, you admit that I don't know";

pub const STORYBOT_RULES: &str = "I want you to act as an Indian story teller. You will come up with entertaining stories that are engaging, imaginative and captivating for children in India. It can be fairy tales, educational stories or any other type of stories which has the potential to capture children's attention and imagination. A story should not be more than 200 words. The audience for the stories do not speak English natively. So use very simple English with short and simple sentences, no complex or compound sentences. Extra points if the story ends with an unexpected twist.";

pub const TECH_QUESTION_BANK_RULES: &str = r#"You are a technology expert tasked with creating multiple-choice questions for a question bank. Your goal is to provide the question, options, and correct answer. Make sure that questions are not repeated.

Please generate the questions and encode the responses in CSV format. Use the following headers in lowercase with spaces replaced by underscores: question, option_a, option_b, option_c, option_d, correct_answer. Additionally, replace any commas in the CSV data with a dollar symbol ($). The output should be comma-separated.

When generating the questions, list the options without prefixing them with option names like A, B, C, or D. However, specify the correct answer in the "correct_answer" column using the corresponding option letter.

Example:
Question,Option_A,Option_B,Option_C,Option_D,Correct_Answer
What is the purpose of the sleep() method in Java?,To terminate a thread,To start a new thread,To pause the execution of a thread for a specific amount of time,To increase the priority of a thread,C

Please generate the questions accordingly and provide the encoded CSV data."#;

/// Domain question-bank rules; `{Context}` is replaced by the retrieved context.
pub const DOMAIN_QUESTION_BANK_RULES: &str = r#"You are a domain expert tasked with creating multiple-choice questions for a question bank. Your goal is to provide the question, options, and correct answer. Make sure that questions are not repeated.

Given the following context:

"{Context}"

Please generate the questions and encode the responses in CSV format. Use the following headers in lowercase with spaces replaced by underscores: question, option_a, option_b, option_c, option_d, correct_answer. Additionally, replace any commas in the CSV data with a dollar symbol ($). The output should be properly formatted and comma-separated.

Example:
Question,Option_A,Option_B,Option_C,Option_D,Correct_Answer
"What is the purpose of the sleep() method in Java?","To terminate a thread","To start a new thread","To pause the execution of a thread for a specific amount of time","To increase the priority of a thread","C"

Please generate the questions accordingly and provide the encoded CSV data."#;

/// `{question}` is replaced by the user's query.
pub const REPHRASE_TEMPLATE: &str = "Write the same question as user input and make it more descriptive without adding new information and without making the facts incorrect.\n\nUser: {question}\nRephrased User input:";

const SOURCE_ATTRIBUTED_TEMPLATE: &str = "Given the following extracted parts of a long document and a question, create a final answer with references (\"SOURCES\").\nIf you don't know the answer, just say that you don't know. Don't try to make up an answer.\nALWAYS return a \"SOURCES\" part in your answer, on its own line, listing the Source values of the parts you used separated by commas.\n\nQUESTION: {question}\n=========\n{summaries}\n=========\nFINAL ANSWER:";

/// Subject of a multi-turn question-bank conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// General technology questions, answered without retrieval.
    Technical,
    /// Questions about an uploaded document set.
    Domain,
}

/// How retrieved chunks and the query are turned into chat messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Excerpts labelled with their chunk id; the model must cite them.
    SourceAttributed,
    /// Plain context block followed by the question.
    RawContext,
    /// Question-bank rules for a multi-turn conversation.
    Conversational(Topic),
}

/// An ordered list of chat messages ready to send to a model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Prompt {
    pub messages: Vec<ChatMessage>,
}

impl Prompt {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }
}

/// Builds [`Prompt`]s, bounding the retrieved context to a character budget.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    max_context_chars: usize,
}

impl PromptAssembler {
    pub fn new(max_context_chars: usize) -> Self {
        Self { max_context_chars: max_context_chars.max(1) }
    }

    /// Assemble the prompt for `mode` from chunks in retrieval order.
    pub fn assemble(&self, mode: PromptMode, chunks: &[SearchResult], query: &str) -> Prompt {
        match mode {
            PromptMode::SourceAttributed => {
                let summaries = self
                    .bounded(chunks)
                    .iter()
                    .map(|(id, text)| format!("Content: {text}\nSource: {id}"))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                let content = SOURCE_ATTRIBUTED_TEMPLATE
                    .replace("{summaries}", &summaries)
                    .replace("{question}", query);
                Prompt::new(vec![ChatMessage::user(content)])
            }
            PromptMode::RawContext => Prompt::new(vec![
                ChatMessage::system(RAW_CONTEXT_RULES),
                ChatMessage::user(format!("{}{query}", self.context_block(chunks))),
            ]),
            PromptMode::Conversational(Topic::Technical) => Prompt::new(vec![
                ChatMessage::system(TECH_QUESTION_BANK_RULES),
                ChatMessage::user(query),
            ]),
            PromptMode::Conversational(Topic::Domain) => {
                let rules = DOMAIN_QUESTION_BANK_RULES.replace("{Context}", &self.context_block(chunks));
                Prompt::new(vec![ChatMessage::system(rules), ChatMessage::user(query)])
            }
        }
    }

    /// Chunk texts joined by [`CONTEXT_SEPARATOR`] and terminated by
    /// [`QUERY_SEPARATOR`].
    pub fn context_block(&self, chunks: &[SearchResult]) -> String {
        let texts: Vec<String> = self.bounded(chunks).into_iter().map(|(_, text)| text).collect();
        format!("{}{QUERY_SEPARATOR}", texts.join(CONTEXT_SEPARATOR))
    }

    /// Prompt asking the model to restate `query` more descriptively.
    pub fn rephrase(&self, query: &str) -> Prompt {
        Prompt::new(vec![ChatMessage::user(REPHRASE_TEMPLATE.replace("{question}", query))])
    }

    /// Story-telling prompt used for the `storybot` document set.
    pub fn storybot(&self, query: &str) -> Prompt {
        Prompt::new(vec![ChatMessage::system(STORYBOT_RULES), ChatMessage::user(query)])
    }

    /// `(chunk id, text)` pairs in order, stopping once the budget is spent.
    /// The first chunk is always kept, truncated if it alone is too long.
    fn bounded(&self, chunks: &[SearchResult]) -> Vec<(String, String)> {
        let mut used = 0usize;
        let mut kept = Vec::with_capacity(chunks.len());
        for result in chunks {
            let len = result.chunk.text.chars().count();
            if used + len > self.max_context_chars {
                if kept.is_empty() {
                    let text: String = result.chunk.text.chars().take(self.max_context_chars).collect();
                    kept.push((result.chunk.id.clone(), text));
                }
                break;
            }
            used += len;
            kept.push((result.chunk.id.clone(), result.chunk.text.clone()));
        }
        kept
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(crate::config::RagConfig::default().max_context_chars)
    }
}

#[cfg(test)]
mod tests {
    use docqa_model::Role;

    use super::*;
    use crate::document::Chunk;

    fn result(id: &str, text: &str) -> SearchResult {
        SearchResult {
            chunk: Chunk {
                id: id.to_string(),
                text: text.to_string(),
                document_id: "doc.txt".to_string(),
                embedding: Vec::new(),
            },
            score: 1.0,
        }
    }

    #[test]
    fn raw_context_joins_chunks_before_query() {
        let prompt = PromptAssembler::default().assemble(
            PromptMode::RawContext,
            &[result("0", "alpha"), result("1", "beta")],
            "what?",
        );
        assert_eq!(prompt.messages.len(), 2);
        assert_eq!(prompt.messages[0].role, Role::System);
        assert_eq!(prompt.messages[0].content, RAW_CONTEXT_RULES);
        assert_eq!(prompt.messages[1].content, "alpha\n\n---\n\nbeta\n\n-----\n\nwhat?");
    }

    #[test]
    fn source_attributed_labels_chunks_with_ids() {
        let prompt = PromptAssembler::default().assemble(
            PromptMode::SourceAttributed,
            &[result("3", "alpha"), result("7", "beta")],
            "why?",
        );
        let content = &prompt.messages[0].content;
        assert!(content.contains("Content: alpha\nSource: 3\n\nContent: beta\nSource: 7"));
        assert!(content.contains("QUESTION: why?"));
        assert!(content.contains("SOURCES"));
    }

    #[test]
    fn domain_rules_embed_context() {
        let prompt = PromptAssembler::default().assemble(
            PromptMode::Conversational(Topic::Domain),
            &[result("0", "photosynthesis")],
            "five questions",
        );
        assert!(prompt.messages[0].content.contains("\"photosynthesis\n\n-----\n\n\""));
        assert_eq!(prompt.messages[1].content, "five questions");
    }

    #[test]
    fn context_is_bounded_by_budget() {
        let assembler = PromptAssembler::new(8);
        assert_eq!(assembler.context_block(&[result("0", "abcde"), result("1", "fghij")]), "abcde\n\n-----\n\n");
        assert_eq!(assembler.context_block(&[result("0", "abcdefghijkl")]), "abcdefgh\n\n-----\n\n");
    }

    #[test]
    fn rephrase_fills_question() {
        let prompt = PromptAssembler::default().rephrase("what is QuML");
        assert!(prompt.messages[0].content.contains("User: what is QuML\nRephrased User input:"));
    }
}
