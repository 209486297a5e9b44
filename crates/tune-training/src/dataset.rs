use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Stable identifier for a dataset (content hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// One fine-tuning example: an ordered conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub messages: Vec<ChatMessage>,
}

impl ChatRecord {
    /// System prompt, one user turn, one assistant turn.
    #[must_use]
    pub fn single_turn(system: &str, user: &str, assistant: &str) -> Self {
        Self {
            messages: vec![
                ChatMessage { role: ChatRole::System, content: system.to_string() },
                ChatMessage { role: ChatRole::User, content: user.to_string() },
                ChatMessage { role: ChatRole::Assistant, content: assistant.to_string() },
            ],
        }
    }
}

pub type ChatDataset = Vec<ChatRecord>;

/// Read a JSON-lines chat dataset. Blank lines are skipped.
pub fn read_chat_jsonl(path: &Path) -> TrainingResult<ChatDataset> {
    let contents = std::fs::read_to_string(path)
        .map_err(|source| TrainingError::ReadPath { path: path.to_path_buf(), source })?;
    let mut dataset = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: ChatRecord = serde_json::from_str(line).map_err(|e| {
            TrainingError::Dataset(format!("failed to parse jsonl line {}: {}", idx + 1, e))
        })?;
        dataset.push(record);
    }

    Ok(dataset)
}

pub fn compute_dataset_id(records: &[ChatRecord]) -> TrainingResult<DatasetId> {
    let mut hasher = Sha256::new();

    for record in records {
        let bytes = serde_json::to_vec(record)?;
        hasher.update(bytes);
        hasher.update(b"\n");
    }

    Ok(DatasetId(hex::encode(hasher.finalize())))
}

pub fn validate_chat_records(records: &[ChatRecord]) -> TrainingResult<()> {
    if records.is_empty() {
        return Err(TrainingError::Dataset("dataset must not be empty".to_string()));
    }
    for (idx, record) in records.iter().enumerate() {
        if record.messages.first().map(|m| m.role) != Some(ChatRole::System) {
            return Err(TrainingError::Dataset(format!("record[{idx}] must start with a system message")));
        }
        if !record.messages.iter().any(|m| m.role == ChatRole::User && !m.content.trim().is_empty()) {
            return Err(TrainingError::Dataset(format!("record[{idx}] has no user content")));
        }
        if !record.messages.iter().any(|m| m.role == ChatRole::Assistant) {
            return Err(TrainingError::Dataset(format!("record[{idx}] has no assistant reply")));
        }
    }
    Ok(())
}
