use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedFile {
    pub id: i64,
    pub name: String,
    pub file_path: String,
    pub processed_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectedLine {
    pub id: i64,
    pub file_id: i64,
    /// 1-based position in the source file
    pub line_number: i64,
    /// Snapshot taken when the line was selected
    pub content: String,
    pub selected_at: i64,
}

/// A tracked file together with how many of its lines are selected
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    pub id: i64,
    pub name: String,
    pub file_path: String,
    pub processed_at: String,
    pub selected_count: i64,
}

/// An eligible text file found in the configured directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableFile {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub modified: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub line_number: i64,
    pub content: String,
    pub content_length: usize,
    pub word_count: usize,
    pub selected_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionData {
    pub file_name: String,
    pub file_path: String,
    pub data: Vec<SelectionEntry>,
    pub total_lines: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

/// Render a unix timestamp as ISO-8601
pub fn iso8601(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso8601() {
        assert_eq!(iso8601(0), "1970-01-01T00:00:00+00:00");
        assert_eq!(iso8601(1_700_000_000), "2023-11-14T22:13:20+00:00");
    }
}
