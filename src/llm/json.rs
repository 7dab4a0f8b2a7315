//! Pull JSON payloads out of free-form model output.
//!
//! Models wrap JSON in markdown fences or chatty prose often enough that
//! every curation pass goes through these before `serde_json`.

use tracing::warn;

/// Extract a JSON object (`{...}`) from LLM output.
pub fn extract_json_object(text: &str) -> String {
    extract_delimited(text, '{', '}')
}

/// Extract a JSON array (`[...]`) from LLM output.
pub fn extract_json_array(text: &str) -> String {
    extract_delimited(text, '[', ']')
}

fn extract_delimited(text: &str, open: char, close: char) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with(open) {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with(open) {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    warn!(
        text = %trimmed.chars().take(200).collect::<String>(),
        "Could not locate JSON in LLM response"
    );
    trimmed.to_string()
}
