//! Duplicate removal across discovered records.

use std::collections::HashSet;

use crate::model::RawLead;

fn normalize(value: Option<&str>) -> String {
    value.map(|v| v.trim().to_lowercase()).unwrap_or_default()
}

/// Drops records whose normalized (business_name, phone) pair was already
/// seen, keeping the first occurrence and the input order, then truncates to
/// `max_results`. Records with both fields blank are always kept.
pub fn deduplicate(records: Vec<RawLead>, max_results: usize) -> Vec<RawLead> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut unique = Vec::with_capacity(records.len().min(max_results));

    for record in records {
        if unique.len() >= max_results {
            break;
        }
        let key = (
            normalize(record.business_name.as_deref()),
            normalize(record.phone.as_deref()),
        );
        if key.0.is_empty() && key.1.is_empty() {
            unique.push(record);
            continue;
        }
        if seen.insert(key) {
            unique.push(record);
        }
    }

    unique
}
