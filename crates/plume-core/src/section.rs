//! Section tasks for shred sessions.
//!
//! A preparation call splits a source document into independent sections
//! bound to one server-assigned session id. Sections are generated one at a
//! time and their drafts fold into a single composite document.

use serde::{Deserialize, Serialize};

/// One section of a prepared shred session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionTask {
    /// Position of this section within the session (0-based).
    pub index: usize,
    /// Section heading.
    pub title: String,
    /// Requirement identifiers this section must address.
    #[serde(default)]
    pub requirement_ids: Vec<String>,
    /// Relevant excerpt from the source RFP.
    #[serde(default)]
    pub rfp_excerpt: String,
    /// Relevant excerpt from historical proposals.
    #[serde(default)]
    pub history_excerpt: String,
    /// Generated draft text; empty until the section's generation completes.
    #[serde(default)]
    pub draft: String,
}

/// The batch produced by one preparation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionBatch {
    /// Server-assigned session identifier binding the batch to its document.
    pub session_id: String,
    /// Section tasks in index order.
    pub sections: Vec<SectionTask>,
}

impl SectionBatch {
    /// True if any section already carries a non-empty draft.
    ///
    /// Used by the auto-run rule: a fresh batch with no drafts triggers one
    /// automatic generate-all pass.
    pub fn has_any_draft(&self) -> bool {
        self.sections.iter().any(|s| !s.draft.trim().is_empty())
    }
}

/// Reduces section drafts to one composite document.
///
/// Non-empty drafts are concatenated under their titles, in index order;
/// sections without a draft are skipped.
pub fn compose_document(sections: &[SectionTask]) -> String {
    let mut ordered: Vec<&SectionTask> = sections.iter().collect();
    ordered.sort_by_key(|s| s.index);

    let mut parts = Vec::new();
    for section in ordered {
        if section.draft.trim().is_empty() {
            continue;
        }
        parts.push(format!("## {}\n\n{}", section.title, section.draft.trim()));
    }
    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(index: usize, title: &str, draft: &str) -> SectionTask {
        SectionTask {
            index,
            title: title.to_string(),
            requirement_ids: Vec::new(),
            rfp_excerpt: String::new(),
            history_excerpt: String::new(),
            draft: draft.to_string(),
        }
    }

    #[test]
    fn test_compose_skips_empty_and_orders_by_index() {
        let sections = vec![
            section(2, "Security", "We encrypt everything."),
            section(0, "Overview", "We deliver."),
            section(1, "Approach", "  "),
        ];
        let doc = compose_document(&sections);
        assert_eq!(doc, "## Overview\n\nWe deliver.\n\n## Security\n\nWe encrypt everything.");
    }

    #[test]
    fn test_compose_all_empty_is_empty() {
        let sections = vec![section(0, "A", ""), section(1, "B", "")];
        assert_eq!(compose_document(&sections), "");
    }

    #[test]
    fn test_has_any_draft() {
        let mut batch = SectionBatch {
            session_id: "s1".to_string(),
            sections: vec![section(0, "A", ""), section(1, "B", "")],
        };
        assert!(!batch.has_any_draft());
        batch.sections[1].draft = "text".to_string();
        assert!(batch.has_any_draft());
    }
}
