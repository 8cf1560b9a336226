use serde::{Deserialize, Serialize};

/// Issues and their remediations, index-aligned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

/// One detected issue with its paired suggestion
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Finding<'a> {
    pub issue: &'a str,
    pub suggestion: &'a str,
}

impl Findings {
    pub(crate) fn push(&mut self, issue: String, suggestion: &str) {
        self.issues.push(issue);
        self.suggestions.push(suggestion.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Finding<'_>> {
        self.issues
            .iter()
            .zip(&self.suggestions)
            .map(|(issue, suggestion)| Finding { issue, suggestion })
    }
}
