//! Filename-based topic tagging.
//!
//! Each rule matches against the lower-cased file name. Rules are checked in
//! order and the first match decides the topic.

use std::path::Path;

/// How a rule's needle is compared with the file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Prefix(String),
    Contains(String),
    /// A `-` or `_` delimited token of the file stem
    Word(String),
}

impl Pattern {
    fn matches(&self, file_name: &str) -> bool {
        match self {
            Pattern::Prefix(p) => file_name.starts_with(p.as_str()),
            Pattern::Contains(p) => file_name.contains(p.as_str()),
            Pattern::Word(w) => {
                let stem = file_name
                    .rsplit_once('.')
                    .map(|(stem, _)| stem)
                    .unwrap_or(file_name);
                stem.split(['-', '_']).any(|token| token == w)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopicRule {
    pub pattern: Pattern,
    pub topic: String,
}

impl TopicRule {
    fn new(pattern: Pattern, topic: &str) -> Self {
        Self {
            pattern,
            topic: topic.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopicRules {
    rules: Vec<TopicRule>,
}

pub const SALES_PROCESS: &str = "kpmg_sales_process";
pub const TESTING_GLOSSARY: &str = "powered_testing_glossary";
pub const TOM_ASSETS: &str = "powered_tom_assets";
pub const PHASE_DELIVERY: &str = "powered_phase_delivery";
pub const METHODOLOGY_STRUCTURE: &str = "powered_methodology_structure";

impl Default for TopicRules {
    fn default() -> Self {
        Self::new(vec![
            TopicRule::new(Pattern::Prefix("salesprocess-".into()), SALES_PROCESS),
            TopicRule::new(Pattern::Contains("-salesprocess-".into()), SALES_PROCESS),
            TopicRule::new(Pattern::Contains("glossary-testing".into()), TESTING_GLOSSARY),
            TopicRule::new(Pattern::Contains("testing-glossary".into()), TESTING_GLOSSARY),
            TopicRule::new(Pattern::Word("tom".into()), TOM_ASSETS),
            TopicRule::new(Pattern::Contains("phase".into()), PHASE_DELIVERY),
            TopicRule::new(Pattern::Contains("delivery".into()), PHASE_DELIVERY),
            TopicRule::new(Pattern::Contains("methodology".into()), METHODOLOGY_STRUCTURE),
        ])
    }
}

impl TopicRules {
    pub fn new(rules: Vec<TopicRule>) -> Self {
        Self { rules }
    }

    /// Topic for the file at `path`, or `None` when no rule matches.
    pub fn tag(&self, path: &Path) -> Option<String> {
        let file_name = path.file_name()?.to_string_lossy().to_lowercase();
        self.rules
            .iter()
            .find(|r| r.pattern.matches(&file_name))
            .map(|r| r.topic.clone())
    }
}
