// src/relevance.rs
//! Relevance predicates over normalized item text.
//!
//! - **topic/location** (optional): any configured term appears in the
//!   working-language *or* the original-language title/body. Terms in other
//!   scripts (e.g. Arabic place names) are matched against the original text,
//!   since translation tends to drop or transliterate them.
//! - **keyword** (optional): any configured keyword appears in the
//!   working-language title/body.
//! - **per-source required terms** (optional): any of the source's terms
//!   appears in either language.
//!
//! An item passes only if every configured predicate passes; with nothing
//! configured every item is relevant. Matching is case-insensitive substring
//! matching (Unicode lowercase).

use serde::Deserialize;

use crate::ingest::types::NormalizedItem;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RelevanceRules {
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Topic/location terms, any script.
    #[serde(default)]
    pub locations: Vec<String>,
}

/// Result of relevance evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relevance {
    /// "predicate:term" for every predicate that passed on a term.
    pub matched: Vec<String>,
    /// One entry per failed predicate. Empty means relevant.
    pub reasons: Vec<String>,
}

impl Relevance {
    pub fn is_relevant(&self) -> bool {
        self.reasons.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelevanceFilter {
    keywords: Vec<String>,
    locations: Vec<String>,
}

fn lowered(terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Lowercased haystacks, computed once per item.
struct Texts {
    working: [String; 2],
    original: [String; 2],
}

impl Texts {
    fn of(item: &NormalizedItem) -> Self {
        Self {
            working: [item.title.to_lowercase(), item.body.to_lowercase()],
            original: [
                item.original_title.to_lowercase(),
                item.original_body.to_lowercase(),
            ],
        }
    }

    fn working_hit<'t>(&self, terms: &'t [String]) -> Option<&'t str> {
        terms
            .iter()
            .find(|t| self.working.iter().any(|h| h.contains(t.as_str())))
            .map(String::as_str)
    }

    fn any_hit<'t>(&self, terms: &'t [String]) -> Option<&'t str> {
        terms
            .iter()
            .find(|t| {
                self.working
                    .iter()
                    .chain(self.original.iter())
                    .any(|h| h.contains(t.as_str()))
            })
            .map(String::as_str)
    }
}

impl RelevanceFilter {
    pub fn new(rules: &RelevanceRules) -> Self {
        Self {
            keywords: lowered(&rules.keywords),
            locations: lowered(&rules.locations),
        }
    }

    /// True when no global predicate is configured.
    pub fn is_permissive(&self) -> bool {
        self.keywords.is_empty() && self.locations.is_empty()
    }

    pub fn evaluate(&self, item: &NormalizedItem, required_terms: &[String]) -> Relevance {
        let mut rel = Relevance::default();
        let required = lowered(required_terms);
        if self.is_permissive() && required.is_empty() {
            return rel;
        }
        let texts = Texts::of(item);

        if !self.locations.is_empty() {
            match texts.any_hit(&self.locations) {
                Some(t) => rel.matched.push(format!("location:{t}")),
                None => rel.reasons.push("no topic/location term".to_string()),
            }
        }
        if !self.keywords.is_empty() {
            match texts.working_hit(&self.keywords) {
                Some(t) => rel.matched.push(format!("keyword:{t}")),
                None => rel.reasons.push("no keyword".to_string()),
            }
        }
        if !required.is_empty() {
            match texts.any_hit(&required) {
                Some(t) => rel.matched.push(format!("source_term:{t}")),
                None => rel.reasons.push("no source-required term".to_string()),
            }
        }
        rel
    }

    pub fn is_relevant(&self, item: &NormalizedItem, required_terms: &[String]) -> bool {
        self.evaluate(item, required_terms).is_relevant()
    }
}
