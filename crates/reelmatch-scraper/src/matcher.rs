//! Matches caller-supplied target links against an account's scraped posts.

use std::collections::{HashMap, HashSet};

use reelmatch_core::{MatchedPost, ScrapedPost};
use serde::Serialize;

use crate::shortcode::{extract_shortcode, Shortcode};

/// Result of matching one account's targets against its posts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchOutcome {
    /// One entry per matched shortcode, in scraped (recency) order.
    pub matched: Vec<MatchedPost>,
    /// Targets no shortcode could be extracted from.
    pub unmatchable_targets: Vec<String>,
    /// Targets resolving to a shortcode an earlier target already claimed.
    pub duplicate_targets: Vec<String>,
    /// Valid targets whose post was not among the scraped posts.
    pub not_found_targets: Vec<String>,
}

/// Matches `targets` against `scraped` by canonical shortcode.
///
/// When several targets resolve to the same shortcode, the first one is
/// reported as the match's `target_link`. A post listed twice by the source
/// is matched once.
#[must_use]
pub fn match_posts(scraped: &[ScrapedPost], targets: &[String]) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    let mut wanted: HashMap<Shortcode, &str> = HashMap::with_capacity(targets.len());
    let mut wanted_order: Vec<Shortcode> = Vec::with_capacity(targets.len());
    for target in targets {
        match extract_shortcode(Some(target)) {
            None => outcome.unmatchable_targets.push(target.clone()),
            Some(code) if wanted.contains_key(&code) => {
                outcome.duplicate_targets.push(target.clone());
            }
            Some(code) => {
                wanted.insert(code.clone(), target);
                wanted_order.push(code);
            }
        }
    }

    let mut seen: HashSet<Shortcode> = HashSet::new();
    for post in scraped {
        let Some(code) = Shortcode::from_post(post) else {
            continue;
        };
        let Some(target) = wanted.get(&code) else {
            continue;
        };
        if !seen.insert(code.clone()) {
            continue;
        }
        outcome
            .matched
            .push(MatchedPost::new(post, code.as_str(), target));
    }

    outcome.not_found_targets = wanted_order
        .into_iter()
        .filter(|code| !seen.contains(code))
        .filter_map(|code| wanted.get(&code).map(|t| (*t).to_owned()))
        .collect();

    outcome
}
