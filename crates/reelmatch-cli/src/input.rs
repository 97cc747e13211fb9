//! Reads a match request from a JSON input file.
//!
//! Two layouts are accepted: the bulk request body served by the HTTP API,
//! or a flat export of `{username, post_link}` rows.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use reelmatch_scraper::{AccountRequest, BulkMatchRequest};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InputFile {
    Rows(Vec<LinkRow>),
    Bulk(BulkMatchRequest),
}

#[derive(Debug, Deserialize)]
struct LinkRow {
    #[serde(default, alias = "account")]
    username: String,
    #[serde(default, alias = "target_link")]
    post_link: String,
}

/// Loads and parses the input file at `path`.
///
/// # Errors
///
/// Returns an error when the file cannot be read or matches neither layout.
pub(crate) fn load_request(path: &Path) -> anyhow::Result<BulkMatchRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read input file {}", path.display()))?;
    parse_request(&raw).with_context(|| format!("failed to parse input file {}", path.display()))
}

pub(crate) fn parse_request(raw: &str) -> anyhow::Result<BulkMatchRequest> {
    let parsed: InputFile = serde_json::from_str(raw)
        .context("expected {\"accounts\": [...]} or an array of {username, post_link} rows")?;
    Ok(match parsed {
        InputFile::Bulk(request) => request,
        InputFile::Rows(rows) => group_rows(rows),
    })
}

/// Groups rows by username in first-appearance order. Rows with a blank
/// username or link are dropped.
fn group_rows(rows: Vec<LinkRow>) -> BulkMatchRequest {
    let mut accounts: Vec<AccountRequest> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut dropped = 0usize;

    for row in rows {
        let username = row.username.trim();
        let link = row.post_link.trim();
        if username.is_empty() || link.is_empty() {
            dropped += 1;
            continue;
        }

        let slot = *index.entry(username.to_owned()).or_insert_with(|| {
            accounts.push(AccountRequest {
                account: username.to_owned(),
                ..AccountRequest::default()
            });
            accounts.len() - 1
        });
        accounts[slot].target_links.push(link.to_owned());
    }

    if dropped > 0 {
        tracing::warn!(dropped, "skipped input rows with a blank username or post_link");
    }

    BulkMatchRequest { accounts }
}
