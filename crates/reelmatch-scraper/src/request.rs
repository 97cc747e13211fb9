//! Inbound request shapes and their validation into [`AccountJob`]s.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::scheduler::AccountJob;

/// `{ "accounts": [ { "account": ..., "target_links": [...], "max_posts": N } ] }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkMatchRequest {
    #[serde(default)]
    pub accounts: Vec<AccountRequest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRequest {
    #[serde(default, alias = "username")]
    pub account: String,
    #[serde(default, alias = "post_links")]
    pub target_links: Vec<String>,
    /// Falls back to the configured default when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_posts: Option<i64>,
}

/// Single-account request body of `POST /v1/fetch-instagram-post`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleMatchRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub post_links: Vec<String>,
}

impl SingleMatchRequest {
    #[must_use]
    pub fn into_bulk(self, max_posts: Option<i64>) -> BulkMatchRequest {
        BulkMatchRequest {
            accounts: vec![AccountRequest {
                account: self.username,
                target_links: self.post_links,
                max_posts,
            }],
        }
    }
}

fn normalize_account(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed).trim().to_owned()
}

impl BulkMatchRequest {
    /// Validates the request and converts it into one job per distinct account.
    ///
    /// Names and links are trimmed; a leading `@` on an account name is
    /// dropped. Repeated entries for the same account are merged: their
    /// links are concatenated in order and the larger `max_posts` wins.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, in request order.
    pub fn validate(&self, default_max_posts: usize) -> Result<Vec<AccountJob>, ValidationError> {
        if self.accounts.is_empty() {
            return Err(ValidationError::NoAccounts);
        }

        let mut jobs: Vec<AccountJob> = Vec::with_capacity(self.accounts.len());
        let mut index_by_account: HashMap<String, usize> = HashMap::new();

        for (index, entry) in self.accounts.iter().enumerate() {
            let account = normalize_account(&entry.account);
            if account.is_empty() {
                return Err(ValidationError::MissingAccount { index });
            }

            if entry.target_links.is_empty() {
                return Err(ValidationError::NoTargetLinks { account });
            }
            let mut links = Vec::with_capacity(entry.target_links.len());
            for (link_index, link) in entry.target_links.iter().enumerate() {
                let link = link.trim();
                if link.is_empty() {
                    return Err(ValidationError::BlankTargetLink {
                        account,
                        index: link_index,
                    });
                }
                links.push(link.to_owned());
            }

            let max_posts = match entry.max_posts {
                None if default_max_posts > 0 => default_max_posts,
                None => return Err(ValidationError::InvalidMaxPosts { account, value: 0 }),
                Some(value) => match usize::try_from(value) {
                    Ok(n) if n > 0 => n,
                    _ => return Err(ValidationError::InvalidMaxPosts { account, value }),
                },
            };

            if let Some(&existing) = index_by_account.get(&account) {
                let job = &mut jobs[existing];
                job.target_links.extend(links);
                job.max_posts = job.max_posts.max(max_posts);
                tracing::debug!(account = %job.account, "merged duplicate account entry");
            } else {
                index_by_account.insert(account.clone(), jobs.len());
                jobs.push(AccountJob {
                    account,
                    target_links: links,
                    max_posts,
                });
            }
        }

        Ok(jobs)
    }
}
