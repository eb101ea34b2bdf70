//! Robots.txt handling module
//!
//! This module fetches and parses robots.txt files. Fetching is fail-open:
//! any failure yields an empty, permissive rule set.

mod parser;

pub use parser::{parse_robots, RobotsRules};

use crate::crawler::fetch_text;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Fetches robots.txt for an origin and returns the rules for `agent`
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `origin` - The `scheme://host[:port]` origin to fetch from
/// * `agent` - The crawler's own agent token
/// * `timeout` - Request timeout
///
/// # Returns
///
/// The merged rules, or [`RobotsRules::allow_all`] if robots.txt is missing,
/// unreachable or unreadable.
pub async fn fetch_robots(client: &Client, origin: &str, agent: &str, timeout: Duration) -> RobotsRules {
    let Ok(robots_url) = Url::parse(&format!("{origin}/robots.txt")) else {
        return RobotsRules::allow_all();
    };

    match fetch_text(client, &robots_url, timeout).await {
        Ok(fetched) => {
            let rules = parse_robots(&fetched.body, agent);
            tracing::debug!(
                "robots.txt for {}: {} allow, {} disallow rules",
                origin,
                rules.allows.len(),
                rules.disallows.len()
            );
            rules
        }
        Err(e) => {
            tracing::debug!("No usable robots.txt for {}: {}", origin, e);
            RobotsRules::allow_all()
        }
    }
}
