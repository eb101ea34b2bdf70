//! Breadth-first crawl frontier
//!
//! This module handles:
//! - FIFO ordering of URLs to crawl
//! - The visited set (URLs are marked when accepted, not when fetched)
//! - Admission rules: depth, scope, binary files and robots.txt

use crate::robots::RobotsRules;
use crate::url::{has_binary_extension, in_scope};
use std::collections::{HashSet, VecDeque};
use url::Url;

/// A URL queued for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlQueueItem {
    /// The normalized URL to fetch
    pub url: Url,

    /// Link distance from the start URL
    pub depth: u32,
}

/// Why a URL was not admitted to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AlreadyVisited,
    TooDeep,
    OutOfScope,
    BinaryFile,
    RobotsDisallowed,
}

/// FIFO frontier for one crawl
pub struct Frontier {
    /// URLs waiting to be fetched, in discovery order
    queue: VecDeque<CrawlQueueItem>,

    /// Every URL ever accepted
    visited: HashSet<String>,

    origin: String,
    scope_path: String,
    max_depth: u32,
    robots: RobotsRules,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `origin` - The only origin URLs may be on
    /// * `scope_path` - The path subtree URLs must stay within
    /// * `max_depth` - Deepest link distance admitted
    /// * `robots` - robots.txt rules for the origin
    pub fn new(origin: String, scope_path: String, max_depth: u32, robots: RobotsRules) -> Self {
        Self {
            queue: VecDeque::new(),
            visited: HashSet::new(),
            origin,
            scope_path,
            max_depth,
            robots,
        }
    }

    /// Adds a URL at `depth`, unless a rule rejects it
    ///
    /// The URL is marked visited only when it is accepted.
    pub fn enqueue(&mut self, url: Url, depth: u32) -> Result<(), Rejection> {
        if self.visited.contains(url.as_str()) {
            return Err(Rejection::AlreadyVisited);
        }
        if depth > self.max_depth {
            return Err(Rejection::TooDeep);
        }
        if !in_scope(&url, &self.origin, &self.scope_path) {
            return Err(Rejection::OutOfScope);
        }
        if has_binary_extension(url.path()) {
            return Err(Rejection::BinaryFile);
        }
        if !self.robots.is_allowed(url.path()) {
            return Err(Rejection::RobotsDisallowed);
        }

        self.visited.insert(url.to_string());
        self.queue.push_back(CrawlQueueItem { url, depth });
        Ok(())
    }

    /// Removes and returns the oldest queued URL
    pub fn pop(&mut self) -> Option<CrawlQueueItem> {
        self.queue.pop_front()
    }

    /// Number of URLs waiting to be fetched
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of URLs accepted so far
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}
