//! Robots.txt parser implementation
//!
//! Parsing is a pure function over the file text. Groups are built from
//! consecutive `User-agent:` lines, and the rules of every group that applies
//! to `*` or to our own agent token are merged into one [`RobotsRules`].

/// Allow and disallow path prefixes that apply to this crawler
///
/// An empty rule set allows everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRules {
    /// Path prefixes explicitly allowed
    pub allows: Vec<String>,

    /// Path prefixes disallowed
    pub disallows: Vec<String>,
}

impl RobotsRules {
    /// Creates a permissive rule set
    ///
    /// This is used as the default when robots.txt cannot be fetched.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Returns true when there are no rules at all
    pub fn is_empty(&self) -> bool {
        self.allows.is_empty() && self.disallows.is_empty()
    }

    /// Checks if a path is allowed
    ///
    /// The longest matching prefix across both lists wins; an allow and a
    /// disallow of equal length resolve to allowed. A path no rule matches
    /// is allowed.
    ///
    /// # Examples
    ///
    /// ```
    /// use sitesnap::robots::parse_robots;
    ///
    /// let rules = parse_robots("User-agent: *\nDisallow: /private\nAllow: /private/docs", "sitesnap");
    /// assert!(!rules.is_allowed("/private/keys"));
    /// assert!(rules.is_allowed("/private/docs/intro"));
    /// ```
    pub fn is_allowed(&self, path: &str) -> bool {
        let longest = |rules: &[String]| {
            rules
                .iter()
                .filter(|rule| path.starts_with(rule.as_str()))
                .map(|rule| rule.len())
                .max()
        };

        match (longest(&self.allows), longest(&self.disallows)) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(allow), Some(disallow)) => allow >= disallow,
        }
    }
}

/// One `User-agent` group while parsing
#[derive(Debug, Default)]
struct Group {
    agents: Vec<String>,
    allows: Vec<String>,
    disallows: Vec<String>,
    has_rules: bool,
}

impl Group {
    fn applies_to(&self, agent: &str) -> bool {
        self.agents.iter().any(|a| a == "*" || a == agent)
    }
}

/// Parses robots.txt content into the rules that apply to `agent`
///
/// # Grouping
///
/// - Consecutive `User-agent:` lines share one group
/// - A `User-agent:` line after the current group has any Allow/Disallow
///   closes that group and opens a new one
/// - Allow/Disallow lines before the first `User-agent:` are ignored
/// - Empty `Disallow:` values allow everything and add no rule
///
/// Agent names are compared case-insensitively.
pub fn parse_robots(content: &str, agent: &str) -> RobotsRules {
    let agent = agent.trim().to_ascii_lowercase();
    let mut groups: Vec<Group> = Vec::new();
    let mut current = Group::default();

    for raw in content.lines() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if current.has_rules {
                    groups.push(std::mem::take(&mut current));
                }
                current.agents.push(value.to_ascii_lowercase());
            }
            "allow" | "disallow" => {
                if current.agents.is_empty() {
                    continue;
                }
                current.has_rules = true;
                if value.is_empty() {
                    continue;
                }
                if key == "allow" {
                    current.allows.push(value.to_string());
                } else {
                    current.disallows.push(value.to_string());
                }
            }
            _ => {}
        }
    }
    groups.push(current);

    let mut rules = RobotsRules::default();
    for group in groups.into_iter().filter(|g| g.applies_to(&agent)) {
        rules.allows.extend(group.allows);
        rules.disallows.extend(group.disallows);
    }
    rules
}
