//! Directory placement heuristics.
//!
//! A flat page title is pushed into a directory by a fixed chain of five
//! rewrite rules, applied left to right. Each rule is a total function on
//! `(title, graph context)`; the chain is deterministic for a given
//! backlink snapshot and always terminates after exactly five steps.

use std::sync::LazyLock;

use regex::Regex;

use crate::index::BacklinkLookup;

static ANU_COURSE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(COMP|ENGN|MATH|STAT)\d{4}").expect("valid course pattern"));

static ANU_COURSE_EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(COMP|ENGN|MATH|STAT)\d{4}$").expect("valid course pattern"));

static BERKELEY_COURSE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(CS|STAT|EE)\d{3}(-\d+)?[a-zA-Z]?").expect("valid course pattern")
});

/// Literal title prefixes that get their own directory level.
const STATIC_PREFIXES: [&str; 3] = ["HMU", "IJCAI17", "AAAI"];

/// Conference name prefixes collected under `Conferences/`.
const CONFERENCE_PREFIXES: [&str; 7] = [
    "ICLR",
    "AAAI",
    "IJCAI",
    "ICAPS",
    "CHAIWorkshop",
    "CognitiveRobotics",
    "DICTA",
];

/// Read-only graph context the chain runs against.
pub struct PlacementContext<'a> {
    /// Home page title; pages linked only from here are left in place.
    pub front_page: &'a str,
    pub backlinks: &'a dyn BacklinkLookup,
}

/// One step of the placement chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteRule {
    /// Place a page under the backlink whose name prefixes all other
    /// backlinks, preferring an exact course-code backlink.
    BacklinkPlacement,
    /// Split off a known literal or course-code title prefix.
    StaticPrefixes,
    /// Collect course pages under `Courses/<institution>/`.
    CoursePlacement,
    /// Collect pages of a few known categories under fixed directories.
    CategoryPlacement,
    /// Everything still flat goes under `Root/`.
    DefaultDirectory,
}

/// The fixed rule order. Every title passes through all five rules.
pub const REWRITE_CHAIN: [RewriteRule; 5] = [
    RewriteRule::BacklinkPlacement,
    RewriteRule::StaticPrefixes,
    RewriteRule::CoursePlacement,
    RewriteRule::CategoryPlacement,
    RewriteRule::DefaultDirectory,
];

/// Run the whole chain over a title.
pub fn rewrite_title(title: &str, context: &PlacementContext<'_>) -> String {
    REWRITE_CHAIN
        .iter()
        .fold(title.to_string(), |title, rule| rule.apply(&title, context))
}

impl RewriteRule {
    pub fn apply(self, title: &str, context: &PlacementContext<'_>) -> String {
        match self {
            Self::BacklinkPlacement => backlink_placement(title, context),
            Self::StaticPrefixes => static_prefixes(title),
            Self::CoursePlacement => course_placement(title),
            Self::CategoryPlacement => category_placement(title),
            Self::DefaultDirectory => default_directory(title),
        }
    }
}

/// If a page is not already in a directory, not linked from the front page,
/// and linked from a page whose name is a prefix of all other backlinks,
/// put it under that page. A backlink that is exactly a course code wins
/// outright, with lexicographic tie-breaking, so the result never depends
/// on backlink enumeration order.
fn backlink_placement(title: &str, context: &PlacementContext<'_>) -> String {
    if title.contains('/') {
        return title.to_string();
    }

    let backlinks = context.backlinks.backlinks_of(title);
    let mut shortest: Option<&String> = None;
    let mut course: Option<&String> = None;
    for backlink in &backlinks {
        if shortest.is_none_or(|s| (backlink.len(), backlink.as_str()) < (s.len(), s.as_str())) {
            shortest = Some(backlink);
        }
        if ANU_COURSE_EXACT.is_match(backlink)
            && course.is_none_or(|c| c.as_str() >= backlink.as_str())
        {
            course = Some(backlink);
        }
    }

    let Some(shortest) = shortest else {
        return title.to_string();
    };
    if shortest == context.front_page {
        return title.to_string();
    }

    if let Some(course) = course {
        return format!("{course}/{title}");
    }

    // Ambiguous when the backlinks do not all look like subpages of one root.
    if backlinks.iter().all(|b| b.starts_with(shortest.as_str())) {
        format!("{shortest}/{title}")
    } else {
        title.to_string()
    }
}

/// Rewrite titles of the subset of pages that follow a very uniform
/// structure: a course code or known literal prefix followed by the rest
/// of the name.
fn static_prefixes(title: &str) -> String {
    if title.contains('/') {
        return title.to_string();
    }

    let prefix_end = ANU_COURSE_PREFIX
        .find(title)
        .map(|m| m.end())
        .or_else(|| {
            STATIC_PREFIXES
                .iter()
                .find(|prefix| title.starts_with(**prefix))
                .map(|prefix| prefix.len())
        });
    let Some(prefix_end) = prefix_end else {
        return title.to_string();
    };

    let (first, rest) = title.split_at(prefix_end);
    let rest = rest.trim();
    if rest.is_empty() {
        title.to_string()
    } else {
        format!("{first}/{rest}")
    }
}

// Deliberately no "already placed" guard here or in category_placement;
// the original chain ran both rules unconditionally.
fn course_placement(title: &str) -> String {
    if ANU_COURSE_PREFIX.is_match(title) {
        return format!("Courses/ANU/{title}");
    }
    if BERKELEY_COURSE_PREFIX.is_match(title) {
        return format!("Courses/Berkeley/{title}");
    }
    title.to_string()
}

fn category_placement(title: &str) -> String {
    if title.starts_with("GRE") {
        return format!("GRE/{title}");
    }
    if title.contains("PhD") {
        return format!("PhD/{title}");
    }
    if title.starts_with("WainwrightJordan") {
        return format!("ReadingList/{title}");
    }
    if CONFERENCE_PREFIXES
        .iter()
        .any(|conference| title.starts_with(conference))
    {
        return format!("Conferences/{title}");
    }
    title.to_string()
}

/// Guarantees every title reaching the path encoder has at least one
/// directory component.
fn default_directory(title: &str) -> String {
    if title.contains('/') {
        title.to_string()
    } else {
        format!("Root/{title}")
    }
}
