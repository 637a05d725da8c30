//! Additive scoring rules
//!
//! A policy is an ordered list of rules. Each rule looks at a fact sheet and
//! either stays silent or contributes a score delta with a tag. Contributions
//! are clamped individually, summed in order, and the total is clamped into
//! the 0-100 range.

/// Bound for a single rule's contribution
pub const MAX_RULE_DELTA: i32 = 100;

/// A rule's contribution to the score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub delta: i32,
    pub tag: String,
}

impl Hit {
    pub fn new(delta: i32, tag: impl Into<String>) -> Self {
        Self {
            delta: delta.clamp(-MAX_RULE_DELTA, MAX_RULE_DELTA),
            tag: tag.into(),
        }
    }
}

/// A named scoring rule over facts of type `C`.
pub struct Rule<C> {
    pub name: &'static str,
    pub check: fn(&C) -> Option<Hit>,
}

impl<C> Rule<C> {
    pub const fn new(name: &'static str, check: fn(&C) -> Option<Hit>) -> Self {
        Self { name, check }
    }
}

/// Summed result of a rule list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub score: u8,
    pub hits: Vec<Hit>,
}

impl Verdict {
    /// Comma-joined tags of the rules that raised the score, or `quiet_tag`
    /// when nothing did.
    pub fn reason(&self, quiet_tag: &str) -> String {
        let tags: Vec<&str> = self
            .hits
            .iter()
            .filter(|h| h.delta > 0)
            .map(|h| h.tag.as_str())
            .collect();

        if tags.is_empty() {
            quiet_tag.to_string()
        } else {
            tags.join(",")
        }
    }
}

pub fn evaluate<C>(rules: &[Rule<C>], facts: &C) -> Verdict {
    let mut total: i32 = 0;
    let mut hits = Vec::new();

    for rule in rules {
        if let Some(hit) = (rule.check)(facts) {
            total += hit.delta;
            hits.push(hit);
        }
    }

    Verdict {
        score: total.clamp(0, 100) as u8,
        hits,
    }
}
