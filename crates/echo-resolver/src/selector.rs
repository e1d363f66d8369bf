// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Declarative traversal plans compiled from path segments.
//!
//! A [`Selector`] says which fields to explore and where to report matches. It
//! is a pure function of the segment list: compiling never touches the graph,
//! and a segment that does not exist only shows up when the plan is walked.
//!
//! Plans are built right to left. For `[a, b]`:
//!
//! ```text
//! leaf: Fields{a: Fields{b: Match}}
//! all:  Union[Match, Fields{a: Union[Match, Fields{b: Match}]}]
//! ```

/// Which nodes along the path a plan reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Only the node reached by following every segment.
    Leaf,
    /// Every node on the way, root first.
    All,
}

/// Tagged-union traversal plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Report the current node.
    Matcher,
    /// Descend into the named fields, in order, each with its own plan.
    ExploreFields(Vec<(String, Selector)>),
    /// Apply every member plan to the current node, in order.
    ExploreUnion(Vec<Selector>),
}

impl Selector {
    /// Compile `segments` under `mode`. An empty list matches at the root.
    pub fn compile<S: AsRef<str>>(segments: &[S], mode: Mode) -> Self {
        segments.iter().rev().fold(Self::Matcher, |plan, segment| {
            let explore = Self::ExploreFields(vec![(segment.as_ref().to_owned(), plan)]);
            match mode {
                Mode::Leaf => explore,
                Mode::All => Self::ExploreUnion(vec![Self::Matcher, explore]),
            }
        })
    }

    /// [`Mode::Leaf`] plan over `segments`.
    pub fn leaf<S: AsRef<str>>(segments: &[S]) -> Self {
        Self::compile(segments, Mode::Leaf)
    }

    /// [`Mode::All`] plan over `segments`.
    pub fn all<S: AsRef<str>>(segments: &[S]) -> Self {
        Self::compile(segments, Mode::All)
    }

    /// Whether the node this plan is applied to is reported.
    pub fn is_match(&self) -> bool {
        match self {
            Self::Matcher => true,
            Self::ExploreFields(_) => false,
            Self::ExploreUnion(members) => members.iter().any(Self::is_match),
        }
    }

    /// Fields to explore from the current node, with the plan for each child,
    /// in traversal order.
    pub fn interests(&self) -> Vec<(&str, &Selector)> {
        match self {
            Self::Matcher => Vec::new(),
            Self::ExploreFields(fields) => fields.iter().map(|(f, s)| (f.as_str(), s)).collect(),
            Self::ExploreUnion(members) => members.iter().flat_map(Self::interests).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(name: &str, next: Selector) -> Selector {
        Selector::ExploreFields(vec![(name.to_owned(), next)])
    }

    #[test]
    fn empty_path_matches_immediately() {
        let none: [&str; 0] = [];
        assert_eq!(Selector::leaf(&none), Selector::Matcher);
        assert_eq!(Selector::all(&none), Selector::Matcher);
        assert!(Selector::Matcher.is_match());
        assert!(Selector::Matcher.interests().is_empty());
    }

    #[test]
    fn leaf_nests_fields_right_to_left() {
        let plan = Selector::leaf(&["a", "b"]);
        assert_eq!(plan, fields("a", fields("b", Selector::Matcher)));
        assert!(!plan.is_match());
        let interests = plan.interests();
        assert_eq!(interests.len(), 1);
        assert_eq!(interests[0].0, "a");
        assert!(!interests[0].1.is_match());
    }

    #[test]
    fn all_marks_every_prefix() {
        let plan = Selector::all(&["a", "b"]);
        let expected = Selector::ExploreUnion(vec![
            Selector::Matcher,
            fields(
                "a",
                Selector::ExploreUnion(vec![Selector::Matcher, fields("b", Selector::Matcher)]),
            ),
        ]);
        assert_eq!(plan, expected);

        // root, a, and b are all reported
        let mut plan = &plan;
        let mut seen = Vec::new();
        loop {
            assert!(plan.is_match());
            let next = plan.interests();
            let Some(&(name, child)) = next.first() else {
                break;
            };
            seen.push(name);
            plan = child;
        }
        assert_eq!(seen, ["a", "b"]);
    }
}
