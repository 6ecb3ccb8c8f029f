//! Selector generalization
//!
//! Turns a selector pinned to one element (for example an absolute XPath with
//! positional predicates) into one matching every structurally identical
//! sibling. Candidate construction is a pure function over an
//! [`AncestrySnapshot`]; verification against the live page happens in
//! [`generalize`].

use tracing::{debug, warn};

use crate::domain::browser::{AncestrySnapshot, Browser, NodeInfo, Selector};
use crate::domain::DomainError;

/// Result of generalizing a sample selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generalization {
    pub selector: Selector,
    /// False when the sample selector was kept unchanged
    pub generalized: bool,
    /// Number of elements the returned selector matches
    pub matches: usize,
}

/// Candidate selectors, closest relaxation first
///
/// Walking up from the sample, every level whose node repeats among its
/// siblings yields one candidate: that level is matched by tag and classes,
/// every other level keeps its position. Paths start at the nearest ancestor
/// with an id above the relaxed level, or at the document root.
pub fn candidates(snapshot: &AncestrySnapshot) -> Vec<Selector> {
    let nodes = &snapshot.nodes;

    (0..nodes.len())
        .rev()
        .filter(|&level| nodes[level].is_repeated())
        .map(|level| Selector::Css(candidate_at(nodes, level)))
        .collect()
}

fn candidate_at(nodes: &[NodeInfo], relaxed: usize) -> String {
    let anchor = (0..relaxed)
        .rev()
        .find_map(|i| nodes[i].id_selector().map(|id| (i, format!("{}{}", nodes[i].tag, id))));

    let (start, mut parts) = match anchor {
        Some((index, selector)) => (index + 1, vec![selector]),
        None => (0, Vec::new()),
    };

    for (index, node) in nodes.iter().enumerate().skip(start) {
        parts.push(if index == relaxed {
            node.signature_selector()
        } else {
            node.positional_selector()
        });
    }

    parts.join(" > ")
}

/// Generalize `sample` on the current page
///
/// The returned selector always matches the sample's own element; when no
/// candidate does, the sample selector is returned unchanged.
pub async fn generalize(
    browser: &dyn Browser,
    sample: &Selector,
) -> Result<Generalization, DomainError> {
    let sample_matches = browser.query_all(sample, None).await?;

    let Some(target) = sample_matches.first() else {
        warn!(selector = %sample, "Sample selector matched nothing, not generalizing");
        return Ok(Generalization {
            selector: sample.clone(),
            generalized: false,
            matches: 0,
        });
    };

    let snapshot = browser.ancestry(target).await?;

    for candidate in candidates(&snapshot) {
        match browser.query_all(&candidate, None).await {
            Ok(matches) if matches.contains(target) => {
                debug!(
                    sample = %sample,
                    generalized = %candidate,
                    matches = matches.len(),
                    "Generalized selector"
                );
                return Ok(Generalization {
                    selector: candidate,
                    generalized: true,
                    matches: matches.len(),
                });
            }
            Ok(_) => debug!(candidate = %candidate, "Candidate does not match the sample"),
            Err(e) => debug!(candidate = %candidate, error = %e, "Candidate query failed"),
        }
    }

    warn!(selector = %sample, "Selector generalization failed, using the sample selector");
    Ok(Generalization {
        selector: sample.clone(),
        generalized: false,
        matches: sample_matches.len(),
    })
}
