use thiserror::Error;
use tracing::debug;

use crate::dom::document::{Document, NodeId};
use crate::dom::tokens::count_tokens;

/// Default token budget for a single field's context.
pub const DEFAULT_TOKEN_BUDGET: usize = 100_000;

/// Documents at or under this many tokens are sent whole for every field.
pub const DEFAULT_TRUNCATE_THRESHOLD: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TruncateError {
    /// The target element alone meets or exceeds the budget; the field
    /// cannot be represented and should be skipped.
    #[error("target element needs {tokens} tokens, budget is {budget}")]
    TargetTooLarge { tokens: usize, budget: usize },

    #[error("token budget must be positive")]
    InvalidBudget,
}

/// A reduced HTML fragment around one target element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncation {
    pub html: String,
    pub tokens: usize,
    /// Number of ancestor wrappers kept around the target.
    pub ancestors_kept: usize,
    /// Whole subtrees included before / after the core fragment.
    pub before_nodes: usize,
    pub after_nodes: usize,
}

// ============================================================================
// Context truncation
// ============================================================================

/// Build an HTML fragment that keeps `target` verbatim plus as much
/// surrounding context as fits in `budget` tokens.
///
/// 1. The target's own serialization must be under the budget.
/// 2. Ancestor tags (attributes only) are wrapped around it, from the parent
///    upward, while the fragment stays strictly under 80% of the budget. The
///    first wrapper that would break that stops the ascent.
/// 3. What is left of the budget is halved between the content before and
///    after the target. Each side takes whole neighbouring subtrees, nearest
///    first, and stops at the first one that does not fit.
///
/// The result is a fragment of the original markup, not a standalone
/// document.
pub fn truncate_context(
    doc: &Document,
    target: NodeId,
    budget: usize,
) -> Result<Truncation, TruncateError> {
    if budget == 0 {
        return Err(TruncateError::InvalidBudget);
    }

    let target_html = doc.outer_html(target);
    let target_tokens = count_tokens(&target_html);
    if target_tokens >= budget {
        return Err(TruncateError::TargetTooLarge {
            tokens: target_tokens,
            budget,
        });
    }

    let (core, core_tokens, ancestors_kept) =
        wrap_ancestors(doc, target, target_html, target_tokens, budget);

    let half = (budget - core_tokens) / 2;
    let (before, before_nodes) = pack_side(doc, preceding_subtrees(doc, target), half);
    let (after, after_nodes) = pack_side(doc, following_subtrees(doc, target), half);

    debug!(
        node = target.0,
        core_tokens,
        ancestors_kept,
        before_nodes,
        after_nodes,
        "truncated field context"
    );

    if before_nodes == 0 && after_nodes == 0 {
        return Ok(Truncation {
            html: core,
            tokens: core_tokens,
            ancestors_kept,
            before_nodes,
            after_nodes,
        });
    }

    // before was collected nearest-first
    let mut html = String::new();
    for piece in before.iter().rev() {
        html.push_str(piece);
    }
    html.push_str(&core);
    for piece in &after {
        html.push_str(piece);
    }

    let tokens = count_tokens(&html);
    Ok(Truncation {
        html,
        tokens,
        ancestors_kept,
        before_nodes,
        after_nodes,
    })
}

/// Wrap the fragment in ancestor tags while it stays under 80% of budget.
fn wrap_ancestors(
    doc: &Document,
    target: NodeId,
    target_html: String,
    target_tokens: usize,
    budget: usize,
) -> (String, usize, usize) {
    let mut fragment = target_html;
    let mut tokens = target_tokens;
    let mut kept = 0;

    for ancestor in doc.ancestors(target) {
        // the document root has no tag to contribute
        if doc.element(ancestor).is_none() {
            break;
        }

        let candidate = format!(
            "{}{}{}",
            doc.open_tag(ancestor),
            fragment,
            doc.close_tag(ancestor)
        );
        let candidate_tokens = count_tokens(&candidate);
        if !under_ancestor_limit(candidate_tokens, budget) {
            break;
        }

        fragment = candidate;
        tokens = candidate_tokens;
        kept += 1;
    }

    (fragment, tokens, kept)
}

/// `tokens < 0.8 * budget`, without floating point.
fn under_ancestor_limit(tokens: usize, budget: usize) -> bool {
    tokens.saturating_mul(5) < budget.saturating_mul(4)
}

/// Greedily take whole subtree serializations until the next would overflow.
fn pack_side(
    doc: &Document,
    nodes: impl Iterator<Item = NodeId>,
    limit: usize,
) -> (Vec<String>, usize) {
    let mut pieces = Vec::new();
    let mut used = 0;

    for node in nodes {
        let html = doc.outer_html(node);
        let cost = count_tokens(&html);
        if used + cost > limit {
            break;
        }
        used += cost;
        pieces.push(html);
    }

    let count = pieces.len();
    (pieces, count)
}

/// Maximal subtrees that end before `target` starts, nearest first:
/// the target's previous siblings, then each ancestor's previous siblings.
pub fn preceding_subtrees(doc: &Document, target: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    std::iter::once(target)
        .chain(doc.ancestors(target))
        .flat_map(move |n| doc.preceding_siblings(n))
}

/// Maximal subtrees that start after `target` ends, nearest first.
pub fn following_subtrees(doc: &Document, target: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    std::iter::once(target)
        .chain(doc.ancestors(target))
        .flat_map(move |n| doc.following_siblings(n))
}
