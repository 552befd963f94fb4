//! Renderable reference nodes.
//!
//! The engine never produces markup itself. It hands the HTML layer plain
//! data describing what to render: a script reference, a stylesheet
//! reference with its media list, or either of those wrapped in an IE
//! conditional comment.

use serde::Serialize;

use crate::media::MediaList;

/// A renderable asset reference, consumed by the HTML component layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderNode {
    /// A `<script src=...>`-equivalent reference.
    Script { url: String },
    /// A stylesheet-link-equivalent reference with an optional media list.
    Stylesheet {
        url: String,
        media: Option<MediaList>,
    },
    /// A node wrapped in an IE conditional comment.
    Conditional {
        comment: String,
        inner: Box<RenderNode>,
    },
}

impl RenderNode {
    /// The URL of the referenced asset, looking through conditional wrappers.
    pub fn url(&self) -> &str {
        match self {
            RenderNode::Script { url } => url,
            RenderNode::Stylesheet { url, .. } => url,
            RenderNode::Conditional { inner, .. } => inner.url(),
        }
    }

    /// Whether this node is wrapped in a conditional comment.
    pub fn is_conditional(&self) -> bool {
        matches!(self, RenderNode::Conditional { .. })
    }
}
