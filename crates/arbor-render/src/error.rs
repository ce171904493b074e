use arbor_dom::NodeId;
use thiserror::Error;

use crate::RenderId;

/// Failures surfaced by the render-tree builder and scene loading.
///
/// Tree invariant violations are not reported here; they are bugs and panic.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The style resolver produced nothing for an element that needs a box.
    #[error("no computed style for node {0:?}")]
    MissingStyle(NodeId),

    /// A DOM node was referenced that the document does not contain.
    #[error("node {0:?} is not part of the document")]
    UnknownNode(NodeId),

    /// A node was attached before its parent had a renderer.
    #[error("parent of node {0:?} has no renderer")]
    DetachedParent(NodeId),

    /// A render object id no longer refers to a live object.
    #[error("render object {0} was destroyed")]
    StaleRenderer(RenderId),

    /// A scene step names an element `id` the scene does not define.
    #[error("scene has no element with id '{0}'")]
    UnknownTarget(String),
}
