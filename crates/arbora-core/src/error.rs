pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown parser kind: {kind}")]
    UnknownParserKind { kind: String },

    #[error("Duplicate node id in document: {node_id}")]
    DuplicateNode { node_id: String },

    #[error("Edge {edge_id} references a missing node: {node_id}")]
    MissingEndpoint { edge_id: String, node_id: String },

    #[error("Unknown node: {node_id}")]
    UnknownNode { node_id: String },

    #[error("Degenerate geometry for node {node_id}: {message}")]
    DegenerateGeometry { node_id: String, message: String },

    #[error("Invalid canvas bounds: {message}")]
    InvalidCanvas { message: String },
}
