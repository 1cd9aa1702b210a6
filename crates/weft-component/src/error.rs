use thiserror::Error;
use weft_model::{ComponentId, ModelError};

#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("component {0} does not exist")]
    UnknownComponent(ComponentId),

    #[error("invalid component id {0:?}")]
    InvalidId(String),

    #[error("duplicate component id {id:?} under {parent}")]
    DuplicateId { parent: String, id: String },

    #[error("cannot add {id:?} under detached component {parent}")]
    DetachedParent { parent: ComponentId, id: String },

    #[error("component {id} is a {actual}, expected a {expected}")]
    WrongKind {
        id: ComponentId,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("default button can only be set on a root form, {0} is nested")]
    NestedDefaultButton(ComponentId),

    #[error(
        "model of {0} does not return a stable collection instance; multi-select updates need the same collection on every call"
    )]
    UnstableCollection(ComponentId),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, ComponentError>;
