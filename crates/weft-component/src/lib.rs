//! Server-side component model for weft pages.
//!
//! Pages own an arena [`ComponentTree`]; widgets are tagged variants
//! composed with a small set of capability traits ([`Addressable`],
//! [`Validatable`], [`ModelBound`], [`Persistable`]) instead of a class
//! hierarchy.

pub mod error;
pub mod field;
pub mod handler;
pub mod kind;
pub mod model;
pub mod page;
pub mod tree;
pub mod validator;
pub mod widget;

pub use error::{ComponentError, Result};
pub use field::{FormField, ModelBound, Persistable, Validatable};
pub use handler::{BoxError, Handler, HandlerResult, RequestContext, ResponsePage};
pub use kind::{ComponentKind, FormState, Label, Link, SubmitStyle, Submitter};
pub use model::{Model, ModelRef, SharedCollection, SharedList, SharedValue};
pub use page::{Page, RenderInterrupt};
pub use tree::{Addressable, ComponentTree, Node, PathLookup, ROOT};
pub use validator::{
    EmailValidator, EqualInputValidator, FormValidation, FormValidationError, FormValidator,
    PatternValidator, RangeValidator, StringLengthValidator, ValidationError, Validator,
};
pub use widget::{Choice, Widget, choice_for_id, id_for_value};
