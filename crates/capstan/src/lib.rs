//! Capstan — capability descriptors, URI templates, argument binding,
//! subscriptions, pagination, and completion ranking for MCP servers.

pub mod binder;
pub mod completion;
pub mod pagination;
pub mod subscription;
pub mod template;
pub mod types;

pub use binder::{
    bind, coerce_template_params, merge_arguments, remaining_arguments, validate, Arguments,
    ValidationErrors, Violation, ViolationKind,
};
pub use completion::{complete, RankedCompletions, MAX_COMPLETIONS};
pub use pagination::{paginate, Cursor, Page, DEFAULT_PAGE_SIZE};
pub use subscription::SubscriptionManager;
pub use template::{match_first, TemplateParams, UriTemplate};
pub use types::*;
