// gok_flow/src/lib.rs

//! gok_flow: the async step-pipeline engine behind the GokCafe checkout.
//!
//! A pipeline is an ordered list of named steps. Each step has `before`, `on`
//! and `after` handlers that share one `ContextData<T>`; a handler returns
//! `PipelineControl::Continue` or `PipelineControl::Stop`, or fails with the
//! pipeline's error type. Steps can be optional or skipped by a predicate.
//! `Flows` keeps one pipeline per context type so callers dispatch by data.

pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use crate::core::context::Handler;
pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::step::{SkipCondition, StepDef};
pub use crate::error::{FlowError, FlowResult};
pub use crate::pipeline::definition::Pipeline;
pub use crate::registry::Flows;
