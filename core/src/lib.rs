// core/src/lib.rs

//! Flowline: async, type-safe step pipelines.
//!
//! A pipeline is an ordered list of named steps. Each step can carry
//! `before`, `on` and `after` handlers that receive a shared
//! [`ContextData<T>`] and decide whether the run continues or stops.
//! Steps may be optional or skipped by a condition evaluated on the
//! context. A [`Flows`] registry keys pipelines by their context type so
//! request handlers only need to build a context and call `run`.
//!
//! ```ignore
//! let mut p = Pipeline::<Ctx, AppError>::new(&[("load", false, None), ("save", false, None)]);
//! p.on_root("load", |ctx| Box::pin(async move { /* ... */ Ok::<_, AppError>(PipelineControl::Continue) }));
//! flows.register_pipeline(p);
//! flows.run(ContextData::new(ctx)).await?;
//! ```

pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use crate::core::context::Handler;
pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::step::{SkipCondition, StepDef};

pub use crate::pipeline::definition::Pipeline;

pub use crate::error::{FlowError, FlowResult};

pub use crate::registry::Flows;
