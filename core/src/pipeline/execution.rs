// core/src/pipeline/execution.rs

use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::core::step::StepDef;
use crate::error::FlowError;
use crate::pipeline::definition::{Phase, Pipeline};
use tracing::{event, instrument, span, Instrument, Level};

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step in order against `ctx_data`.
  ///
  /// For each step: the skip condition is evaluated, then `before`, `on`
  /// and `after` handlers run in sequence. The first `Stop` ends the run
  /// with [`PipelineResult::Stopped`]; the first error is returned as-is.
  /// A non-optional step without any handler fails with
  /// [`FlowError::HandlerMissing`].
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      context_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    event!(Level::DEBUG, "Pipeline execution starting.");

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_span = span!(
        Level::INFO,
        "pipeline_step",
        step_name = step_def.name.as_str(),
        step_index = step_idx,
        optional = step_def.optional
      );
      let control = self.run_step(step_def, &ctx_data).instrument(step_span).await?;
      if control == PipelineControl::Stop {
        return Ok(PipelineResult::Stopped);
      }
    }

    event!(Level::DEBUG, "Pipeline execution completed.");
    Ok(PipelineResult::Completed)
  }

  async fn run_step(&self, step_def: &StepDef<TData>, ctx_data: &ContextData<TData>) -> Result<PipelineControl, Err> {
    if let Some(skip_if) = &step_def.skip_if {
      if skip_if(ctx_data.clone()) {
        event!(Level::INFO, "Step skipped by its condition.");
        return Ok(PipelineControl::Continue);
      }
    }

    if !self.has_handlers(&step_def.name) {
      if step_def.optional {
        event!(Level::DEBUG, "Optional step has no handlers, skipping.");
        return Ok(PipelineControl::Continue);
      }
      event!(Level::ERROR, "Non-optional step has no handlers.");
      return Err(Err::from(FlowError::HandlerMissing {
        step_name: step_def.name.clone(),
      }));
    }

    for phase in Phase::ALL {
      if self.run_phase(phase, &step_def.name, ctx_data).await? == PipelineControl::Stop {
        event!(Level::INFO, phase = phase.as_str(), "Pipeline stopped by a handler.");
        return Ok(PipelineControl::Stop);
      }
    }
    Ok(PipelineControl::Continue)
  }

  async fn run_phase(&self, phase: Phase, step_name: &str, ctx_data: &ContextData<TData>) -> Result<PipelineControl, Err> {
    let Some(handlers) = self.handlers(phase).get(step_name) else {
      return Ok(PipelineControl::Continue);
    };

    for (handler_idx, handler_fn) in handlers.iter().enumerate() {
      let handler_span = span!(Level::DEBUG, "step_handler", phase = phase.as_str(), handler_index = handler_idx);
      match handler_fn(ctx_data.clone()).instrument(handler_span).await {
        Ok(PipelineControl::Continue) => {}
        Ok(PipelineControl::Stop) => return Ok(PipelineControl::Stop),
        Err(e) => {
          event!(Level::ERROR, phase = phase.as_str(), error = %e, "Handler failed.");
          return Err(e);
        }
      }
    }
    Ok(PipelineControl::Continue)
  }
}
