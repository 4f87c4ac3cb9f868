//! Probgen · adaptive educational problem generation pipeline.
//!
//! Reads one JSON batch job (from a file path argument, or stdin when no
//! argument is given), runs the pipeline once, and prints the produced items
//! as JSON. The surrounding API layer and the real persistence schema live
//! outside this repository.
//!
//! Important env variables:
//!   OPENAI_API_KEY       : enables provider generation if present
//!   OPENAI_BASE_URL      : default "https://api.openai.com/v1"
//!   OPENAI_MODEL         : default "gpt-4o-mini"
//!   PIPELINE_CONFIG_PATH : path to TOML config (system prompts + delays)
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod config;
mod domain;
mod error;
mod grades;
mod openai;
mod parser;
mod pipeline;
mod planner;
mod prompt;
mod telemetry;
mod templates;
mod util;

use std::io::Read;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::BatchJob;
use crate::openai::OpenAI;
use crate::pipeline::{MemoryStore, Orchestrator, DEFAULT_UNIT_DELAY};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let job: BatchJob = read_job()?;

  let cfg = config::load_pipeline_config_from_env().unwrap_or_default();
  let unit_delay = cfg.unit_delay_ms.map(Duration::from_millis).unwrap_or(DEFAULT_UNIT_DELAY);

  // A missing credential never aborts the batch; every unit is then served
  // from the template bank.
  let generator = match OpenAI::from_env() {
    Ok(client) => Some(client),
    Err(e) => {
      warn!(target: "probgen", error = %e, "provider disabled; batch will use templates only");
      None
    }
  };

  let store = MemoryStore::new();
  let orchestrator = Orchestrator::new(generator, store.clone(), cfg.prompts)
    .with_unit_delay(unit_delay);

  let report = orchestrator.run_batch(&job).await;
  info!(
    target: "probgen",
    produced = report.items.len(),
    ai = report.ai_count,
    template = report.template_count,
    persisted = store.saved().await.len(),
    "pipeline run finished"
  );

  println!("{}", serde_json::to_string_pretty(&report.items)?);
  Ok(())
}

fn read_job() -> Result<BatchJob, Box<dyn std::error::Error>> {
  let raw = match std::env::args().nth(1) {
    Some(path) => std::fs::read_to_string(path)?,
    None => {
      let mut buf = String::new();
      std::io::stdin().read_to_string(&mut buf)?;
      buf
    }
  };
  Ok(serde_json::from_str(&raw)?)
}
