//! Provider settings from the environment plus optional pipeline tuning
//! (system prompts, delays) from TOML.
//!
//! See `PipelineConfig` and `Prompts` for the expected schema.

use serde::Deserialize;
use tracing::{error, info};

use crate::error::{Error, Result};

/// Connection settings for the chat-completions provider.
/// Read once at startup; the credential is never logged.
#[derive(Clone, Debug)]
pub struct ProviderSettings {
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl ProviderSettings {
  /// Build settings from the environment. Fails with `Error::Config` when the
  /// credential is absent so no call is ever attempted without one.
  pub fn from_env() -> Result<Self> {
    let api_key = std::env::var("OPENAI_API_KEY")
      .ok()
      .filter(|k| !k.trim().is_empty())
      .ok_or(Error::Config)?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    Ok(Self { api_key, base_url, model })
  }
}

/// Optional tuning file loaded from PIPELINE_CONFIG_PATH.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct PipelineConfig {
  #[serde(default)]
  pub prompts: Prompts,
  /// Fixed inter-unit / retry delay in milliseconds. Also the WAIT interval
  /// of the per-unit state machine.
  #[serde(default)]
  pub unit_delay_ms: Option<u64>,
}

/// System roles used by the generation client. Defaults are sensible for
/// grade-school problem generation; override them in TOML to tune tone.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  pub item_system: String,
  pub solution_system: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      item_system: "You are an educational content generator for school students. \
        Follow the requested format, difficulty and grade level exactly. \
        Respond ONLY with strict JSON matching the requested keys."
        .into(),
      solution_system: "You are a meticulous solution writer for educational problems. \
        Work step by step, verify the final answer, and respond ONLY with strict JSON \
        matching the requested keys."
        .into(),
    }
  }
}

/// Attempt to load `PipelineConfig` from PIPELINE_CONFIG_PATH.
/// On any parsing/IO error, returns None and the defaults apply.
pub fn load_pipeline_config_from_env() -> Option<PipelineConfig> {
  let path = std::env::var("PIPELINE_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<PipelineConfig>(&s) {
      Ok(cfg) => {
        info!(target: "probgen", %path, "Loaded pipeline config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "probgen", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "probgen", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn toml_overrides_only_what_is_given() {
    let cfg: PipelineConfig =
      toml::from_str("unit_delay_ms = 250\n[prompts]\nitem_system = \"x\"\nsolution_system = \"y\"")
        .expect("parse");
    assert_eq!(cfg.unit_delay_ms, Some(250));
    assert_eq!(cfg.prompts.item_system, "x");
  }

  #[test]
  fn empty_toml_falls_back_to_defaults() {
    let cfg: PipelineConfig = toml::from_str("").expect("parse");
    assert!(cfg.unit_delay_ms.is_none());
    assert!(cfg.prompts.item_system.contains("strict JSON"));
  }
}
