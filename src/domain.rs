//! Domain models used by the pipeline: difficulty tiers, topics, item kinds,
//! per-unit requests, produced items, and the outbound persistence payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the three difficulty tiers a batch is partitioned into.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
}

impl Difficulty {
  /// Tier order matters: remainder units and reconciliation adjustments are
  /// assigned in this order (easy first, hard last).
  pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Easy => "easy",
      Difficulty::Medium => "medium",
      Difficulty::Hard => "hard",
    }
  }
}

impl std::fmt::Display for Difficulty {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Subject a problem is requested for. The grade validator decides which of
/// these are permitted for a given grade band.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
  GeneralMath,
  Reading,
  Nature,
  Geography,
  Science,
  History,
  IntroComputing,
  Biology,
  Physics,
  Chemistry,
  Programming,
  Algorithms,
}

impl Topic {
  pub const ALL: [Topic; 12] = [
    Topic::GeneralMath,
    Topic::Reading,
    Topic::Nature,
    Topic::Geography,
    Topic::Science,
    Topic::History,
    Topic::IntroComputing,
    Topic::Biology,
    Topic::Physics,
    Topic::Chemistry,
    Topic::Programming,
    Topic::Algorithms,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Topic::GeneralMath => "general math",
      Topic::Reading => "reading comprehension",
      Topic::Nature => "nature studies",
      Topic::Geography => "geography",
      Topic::Science => "science",
      Topic::History => "history",
      Topic::IntroComputing => "intro computing",
      Topic::Biology => "biology",
      Topic::Physics => "physics",
      Topic::Chemistry => "chemistry",
      Topic::Programming => "programming",
      Topic::Algorithms => "algorithms",
    }
  }

  /// STEM/CS subjects eligible for the open-ended competitive format
  /// (only at grade >= 7; see the prompt builder).
  pub fn is_stem_cs(&self) -> bool {
    matches!(
      self,
      Topic::IntroComputing
        | Topic::Programming
        | Topic::Algorithms
        | Topic::Physics
        | Topic::Chemistry
    )
  }
}

impl std::fmt::Display for Topic {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// What kind of assignment the item will be used in.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
  Exercise,
  Quiz,
  Homework,
}

impl ItemType {
  pub fn as_str(&self) -> &'static str {
    match self {
      ItemType::Exercise => "exercise",
      ItemType::Quiz => "quiz",
      ItemType::Homework => "homework",
    }
  }
}

impl std::fmt::Display for ItemType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Target answer format the generator is instructed to produce.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProblemFormat {
  MultipleChoice,
  ShortAnswer,
  Essay,
  Competitive,
}

impl ProblemFormat {
  pub fn as_str(&self) -> &'static str {
    match self {
      ProblemFormat::MultipleChoice => "multiple choice",
      ProblemFormat::ShortAnswer => "short answer",
      ProblemFormat::Essay => "essay",
      ProblemFormat::Competitive => "competitive",
    }
  }
}

/// Where did a produced item come from?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemOrigin {
  /// Generated by the external provider and parsed successfully.
  Ai,
  /// Served from the static template bank (fallback or no client).
  Template,
}

/// Immutable per-unit generation request. One per planned unit.
#[derive(Clone, Debug, Serialize)]
pub struct GenerationRequest {
  pub topic: Topic,
  pub difficulty: Difficulty,
  pub item_type: ItemType,
  pub grade_level: u8,
  pub point_value: u32,
  pub format_override: Option<ProblemFormat>,
  /// Opaque token appended to the prompt so otherwise-identical calls in one
  /// batch do not generate duplicate items.
  pub variation_token: Option<String>,
}

/// A finished item. Produced exactly once per unit and never mutated;
/// ownership passes to the persistence collaborator immediately.
#[derive(Clone, Debug, Serialize)]
pub struct GeneratedItem {
  pub id: String,
  pub title: String,
  pub description: String,
  pub body: String,
  pub origin: ItemOrigin,
}

/// Outbound persistence payload handed to the `ProblemStore` collaborator.
/// The storage schema behind it is out of scope here.
#[derive(Clone, Debug, Serialize)]
pub struct NewProblem {
  pub title: String,
  pub description: String,
  pub topic: Topic,
  pub difficulty: Difficulty,
  pub item_type: ItemType,
  pub point_value: u32,
  pub body: String,
  pub origin: ItemOrigin,
  pub generated_at: DateTime<Utc>,
  pub usage_count: u32,
}

impl NewProblem {
  pub fn from_item(req: &GenerationRequest, item: &GeneratedItem) -> Self {
    Self {
      title: item.title.clone(),
      description: item.description.clone(),
      topic: req.topic,
      difficulty: req.difficulty,
      item_type: req.item_type,
      point_value: req.point_value,
      body: item.body.clone(),
      origin: item.origin,
      generated_at: Utc::now(),
      usage_count: 0,
    }
  }
}

/// Per-tier counts requested by the caller instead of the default split.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct DifficultyOverride {
  #[serde(default)]
  pub easy: u32,
  #[serde(default)]
  pub medium: u32,
  #[serde(default)]
  pub hard: u32,
}

impl DifficultyOverride {
  pub fn total(&self) -> u32 {
    self.easy + self.medium + self.hard
  }
}

/// One inbound batch job, as received from the external API/CLI layer.
#[derive(Clone, Debug, Deserialize)]
pub struct BatchJob {
  pub topic: Topic,
  pub grade_level: u8,
  pub item_type: ItemType,
  pub point_value: u32,
  pub batch_size: u32,
  #[serde(default)]
  pub difficulty_override: Option<DifficultyOverride>,
  #[serde(default)]
  pub format_override: Option<ProblemFormat>,
}
