//! Prompt construction for the generation provider.
//!
//! Flow:
//! 1) Pick a target format from (resolved topic, grade), unless overridden.
//! 2) Inject difficulty-keyed hints (concepts, complexity, numeric ranges)
//!    and grade-keyed hints (vocabulary register, step count).
//! 3) Emit the exact output contract the parser expects, so the expected
//!    field names are self-documenting in the prompt itself.
//!
//! Everything here is pure and deterministic given identical inputs, except
//! that an optional variation token is appended to reduce duplicate
//! generations across otherwise-identical calls.

use crate::domain::{Difficulty, GenerationRequest, ProblemFormat, Topic};
use crate::grades::{band_for_grade, GradeBand};
use crate::util::fill_template;

/// The JSON shape the generator must return for an item. Kept in one place so
/// prompt and parser cannot drift apart.
pub const ITEM_CONTRACT: &str = r#"Return ONLY strict JSON with exactly these keys:
{
  "title": "short problem title (max 10 words)",
  "description": "one-paragraph student-facing summary of the task",
  "content": "the full problem statement, self-contained"
}"#;

/// The JSON shape the generator must return for a solution.
pub const SOLUTION_CONTRACT: &str = r#"Return ONLY strict JSON with exactly these keys:
{
  "answer": "the final answer, as concise as possible",
  "solution": "a complete step-by-step solution",
  "test_cases": ["at least two worked examples or checks, as strings"]
}"#;

struct DifficultyHints {
  concepts: &'static str,
  complexity: &'static str,
  numbers: &'static str,
}

const EASY_HINTS: DifficultyHints = DifficultyHints {
  concepts: "one single concept, directly stated",
  complexity: "solvable in one or two steps",
  numbers: "small friendly numbers (0-20), no fractions unless asked",
};
const MEDIUM_HINTS: DifficultyHints = DifficultyHints {
  concepts: "two related concepts that must be combined",
  complexity: "three to five reasoning steps",
  numbers: "numbers up to a few hundred; simple fractions allowed",
};
const HARD_HINTS: DifficultyHints = DifficultyHints {
  concepts: "several concepts with a non-obvious connection",
  complexity: "multi-step reasoning with at least one insight required",
  numbers: "any reasonable magnitude; edge cases worth considering",
};

fn difficulty_hints(difficulty: Difficulty) -> &'static DifficultyHints {
  match difficulty {
    Difficulty::Easy => &EASY_HINTS,
    Difficulty::Medium => &MEDIUM_HINTS,
    Difficulty::Hard => &HARD_HINTS,
  }
}

struct GradeHints {
  vocabulary: &'static str,
  steps: &'static str,
}

const PRIMARY_HINTS: GradeHints = GradeHints {
  vocabulary: "very simple words, short sentences, concrete objects",
  steps: "one instruction at a time",
};
const UPPER_PRIMARY_HINTS: GradeHints = GradeHints {
  vocabulary: "everyday vocabulary, short paragraphs",
  steps: "at most two chained instructions",
};
const MIDDLE_HINTS: GradeHints = GradeHints {
  vocabulary: "subject vocabulary is fine if introduced in context",
  steps: "multi-step instructions acceptable",
};
const SECONDARY_HINTS: GradeHints = GradeHints {
  vocabulary: "precise technical vocabulary expected",
  steps: "no hand-holding; state the problem plainly",
};

fn grade_hints(band: GradeBand) -> &'static GradeHints {
  match band {
    GradeBand::Primary => &PRIMARY_HINTS,
    GradeBand::UpperPrimary => &UPPER_PRIMARY_HINTS,
    GradeBand::Middle => &MIDDLE_HINTS,
    GradeBand::Secondary => &SECONDARY_HINTS,
  }
}

/// Choose the target format for a unit. The explicit override wins; the
/// open-ended competitive format is reserved for STEM/CS topics at grade >= 7.
pub fn choose_format(
  topic: Topic,
  grade: u8,
  format_override: Option<ProblemFormat>,
) -> ProblemFormat {
  if let Some(f) = format_override {
    return f;
  }
  match band_for_grade(grade) {
    GradeBand::Primary | GradeBand::UpperPrimary => ProblemFormat::MultipleChoice,
    band => {
      if topic.is_stem_cs() && grade >= 7 {
        ProblemFormat::Competitive
      } else if band == GradeBand::Middle {
        ProblemFormat::ShortAnswer
      } else {
        ProblemFormat::Essay
      }
    }
  }
}

fn format_instructions(format: ProblemFormat) -> &'static str {
  match format {
    ProblemFormat::MultipleChoice => {
      "Write a closed-form multiple-choice question with exactly four options \
       labelled A-D and exactly one correct option. Do not reveal the answer \
       in the content."
    }
    ProblemFormat::ShortAnswer => {
      "Write a short-answer question answerable in one to three sentences or \
       a single computed value."
    }
    ProblemFormat::Essay => {
      "Write an open essay prompt that requires a structured argument of a few \
       paragraphs, with clear assessment expectations stated."
    }
    ProblemFormat::Competitive => {
      "Write a competitive-style problem: a precise statement, explicit input \
       and output specification, constraints, and one worked example. The task \
       must have an objectively checkable answer."
    }
  }
}

const ITEM_TEMPLATE: &str = "\
Create one {difficulty} {item_type} problem for grade {grade} students.

Topic: {topic} — {topic_description}
Point value: {points}

Format: {format}.
{format_instructions}

Difficulty guidance:
- Concepts: {concepts}
- Complexity: {complexity}
- Numbers: {numbers}

Grade guidance:
- Vocabulary: {vocabulary}
- Steps: {steps}

{contract}";

/// Build the generation instruction for one unit.
pub fn build_item_prompt(
  req: &GenerationRequest,
  resolved_topic: Topic,
  topic_description: &str,
) -> String {
  let format = choose_format(resolved_topic, req.grade_level, req.format_override);
  let dh = difficulty_hints(req.difficulty);
  let gh = grade_hints(band_for_grade(req.grade_level));

  let mut prompt = fill_template(
    ITEM_TEMPLATE,
    &[
      ("difficulty", req.difficulty.as_str()),
      ("item_type", req.item_type.as_str()),
      ("grade", &req.grade_level.to_string()),
      ("topic", resolved_topic.as_str()),
      ("topic_description", topic_description),
      ("points", &req.point_value.to_string()),
      ("format", format.as_str()),
      ("format_instructions", format_instructions(format)),
      ("concepts", dh.concepts),
      ("complexity", dh.complexity),
      ("numbers", dh.numbers),
      ("vocabulary", gh.vocabulary),
      ("steps", gh.steps),
      ("contract", ITEM_CONTRACT),
    ],
  );

  if let Some(token) = &req.variation_token {
    prompt.push_str("\n\nVariation token (ignore, do not echo): ");
    prompt.push_str(token);
  }
  prompt
}

/// Build the instruction asking for a full solution to an existing item.
pub fn build_solution_prompt(title: &str, body: &str) -> String {
  format!(
    "Solve the following problem completely.\n\nTitle: {title}\n\nProblem:\n{body}\n\n{SOLUTION_CONTRACT}"
  )
}
