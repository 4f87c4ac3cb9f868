//! Grade-band mapping and topic appropriateness gating.
//!
//! Four ordered bands cover grades 1-12. Each band enumerates the topics it
//! permits (strictly growing; the top band allows everything) and carries one
//! fixed fallback topic. `resolve` is total: a topic outside the band's set is
//! replaced by the band fallback, never rejected.

use crate::domain::Topic;

/// Coarse grouping of grade levels used to gate topic and format choices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GradeBand {
  /// Grades 1-3.
  Primary,
  /// Grades 4-5.
  UpperPrimary,
  /// Grades 6-8.
  Middle,
  /// Grade 9 and above.
  Secondary,
}

impl GradeBand {
  pub fn as_str(&self) -> &'static str {
    match self {
      GradeBand::Primary => "primary",
      GradeBand::UpperPrimary => "upper primary",
      GradeBand::Middle => "middle",
      GradeBand::Secondary => "secondary",
    }
  }
}

impl std::fmt::Display for GradeBand {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

pub fn band_for_grade(grade: u8) -> GradeBand {
  match grade {
    0..=3 => GradeBand::Primary,
    4..=5 => GradeBand::UpperPrimary,
    6..=8 => GradeBand::Middle,
    _ => GradeBand::Secondary,
  }
}

const PRIMARY_TOPICS: &[Topic] = &[Topic::GeneralMath, Topic::Reading, Topic::Nature];

const UPPER_PRIMARY_TOPICS: &[Topic] = &[
  Topic::GeneralMath,
  Topic::Reading,
  Topic::Nature,
  Topic::Geography,
  Topic::Science,
  Topic::History,
];

const MIDDLE_TOPICS: &[Topic] = &[
  Topic::GeneralMath,
  Topic::Reading,
  Topic::Nature,
  Topic::Geography,
  Topic::Science,
  Topic::History,
  Topic::IntroComputing,
  Topic::Biology,
  Topic::Physics,
];

pub fn allowed_topics(band: GradeBand) -> &'static [Topic] {
  match band {
    GradeBand::Primary => PRIMARY_TOPICS,
    GradeBand::UpperPrimary => UPPER_PRIMARY_TOPICS,
    GradeBand::Middle => MIDDLE_TOPICS,
    GradeBand::Secondary => &Topic::ALL,
  }
}

pub fn is_valid(topic: Topic, grade: u8) -> bool {
  allowed_topics(band_for_grade(grade)).contains(&topic)
}

/// One fixed, non-random substitute per band.
pub fn fallback_topic(band: GradeBand) -> Topic {
  match band {
    GradeBand::Primary => Topic::GeneralMath,
    GradeBand::UpperPrimary => Topic::Geography,
    GradeBand::Middle => Topic::IntroComputing,
    GradeBand::Secondary => Topic::Algorithms,
  }
}

/// Map a requested topic to one that is permitted for the grade. Total.
pub fn resolve(topic: Topic, grade: u8) -> Topic {
  if is_valid(topic, grade) {
    topic
  } else {
    fallback_topic(band_for_grade(grade))
  }
}

/// Curated age-appropriate phrasings for (topic, band) pairs the prompt
/// builder leans on. Sparse on purpose; anything missing is synthesized.
const TOPIC_PHRASES: &[(Topic, GradeBand, &str)] = &[
  (Topic::GeneralMath, GradeBand::Primary, "counting, shapes and simple addition stories"),
  (Topic::GeneralMath, GradeBand::UpperPrimary, "fractions, long division and word problems"),
  (Topic::GeneralMath, GradeBand::Middle, "ratios, negative numbers and early algebra"),
  (Topic::GeneralMath, GradeBand::Secondary, "algebra, functions and quantitative reasoning"),
  (Topic::Reading, GradeBand::Primary, "short picture-supported stories with simple words"),
  (Topic::Reading, GradeBand::Middle, "paragraph-level comprehension and inference"),
  (Topic::Nature, GradeBand::Primary, "animals, plants and the weather around us"),
  (Topic::Geography, GradeBand::UpperPrimary, "continents, countries, maps and capitals"),
  (Topic::Science, GradeBand::UpperPrimary, "everyday experiments and observations"),
  (Topic::History, GradeBand::Middle, "key events, causes and consequences"),
  (Topic::IntroComputing, GradeBand::Middle, "step-by-step thinking, simple programs and logic"),
  (Topic::Biology, GradeBand::Middle, "cells, body systems and ecosystems"),
  (Topic::Physics, GradeBand::Middle, "motion, forces and energy in daily life"),
  (Topic::Physics, GradeBand::Secondary, "kinematics, Newton's laws and energy conservation"),
  (Topic::Chemistry, GradeBand::Secondary, "atoms, reactions and stoichiometry"),
  (Topic::Programming, GradeBand::Secondary, "writing and debugging small programs"),
  (Topic::Algorithms, GradeBand::Secondary, "algorithmic problem solving and complexity"),
];

/// Human phrase for the resolved topic at this grade, used inside prompts.
pub fn describe(topic: Topic, grade: u8) -> String {
  let resolved = resolve(topic, grade);
  let band = band_for_grade(grade);
  TOPIC_PHRASES
    .iter()
    .find(|(t, b, _)| *t == resolved && *b == band)
    .map(|(_, _, phrase)| (*phrase).to_string())
    .unwrap_or_else(|| format!("{} (adapted for grade {})", resolved, grade))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bands_cover_all_grades_in_order() {
    assert_eq!(band_for_grade(1), GradeBand::Primary);
    assert_eq!(band_for_grade(3), GradeBand::Primary);
    assert_eq!(band_for_grade(4), GradeBand::UpperPrimary);
    assert_eq!(band_for_grade(5), GradeBand::UpperPrimary);
    assert_eq!(band_for_grade(6), GradeBand::Middle);
    assert_eq!(band_for_grade(8), GradeBand::Middle);
    assert_eq!(band_for_grade(9), GradeBand::Secondary);
    assert_eq!(band_for_grade(12), GradeBand::Secondary);
  }

  #[test]
  fn allowed_sets_strictly_grow_and_top_band_allows_everything() {
    let sizes = [
      allowed_topics(GradeBand::Primary).len(),
      allowed_topics(GradeBand::UpperPrimary).len(),
      allowed_topics(GradeBand::Middle).len(),
      allowed_topics(GradeBand::Secondary).len(),
    ];
    assert!(sizes.windows(2).all(|w| w[0] < w[1]), "sizes: {sizes:?}");
    assert_eq!(sizes[3], Topic::ALL.len());
  }

  #[test]
  fn resolve_always_lands_in_the_allowed_set() {
    for topic in Topic::ALL {
      for grade in 1..=12u8 {
        let resolved = resolve(topic, grade);
        assert!(
          is_valid(resolved, grade),
          "resolve({topic:?}, {grade}) = {resolved:?} is not allowed"
        );
      }
    }
  }

  #[test]
  fn physics_at_grade_two_falls_back_to_general_math() {
    assert_eq!(resolve(Topic::Physics, 2), Topic::GeneralMath);
  }

  #[test]
  fn band_fallbacks_are_members_of_their_own_band() {
    for band in [
      GradeBand::Primary,
      GradeBand::UpperPrimary,
      GradeBand::Middle,
      GradeBand::Secondary,
    ] {
      assert!(allowed_topics(band).contains(&fallback_topic(band)));
    }
  }

  #[test]
  fn describe_synthesizes_when_no_curated_phrase_exists() {
    // History has no Secondary phrase; the synthesized form names the grade.
    let d = describe(Topic::History, 11);
    assert!(d.contains("history") && d.contains("11"), "got: {d}");
    // Curated phrase path.
    assert_eq!(describe(Topic::GeneralMath, 2), "counting, shapes and simple addition stories");
  }
}
