//! Layered extraction of structured fields from raw generated text.
//!
//! Providers rarely return clean JSON: fences, prose around the object,
//! trailing commas, stray control characters and half-escaped backslashes are
//! all common. Parsing is an ordered chain of strategies, each attempted only
//! if the previous one failed:
//!
//!   1. strip fences, take the first balanced `{...}` span, strict parse;
//!   2. sanitize the span (control chars, trailing commas, lone backslashes)
//!      and parse again;
//!   3. regex-recover each mandatory field individually.
//!
//! A successful strategy that is still missing a mandatory field raises
//! `Error::Schema`; `Error::Parse` means all three strategies were exhausted.

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Structured fields of a generated problem item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedItem {
  pub title: String,
  pub description: String,
  /// Full problem statement; empty when the generator omitted it.
  pub body: String,
}

/// Structured fields of a generated solution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedSolution {
  pub answer: String,
  pub solution: String,
  pub test_cases: Vec<String>,
}

const ITEM_MANDATORY: &[&str] = &["title", "description"];
const SOLUTION_MANDATORY: &[&str] = &["answer", "solution", "test_cases"];

pub fn parse_item(text: &str) -> Result<ParsedItem> {
  let obj = run_strategies(text, ITEM_MANDATORY)?;
  let title = mandatory_string(&obj, "title")?;
  let description = mandatory_string(&obj, "description")?;
  let body = optional_string(&obj, "content")
    .or_else(|| optional_string(&obj, "body"))
    .unwrap_or_default();
  Ok(ParsedItem { title, description, body })
}

pub fn parse_solution(text: &str) -> Result<ParsedSolution> {
  let obj = run_strategies(text, SOLUTION_MANDATORY)?;
  let answer = mandatory_string(&obj, "answer")?;
  let solution = mandatory_string(&obj, "solution")?;
  let test_cases = match obj.get("test_cases") {
    Some(Value::Array(items)) if !items.is_empty() => items
      .iter()
      .map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
      })
      .collect(),
    _ => return Err(Error::Schema("test_cases")),
  };
  Ok(ParsedSolution { answer, solution, test_cases })
}

/// Run the strategy chain until one yields a JSON object.
fn run_strategies(text: &str, mandatory: &[&'static str]) -> Result<Map<String, Value>> {
  let span = candidate_span(text);

  if let Some(obj) = span.and_then(strict_object) {
    return Ok(obj);
  }
  if let Some(obj) = span.map(sanitize).and_then(|s| strict_object(&s)) {
    return Ok(obj);
  }
  if let Some(obj) = recover_fields(text, mandatory) {
    return Ok(obj);
  }
  Err(Error::Parse)
}

fn mandatory_string(obj: &Map<String, Value>, field: &'static str) -> Result<String> {
  optional_string(obj, field).ok_or(Error::Schema(field))
}

fn optional_string(obj: &Map<String, Value>, field: &str) -> Option<String> {
  obj
    .get(field)
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_string)
}

/// Narrow the raw text down to the first balanced top-level `{...}` span,
/// after dropping markdown code fences.
fn candidate_span(text: &str) -> Option<&str> {
  balanced_object_span(strip_code_fences(text))
}

/// Remove a surrounding ``` / ```json fence if present; otherwise return the
/// input untouched.
fn strip_code_fences(text: &str) -> &str {
  let trimmed = text.trim();
  let Some(open) = trimmed.find("```") else {
    return trimmed;
  };
  let after_fence = &trimmed[open + 3..];
  // Skip the optional language tag on the fence line.
  let inner_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
  let inner = &after_fence[inner_start..];
  match inner.find("```") {
    Some(close) => &inner[..close],
    None => inner,
  }
}

/// First balanced `{...}` span, brace counting with string/escape awareness.
fn balanced_object_span(text: &str) -> Option<&str> {
  let start = text.find('{')?;
  let mut depth = 0usize;
  let mut in_string = false;
  let mut escaped = false;

  for (i, ch) in text[start..].char_indices() {
    if in_string {
      if escaped {
        escaped = false;
      } else if ch == '\\' {
        escaped = true;
      } else if ch == '"' {
        in_string = false;
      }
      continue;
    }
    match ch {
      '"' => in_string = true,
      '{' => depth += 1,
      '}' => {
        depth -= 1;
        if depth == 0 {
          return Some(&text[start..start + i + ch.len_utf8()]);
        }
      }
      _ => {}
    }
  }
  None
}

fn strict_object(span: &str) -> Option<Map<String, Value>> {
  match serde_json::from_str::<Value>(span) {
    Ok(Value::Object(obj)) => Some(obj),
    _ => None,
  }
}

/// Repair the frequent offenders: raw control characters, backslashes that do
/// not start a valid escape, and trailing commas before a closing bracket.
fn sanitize(span: &str) -> String {
  let mut cleaned = String::with_capacity(span.len());
  let mut chars = span.chars().peekable();
  while let Some(ch) = chars.next() {
    match ch {
      '\\' => match chars.peek() {
        Some(next) if matches!(next, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u') => {
          cleaned.push('\\');
        }
        _ => cleaned.push_str("\\\\"),
      },
      '\n' | '\t' => cleaned.push(ch),
      c if c.is_control() => {}
      c => cleaned.push(c),
    }
  }

  // Trailing commas: `, }` and `, ]` are invalid in strict JSON.
  let comma = Regex::new(r",\s*([}\]])").ok();
  match comma {
    Some(re) => re.replace_all(&cleaned, "$1").into_owned(),
    None => cleaned,
  }
}

/// Last resort: pull each mandatory field out individually. Succeeds only if
/// every mandatory field is recovered.
fn recover_fields(text: &str, mandatory: &[&'static str]) -> Option<Map<String, Value>> {
  let mut obj = Map::new();
  for field in mandatory {
    let value = if *field == "test_cases" {
      recover_array_field(text, field)?
    } else {
      Value::String(recover_string_field(text, field)?)
    };
    obj.insert((*field).to_string(), value);
  }
  Some(obj)
}

fn recover_string_field(text: &str, field: &str) -> Option<String> {
  let pattern = format!(r#""{}"\s*:\s*"((?:[^"\\]|\\.)*)""#, regex::escape(field));
  let re = Regex::new(&pattern).ok()?;
  let raw = re.captures(text)?.get(1)?.as_str();
  // Round-trip through serde to resolve the escapes we just matched.
  serde_json::from_str::<String>(&format!("\"{raw}\"")).ok().filter(|s| !s.trim().is_empty())
}

fn recover_array_field(text: &str, field: &str) -> Option<Value> {
  let pattern = format!(r#"(?s)"{}"\s*:\s*(\[.*?\])"#, regex::escape(field));
  let re = Regex::new(&pattern).ok()?;
  let raw = re.captures(text)?.get(1)?.as_str();
  serde_json::from_str::<Value>(raw).ok().filter(|v| v.is_array())
}
