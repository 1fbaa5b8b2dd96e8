//! Response parsing/validation: converts raw generative-model output into the
//! canonical `LevelContent`.
//!
//! The source text has no enforceable contract, so parsing degrades through
//! strictly-ordered fallbacks instead of failing outright:
//!   1. direct JSON parse
//!   2. fenced ```json block extraction
//!   3. schema acceptance check on the parsed object
//!   4. structured-text fallback (### FLASHCARDS / ### ASSESSMENT markers)
//!   5. normalization (field aliases, empty-list coercion, default status,
//!      level-5 section concatenation)
//!   6. terminal `"error"`-status content embedding the raw response
//!
//! Partial extraction is acceptable; fabricating content that wasn't present
//! is not. Malformed flashcard/question blocks are dropped with a warning,
//! never guessed at.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::domain::{
  level_status_tag, AssessmentQuestion, Flashcard, LevelContent, QuestionType,
};
use crate::error::ParseFailure;
use crate::util::trunc_for_log;

static FENCE_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("fence regex"));
static FLASHCARDS_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)###\s*FLASHCARDS").expect("flashcards regex"));
static ASSESSMENT_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)###\s*ASSESSMENT").expect("assessment regex"));
static BLOCK_SPLIT_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"####\s+").expect("block split regex"));
static ANSWER_LINE_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)Correct Answer:\s*([A-Za-z])").expect("answer regex"));
static OPTION_PREFIX_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[A-Z][.)]\s*").expect("option prefix regex"));

/// Parse a raw response into `LevelContent`. Total parse failure becomes an
/// `"error"`-status record carrying a diagnostic plus the raw response; it is
/// rendered inline, never thrown.
#[instrument(level = "debug", skip(raw), fields(level, raw_len = raw.len()))]
pub fn parse_level_response(raw: &str, level: u8) -> LevelContent {
  match try_parse(raw, level) {
    Ok(content) => content,
    Err(e) => {
      warn!(
        target: "mastery_backend",
        level,
        error = %e,
        raw = %trunc_for_log(raw, 200),
        "Response yielded no usable content"
      );
      LevelContent::error(format!(
        "Failed to parse the model response for level {}: {}.\n\nRaw Response:\n{}",
        level, e, raw
      ))
    }
  }
}

/// The fallback chain behind a plain `Result`, so a future stricter
/// JSON-only mode can be swapped in without touching callers.
fn try_parse(raw: &str, level: u8) -> Result<LevelContent, ParseFailure> {
  if let Some(value) = extract_json(raw) {
    if accepts_schema(&value, level) {
      debug!(target: "mastery_backend", level, "Parsed JSON response");
      return Ok(from_json(value, level));
    }
    warn!(
      target: "mastery_backend",
      level,
      "Parsed JSON lacks expected keys; falling back to structured text"
    );
  }
  parse_structured_text(raw, level)
}

/// Attempt 1: the whole text as JSON. Attempt 2: a fenced code block
/// (optionally tagged "json") parsed as JSON.
fn extract_json(raw: &str) -> Option<Value> {
  if let Ok(v) = serde_json::from_str::<Value>(raw) {
    return Some(v);
  }
  let caps = FENCE_RE.captures(raw)?;
  match serde_json::from_str::<Value>(caps.get(1)?.as_str()) {
    Ok(v) => Some(v),
    Err(e) => {
      warn!(target: "mastery_backend", error = %e, "Found a fenced code block, but it is not valid JSON");
      None
    }
  }
}

/// A parsed object counts as a `LevelContent` source only if it carries at
/// least one expected key. Anything else falls through to text parsing.
fn accepts_schema(value: &Value, level: u8) -> bool {
  let Some(obj) = value.as_object() else {
    return false;
  };
  let base = ["main_content_md", "flashcards", "assessment_questions"];
  if base.iter().any(|k| obj.contains_key(*k)) {
    return true;
  }
  level == 5
    && ["feedback_md", "practice_assignment_md", "solution_md"]
      .iter()
      .any(|k| obj.contains_key(*k))
}

fn str_field(value: &Value, key: &str) -> String {
  value
    .get(key)
    .and_then(Value::as_str)
    .unwrap_or_default()
    .to_string()
}

/// Append `section` to `acc`, inserting exactly one blank line when the left
/// side is non-empty.
fn concat_section(acc: &mut String, section: &str) {
  if section.is_empty() {
    return;
  }
  if !acc.is_empty() {
    acc.push_str("\n\n");
  }
  acc.push_str(section);
}

fn from_json(value: Value, level: u8) -> LevelContent {
  // Accept the widespread misspelling as an alias.
  let mut main_content = {
    let canonical = str_field(&value, "main_content_md");
    if canonical.is_empty() {
      str_field(&value, "main_conent_md")
    } else {
      canonical
    }
  };

  // Level 5 splits the mastery material across extra sections; fold them
  // back into the main content in a fixed order.
  if level == 5 {
    let practice = str_field(&value, "practice_assignment_md");
    let solution = str_field(&value, "solution_md");
    concat_section(&mut main_content, &practice);
    concat_section(&mut main_content, &solution);
  }

  let status = {
    let s = str_field(&value, "status");
    if s.is_empty() {
      level_status_tag(level)
    } else {
      s
    }
  };

  let flashcards = typed_array::<Flashcard>(&value, "flashcards", level);
  let assessment_questions =
    typed_array::<AssessmentQuestion>(&value, "assessment_questions", level);

  LevelContent {
    status,
    main_content,
    assignment_summary: str_field(&value, "assignment_summary_md"),
    feedback: str_field(&value, "feedback_md"),
    flashcards,
    assessment_questions,
  }
}

/// Deserialize an array field element by element, dropping (not failing on)
/// malformed entries. A missing or non-array field coerces to an empty list.
fn typed_array<T: serde::de::DeserializeOwned>(value: &Value, key: &str, level: u8) -> Vec<T> {
  let Some(items) = value.get(key).and_then(Value::as_array) else {
    return Vec::new();
  };
  let mut out = Vec::with_capacity(items.len());
  for (i, item) in items.iter().enumerate() {
    match serde_json::from_value::<T>(item.clone()) {
      Ok(t) => out.push(t),
      Err(e) => {
        warn!(target: "mastery_backend", level, %key, index = i, error = %e, "Dropping malformed array entry");
      }
    }
  }
  out
}

/// Structured-text fallback. The text is split on the `### FLASHCARDS` and
/// `### ASSESSMENT` markers in whichever order they appear; either may be
/// absent. Text before the earliest marker is the main content.
fn parse_structured_text(raw: &str, level: u8) -> Result<LevelContent, ParseFailure> {
  let fc = FLASHCARDS_RE.find(raw);
  let asm = ASSESSMENT_RE.find(raw);

  let main_content = match (fc, asm) {
    (Some(f), Some(a)) => raw[..f.start().min(a.start())].trim().to_string(),
    (Some(f), None) => raw[..f.start()].trim().to_string(),
    (None, Some(a)) => raw[..a.start()].trim().to_string(),
    (None, None) => {
      warn!(
        target: "mastery_backend",
        level,
        "No section markers found; treating entire response as main content"
      );
      raw.trim().to_string()
    }
  };

  // A section's region runs from its marker to the next marker after it, or
  // to the end of the text.
  let region = |this: regex::Match, other: Option<regex::Match>| -> &str {
    let end = match other {
      Some(o) if o.start() > this.end() => o.start(),
      _ => raw.len(),
    };
    &raw[this.end()..end]
  };

  let flashcards = match fc {
    Some(f) => parse_flashcard_region(region(f, asm), level),
    None => Vec::new(),
  };
  let assessment_questions = match asm {
    Some(a) => parse_assessment_region(region(a, fc), level),
    None => Vec::new(),
  };

  if main_content.is_empty() && flashcards.is_empty() && assessment_questions.is_empty() {
    return Err(ParseFailure::NoUsableContent);
  }

  Ok(LevelContent {
    status: level_status_tag(level),
    main_content,
    assignment_summary: String::new(),
    feedback: String::new(),
    flashcards,
    assessment_questions,
  })
}

fn blocks(region: &str) -> Vec<&str> {
  BLOCK_SPLIT_RE
    .split(region)
    .filter(|b| !b.trim().is_empty())
    .collect()
}

/// Each `#### ` block: first line is the heading, the remainder the content.
/// Blocks missing either part are dropped; partial extraction is acceptable.
fn parse_flashcard_region(region: &str, level: u8) -> Vec<Flashcard> {
  let mut cards = Vec::new();
  for block in blocks(region) {
    let block = block.trim();
    let mut lines = block.lines();
    let heading = lines.next().unwrap_or_default().trim().to_string();
    let content = lines.collect::<Vec<_>>().join("\n").trim().to_string();
    if heading.is_empty() || content.is_empty() {
      warn!(target: "mastery_backend", level, block = %trunc_for_log(block, 80), "Skipping malformed flashcard block");
      continue;
    }
    cards.push(Flashcard { heading, content });
  }
  cards
}

/// Each `#### ` block must contain a question line, option lines, and a
/// `Correct Answer: <LETTER>` line found scanning from the bottom upward.
/// The letter maps to a zero-based option index; a block failing any check
/// (including an out-of-bounds letter) is dropped, not guessed at.
fn parse_assessment_region(region: &str, level: u8) -> Vec<AssessmentQuestion> {
  let mut questions = Vec::new();
  for (position, block) in blocks(region).iter().enumerate() {
    let lines: Vec<&str> = block
      .trim()
      .lines()
      .map(str::trim)
      .filter(|l| !l.is_empty())
      .collect();
    // Need at least question, one option, and the answer line.
    if lines.len() < 3 {
      warn!(target: "mastery_backend", level, position, "Skipping malformed assessment block: too few lines");
      continue;
    }

    let question_text = lines[0].to_string();

    let mut answer_line = None;
    for j in (1..lines.len()).rev() {
      if let Some(caps) = ANSWER_LINE_RE.captures(lines[j]) {
        let letter = caps
          .get(1)
          .map(|m| m.as_str().to_ascii_uppercase())
          .unwrap_or_default();
        answer_line = Some((j, letter));
        break;
      }
    }
    let Some((answer_index, letter)) = answer_line else {
      warn!(target: "mastery_backend", level, position, "Skipping assessment block: no 'Correct Answer' line");
      continue;
    };

    let options: Vec<String> = lines[1..answer_index]
      .iter()
      .map(|l| OPTION_PREFIX_RE.replace(l, "").trim().to_string())
      .collect();
    if options.is_empty() {
      warn!(target: "mastery_backend", level, position, "Skipping assessment block: no options");
      continue;
    }

    let letter_byte = letter.as_bytes()[0];
    let correct = (letter_byte.wrapping_sub(b'A') as usize) < options.len();
    if !correct {
      warn!(
        target: "mastery_backend",
        level,
        position,
        %letter,
        options = options.len(),
        "Skipping assessment block: answer letter out of bounds"
      );
      continue;
    }
    let correct_option = options[(letter_byte - b'A') as usize].clone();

    questions.push(AssessmentQuestion {
      id: format!("q{}-{}", level, position + 1),
      concept_focus: format!("Level {} concept", level),
      question_type: QuestionType::Mcq,
      question_text,
      options,
      correct_answers: vec![correct_option],
    });
  }
  questions
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::STATUS_ERROR;

  #[test]
  fn fenced_json_is_extracted_and_status_defaulted() {
    let raw = "```json\n{\"main_content_md\":\"X\",\"flashcards\":[],\"assessment_questions\":[]}\n```";
    let content = parse_level_response(raw, 3);
    assert_eq!(content.main_content, "X");
    assert_eq!(content.status, "LEVEL_3_OVERVIEW");
    assert!(content.flashcards.is_empty());
    assert!(content.assessment_questions.is_empty());
  }

  #[test]
  fn direct_json_keeps_its_own_status() {
    let raw = r#"{"status":"LEVEL_2_ADVANCED_UNDERSTANDING","main_content_md":"deep"}"#;
    let content = parse_level_response(raw, 2);
    assert_eq!(content.status, "LEVEL_2_ADVANCED_UNDERSTANDING");
    assert_eq!(content.main_content, "deep");
  }

  #[test]
  fn misspelled_main_content_alias_is_accepted() {
    let raw = r#"{"main_conent_md":"typo content","flashcards":[]}"#;
    let content = parse_level_response(raw, 1);
    assert_eq!(content.main_content, "typo content");
  }

  #[test]
  fn json_without_expected_keys_falls_through_to_text() {
    // Valid JSON, but no recognizable schema: the raw text itself becomes
    // the main content via the structured-text fallback.
    let raw = r#"{"foo": 1}"#;
    let content = parse_level_response(raw, 1);
    assert_eq!(content.main_content, raw);
    assert_eq!(content.status, "LEVEL_1_OVERVIEW");
  }

  #[test]
  fn level5_sections_concatenate_in_order() {
    let raw = r#"{"main_content_md":"A","practice_assignment_md":"B","solution_md":"C"}"#;
    let content = parse_level_response(raw, 5);
    assert_eq!(content.main_content, "A\n\nB\n\nC");
  }

  #[test]
  fn level5_concat_skips_separator_when_left_side_empty() {
    let raw = r#"{"practice_assignment_md":"B","solution_md":"C"}"#;
    let content = parse_level_response(raw, 5);
    assert_eq!(content.main_content, "B\n\nC");
  }

  #[test]
  fn level5_sections_are_ignored_on_other_levels() {
    let raw = r#"{"main_content_md":"A","practice_assignment_md":"B","solution_md":"C"}"#;
    let content = parse_level_response(raw, 4);
    assert_eq!(content.main_content, "A");
  }

  #[test]
  fn structured_text_extracts_flashcard_and_mcq() {
    let raw = "Intro text.\n\n\
               ### FLASHCARDS\n\
               #### Recursion\nA function calling itself.\n\n\
               ### ASSESSMENT\n\
               #### What is recursion?\n\
               A. A loop\n\
               B. A function calling itself\n\
               C. A variable\n\
               Correct Answer: B\n";
    let content = parse_level_response(raw, 2);
    assert_eq!(content.main_content, "Intro text.");
    assert_eq!(content.flashcards.len(), 1);
    assert_eq!(content.flashcards[0].heading, "Recursion");
    assert_eq!(content.flashcards[0].content, "A function calling itself.");
    assert_eq!(content.assessment_questions.len(), 1);
    let q = &content.assessment_questions[0];
    assert_eq!(q.id, "q2-1");
    assert_eq!(q.options.len(), 3);
    assert_eq!(q.correct_answers, vec!["A function calling itself".to_string()]);
  }

  #[test]
  fn markers_work_in_either_order() {
    let raw = "Main.\n\
               ### ASSESSMENT\n\
               #### Pick one\nA. yes\nB. no\nCorrect answer: a\n\
               ### FLASHCARDS\n\
               #### Card\nBody.\n";
    let content = parse_level_response(raw, 1);
    assert_eq!(content.main_content, "Main.");
    assert_eq!(content.flashcards.len(), 1);
    assert_eq!(content.assessment_questions.len(), 1);
    assert_eq!(content.assessment_questions[0].correct_answers, vec!["yes".to_string()]);
  }

  #[test]
  fn out_of_bounds_answer_letter_drops_the_block() {
    let raw = "### ASSESSMENT\n\
               #### Broken\nA. only option\nCorrect Answer: D\n\
               #### Fine\nA. first\nB. second\nCorrect Answer: A\n";
    let content = parse_level_response(raw, 1);
    assert_eq!(content.assessment_questions.len(), 1);
    // Position numbering counts dropped blocks too.
    assert_eq!(content.assessment_questions[0].id, "q1-2");
  }

  #[test]
  fn malformed_flashcard_blocks_are_dropped_not_fatal() {
    let raw = "### FLASHCARDS\n\
               #### HeadingOnly\n\
               #### Good\nContent here.\n";
    let content = parse_level_response(raw, 1);
    assert_eq!(content.flashcards.len(), 1);
    assert_eq!(content.flashcards[0].heading, "Good");
  }

  #[test]
  fn empty_response_is_a_terminal_error_state() {
    let content = parse_level_response("", 4);
    assert_eq!(content.status, STATUS_ERROR);
    assert!(!content.main_content.is_empty());
  }

  #[test]
  fn plain_prose_is_accepted_as_main_content() {
    let content = parse_level_response("Just some prose with no markers.", 0);
    assert_eq!(content.status, "LEVEL_0_OVERVIEW");
    assert_eq!(content.main_content, "Just some prose with no markers.");
  }

  #[test]
  fn malformed_question_entries_in_json_are_dropped() {
    let raw = r#"{"main_content_md":"X","assessment_questions":[
      {"id":"q1","concept_focus":"c","type":"MCQ","question_text":"t","options":["a"],"correct_answers":["a"]},
      {"not_a_question":true}
    ]}"#;
    let content = parse_level_response(raw, 1);
    assert_eq!(content.assessment_questions.len(), 1);
  }
}
