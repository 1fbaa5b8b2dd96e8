//! Prompt assembly: turns a level template, the uploaded file bundle, and the
//! previous level's Q&A into the exact payload handed to a provider adapter.
//!
//! Assembly is backend-agnostic. Binary files become tagged parts; how a
//! concrete backend transports (or degrades) them is the adapter's concern.

use tracing::{debug, instrument};

use crate::config::ANSWERS_DOCUMENT_TOKEN;
use crate::domain::{AnswersDocument, FileAsset, FileBundle, FileEncoding, PriorAssessment};
use crate::files::media_type_for;
use crate::util::fill_template;

const PREVIOUS_RESPONSES_BEGIN: &str = "--- PREVIOUS LEVEL ASSESSMENT RESPONSES ---";
const PREVIOUS_RESPONSES_END: &str = "--- END PREVIOUS RESPONSES ---";
const NO_PRIOR_DATA: &str = "(No previous assessment data provided or applicable)";

/// One file-derived content part, parallel to the prompt text.
#[derive(Clone, Debug, PartialEq)]
pub enum PromptPart {
  /// Inline text excerpt, already wrapped with named begin/end markers.
  Text(String),
  /// Binary blob; assembly never inspects the content.
  Inline {
    label: &'static str,
    name: String,
    media_type: &'static str,
    data: String,
  },
}

/// The assembled request: a single prompt string plus file-derived parts.
#[derive(Clone, Debug)]
pub struct AssembledPrompt {
  pub level: u8,
  pub text: String,
  pub parts: Vec<PromptPart>,
}

fn file_part(label: &'static str, asset: &FileAsset) -> PromptPart {
  match asset.encoding {
    FileEncoding::Text => PromptPart::Text(fill_template(
      "--- {label}: {name} ---\n\n{content}\n\n--- End {label} ---",
      &[
        ("label", label),
        ("name", &asset.name),
        ("content", &asset.content),
      ],
    )),
    FileEncoding::Base64 => PromptPart::Inline {
      label,
      name: asset.name.clone(),
      media_type: media_type_for(&asset.name),
      data: asset.content.clone(),
    },
  }
}

/// Render the previous level's questions with the learner's answers.
/// Questions with no entry in the answer map get an explicit marker instead
/// of being silently omitted.
fn render_prior(prior: &PriorAssessment) -> String {
  prior
    .questions
    .iter()
    .enumerate()
    .map(|(i, q)| {
      if q.id.is_empty() {
        return format!("Question {}: (Missing ID) {}", i + 1, q.question_text);
      }
      let selected = prior.answers.get(&q.id).map(Vec::as_slice).unwrap_or(&[]);
      let answers_string = if selected.is_empty() {
        "No answer provided".to_string()
      } else {
        selected.join(", ")
      };
      format!(
        "Previous Question {} (ID: {}): {}\nUser's Answer: {}",
        i + 1,
        q.id,
        q.question_text,
        answers_string
      )
    })
    .collect::<Vec<_>>()
    .join("\n\n")
}

/// Assemble the full prompt for `level`.
///
/// Level 6 substitutes the answers document into the template verbatim;
/// verifying the document exists is the state machine's job, not ours.
/// For level > 0 the previous-responses section is always appended (with an
/// explicit no-data marker when empty); for level 0 it never is, even if
/// prior data was (incorrectly) supplied.
#[instrument(level = "debug", skip_all, fields(level, prior = prior.is_some()))]
pub fn assemble_prompt(
  template: &str,
  level: u8,
  bundle: &FileBundle,
  prior: Option<&PriorAssessment>,
  answers_document: Option<&AnswersDocument>,
) -> AssembledPrompt {
  let mut text = template.to_string();

  if level == 6 {
    if let Some(doc) = answers_document {
      text = text.replace(ANSWERS_DOCUMENT_TOKEN, &doc.content);
      debug!(
        target: "mastery_backend",
        doc = %doc.name,
        chars = doc.content.len(),
        "Inserted answers document into level 6 prompt"
      );
    }
  }

  if level > 0 {
    let body = match prior {
      Some(p) if !p.questions.is_empty() => render_prior(p),
      _ => NO_PRIOR_DATA.to_string(),
    };
    text.push_str(&format!(
      "\n\n{}\n{}\n{}",
      PREVIOUS_RESPONSES_BEGIN, body, PREVIOUS_RESPONSES_END
    ));
  }

  let mut parts = Vec::with_capacity(1 + bundle.resources.len());
  parts.push(file_part("Assignment File", &bundle.assignment));
  for resource in &bundle.resources {
    parts.push(file_part("Resource File", resource));
  }

  AssembledPrompt { level, text, parts }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{AnswerMap, AssessmentQuestion, QuestionType};

  fn bundle() -> FileBundle {
    FileBundle {
      assignment: FileAsset {
        name: "essay.txt".into(),
        content: "Write an essay.".into(),
        encoding: FileEncoding::Text,
      },
      resources: vec![FileAsset {
        name: "rubric.pdf".into(),
        content: "cnVicmlj".into(),
        encoding: FileEncoding::Base64,
      }],
    }
  }

  fn question(id: &str) -> AssessmentQuestion {
    AssessmentQuestion {
      id: id.into(),
      concept_focus: "focus".into(),
      question_type: QuestionType::Mcq,
      question_text: "What?".into(),
      options: vec!["A".into(), "B".into()],
      correct_answers: vec!["A".into()],
    }
  }

  #[test]
  fn previous_responses_section_present_for_levels_above_zero() {
    for level in 1..=6u8 {
      let p = assemble_prompt("tpl", level, &bundle(), None, None);
      assert!(
        p.text.contains(PREVIOUS_RESPONSES_BEGIN),
        "level {} must carry the marker",
        level
      );
      assert!(p.text.contains(NO_PRIOR_DATA));
    }
  }

  #[test]
  fn level_zero_never_gets_previous_responses() {
    let mut answers = AnswerMap::new();
    answers.insert("q1".into(), vec!["A".into()]);
    let prior = PriorAssessment {
      questions: vec![question("q1")],
      answers,
    };
    // Even when prior data is (incorrectly) supplied.
    let p = assemble_prompt("tpl", 0, &bundle(), Some(&prior), None);
    assert!(!p.text.contains(PREVIOUS_RESPONSES_BEGIN));
  }

  #[test]
  fn prior_answers_are_joined_and_unanswered_questions_marked() {
    let mut answers = AnswerMap::new();
    answers.insert("q1".into(), vec!["A".into(), "B".into()]);
    let prior = PriorAssessment {
      questions: vec![question("q1"), question("q2")],
      answers,
    };
    let p = assemble_prompt("tpl", 2, &bundle(), Some(&prior), None);
    assert!(p.text.contains("User's Answer: A, B"));
    assert!(p.text.contains("User's Answer: No answer provided"));
    assert!(p.text.contains("(ID: q1)"));
  }

  #[test]
  fn level_six_substitutes_the_answers_document() {
    let doc = AnswersDocument {
      name: "final.txt".into(),
      content: "my submitted work".into(),
      doc_type: "text/plain".into(),
    };
    let tpl = format!("Review this: {}", ANSWERS_DOCUMENT_TOKEN);
    let p = assemble_prompt(&tpl, 6, &bundle(), None, Some(&doc));
    assert!(p.text.contains("my submitted work"));
    assert!(!p.text.contains(ANSWERS_DOCUMENT_TOKEN));
  }

  #[test]
  fn files_become_marked_text_or_tagged_binary_parts() {
    let p = assemble_prompt("tpl", 0, &bundle(), None, None);
    assert_eq!(p.parts.len(), 2);
    match &p.parts[0] {
      PromptPart::Text(t) => {
        assert!(t.starts_with("--- Assignment File: essay.txt ---"));
        assert!(t.ends_with("--- End Assignment File ---"));
        assert!(t.contains("Write an essay."));
      }
      other => panic!("expected text part, got {:?}", other),
    }
    match &p.parts[1] {
      PromptPart::Inline {
        label,
        name,
        media_type,
        ..
      } => {
        assert_eq!(*label, "Resource File");
        assert_eq!(name, "rubric.pdf");
        assert_eq!(*media_type, "application/pdf");
      }
      other => panic!("expected inline part, got {:?}", other),
    }
  }
}
