//! Tests for clarification extraction

use super::*;

const SPEC_WITH_MARKERS: &str = "\
# Feature Spec: Hockey Simulator

## Gameplay

The simulator supports exhibition matches.
[NEEDS CLARIFICATION: Should users interact via touch or keyboard?]

**Suggested Answers**:

| Option | Description |
| A | Touch gestures |
| B | Keyboard |

**Your choice**: _[Awaiting response]_

---

## Platforms

Initial release targets a single platform.
[NEEDS CLARIFICATION: Which platform ships first?]

## Non-goals

Multiplayer is out of scope.
";

// ============================================================================
// Marker scan
// ============================================================================

#[test]
fn test_extract_markers_finds_all_questions() {
    let questions = extract_markers(SPEC_WITH_MARKERS);

    assert_eq!(questions.len(), 2);
    assert_eq!(
        questions[0].question,
        "Should users interact via touch or keyboard?"
    );
    assert_eq!(questions[1].question, "Which platform ships first?");
}

#[test]
fn test_extract_markers_captures_preceding_context() {
    let questions = extract_markers(SPEC_WITH_MARKERS);

    assert!(questions[0]
        .context
        .contains("The simulator supports exhibition matches."));
    assert!(questions[1]
        .context
        .contains("Initial release targets a single platform."));
}

#[test]
fn test_extract_markers_captures_answer_options() {
    let questions = extract_markers(SPEC_WITH_MARKERS);

    assert!(questions[0].answer_options.contains("Touch gestures"));
    // The options block ends before the choice placeholder.
    assert!(!questions[0].answer_options.contains("Your choice"));
    assert_eq!(questions[1].answer_options, "");
}

#[test]
fn test_extract_markers_empty_spec() {
    assert!(extract_markers("# Spec without open questions\n").is_empty());
}

#[test]
fn test_topic_is_clipped_question_without_markers() {
    let questions = extract_markers(
        "[NEEDS CLARIFICATION: Should the retry schedule be configurable per deployment environment or fixed?]",
    );

    let topic = &questions[0].topic;
    assert!(topic.ends_with("..."));
    assert!(!topic.contains('?'));
    assert!(topic.chars().count() <= 53);
}

#[test]
fn test_context_is_char_boundary_safe() {
    let spec = format!(
        "{}[NEEDS CLARIFICATION: boundary?]",
        "ü".repeat(300)
    );

    let questions = extract_markers(&spec);

    assert_eq!(questions[0].context.chars().count(), 200);
}

// ============================================================================
// LLM response parsing
// ============================================================================

#[test]
fn test_parse_llm_questions_plain_json() {
    let response = r#"[
        {"topic": "Platform", "question": "Web or mobile?", "context": "Initial release"}
    ]"#;

    let questions = parse_llm_questions(response).unwrap();

    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].topic, "Platform");
    assert_eq!(questions[0].answer_options, "");
    assert_eq!(questions[0].recommended_option, None);
}

#[test]
fn test_parse_llm_questions_strips_code_fences() {
    let response = "```json\n[{\"topic\": \"T\", \"question\": \"Q?\", \"context\": \"C\"}]\n```";

    let questions = parse_llm_questions(response).unwrap();

    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].question, "Q?");
}

#[test]
fn test_parse_llm_questions_keeps_optional_fields() {
    let response = r#"[{
        "topic": "Retry",
        "question": "How many attempts?",
        "context": "Dispatch",
        "answer_options": "| 3 | 5 |",
        "recommended_option": "3 - matches the upstream timeout budget"
    }]"#;

    let questions = parse_llm_questions(response).unwrap();

    assert_eq!(
        questions[0].recommended_option.as_deref(),
        Some("3 - matches the upstream timeout budget")
    );
}

#[test]
fn test_parse_llm_questions_rejects_non_json() {
    assert!(parse_llm_questions("Sorry, I cannot help with that.").is_err());
}

// ============================================================================
// Markdown rendering
// ============================================================================

#[test]
fn test_render_clarifications_md_layout() {
    let questions = extract_markers(SPEC_WITH_MARKERS);

    let markdown = render_clarifications_md(&questions, "Hockey Simulator", "./spec.md");

    assert!(markdown.starts_with("# Clarification Questions: Hockey Simulator"));
    assert!(markdown.contains("**Total Questions**: 2"));
    assert!(markdown.contains("## Question 1:"));
    assert!(markdown.contains("## Question 2:"));
    assert!(markdown.contains("**Answer Options**:"));
    assert!(markdown.contains("**Answer**: _Pending_"));
    assert!(markdown.contains("## Resolution Notes"));
}

#[test]
fn test_render_clarifications_md_without_questions() {
    let markdown = render_clarifications_md(&[], "Empty Feature", "./spec.md");

    assert!(markdown.contains("**Total Questions**: 0"));
    assert!(!markdown.contains("## Question 1:"));
}
