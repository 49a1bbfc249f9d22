//! Turns raw provider reply text into validated [`Question`]s.
//!
//! Each provider only decides how candidate fields are pulled out of its
//! reply; the checks on those fields live in [`validate_candidate`].

use serde_json::Value;
use tinyquiz_common::constants::OPTION_COUNT;
use tinyquiz_common::{AiProvider, Question};

use super::ProviderError;

/// Fields of one question before validation
#[derive(Debug, Default)]
pub(crate) struct Candidate {
    pub question: Option<Value>,
    pub options: Option<Value>,
    pub correct_answer: Option<Value>,
    pub explanation: Option<Value>,
}

/// Remove markdown code-fence markup around a reply
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json\n", "")
        .replace("```json", "")
        .replace("```\n", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Locate the first `[ { ... } ]` literal in free text.
///
/// The match starts at the first `[` followed (after whitespace) by `{` and
/// ends at the earliest `}` followed (after whitespace) by `]`.
pub fn find_array_literal(text: &str) -> Option<&str> {
    let (start, brace) = text.char_indices().find_map(|(i, c)| {
        if c != '[' {
            return None;
        }
        let rest = text[i + 1..].trim_start();
        rest.starts_with('{').then(|| (i, text.len() - rest.len()))
    })?;

    let mut cursor = brace + 1;
    while let Some(offset) = text[cursor..].find('}') {
        let close = cursor + offset;
        let after = text[close + 1..].trim_start();
        if after.starts_with(']') {
            let end = text.len() - after.len() + 1;
            return Some(&text[start..end]);
        }
        cursor = close + 1;
    }
    None
}

fn non_blank_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Shared schema check for every provider
pub(crate) fn validate_candidate(index: usize, candidate: Candidate) -> Result<Question, ProviderError> {
    let text = non_blank_str(candidate.question.as_ref())
        .ok_or_else(|| ProviderError::question(index, "Missing or invalid question text"))?
        .to_string();

    let raw_options = match candidate.options {
        Some(Value::Array(items)) if items.len() == OPTION_COUNT => items,
        _ => {
            return Err(ProviderError::question(
                index,
                format!("Must have exactly {OPTION_COUNT} options"),
            ));
        }
    };

    let correct_option_index = candidate
        .correct_answer
        .as_ref()
        .and_then(Value::as_u64)
        .filter(|&i| i < OPTION_COUNT as u64)
        .ok_or_else(|| {
            ProviderError::question(index, "correctAnswer must be an integer between 0-3")
        })? as u8;

    let explanation = non_blank_str(candidate.explanation.as_ref())
        .ok_or_else(|| ProviderError::question(index, "Missing or invalid explanation"))?
        .to_string();

    let mut options: [String; OPTION_COUNT] = Default::default();
    for (slot, raw) in options.iter_mut().zip(raw_options.iter()) {
        *slot = non_blank_str(Some(raw))
            .ok_or_else(|| ProviderError::question(index, "All options must be non-empty strings"))?
            .to_string();
    }

    Ok(Question {
        text,
        options,
        correct_option_index,
        explanation,
    })
}

/// Provider A: `{"questions": [{question, options, correctAnswer, explanation}]}`
pub fn parse_wrapped_questions(provider: AiProvider, raw: &str) -> Result<Vec<Question>, ProviderError> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(&cleaned).map_err(|e| ProviderError::MalformedResponse {
        provider,
        reason: format!("invalid JSON format: {e}"),
    })?;

    let items = match value.get("questions") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        Some(Value::Array(_)) => return Err(ProviderError::structure("No questions generated")),
        _ => {
            return Err(ProviderError::structure(
                "Invalid questions format - expected questions array",
            ));
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let candidate = Candidate {
                question: item.get("question").cloned(),
                options: item.get("options").cloned(),
                correct_answer: item.get("correctAnswer").cloned(),
                explanation: item.get("explanation").cloned(),
            };
            validate_candidate(i + 1, candidate)
        })
        .collect()
}

/// Which extraction strategy recovered the array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    ArrayLiteral,
    FencedArrayLiteral,
    WholeText,
}

fn parse_array(text: &str) -> Option<Vec<Value>> {
    match serde_json::from_str(text) {
        Ok(Value::Array(items)) => Some(items),
        _ => None,
    }
}

/// Try the three increasingly permissive strategies in order
pub fn extract_flat_array(raw: &str) -> Option<(Extraction, Vec<Value>)> {
    if let Some(items) = find_array_literal(raw).and_then(parse_array) {
        return Some((Extraction::ArrayLiteral, items));
    }

    let cleaned = strip_code_fences(raw);
    if let Some(items) = find_array_literal(&cleaned).and_then(parse_array) {
        return Some((Extraction::FencedArrayLiteral, items));
    }

    if cleaned.starts_with('[') {
        return parse_array(&cleaned).map(|items| (Extraction::WholeText, items));
    }

    None
}

/// JSON truthiness: absent, null, false, 0 and "" count as missing
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(_) => true,
    }
}

const FLAT_REQUIRED: [&str; 6] = ["question", "option1", "option2", "option3", "option4", "answer"];

fn flat_candidate(index: usize, item: &Value) -> Result<Candidate, ProviderError> {
    if !FLAT_REQUIRED.iter().all(|field| is_present(item.get(*field))) {
        return Err(ProviderError::question(index, "Missing required fields"));
    }

    let answer = item.get("answer").and_then(Value::as_str).ok_or_else(|| {
        ProviderError::question(index, "Invalid answer format. Expected option1, option2, option3, or option4")
    })?;

    let correct = match answer.to_ascii_lowercase().as_str() {
        "option1" => 0,
        "option2" => 1,
        "option3" => 2,
        "option4" => 3,
        _ => {
            return Err(ProviderError::question(
                index,
                format!(
                    "Invalid answer format \"{answer}\". Expected option1, option2, option3, or option4"
                ),
            ));
        }
    };

    let explanation = match non_blank_str(item.get("explanation")) {
        Some(text) => Value::String(text.to_string()),
        None => Value::String(format!("The correct answer is {answer}.")),
    };

    let options = ["option1", "option2", "option3", "option4"]
        .iter()
        .map(|field| item.get(*field).cloned().unwrap_or(Value::Null))
        .collect();

    Ok(Candidate {
        question: item.get("question").cloned(),
        options: Some(Value::Array(options)),
        correct_answer: Some(Value::from(correct)),
        explanation: Some(explanation),
    })
}

/// Provider B: bare `[{question, option1..option4, answer, explanation?}]`
pub fn parse_flat_questions(provider: AiProvider, raw: &str) -> Result<Vec<Question>, ProviderError> {
    let (strategy, items) =
        extract_flat_array(raw).ok_or_else(|| ProviderError::MalformedResponse {
            provider,
            reason: "no valid JSON MCQ array found".to_string(),
        })?;

    tracing::debug!(provider = %provider, strategy = ?strategy, count = items.len(), "Extracted MCQ array");

    items
        .iter()
        .enumerate()
        .map(|(i, item)| validate_candidate(i + 1, flat_candidate(i + 1, item)?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GEMINI_REPLY: &str = r#"```json
{
  "questions": [
    {
      "question": "  What do plants absorb for photosynthesis? ",
      "options": [" Oxygen", "Carbon dioxide ", "Nitrogen", "Helium"],
      "correctAnswer": 1,
      "explanation": " Plants take in CO2. "
    },
    {
      "question": "Where does photosynthesis happen?",
      "options": ["Mitochondria", "Nucleus", "Chloroplast", "Ribosome"],
      "correctAnswer": 2,
      "explanation": "Chloroplasts contain chlorophyll."
    }
  ]
}
```"#;

    fn flat_item(answer: &str) -> String {
        format!(
            r#"{{"question": "Q?", "option1": "A", "option2": "B", "option3": "C", "option4": "D", "answer": "{answer}", "explanation": "E"}}"#
        )
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[1]\n```\n"), "[1]");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  plain  "), "plain");
    }

    #[test]
    fn test_find_array_literal() {
        let text = "Sure! Here you go:\n[\n  {\"a\": 1},\n  {\"b\": 2}\n]\nEnjoy [the quiz]";
        assert_eq!(find_array_literal(text), Some("[\n  {\"a\": 1},\n  {\"b\": 2}\n]"));
        assert_eq!(find_array_literal("[1, 2] then [ {\"x\": 0} ]"), Some("[ {\"x\": 0} ]"));
        assert_eq!(find_array_literal("no arrays [here]"), None);
        assert_eq!(find_array_literal("[{\"unterminated\": true}"), None);
    }

    #[test]
    fn test_wrapped_questions_trimmed() {
        let questions = parse_wrapped_questions(AiProvider::Gemini, GEMINI_REPLY).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].text, "What do plants absorb for photosynthesis?");
        assert_eq!(questions[0].options[0], "Oxygen");
        assert_eq!(questions[0].options[1], "Carbon dioxide");
        assert_eq!(questions[0].correct_option_index, 1);
        assert_eq!(questions[0].explanation, "Plants take in CO2.");
        assert_eq!(questions[1].correct_option_index, 2);
    }

    #[test]
    fn test_wrapped_malformed_json() {
        let err = parse_wrapped_questions(AiProvider::Gemini, "{ not json").unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }

    #[test]
    fn test_wrapped_missing_or_empty_questions() {
        let err = parse_wrapped_questions(AiProvider::Gemini, r#"{"items": []}"#).unwrap_err();
        assert!(matches!(err, ProviderError::SchemaViolation { .. }));

        let err = parse_wrapped_questions(AiProvider::Gemini, r#"{"questions": {}}"#).unwrap_err();
        assert!(matches!(err, ProviderError::SchemaViolation { .. }));

        let err = parse_wrapped_questions(AiProvider::Gemini, r#"{"questions": []}"#).unwrap_err();
        assert!(err.to_string().contains("No questions generated"));
    }

    #[test]
    fn test_wrapped_wrong_option_count_names_index() {
        let raw = r#"{"questions": [
            {"question": "ok", "options": ["a","b","c","d"], "correctAnswer": 0, "explanation": "e"},
            {"question": "bad", "options": ["a","b","c"], "correctAnswer": 0, "explanation": "e"}
        ]}"#;
        let err = parse_wrapped_questions(AiProvider::Gemini, raw).unwrap_err();
        assert_eq!(err.to_string(), "Question 2: Must have exactly 4 options");
    }

    #[test]
    fn test_wrapped_out_of_range_answer() {
        let raw = r#"{"questions": [
            {"question": "q", "options": ["a","b","c","d"], "correctAnswer": 4, "explanation": "e"}
        ]}"#;
        let err = parse_wrapped_questions(AiProvider::Gemini, raw).unwrap_err();
        assert!(err.to_string().starts_with("Question 1: correctAnswer"));

        let raw = raw.replace("\"correctAnswer\": 4", "\"correctAnswer\": \"1\"");
        assert!(parse_wrapped_questions(AiProvider::Gemini, &raw).is_err());
    }

    #[test]
    fn test_wrapped_requires_explanation_and_options() {
        let raw = r#"{"questions": [
            {"question": "q", "options": ["a","b","c","d"], "correctAnswer": 1}
        ]}"#;
        let err = parse_wrapped_questions(AiProvider::Gemini, raw).unwrap_err();
        assert_eq!(err.to_string(), "Question 1: Missing or invalid explanation");

        let raw = r#"{"questions": [
            {"question": "q", "options": ["a","  ","c","d"], "correctAnswer": 1, "explanation": "e"}
        ]}"#;
        let err = parse_wrapped_questions(AiProvider::Gemini, raw).unwrap_err();
        assert_eq!(err.to_string(), "Question 1: All options must be non-empty strings");
    }

    #[test]
    fn test_flat_strategy_array_literal() {
        let raw = format!("Here are your MCQs:\n[{}, {}]\nGood luck!", flat_item("option2"), flat_item("OPTION4"));
        let (strategy, items) = extract_flat_array(&raw).unwrap();
        assert_eq!(strategy, Extraction::ArrayLiteral);
        assert_eq!(items.len(), 2);

        let questions = parse_flat_questions(AiProvider::Nvidia, &raw).unwrap();
        assert_eq!(questions[0].correct_option_index, 1);
        assert_eq!(questions[1].correct_option_index, 3);
        assert_eq!(questions[0].options, ["A", "B", "C", "D"].map(String::from));
    }

    #[test]
    fn test_flat_strategy_fenced() {
        // The fence marker hides the array literal until it is stripped
        let raw = format!("[```json\n{}\n]", flat_item("option1"));
        let (strategy, items) = extract_flat_array(&raw).unwrap();
        assert_eq!(strategy, Extraction::FencedArrayLiteral);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_flat_strategy_whole_text() {
        let (strategy, items) = extract_flat_array("```json\n[]\n```").unwrap();
        assert_eq!(strategy, Extraction::WholeText);
        assert!(items.is_empty());
    }

    #[test]
    fn test_flat_whole_text_recovers_questions() {
        // "}]" inside the first question ends the literal match early
        let first = r#"{"question": "Set {a}] ?", "option1": "A", "option2": "B", "option3": "C", "option4": "D", "answer": "option2", "explanation": "E"}"#;
        let raw = format!("```json\n[{first}, {}]\n```", flat_item("option4"));

        assert_eq!(find_array_literal(&raw), Some(r#"[{"question": "Set {a}]"#));
        let (strategy, items) = extract_flat_array(&raw).unwrap();
        assert_eq!(strategy, Extraction::WholeText);
        assert_eq!(items.len(), 2);

        let questions = parse_flat_questions(AiProvider::Nvidia, &raw).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].text, "Set {a}] ?");
        assert_eq!(questions[0].options, ["A", "B", "C", "D"].map(String::from));
        assert_eq!(
            questions.iter().map(|q| q.correct_option_index).collect::<Vec<_>>(),
            [1, 3]
        );
    }

    #[test]
    fn test_flat_same_shape_as_wrapped() {
        let wrapped = r#"{"questions": [{"question": "Q?", "options": ["A","B","C","D"], "correctAnswer": 2, "explanation": "E"}]}"#;
        let flat = format!("[{}]", flat_item("option3"));
        assert_eq!(
            parse_wrapped_questions(AiProvider::Gemini, wrapped).unwrap(),
            parse_flat_questions(AiProvider::Nvidia, &flat).unwrap()
        );
    }

    #[test]
    fn test_flat_no_array() {
        let err = parse_flat_questions(AiProvider::Nvidia, "I cannot help with that.").unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }

    #[test]
    fn test_flat_missing_field_names_index() {
        let raw = format!(
            "[{}, {{\"question\": \"Q\", \"option1\": \"A\", \"option2\": \"B\", \"option3\": \"C\", \"answer\": \"option1\"}}]",
            flat_item("option1")
        );
        let err = parse_flat_questions(AiProvider::Nvidia, &raw).unwrap_err();
        assert_eq!(err.to_string(), "Question 2: Missing required fields");
    }

    #[test]
    fn test_flat_invalid_answer_token() {
        let raw = format!("[{}]", flat_item("B"));
        let err = parse_flat_questions(AiProvider::Nvidia, &raw).unwrap_err();
        assert!(err.to_string().starts_with("Question 1: Invalid answer format \"B\""));
    }

    #[test]
    fn test_flat_explanation_defaults() {
        let raw = r#"[{"question": " Q ", "option1": "A", "option2": "B", "option3": "C", "option4": "D", "answer": "Option3"}]"#;
        let questions = parse_flat_questions(AiProvider::Nvidia, raw).unwrap();
        assert_eq!(questions[0].text, "Q");
        assert_eq!(questions[0].correct_option_index, 2);
        assert_eq!(questions[0].explanation, "The correct answer is Option3.");
    }
}
