//! Accepted request shapes for the ask and retrieve endpoints.
//!
//! Every shape is listed explicitly in [`AskPayload`] and normalized into
//! one [`AskRequest`]:
//!
//! | Body                          | Meaning                        |
//! |-------------------------------|--------------------------------|
//! | `{"question": "...", "k": 4}` | `k` optional                   |
//! | `{"query": "...", "k": 4}`    | `k` optional                   |
//! | `{"data": ["...", 4]}`        | Gradio-style, `k` optional     |
//! | `"..."`                       | bare JSON string               |

use lector_core::{Error, Result};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AskPayload {
    Question {
        question: String,
        #[serde(default)]
        k: Option<i64>,
    },
    Query {
        query: String,
        #[serde(default)]
        k: Option<i64>,
    },
    Gradio {
        data: GradioArgs,
    },
    Bare(String),
}

/// Positional `data` array of a Gradio-style request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum GradioArgs {
    WithK(String, i64),
    QuestionOnly((String,)),
}

/// A validated question with an optional explicit `k`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskRequest {
    pub question: String,
    pub k: Option<usize>,
}

impl AskRequest {
    /// Parse a JSON request body in any accepted shape.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let payload: AskPayload = serde_json::from_slice(body).map_err(|_| {
            Error::Configuration(
                "expected {\"question\": ...}, {\"query\": ...}, {\"data\": [...]} or a JSON string"
                    .to_string(),
            )
        })?;
        Self::try_from(payload)
    }
}

impl TryFrom<AskPayload> for AskRequest {
    type Error = Error;

    fn try_from(payload: AskPayload) -> Result<Self> {
        let (question, k) = match payload {
            AskPayload::Question { question, k } => (question, k),
            AskPayload::Query { query, k } => (query, k),
            AskPayload::Gradio {
                data: GradioArgs::WithK(question, k),
            } => (question, Some(k)),
            AskPayload::Gradio {
                data: GradioArgs::QuestionOnly((question,)),
            } => (question, None),
            AskPayload::Bare(question) => (question, None),
        };

        let question = question.trim().to_string();
        if question.is_empty() {
            return Err(Error::Configuration("question must not be empty".to_string()));
        }
        let k = match k {
            None => None,
            Some(k) if k > 0 => Some(k as usize),
            Some(k) => {
                return Err(Error::Configuration(format!("k must be >= 1, got {}", k)));
            }
        };
        Ok(Self { question, k })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<AskRequest> {
        AskRequest::from_json(body.as_bytes())
    }

    fn req(question: &str, k: Option<usize>) -> AskRequest {
        AskRequest {
            question: question.to_string(),
            k,
        }
    }

    #[test]
    fn accepts_every_shape() {
        assert_eq!(parse(r#"{"question": "Why?"}"#).unwrap(), req("Why?", None));
        assert_eq!(
            parse(r#"{"question": "Why?", "k": 2}"#).unwrap(),
            req("Why?", Some(2))
        );
        assert_eq!(
            parse(r#"{"query": "How?", "k": 6}"#).unwrap(),
            req("How?", Some(6))
        );
        assert_eq!(parse(r#"{"data": ["What?"]}"#).unwrap(), req("What?", None));
        assert_eq!(
            parse(r#"{"data": ["What?", 3]}"#).unwrap(),
            req("What?", Some(3))
        );
        assert_eq!(parse(r#""  Who?  ""#).unwrap(), req("Who?", None));
    }

    #[test]
    fn null_k_means_default() {
        assert_eq!(
            parse(r#"{"question": "Why?", "k": null}"#).unwrap(),
            req("Why?", None)
        );
    }

    #[test]
    fn rejects_empty_question() {
        assert!(matches!(
            parse(r#"{"question": "   "}"#),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(parse(r#""""#), Err(Error::Configuration(_))));
    }

    #[test]
    fn rejects_non_positive_k() {
        assert!(parse(r#"{"question": "Why?", "k": 0}"#).is_err());
        assert!(parse(r#"{"data": ["Why?", -1]}"#).is_err());
    }

    #[test]
    fn rejects_unknown_shapes() {
        for body in [
            r#"{"prompt": "Why?"}"#,
            r#"{"data": []}"#,
            r#"{"data": ["a", 1, 2]}"#,
            r#"42"#,
            "not json",
        ] {
            assert!(
                matches!(parse(body), Err(Error::Configuration(_))),
                "accepted {}",
                body
            );
        }
    }
}
