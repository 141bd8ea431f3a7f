//! Category / sentiment / urgency classification.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use supportflow_llm::{ChatModel, ChatRequest, extract_json_object};
use supportflow_shared::{Category, Sentiment, Urgency};

use crate::outcome::{FallbackReason, StageOutcome, with_deadline};

const CLASSIFIER_PROMPT: &str = r#"You are a senior support routing agent with emotional intelligence.
Analyze the incoming query and provide:
1. Category - exactly one of: Billing, Technical, Feature, Bug
2. Sentiment - exactly one of: Positive, Neutral, Negative
3. Urgency - exactly one of: Low, Medium, High, Critical

Format your response as JSON:
{"category": "category_name", "sentiment": "sentiment_name", "urgency": "urgency_level"}

Sentiment guidelines:
- Positive: friendly, appreciative, patient tone
- Neutral: standard inquiry, no emotional indicators
- Negative: frustrated, angry, disappointed, urgent complaints

Urgency guidelines:
- Critical: service down, security issue, business blocking
- High: important feature broken, duplicate charges
- Medium: standard bugs, feature requests
- Low: general questions, minor issues"#;

/// The resolved routing triple. Always one of the 4x3x4 valid combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    pub category: Category,
    pub sentiment: Sentiment,
    pub urgency: Urgency,
}

/// Parse a classifier reply.
///
/// Unparseable text yields the defaults for all three fields; a parsed object
/// has each field validated on its own, so one bad value only resets that
/// field.
pub fn parse_classification(text: &str) -> StageOutcome<Classification> {
    let object = match extract_json_object(text) {
        Ok(object) => object,
        Err(e) => {
            return StageOutcome::fallback(
                Classification::default(),
                FallbackReason::Malformed(e.to_string()),
            );
        }
    };

    let mut rejected = Vec::new();
    let classification = Classification {
        category: closed_field(&object, "category", &mut rejected),
        sentiment: closed_field(&object, "sentiment", &mut rejected),
        urgency: closed_field(&object, "urgency", &mut rejected),
    };

    if rejected.is_empty() {
        StageOutcome::Primary(classification)
    } else {
        StageOutcome::fallback(classification, FallbackReason::OutOfRange(rejected.join(", ")))
    }
}

fn closed_field<T>(object: &Map<String, Value>, key: &str, rejected: &mut Vec<String>) -> T
where
    T: FromStr + Default,
{
    match object.get(key) {
        Some(Value::String(s)) => s.parse().unwrap_or_else(|_| {
            rejected.push(format!("{key}={s:?}"));
            T::default()
        }),
        Some(other) => {
            rejected.push(format!("{key}={other}"));
            T::default()
        }
        None => {
            rejected.push(format!("{key} missing"));
            T::default()
        }
    }
}

/// Classification stage.
pub struct Classifier {
    model: Arc<dyn ChatModel>,
    temperature: f32,
    deadline_secs: u64,
}

impl Classifier {
    pub fn new(model: Arc<dyn ChatModel>, temperature: f32, deadline_secs: u64) -> Self {
        Self {
            model,
            temperature,
            deadline_secs,
        }
    }

    /// Classify `query`. Never fails: call errors resolve to the defaults.
    #[instrument(skip_all, fields(model = %self.model.model_id()))]
    pub async fn classify(&self, query: &str) -> StageOutcome<Classification> {
        let request = ChatRequest::new(CLASSIFIER_PROMPT, query, self.temperature).json();

        let outcome =
            match with_deadline("classify", self.deadline_secs, self.model.complete(&request)).await
            {
                Ok(reply) => parse_classification(&reply),
                Err(e) => StageOutcome::fallback(
                    Classification::default(),
                    FallbackReason::from_error(&e),
                ),
            };

        if let Some(reason) = outcome.fallback_reason() {
            warn!(%reason, "classifier output replaced by defaults");
        }
        let resolved = outcome.value();
        info!(
            category = %resolved.category,
            sentiment = %resolved.sentiment,
            urgency = %resolved.urgency,
            "classification resolved"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Reply, ScriptedChat};

    fn assert_valid(c: &Classification) {
        assert!(Category::ALL.contains(&c.category));
        assert!(Sentiment::ALL.contains(&c.sentiment));
        assert!(Urgency::ALL.contains(&c.urgency));
    }

    #[test]
    fn well_formed_reply_is_primary() {
        let outcome = parse_classification(
            r#"{"category": "Billing", "sentiment": "Negative", "urgency": "High"}"#,
        );
        assert_eq!(
            outcome,
            StageOutcome::Primary(Classification {
                category: Category::Billing,
                sentiment: Sentiment::Negative,
                urgency: Urgency::High,
            })
        );
    }

    #[test]
    fn fenced_reply_is_accepted() {
        let outcome = parse_classification(
            "```json\n{\"category\": \"Bug\", \"sentiment\": \"Neutral\", \"urgency\": \"Low\"}\n```",
        );
        assert!(!outcome.is_fallback());
        assert_eq!(outcome.value().category, Category::Bug);
    }

    #[test]
    fn unparseable_reply_resets_all_fields() {
        let outcome = parse_classification("I think this is about billing.");
        assert_eq!(*outcome.value(), Classification::default());
        assert!(matches!(outcome.fallback_reason(), Some(FallbackReason::Malformed(_))));
    }

    #[test]
    fn invalid_values_reset_independently() {
        let outcome = parse_classification(
            r#"{"category": "Bug", "sentiment": "Furious", "urgency": "Critical"}"#,
        );
        let c = outcome.value();
        assert_eq!(c.category, Category::Bug);
        assert_eq!(c.sentiment, Sentiment::Neutral);
        assert_eq!(c.urgency, Urgency::Critical);
        match outcome.fallback_reason() {
            Some(FallbackReason::OutOfRange(detail)) => assert!(detail.contains("Furious")),
            other => panic!("expected OutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn adversarial_outputs_stay_in_the_closed_set() {
        let replies = [
            "",
            "null",
            "[\"Billing\", \"Negative\", \"High\"]",
            r#"{"category": "billing", "sentiment": "NEGATIVE", "urgency": "urgent"}"#,
            r#"{"category": 42, "sentiment": null, "urgency": {"level": "High"}}"#,
            r#"{"category": "Billing; DROP TABLE tickets"}"#,
            r#"{"category": "Feature", "sentiment": "Positive", "urgency": "Low", "extra": true}"#,
            "{\"category\": \"Technical\"",
            "```\nnot json at all\n```",
        ];

        for reply in replies {
            assert_valid(parse_classification(reply).value());
        }

        let lowercase = parse_classification(
            r#"{"category": "billing", "sentiment": "NEGATIVE", "urgency": "urgent"}"#,
        );
        assert_eq!(*lowercase.value(), Classification::default());
    }

    #[tokio::test]
    async fn call_failure_yields_defaults() {
        let chat = ScriptedChat::new(vec![Reply::Fail("HTTP 500".into())]);
        let classifier = Classifier::new(chat, 0.0, 5);

        let outcome = classifier.classify("My app crashes").await;
        assert_eq!(*outcome.value(), Classification::default());
        assert!(matches!(outcome.fallback_reason(), Some(FallbackReason::CallFailed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_call_times_out_to_defaults() {
        let chat = ScriptedChat::new(vec![Reply::Hang]);
        let classifier = Classifier::new(chat, 0.0, 3);

        let outcome = classifier.classify("hello").await;
        assert_eq!(*outcome.value(), Classification::default());
        assert_eq!(outcome.fallback_reason(), Some(&FallbackReason::TimedOut(3)));
    }

    #[tokio::test]
    async fn sends_query_as_json_request() {
        let chat = ScriptedChat::new(vec![Reply::Text(
            r#"{"category": "Feature", "sentiment": "Positive", "urgency": "Low"}"#.into(),
        )]);
        let classifier = Classifier::new(chat.clone(), 0.0, 5);

        let outcome = classifier.classify("Can you add dark mode?").await;
        assert_eq!(outcome.value().category, Category::Feature);

        let requests = chat.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].json_output);
        assert_eq!(requests[0].temperature, 0.0);
        assert_eq!(requests[0].messages[1].content, "Can you add dark mode?");
    }
}
