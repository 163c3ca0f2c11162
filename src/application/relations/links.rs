use std::collections::BTreeMap;

use tracing::{info, instrument, warn};

use crate::application::error::AppError;
use crate::application::repos::RepoError;
use crate::domain::documents::{DocRef, Fields, collections};
use crate::domain::payloads::event_id_from_token;

use super::{RelationshipMaintainer, refs_from_ids};

impl RelationshipMaintainer {
    /// Replace each problem statement's `events` with the given events.
    ///
    /// Event tokens are bare ids or `"<title>|<id>"`. Prior associations are
    /// discarded, not merged.
    #[instrument(skip(self, mapping), fields(statements = mapping.len()))]
    pub async fn link_problem_statements_to_events(
        &self,
        mapping: &BTreeMap<String, Vec<String>>,
    ) -> Result<(), AppError> {
        self.invalidating(async {
            for (statement_id, tokens) in mapping {
                let event_ids: Vec<String> = tokens
                    .iter()
                    .map(|token| event_id_from_token(token).to_string())
                    .collect();
                let mut fields = Fields::new();
                fields.insert(
                    "events".into(),
                    refs_from_ids(collections::HACKATHONS, &event_ids),
                );

                let statement = DocRef::new(collections::PROBLEM_STATEMENTS, statement_id);
                self.store
                    .update(&statement, fields)
                    .await
                    .map_err(|err| match err {
                        RepoError::NotFound(reference) => {
                            warn!(document = %reference, "Problem statement not found");
                            AppError::not_found("problem statement", reference.id)
                        }
                        other => AppError::from(other),
                    })?;
                info!(statement_id, events = ?event_ids, "Linked problem statement to events");
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::application::relations::test_support::{harness, ids, served_ids};

    use super::*;

    fn mapping(statement: &str, events: &[&str]) -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([(
            statement.to_string(),
            events.iter().map(|event| event.to_string()).collect(),
        )])
    }

    #[tokio::test]
    async fn relinking_replaces_events_wholesale() {
        let h = harness(json!({
            "problem_statements": {"ps1": {"title": "Routing"}}
        }));
        let statement = DocRef::new(collections::PROBLEM_STATEMENTS, "ps1");

        h.maintainer
            .link_problem_statements_to_events(&mapping("ps1", &["evA", "evB"]))
            .await
            .expect("first link");
        assert_eq!(ids(&h.store, &statement, "events").await, vec!["evA", "evB"]);

        h.maintainer
            .link_problem_statements_to_events(&mapping("ps1", &["evC"]))
            .await
            .expect("second link");
        assert_eq!(ids(&h.store, &statement, "events").await, vec!["evC"]);
    }

    #[tokio::test]
    async fn titled_tokens_use_the_trailing_id() {
        let h = harness(json!({
            "problem_statements": {"ps1": {"title": "Routing"}}
        }));
        h.maintainer
            .link_problem_statements_to_events(&mapping("ps1", &["Fall 2024|h7"]))
            .await
            .expect("link");
        let statement = DocRef::new(collections::PROBLEM_STATEMENTS, "ps1");
        assert_eq!(ids(&h.store, &statement, "events").await, vec!["h7"]);
    }

    #[tokio::test]
    async fn unknown_statement_is_not_found() {
        let h = harness(json!({}));
        let err = h
            .maintainer
            .link_problem_statements_to_events(&mapping("ghost", &["h1"]))
            .await
            .expect_err("missing statement");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn partial_relink_still_clears_cached_statements() {
        let h = harness(json!({
            "problem_statements": {
                "ps1": {"title": "Routing", "events": [{"$ref": "hackathons/old"}]}
            }
        }));
        let statement = DocRef::new(collections::PROBLEM_STATEMENTS, "ps1");
        assert_eq!(served_ids(&h, &statement, "events").await, vec![json!("old")]);

        let mut links = mapping("ps1", &["evNew"]);
        links.insert("zz_missing".into(), vec!["evX".into()]);
        let err = h
            .maintainer
            .link_problem_statements_to_events(&links)
            .await
            .expect_err("second statement is missing");

        assert!(err.is_not_found());
        assert_eq!(ids(&h.store, &statement, "events").await, vec!["evNew"]);
        assert_eq!(served_ids(&h, &statement, "events").await, vec![json!("evNew")]);
    }
}
