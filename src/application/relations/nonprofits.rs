use tracing::{info, instrument};

use crate::application::error::AppError;
use crate::application::repos::RepoError;
use crate::domain::documents::{DocRef, Fields, Value, collections};
use crate::domain::payloads::{NewNonprofit, NonprofitUpdate};

use super::{RelationshipMaintainer, refs_from_ids};

impl RelationshipMaintainer {
    #[instrument(skip(self, nonprofit), fields(name = %nonprofit.name))]
    pub async fn save_nonprofit(&self, nonprofit: NewNonprofit) -> Result<DocRef, AppError> {
        let mut fields = Fields::new();
        fields.insert(
            "contact_email".into(),
            Value::List(vec![Value::text(nonprofit.contact_email)]),
        );
        fields.insert(
            "contact_people".into(),
            Value::List(vec![Value::text(nonprofit.contact_name)]),
        );
        fields.insert("name".into(), Value::text(nonprofit.name));
        fields.insert("slack_channel".into(), Value::text(nonprofit.slack_channel));
        fields.insert("website".into(), Value::text(nonprofit.website));
        fields.insert("description".into(), Value::text(nonprofit.description));
        fields.insert(
            "problem_statements".into(),
            refs_from_ids(collections::PROBLEM_STATEMENTS, &nonprofit.problem_statement_ids),
        );

        let reference = self.store.add(collections::NONPROFITS, fields).await?;
        info!(nonprofit_id = %reference.id, "Saved nonprofit");
        self.cache.invalidate_all();
        Ok(reference)
    }

    #[instrument(skip(self, update), fields(nonprofit_id = %update.id))]
    pub async fn update_nonprofit(&self, update: NonprofitUpdate) -> Result<(), AppError> {
        let reference = DocRef::new(collections::NONPROFITS, &update.id);
        let mut fields = Fields::new();
        fields.insert(
            "problem_statements".into(),
            refs_from_ids(collections::PROBLEM_STATEMENTS, &update.problem_statement_ids),
        );

        self.store
            .update(&reference, fields)
            .await
            .map_err(|err| match err {
                RepoError::NotFound(_) => AppError::not_found("nonprofit", update.id.clone()),
                other => AppError::from(other),
            })?;
        info!("Updated nonprofit problem statements");
        self.cache.invalidate_all();
        Ok(())
    }

    /// Delete a nonprofit. Removing an absent nonprofit succeeds.
    #[instrument(skip(self))]
    pub async fn remove_nonprofit(&self, id: &str) -> Result<(), AppError> {
        if id.trim().is_empty() {
            return Err(AppError::validation("missing field `id`"));
        }
        self.store
            .delete(&DocRef::new(collections::NONPROFITS, id))
            .await?;
        info!(nonprofit_id = id, "Removed nonprofit");
        self.cache.invalidate_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::application::relations::test_support::{harness, ids};
    use crate::application::repos::DocumentStore;

    use super::*;

    #[tokio::test]
    async fn save_converts_problem_statement_ids_to_references() {
        let h = harness(json!({}));
        let reference = h
            .maintainer
            .save_nonprofit(NewNonprofit {
                contact_name: "Jo".into(),
                contact_email: "jo@example.org".into(),
                name: "Food Rescue".into(),
                slack_channel: "npo-food".into(),
                website: "https://food.example".into(),
                description: "Routes surplus food".into(),
                problem_statement_ids: vec!["ps1".into(), "ps2".into()],
            })
            .await
            .expect("saved");

        assert_eq!(
            ids(&h.store, &reference, "problem_statements").await,
            vec!["ps1", "ps2"]
        );
        let saved = h.store.get(&reference).await.expect("get").expect("exists");
        assert_eq!(saved.get_str("name"), Some("Food Rescue"));
    }

    #[tokio::test]
    async fn update_replaces_problem_statements() {
        let h = harness(json!({
            "nonprofits": {"n1": {"name": "Food Rescue", "problem_statements": [{"$ref": "problem_statements/ps1"}]}}
        }));
        h.maintainer
            .update_nonprofit(NonprofitUpdate {
                id: "n1".into(),
                problem_statement_ids: vec!["ps9".into()],
            })
            .await
            .expect("updated");
        let reference = DocRef::new(collections::NONPROFITS, "n1");
        assert_eq!(ids(&h.store, &reference, "problem_statements").await, vec!["ps9"]);
    }

    #[tokio::test]
    async fn update_of_missing_nonprofit_is_not_found() {
        let h = harness(json!({}));
        let err = h
            .maintainer
            .update_nonprofit(NonprofitUpdate {
                id: "ghost".into(),
                problem_statement_ids: Vec::new(),
            })
            .await
            .expect_err("missing");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn remove_deletes_the_document() {
        let h = harness(json!({"nonprofits": {"n1": {"name": "Food Rescue"}}}));
        h.maintainer.remove_nonprofit("n1").await.expect("removed");
        let reference = DocRef::new(collections::NONPROFITS, "n1");
        assert!(h.store.get(&reference).await.expect("get").is_none());
    }
}
