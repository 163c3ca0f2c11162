use tracing::{info, instrument};

use crate::application::error::AppError;
use crate::domain::documents::{DocRef, Fields, Value, collections};
use crate::domain::payloads::NewHackathon;

use super::{RelationshipMaintainer, refs_from_ids};

impl RelationshipMaintainer {
    /// Insert a hackathon, or replace it when `event_id` names an existing id.
    #[instrument(skip(self, hackathon), fields(start_date = %hackathon.start_date))]
    pub async fn save_hackathon(&self, hackathon: NewHackathon) -> Result<DocRef, AppError> {
        let mut devpost = Fields::new();
        devpost.insert("name".into(), Value::text("DevPost"));
        devpost.insert("link".into(), Value::text(hackathon.devpost_url));

        let mut fields = Fields::new();
        fields.insert("links".into(), Value::List(vec![Value::Map(devpost)]));
        fields.insert("location".into(), Value::text(hackathon.location));
        fields.insert("start_date".into(), Value::text(hackathon.start_date));
        fields.insert("end_date".into(), Value::text(hackathon.end_date));
        fields.insert("type".into(), Value::text(hackathon.event_type));
        fields.insert("image_url".into(), Value::text(hackathon.image_url));
        fields.insert(
            "nonprofits".into(),
            refs_from_ids(collections::NONPROFITS, &hackathon.nonprofit_ids),
        );
        fields.insert(
            "teams".into(),
            refs_from_ids(collections::TEAMS, &hackathon.team_ids),
        );

        let reference = match hackathon.event_id {
            Some(event_id) => {
                fields.insert("event_id".into(), Value::text(&event_id));
                let reference = DocRef::new(collections::HACKATHONS, event_id);
                self.store.set(&reference, fields, false).await?;
                reference
            }
            None => self.store.add(collections::HACKATHONS, fields).await?,
        };

        info!(hackathon_id = %reference.id, "Saved hackathon");
        self.cache.invalidate_all();
        Ok(reference)
    }
}
