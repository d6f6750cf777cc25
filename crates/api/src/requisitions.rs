use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use reqdraft_core::{
    DraftHeader, DraftItem, PersistedRequisition, PersistenceError, RequisitionId,
    RequisitionPersistence, ServerItemId,
};

use crate::client::ApiClient;

/// Persistence collaborator for the requisition resource. The backend owns
/// identifiers and the authoritative number; saving promotes every submitted
/// item with a server identity.
pub struct HttpRequisitionClient {
    client: Arc<ApiClient>,
}

impl HttpRequisitionClient {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RequisitionPersistence for HttpRequisitionClient {
    async fn save(
        &self,
        header: &DraftHeader,
        items: &[DraftItem],
    ) -> Result<PersistedRequisition, PersistenceError> {
        let payload = requisition_payload(header, items);
        let response = self.client.post_json("/requisitions/", &payload).await?;
        parse_persisted(&response).ok_or_else(|| {
            PersistenceError::Rejected(
                "requisition response carried no usable identifiers".to_string(),
            )
        })
    }
}

fn requisition_payload(header: &DraftHeader, items: &[DraftItem]) -> Value {
    let mut body = Map::new();
    body.insert("requesting_department".to_string(), id_value(header.department.as_ref()));
    body.insert("project".to_string(), id_value(header.project.as_ref()));
    body.insert("funding_source".to_string(), id_value(header.funding_source.as_ref()));
    body.insert("budget_unit".to_string(), id_value(header.budget_unit.as_ref()));
    body.insert("agreement".to_string(), id_value(header.agreement.as_ref()));
    body.insert("tender".to_string(), id_value(header.tender.as_ref()));
    body.insert("category".to_string(), id_value(header.category.as_ref()));
    body.insert("external_service".to_string(), id_value(header.external_service.as_ref()));
    body.insert("requisition_reason".to_string(), json!(header.reason));
    body.insert(
        "observations".to_string(),
        header.observations.as_deref().map(|remarks| json!(remarks)).unwrap_or(Value::Null),
    );
    body.insert(
        "items".to_string(),
        Value::Array(
            items
                .iter()
                .map(|item| {
                    json!({
                        "product": id_value(Some(&item.product_id)),
                        "quantity": item.quantity,
                        "unit": id_value(Some(&item.unit_id)),
                        "description": id_value(Some(&item.description_id)),
                    })
                })
                .collect(),
        ),
    );
    Value::Object(body)
}

/// Backend catalog keys are numeric; send them as numbers when they parse,
/// falling back to the raw string otherwise.
fn id_value(id: Option<&reqdraft_core::EntryId>) -> Value {
    match id {
        Some(id) => match id.0.parse::<i64>() {
            Ok(number) => json!(number),
            Err(_) => json!(id.0),
        },
        None => Value::Null,
    }
}

fn parse_persisted(response: &Value) -> Option<PersistedRequisition> {
    let id = response.get("id").and_then(scalar_string)?;
    let number = response
        .get("number")
        .and_then(scalar_string)
        .or_else(|| response.get("folio").and_then(scalar_string))
        .unwrap_or_else(|| id.clone());
    let item_ids = response
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").and_then(scalar_string))
                .map(ServerItemId)
                .collect()
        })
        .unwrap_or_default();

    Some(PersistedRequisition { id: RequisitionId(id), number, item_ids })
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use reqdraft_core::{
        CatalogDomain, DraftHeader, DraftLedger, EntryId, NewDraftItem, SessionContext,
    };

    use super::{parse_persisted, requisition_payload};

    fn header() -> DraftHeader {
        let session =
            SessionContext::new("Recursos Materiales", "Ana Torres").expect("valid session");
        let mut header = DraftHeader::seeded(
            &session,
            NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date"),
        );
        header.set_selection(CatalogDomain::Department, Some(EntryId("1".to_string())));
        header.set_selection(CatalogDomain::Project, Some(EntryId("2".to_string())));
        header.reason = "Reposición de consumibles".to_string();
        header
    }

    #[test]
    fn payload_uses_backend_field_names_and_numeric_ids() {
        let mut ledger = DraftLedger::new();
        ledger
            .add(NewDraftItem {
                product_id: Some(EntryId("10".to_string())),
                quantity: Some(2.0),
                unit_id: Some(EntryId("20".to_string())),
                description_id: Some(EntryId("30".to_string())),
                estimated_unit_cost: None,
            })
            .expect("valid item");

        let payload = requisition_payload(&header(), ledger.items());

        assert_eq!(payload["requesting_department"], json!(1));
        assert_eq!(payload["requisition_reason"], json!("Reposición de consumibles"));
        assert_eq!(payload["observations"], json!(null));
        assert_eq!(payload["funding_source"], json!(null));
        assert_eq!(payload["items"][0]["product"], json!(10));
        assert_eq!(payload["items"][0]["quantity"], json!(2.0));
    }

    #[test]
    fn persisted_response_parses_ids_number_and_item_identities_in_order() {
        let response = json!({
            "id": 501,
            "number": 43,
            "items": [{"id": 700}, {"id": 701}]
        });

        let persisted = parse_persisted(&response).expect("usable response");

        assert_eq!(persisted.id.0, "501");
        assert_eq!(persisted.number, "43");
        assert_eq!(persisted.item_ids.len(), 2);
        assert_eq!(persisted.item_ids[0].0, "700");
    }

    #[test]
    fn number_falls_back_to_the_requisition_id() {
        let response = json!({"id": "77"});
        let persisted = parse_persisted(&response).expect("usable response");

        assert_eq!(persisted.number, "77");
        assert!(persisted.item_ids.is_empty());
    }
}
