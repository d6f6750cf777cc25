pub mod cascade;
pub mod resolver;

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque identifier of a catalog record, kept in the backend's own string form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub String);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: EntryId,
    pub label: String,
    /// Estimated unit cost carried by item-description records; absent elsewhere.
    pub unit_cost: Option<Decimal>,
}

/// Logical catalog served by the procurement backend. Each domain owns a fixed,
/// ordered list of candidate endpoints; the first candidate that answers with a
/// non-empty collection wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogDomain {
    AdministrativeUnit,
    Department,
    Project,
    FundingSource,
    BudgetUnit,
    Agreement,
    Category,
    Tender,
    ExternalService,
    Product,
    UnitOfMeasure,
    ItemDescription,
}

const ITEM_DESCRIPTION_BASES: &[&str] =
    &["/catalogs/item-descriptions/", "/item-descriptions/", "/catalogs/descriptions/"];

impl CatalogDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdministrativeUnit => "administrative_unit",
            Self::Department => "department",
            Self::Project => "project",
            Self::FundingSource => "funding_source",
            Self::BudgetUnit => "budget_unit",
            Self::Agreement => "agreement",
            Self::Category => "category",
            Self::Tender => "tender",
            Self::ExternalService => "external_service",
            Self::Product => "product",
            Self::UnitOfMeasure => "unit_of_measure",
            Self::ItemDescription => "item_description",
        }
    }

    /// Whether this domain's endpoints are parameterized by a parent entry.
    pub fn is_scoped(&self) -> bool {
        matches!(self, Self::ItemDescription)
    }

    /// Ordered candidate endpoints, with the scope parameter substituted when the
    /// domain requires one. A scoped domain with no scope has nothing to probe.
    pub fn candidate_endpoints(&self, scope: Option<&EntryId>) -> Vec<String> {
        match self {
            Self::ItemDescription => {
                let Some(product) = scope else {
                    return Vec::new();
                };
                let mut endpoints = Vec::with_capacity(ITEM_DESCRIPTION_BASES.len() * 2);
                for base in ITEM_DESCRIPTION_BASES {
                    endpoints.push(format!("{base}?product={product}"));
                }
                for base in ITEM_DESCRIPTION_BASES {
                    endpoints.push(format!("{base}?product_id={product}"));
                }
                endpoints
            }
            _ => self.static_candidates().iter().map(|endpoint| (*endpoint).to_string()).collect(),
        }
    }

    fn static_candidates(&self) -> &'static [&'static str] {
        match self {
            Self::AdministrativeUnit => {
                &["/catalogs/administrative-units/", "/catalogs/administrative_units/"]
            }
            Self::Department => &[
                "/catalogs/departments/",
                "/catalogs/requesting-departments/",
                "/catalogs/requesting_departments/",
            ],
            Self::Project => &["/catalogs/projects/"],
            Self::FundingSource => {
                &["/catalogs/funding-sources/", "/catalogs/funding_sources/", "/catalogs/funding/"]
            }
            Self::BudgetUnit => &["/catalogs/budget-units/", "/catalogs/budget_units/"],
            Self::Agreement => &["/catalogs/agreements/"],
            Self::Category => &["/catalogs/categories/"],
            Self::Tender => &["/catalogs/tenders/"],
            Self::ExternalService => {
                &["/catalogs/external-services/", "/catalogs/external_services/", "/catalogs/services/"]
            }
            Self::Product => {
                &["/catalogs/products/", "/products/", "/catalogs/items/", "/catalogs/expense-objects/"]
            }
            Self::UnitOfMeasure => {
                &["/catalogs/units/", "/catalogs/measurement-units/", "/catalogs/uoms/", "/units/"]
            }
            Self::ItemDescription => ITEM_DESCRIPTION_BASES,
        }
    }
}

impl fmt::Display for CatalogDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const ID_FIELDS: &[&str] = &["id", "pk", "uuid"];
const CODE_FIELDS: &[&str] = &["code", "clave", "codigo"];
const NAME_FIELDS: &[&str] = &["name", "nombre", "description", "descripcion", "text", "label"];
const COST_FIELDS: &[&str] = &["estimated_unit_cost", "costo", "cost"];

/// Accepts either a bare collection or a `{results: [...]}` envelope. Anything
/// else is a shape failure for the candidate that produced it.
pub fn normalize_collection(payload: &Value) -> Option<Vec<Value>> {
    match payload {
        Value::Array(records) => Some(records.clone()),
        Value::Object(envelope) => match envelope.get("results") {
            Some(Value::Array(records)) => Some(records.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Normalizes one heterogeneous source record into a canonical entry. Records
/// without a usable identifier are dropped.
pub fn entry_from_record(record: &Value) -> Option<CatalogEntry> {
    let id = scalar_field(record, ID_FIELDS)?;
    let code = scalar_field(record, CODE_FIELDS);
    let name = scalar_field(record, NAME_FIELDS);

    let label = match (code, name) {
        (Some(code), Some(name)) => format!("{code} - {name}"),
        (None, Some(name)) => name,
        (Some(code), None) => code,
        (None, None) => id.clone(),
    };

    let unit_cost = scalar_field(record, COST_FIELDS)
        .and_then(|raw| Decimal::from_str(raw.trim()).ok())
        .filter(|cost| cost > &Decimal::ZERO);

    Some(CatalogEntry { id: EntryId(id), label, unit_cost })
}

fn scalar_field(record: &Value, keys: &[&str]) -> Option<String> {
    let object = record.as_object()?;
    for key in keys {
        match object.get(*key) {
            Some(Value::String(value)) if !value.trim().is_empty() => {
                return Some(value.trim().to_string());
            }
            Some(Value::Number(value)) => return Some(value.to_string()),
            _ => {}
        }
    }
    None
}
