use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogDomain, CatalogEntry, EntryId};
use crate::session::SessionContext;

/// Header-step domains in display order. AdministrativeUnit is carried but not
/// required: it is back-office data the backend may not even serve, and an
/// unavailable catalog must never deadlock the wizard.
pub const HEADER_DOMAINS: &[CatalogDomain] = &[
    CatalogDomain::AdministrativeUnit,
    CatalogDomain::Department,
    CatalogDomain::Project,
    CatalogDomain::FundingSource,
    CatalogDomain::BudgetUnit,
    CatalogDomain::Agreement,
    CatalogDomain::Category,
    CatalogDomain::Tender,
    CatalogDomain::ExternalService,
];

const REQUIRED_DOMAINS: &[CatalogDomain] = &[
    CatalogDomain::Department,
    CatalogDomain::Project,
    CatalogDomain::FundingSource,
    CatalogDomain::BudgetUnit,
    CatalogDomain::Agreement,
    CatalogDomain::Category,
    CatalogDomain::Tender,
    CatalogDomain::ExternalService,
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DraftHeader {
    pub administrative_unit: Option<EntryId>,
    pub department: Option<EntryId>,
    pub project: Option<EntryId>,
    pub funding_source: Option<EntryId>,
    pub budget_unit: Option<EntryId>,
    pub agreement: Option<EntryId>,
    pub category: Option<EntryId>,
    pub tender: Option<EntryId>,
    pub external_service: Option<EntryId>,
    /// Free-text justification for the requisition; required.
    pub reason: String,
    /// Free-text remarks; optional.
    pub observations: Option<String>,
    /// Requester display name, derived from the session context.
    pub requested_by: String,
    /// Session department text, matched against the Department catalog once it
    /// resolves.
    pub department_hint: String,
    pub created_on: NaiveDate,
}

impl DraftHeader {
    /// Empty header seeded from the read-only session context.
    pub fn seeded(session: &SessionContext, today: NaiveDate) -> Self {
        Self {
            administrative_unit: None,
            department: None,
            project: None,
            funding_source: None,
            budget_unit: None,
            agreement: None,
            category: None,
            tender: None,
            external_service: None,
            reason: String::new(),
            observations: None,
            requested_by: session.display_name.clone(),
            department_hint: session.department.clone(),
            created_on: today,
        }
    }

    pub fn selection(&self, domain: CatalogDomain) -> Option<&EntryId> {
        match domain {
            CatalogDomain::AdministrativeUnit => self.administrative_unit.as_ref(),
            CatalogDomain::Department => self.department.as_ref(),
            CatalogDomain::Project => self.project.as_ref(),
            CatalogDomain::FundingSource => self.funding_source.as_ref(),
            CatalogDomain::BudgetUnit => self.budget_unit.as_ref(),
            CatalogDomain::Agreement => self.agreement.as_ref(),
            CatalogDomain::Category => self.category.as_ref(),
            CatalogDomain::Tender => self.tender.as_ref(),
            CatalogDomain::ExternalService => self.external_service.as_ref(),
            _ => None,
        }
    }

    /// Sets one header selection. Item-step domains are not header fields and
    /// are ignored; returns whether the domain was accepted.
    pub fn set_selection(&mut self, domain: CatalogDomain, value: Option<EntryId>) -> bool {
        let slot = match domain {
            CatalogDomain::AdministrativeUnit => &mut self.administrative_unit,
            CatalogDomain::Department => &mut self.department,
            CatalogDomain::Project => &mut self.project,
            CatalogDomain::FundingSource => &mut self.funding_source,
            CatalogDomain::BudgetUnit => &mut self.budget_unit,
            CatalogDomain::Agreement => &mut self.agreement,
            CatalogDomain::Category => &mut self.category,
            CatalogDomain::Tender => &mut self.tender,
            CatalogDomain::ExternalService => &mut self.external_service,
            _ => return false,
        };
        *slot = value;
        true
    }

    /// Required header fields that are still empty, named for inline display.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        for domain in REQUIRED_DOMAINS {
            if self.selection(*domain).is_none() {
                missing.push(domain.as_str());
            }
        }
        if self.reason.trim().is_empty() {
            missing.push("reason");
        }
        missing
    }

    /// Resolves the session's department text against the resolved Department
    /// catalog: exact name match first, then a containment match on either the
    /// entry label or its id (the session text often carries "CODE - Name").
    pub fn resolve_department(&mut self, entries: &[CatalogEntry]) -> Option<&EntryId> {
        if self.department.is_some() {
            return self.department.as_ref();
        }
        let hint = self.department_hint.trim();
        if hint.is_empty() {
            return None;
        }

        let matched = entries
            .iter()
            .find(|entry| entry.label == hint)
            .or_else(|| {
                entries
                    .iter()
                    .find(|entry| hint.contains(&entry.label) || hint.contains(&entry.id.0))
            })
            .map(|entry| entry.id.clone());
        self.department = matched;
        self.department.as_ref()
    }
}
