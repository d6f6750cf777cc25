use reqdraft_api::ApiClient;
use reqdraft_core::config::{AppConfig, LoadOptions};
use reqdraft_core::{CatalogDomain, CatalogResolver, EntryId};

use super::CommandResult;

const COMMAND: &str = "probe";

pub fn run(domain_raw: &str, product: Option<&str>) -> CommandResult {
    let Some(domain) = parse_domain(domain_raw) else {
        return CommandResult::failure(
            COMMAND,
            "unknown_domain",
            format!("`{domain_raw}` is not a catalog domain"),
            2,
        );
    };

    if domain.is_scoped() && product.is_none() {
        return CommandResult::failure(
            COMMAND,
            "missing_scope",
            format!("domain `{domain}` needs --product <id>"),
            2,
        );
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2);
        }
    };
    let client = match ApiClient::new(&config.api) {
        Ok(client) => client,
        Err(error) => return CommandResult::failure(COMMAND, "client_build", error.to_string(), 1),
    };
    let runtime = match super::command_runtime() {
        Ok(runtime) => runtime,
        Err(error) => return CommandResult::failure(COMMAND, "runtime", error.to_string(), 1),
    };

    let resolver = CatalogResolver::new(client);
    let scope = product.map(|id| EntryId(id.to_string()));
    let entries = runtime.block_on(resolver.resolve_scoped(domain, scope.as_ref()));

    if entries.is_empty() {
        // Empty is the contract's "unavailable", not an error.
        return CommandResult::success(
            COMMAND,
            format!("domain `{domain}` resolved to 0 entries (unavailable)"),
        );
    }

    let preview: Vec<&str> =
        entries.iter().take(5).map(|entry| entry.label.as_str()).collect();
    CommandResult::success(
        COMMAND,
        format!(
            "domain `{domain}` resolved to {} entries; first: {}",
            entries.len(),
            preview.join(" | ")
        ),
    )
}

pub(crate) fn parse_domain(raw: &str) -> Option<CatalogDomain> {
    let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
    [
        CatalogDomain::AdministrativeUnit,
        CatalogDomain::Department,
        CatalogDomain::Project,
        CatalogDomain::FundingSource,
        CatalogDomain::BudgetUnit,
        CatalogDomain::Agreement,
        CatalogDomain::Category,
        CatalogDomain::Tender,
        CatalogDomain::ExternalService,
        CatalogDomain::Product,
        CatalogDomain::UnitOfMeasure,
        CatalogDomain::ItemDescription,
    ]
    .into_iter()
    .find(|domain| domain.as_str() == normalized)
}
