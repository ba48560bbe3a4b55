//! Built-in catalog of the stock product modules.

use entitle_core::{FeatureId, ModuleId};

use crate::catalog::{Feature, Module, PolicyCatalog};

fn module(id: &'static str, name: &'static str, category: &'static str, mandatory: bool) -> Module {
    Module {
        id: ModuleId::new(id),
        name: name.to_string(),
        description: None,
        category: Some(category.to_string()),
        mandatory,
    }
}

fn feature(id: &'static str, module_id: &'static str, name: &'static str) -> Feature {
    Feature {
        id: FeatureId::new(id),
        module_id: ModuleId::new(module_id),
        name: name.to_string(),
        description: None,
    }
}

/// The stock catalog shipped with the product.
///
/// Deployments with custom modules build their own [`PolicyCatalog`] instead;
/// the engine does not treat this set specially.
pub fn builtin() -> PolicyCatalog {
    let modules = vec![
        module("mod_tasks", "Routines & Execution", "Core", true),
        module("mod_finance", "Financial Management", "Finance", false),
        module("mod_commercial", "Commercial Management", "Sales", false),
        module("mod_reports", "Advanced Reports", "Analytics", false),
        module("mod_api", "Public API", "Dev", false),
    ];

    let features = vec![
        feature("tasks_overview", "mod_tasks", "Overview"),
        feature("tasks_list", "mod_tasks", "Tasks"),
        feature("tasks_projects", "mod_tasks", "Projects"),
        feature("tasks_teams", "mod_tasks", "Teams"),
        feature("tasks_calendar", "mod_tasks", "Calendar"),
        feature("finance_overview", "mod_finance", "Overview"),
        feature("finance_transactions", "mod_finance", "Transactions"),
        feature("finance_banking", "mod_finance", "Accounts & Banks"),
        feature("finance_categories", "mod_finance", "Categories"),
        feature("finance_cards", "mod_finance", "Cards"),
        feature("crm_overview", "mod_commercial", "Overview"),
        feature("crm_contacts", "mod_commercial", "Contacts"),
        feature("crm_budgets", "mod_commercial", "Quotes"),
        feature("crm_contracts", "mod_commercial", "Contracts"),
        feature("crm_catalogs", "mod_commercial", "Catalogs"),
        feature("reports_dre", "mod_reports", "Management P&L"),
        feature("reports_cashflow", "mod_reports", "Cash Flow"),
        feature("reports_sales", "mod_reports", "Sales Performance"),
        feature("reports_export", "mod_reports", "Spreadsheet Export"),
        feature("api_keys", "mod_api", "API Keys"),
        feature("api_webhooks", "mod_api", "Webhooks"),
        feature("api_docs", "mod_api", "Documentation"),
        feature("api_limiting", "mod_api", "Rate Limiting"),
    ];

    // The built-in set is maintained alongside this file; a mistake here is a
    // programming error, not a runtime condition.
    match PolicyCatalog::new(modules, features) {
        Ok(catalog) => catalog,
        Err(e) => unreachable!("built-in catalog is invalid: {e}"),
    }
}
