use std::sync::Arc;

use serde_json::json;
use tellerkit_web::{handler, Export, Exports, Handler, ModuleError, ModuleScope};

use crate::data::{shared_accounts, SharedAccounts};

/// Account pages served by this router, by unique name.
pub const ACCOUNT_PAGES: [&str; 3] = ["savings", "checking", "credit"];

fn account_page(accounts: SharedAccounts, name: &'static str) -> Arc<dyn Handler> {
    handler(move |_req, res| {
        let account = accounts.account_value(name)?;
        res.render("account", json!({ "account": account }))
    })
}

pub fn entry(scope: &ModuleScope<'_>) -> Result<Exports, ModuleError> {
    let data = scope.require("data")?;
    let accounts = shared_accounts(&data)?;

    let router = scope.framework().router();
    for name in ACCOUNT_PAGES {
        router.get(&format!("/{name}"), account_page(accounts.clone(), name));
    }

    Ok(Exports::new(scope.name())
        .with("router", Export::Router(router))
        .with("accounts", Export::Live(Arc::new(accounts))))
}
