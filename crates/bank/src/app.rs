use std::sync::Arc;

use serde_json::{json, Value};
use tellerkit_web::{handler, Export, Exports, Handler, Middleware, ModuleError, ModuleScope};
use tracing::info;

use crate::data::{self, SharedAccounts, User};
use crate::error::BankError;

fn index(accounts: SharedAccounts) -> Arc<dyn Handler> {
    handler(move |_req, res| {
        let accounts = accounts.to_value()?;
        res.render(
            "index",
            json!({ "title": "Account Summary", "accounts": accounts }),
        )
    })
}

fn profile(users: Vec<User>) -> Arc<dyn Handler> {
    handler(move |_req, res| {
        let user = users
            .first()
            .ok_or_else(|| BankError::Data {
                path: "users.json".into(),
                reason: "no users".into(),
            })?;
        res.render("profile", json!({ "user": user }))
    })
}

pub fn entry(scope: &ModuleScope<'_>) -> Result<Exports, ModuleError> {
    let layout = scope.layout();
    let data = scope.require("data")?;
    let accounts = data::shared_accounts(&data)?;
    let users = data::users(&data).map_err(|e| scope.fail(e))?;
    let write_json = data.procedure("writeJSON")?;
    let account_routes = scope.require("routes/accounts")?.router("router")?;
    let services_routes = scope.require("routes/services")?.router("router")?;

    let mut app = scope.framework().application();
    app.set("views", Value::String(layout.views().display().to_string()));
    app.set("view engine", json!("ejs"));
    app.use_middleware(Middleware::Static(layout.public()));
    app.use_middleware(Middleware::UrlEncoded);

    app.get("/", index(accounts.clone()));
    app.get("/profile", profile(users.clone()));

    app.mount("/account", account_routes.clone());
    app.mount("/services", services_routes.clone());

    let port = layout.port;
    app.listen(
        port,
        Box::new(move || info!(port, "PS Project Running on port {port}!")),
    );

    let users = serde_json::to_value(&users).map_err(|e| scope.fail(e))?;
    Ok(Exports::new(scope.name())
        .with("app", Export::App(Arc::from(app)))
        .with("accounts", Export::Live(Arc::new(accounts)))
        .with("users", Export::Json(users))
        .with("writeJSON", Export::Procedure(write_json))
        .with("accountRoutes", Export::Router(account_routes))
        .with("servicesRoutes", Export::Router(services_routes)))
}
