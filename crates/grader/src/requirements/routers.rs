use serde_json::json;
use tellerkit_web::{Export, Method, Router};

use super::{require_module_file, requirement, with_framework_double};
use crate::capture::Matcher;
use crate::context::GradingContext;
use crate::error::CheckError;
use crate::inspect::Markup;
use crate::locator::RouteLocator;
use crate::suite::{Check, CheckResult, Group, Requirement};
use crate::{ensure, fail};

pub(super) fn requirements() -> Vec<Requirement> {
    let routers = |tag: &'static str, title: &'static str, check: Check| {
        requirement(Group::Routers, tag, title, check)
    };
    vec![
        routers("app-require-account-routes", "App module takes the account router", require_account_routes),
        routers("app-require-services-routes", "App module takes the services router", require_services_routes),
        routers("app-use-account-routes", "Account router is mounted at /account", use_account_routes),
        routers("app-use-services-routes", "Services router is mounted at /services", use_services_routes),
        routers("routes-accounts-js-create-file", "The accounts routes file exists", accounts_file),
        routers("routes-accounts-js-export-router", "Accounts routes module exports its router", accounts_export),
        routers("routes-accounts-js-move-routes", "Account routes live on the accounts router", accounts_move),
        routers("routes-accounts-js-require-data", "Accounts routes module takes the accounts", accounts_data),
        routers("routes-accounts-js-require-express", "Accounts routes module creates its router", accounts_framework),
        routers("routes-services-js-create-file", "The services routes file exists", services_file),
        routers("routes-services-js-export-router", "Services routes module exports its router", services_export),
        routers("routes-services-js-move-routes", "Service routes live on the services router", services_move),
        routers("routes-services-js-require-data", "Services routes module takes the accounts and `writeJSON`", services_data),
        routers("routes-services-js-require-express", "Services routes module creates its router", services_framework),
        routers("views-update-for-routes", "Views link to the mounted routes", views_for_routes),
    ]
}

const ACCOUNTS: &str = "routes/accounts";
const SERVICES: &str = "routes/services";

fn require_routes(ctx: &GradingContext, binding: &str, module: &str) -> CheckResult {
    let exports = ctx.exports()?;
    let Some(export) = exports.get(binding) else {
        fail!(
            "Has the `{binding}` binding been exported from `{}`?",
            ctx.module_path("app")
        );
    };
    ensure!(
        export.as_router().is_some(),
        "Has the router been exported in `{}`?",
        ctx.module_path(module)
    );
    Ok(())
}

fn require_account_routes(ctx: &mut GradingContext) -> CheckResult {
    require_routes(ctx, "accountRoutes", ACCOUNTS)
}

fn require_services_routes(ctx: &mut GradingContext) -> CheckResult {
    require_routes(ctx, "servicesRoutes", SERVICES)
}

/// Load the app with a framework double and check it mounted the very router
/// `module` exports at `prefix`.
fn use_routes(ctx: &GradingContext, module: &str, prefix: &str, message: &str) -> CheckResult {
    require_module_file(ctx, module)?;
    let (framework, instance) =
        with_framework_double(ctx, "app", "The app module could not be loaded")?;
    let router = match instance.require(module).and_then(|e| e.router("router")) {
        Ok(router) => router,
        Err(_) => fail!("{message}"),
    };
    ensure!(
        framework
            .app()
            .mount
            .called_with_exactly(&[Matcher::Eq(json!(prefix)), Matcher::SameRouter(router)]),
        "{message}"
    );
    Ok(())
}

fn use_account_routes(ctx: &mut GradingContext) -> CheckResult {
    use_routes(ctx, ACCOUNTS, "/account", "Are you using your account routes?")
}

fn use_services_routes(ctx: &mut GradingContext) -> CheckResult {
    use_routes(ctx, SERVICES, "/services", "Are you using your services routes?")
}

fn routes_file(ctx: &GradingContext, module: &str) -> CheckResult {
    ensure!(
        ctx.fs().exists(&ctx.layout().source_root().join("routes")),
        "The `routes` dir does not exist."
    );
    require_module_file(ctx, module)
}

fn accounts_file(ctx: &mut GradingContext) -> CheckResult {
    routes_file(ctx, ACCOUNTS)
}

fn services_file(ctx: &mut GradingContext) -> CheckResult {
    routes_file(ctx, SERVICES)
}

/// A fresh load of a routes module and the router it exports.
fn exported_router(ctx: &GradingContext, module: &str) -> Result<Router, CheckError> {
    ctx.app()?;
    require_module_file(ctx, module)?;
    let file = ctx.module_path(module);
    let instance = match ctx.loader().load(module) {
        Ok(instance) => instance,
        Err(_) => fail!("The `{file}` file does not exist or can not be required."),
    };
    match instance.exports().get("router").and_then(Export::as_router) {
        Some(router) => Ok(router.clone()),
        None => fail!("`{file}` is not exporting the `router` function."),
    }
}

fn accounts_export(ctx: &mut GradingContext) -> CheckResult {
    exported_router(ctx, ACCOUNTS).map(|_| ())
}

fn services_export(ctx: &mut GradingContext) -> CheckResult {
    exported_router(ctx, SERVICES).map(|_| ())
}

fn paths_for(router: &Router, method: Method) -> Vec<String> {
    router
        .entries()
        .into_iter()
        .filter(|entry| entry.methods.contains(&method))
        .map(|entry| entry.path)
        .collect()
}

fn move_routes(
    ctx: &GradingContext,
    module: &str,
    expected: usize,
    count_message: &str,
    routes: &[(&str, Method, &str)],
) -> CheckResult {
    let router = exported_router(ctx, module)?;
    ensure!(router.len() == expected, "{count_message}");

    let app = ctx.app()?;
    let app_file = ctx.module_path("app");
    for (path, method, name) in routes {
        ensure!(
            app.locate_top_level(path, method.as_str()).is_none(),
            "The {name} route has not been removed from `{app_file}`."
        );
    }
    let router_name = module.trim_start_matches("routes/");
    for (path, method, name) in routes {
        ensure!(
            paths_for(&router, *method).iter().any(|p| p.as_str() == *path),
            "The {router_name} router does not contain a {name} route."
        );
    }
    Ok(())
}

fn accounts_move(ctx: &mut GradingContext) -> CheckResult {
    move_routes(
        ctx,
        ACCOUNTS,
        3,
        "Were all three routes moved to `accounts.rs` and added to the router?",
        &[
            ("/savings", Method::Get, "savings"),
            ("/checking", Method::Get, "checking"),
            ("/credit", Method::Get, "credit"),
        ],
    )
}

fn services_move(ctx: &mut GradingContext) -> CheckResult {
    move_routes(
        ctx,
        SERVICES,
        4,
        "Were all four routes moved to `services.rs`?",
        &[
            ("/transfer", Method::Get, "transfer get"),
            ("/transfer", Method::Post, "transfer post"),
            ("/payment", Method::Get, "payment get"),
            ("/payment", Method::Post, "payment post"),
        ],
    )
}

fn accounts_data(ctx: &mut GradingContext) -> CheckResult {
    ctx.app()?;
    require_module_file(ctx, ACCOUNTS)?;
    let file = ctx.module_path(ACCOUNTS);
    let exports = ctx.loader().load(ACCOUNTS).map(|i| i.exports().clone()).ok();
    let Some(accounts) = exports.as_ref().and_then(|e| e.get("accounts")) else {
        fail!("Has `data.rs` been required and the `accounts` binding been exported from `{file}`?");
    };
    ensure!(
        accounts.snapshot().is_some_and(|v| v.is_object()),
        "Is the `accounts` const an object?"
    );
    Ok(())
}

fn services_data(ctx: &mut GradingContext) -> CheckResult {
    ctx.app()?;
    require_module_file(ctx, SERVICES)?;
    let file = ctx.module_path(SERVICES);
    let exports = ctx.loader().load(SERVICES).map(|i| i.exports().clone()).ok();
    let Some(accounts) = exports.as_ref().and_then(|e| e.get("accounts")) else {
        fail!("Has an `accounts` binding been exported after requiring the `data` module in `{file}`?");
    };
    let Some(write_json) = exports.as_ref().and_then(|e| e.get("writeJSON")) else {
        fail!("Has the `writeJSON` function been exported after requiring the `data` module in `{file}`?");
    };
    ensure!(
        accounts.snapshot().is_some_and(|v| v.is_object()),
        "Is the `accounts` constant an object?"
    );
    ensure!(write_json.as_procedure().is_some(), "Is `writeJSON` a function?");
    Ok(())
}

/// Load a routes module with a framework double: its router must come from
/// the framework.
fn uses_framework(ctx: &GradingContext, module: &str) -> CheckResult {
    ctx.app()?;
    require_module_file(ctx, module)?;
    let file = ctx.module_path(module);
    let (framework, instance) =
        with_framework_double(ctx, module, &format!("The `{file}` module could not be loaded"))?;
    ensure!(
        framework.router.called(),
        "Has the framework been used to create the `router` in `{file}`?"
    );
    let Some(router) = instance.exports().get("router").and_then(Export::as_router) else {
        fail!("Has the `router` been added to `{file}`?");
    };
    ensure!(
        framework
            .router
            .called_with_exactly(&[Matcher::SameRouter(router.clone())]),
        "Has the `router` const been set to the router the framework created?"
    );
    Ok(())
}

fn accounts_framework(ctx: &mut GradingContext) -> CheckResult {
    uses_framework(ctx, ACCOUNTS)
}

fn services_framework(ctx: &mut GradingContext) -> CheckResult {
    uses_framework(ctx, SERVICES)
}

fn compiled_markup(ctx: &GradingContext, name: &str) -> Result<Markup, CheckError> {
    let view = ctx.view(name)?;
    view.compile()?;
    Ok(view.markup())
}

fn views_for_routes(ctx: &mut GradingContext) -> CheckResult {
    for name in ["index", "summary", "transfer", "payment", "account"] {
        ensure!(
            ctx.view_exists(name),
            "The `{}` file does not exist.",
            ctx.view_path(name)
        );
    }
    let index = compiled_markup(ctx, "index")?;
    let summary = compiled_markup(ctx, "summary")?;
    let transfer = compiled_markup(ctx, "transfer")?;
    let payment = compiled_markup(ctx, "payment")?;
    let account = compiled_markup(ctx, "account")?;

    let Some(transfer_link) = index.nth_attr("a", 1, "href")? else {
        fail!("The transfer link in `index.ejs` is missing.");
    };
    ensure!(
        transfer_link == "/services/transfer",
        "The transfer link in `index.ejs` has not been updated."
    );
    ensure!(
        summary.attr("a", "href")?.as_deref() == Some("/account/<%= account.unique_name %>"),
        "The account link in `summary.ejs` link has not been updated."
    );
    ensure!(
        transfer.attr("#transferForm", "action")?.as_deref() == Some("/services/transfer"),
        "The transfer form action attribute has not been updated."
    );
    ensure!(
        payment.attr("#paymentForm", "action")?.as_deref() == Some("/services/payment"),
        "The payment form action attribute has not been updated."
    );
    let Some(payment_link) = account.attr("a", "href")? else {
        fail!("The payment link has not been updated.");
    };
    ensure!(
        payment_link == "/services/payment",
        "The payment link in `account.ejs` has not been updated."
    );
    Ok(())
}
