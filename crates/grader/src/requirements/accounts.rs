use serde_json::Value;

use super::{
    drive, has_keys, include, include_account, read_as_text, requirement, ACCOUNT_KEYS, USER_KEYS,
};
use crate::context::GradingContext;
use crate::doubles::mock_req;
use crate::error::CheckError;
use crate::intercept::wrap_renderer;
use crate::suite::{Check, CheckResult, Group, Requirement};
use crate::{ensure, fail};

pub(super) fn requirements() -> Vec<Requirement> {
    let accounts = |tag: &'static str, title: &'static str, check: Check| {
        requirement(Group::Accounts, tag, title, check)
    };
    vec![
        accounts("account-ejs-show-transactions", "The account view includes its transactions", show_transactions),
        accounts("app-get-other-account-routes", "Credit and checking routes render the account view", other_account_routes),
        accounts("app-get-profile-route", "Profile route renders the first user", profile_route),
        accounts("app-get-savings-account-route", "Savings route renders the account view", savings_route),
        accounts("app-read-account-data", "Account data is read as text and parsed", read_account_data),
        accounts("app-read-user-data", "User data is read as text and parsed", read_user_data),
        accounts("app-update-index-route", "Index route passes the accounts", update_index_route),
        accounts("index-ejs-update-view", "The index view shows account summaries", update_index_view),
        accounts("profile-ejs-create-view-file", "The profile view file exists", profile_file),
        accounts("profile-ejs-create-view", "The profile view has its content", profile_view),
    ]
}

fn show_transactions(ctx: &mut GradingContext) -> CheckResult {
    let view = ctx.view("account")?;
    view.compile()?;
    view.require(
        &include_account("transactions", "account"),
        "Have you included the `transactions` view in `account.ejs`?",
    )?;
    Ok(())
}

/// Drive the GET route of one account page and check it renders `account`.
fn account_route(ctx: &GradingContext, name: &str) -> CheckResult {
    let app = ctx.app()?;
    let paths = [format!("/{name}"), format!("/account/{name}")];
    let paths = [paths[0].as_str(), paths[1].as_str()];
    let driven = drive(
        &app,
        &paths,
        "get",
        mock_req(),
        &format!("The {name} get route has not been created."),
    )?;
    ensure!(
        driven.res.render.called(),
        "The {name} get route is not calling res.render."
    );
    ensure!(
        driven.view().as_deref() == Some("account"),
        "The {name} route does not seem to be rendering the `account` view."
    );
    let locals = driven.locals();
    ensure!(
        locals.as_ref().is_some_and(Value::is_object),
        "The {name} route res.render may be missing arguments."
    );
    ensure!(
        has_keys(locals.as_ref(), &["account"]),
        "The {name} route may be missing an object with an account key value pair."
    );
    Ok(())
}

fn other_account_routes(ctx: &mut GradingContext) -> CheckResult {
    account_route(ctx, "credit")?;
    account_route(ctx, "checking")
}

fn savings_route(ctx: &mut GradingContext) -> CheckResult {
    account_route(ctx, "savings")
}

fn profile_route(ctx: &mut GradingContext) -> CheckResult {
    let app = ctx.app()?;
    let mut spy = wrap_renderer(&app);
    ctx.client()?.get("/profile").end()?;
    spy.restore();
    let Some(call) = spy.first_call() else {
        fail!("The profile route may have not been created.");
    };
    ensure!(
        call.view == "profile",
        "The profile route does not seem to be rendering the `profile` view."
    );
    ensure!(
        call.locals.pointer("/user/name") == Some(&Value::from("PS User")),
        "The profile route may be missing a user object."
    );
    Ok(())
}

/// Check a raw data binding (`accountData`, `userData`) and its parsed
/// counterpart, from the data module once it exists or the app module before.
fn read_data(ctx: &GradingContext, raw: &str, parsed: &str) -> Result<Value, CheckError> {
    ctx.app()?;
    let (exports, module) = if ctx.module_exists("data") {
        (ctx.module("data"), "data")
    } else {
        (ctx.exports().ok().cloned(), "app")
    };
    let file = ctx.module_path(module);
    let Some(exports) = exports else {
        fail!("Has the `{raw}` variable been created in `{file}`?");
    };
    let Some(raw_export) = exports.get(raw) else {
        fail!("Has the `{raw}` variable been created in `{file}`?");
    };
    let Some(value) = exports.get(parsed).and_then(|export| export.snapshot()) else {
        fail!("Has the `{parsed}` variable been created in `{file}`?");
    };
    ensure!(
        read_as_text(raw_export),
        "It is best if you specify an encoding like \"utf8\" when reading from a file (`read` function)."
    );
    Ok(value)
}

fn read_account_data(ctx: &mut GradingContext) -> CheckResult {
    let accounts = read_data(ctx, "accountData", "accounts")?;
    ensure!(
        accounts.is_object(),
        "The accounts variable does not contain the correct information."
    );
    ensure!(
        has_keys(Some(&accounts), &ACCOUNT_KEYS),
        "The accounts variable does not contain the correct information. Check the accounts.json file."
    );
    Ok(())
}

fn read_user_data(ctx: &mut GradingContext) -> CheckResult {
    let users = read_data(ctx, "userData", "users")?;
    ensure!(
        users.is_array() || users.is_object(),
        "The users variable does not contain the correct information."
    );
    ensure!(
        has_keys(users.get(0), &USER_KEYS),
        "The users variable does not contain the correct information."
    );
    Ok(())
}

fn update_index_route(ctx: &mut GradingContext) -> CheckResult {
    let app = ctx.app()?;
    let mut spy = wrap_renderer(&app);
    ctx.client()?.get("/").end()?;
    spy.restore();
    let Some(call) = spy.first_call() else {
        fail!("The index route may have not been created.");
    };
    ensure!(
        call.view == "index",
        "The index route does not seem to be rendering the `index` view."
    );
    ensure!(
        call.locals.get("title") == Some(&Value::from("Account Summary")),
        "The index route object `title` key value pair was not updated."
    );
    ensure!(
        has_keys(call.locals.get("accounts"), &ACCOUNT_KEYS),
        "The index route object may be missing an `accounts: accounts` key value pair."
    );
    Ok(())
}

fn update_index_view(ctx: &mut GradingContext) -> CheckResult {
    let view = ctx.view("index")?;
    view.compile()?;
    view.require(&include("header"), "Have you included the `header` view?")?;
    view.require(
        r#"<div\s+class\s*=\s*("|'|\s*)container(\s*|"|')>"#,
        "The `div` with a class of `container` can not be found.",
    )?;
    view.require(
        r"<h1>\s*<%=\s*title\s*%>\s*</h1>",
        "The `title` variable seems to be missing.",
    )?;
    view.require(
        r#"<a\s+href=('|")?/profile('|")?>\s*(P|p)rofile\s*</a>"#,
        "The `profile` link seems to be missing.",
    )?;
    for account in ACCOUNT_KEYS {
        view.require(
            &include_account("summary", &format!("accounts.{account}")),
            &format!("Have you included the `summary` view for the `{account}` account?"),
        )?;
    }
    view.require(
        r#"<a\s+href=('|")?(/services)?/transfer('|")?>\s*(T|t)ransfer\s*</a>"#,
        "The `transfer` link seems to be missing.",
    )?;
    view.require(&include("footer"), "Have you included the `footer` view?")?;
    Ok(())
}

fn profile_file(ctx: &mut GradingContext) -> CheckResult {
    ensure!(ctx.view_exists("profile"), "The `profile.ejs` view file does not exist.");
    Ok(())
}

fn profile_view(ctx: &mut GradingContext) -> CheckResult {
    let view = ctx.view("profile")?;
    view.compile()?;
    view.require(&include("header"), "Have you included the `header` view?")?;
    for field in USER_KEYS {
        view.require(
            &format!(r"<%=\s*user.{field}\s*%>"),
            &format!("The users {field} is not displayed."),
        )?;
    }
    view.require(
        r"<h1>\s*Profile\s*</h1>",
        "The title `<h1>` element seems to be missing.",
    )?;
    view.require(
        r#"<a\s+href=('|")?/('|")?>(.*)</a>"#,
        "A link to the Account Summary seems to be missing.",
    )?;
    view.require(&include("footer"), "Have you included the `footer` view?")?;
    Ok(())
}
