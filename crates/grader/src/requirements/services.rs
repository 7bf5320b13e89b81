use serde_json::{json, Value};
use tellerkit_web::Request;

use super::{
    accounts_now, balance, check_write, drive, has_keys, requirement, spy_write_json,
    written_accounts, ACCOUNT_KEYS, PAYMENT_PATHS, TRANSFER_PATHS,
};
use crate::capture::Matcher;
use crate::context::GradingContext;
use crate::doubles::{mock_req, mock_req_with, mock_res};
use crate::error::CheckError;
use crate::locator::RouteLocator;
use crate::suite::{Check, CheckResult, Group, Requirement};
use crate::{ensure, fail};

const TRANSFER_MISSING: &str = "The transfer post route may not exist.";
const UTF8: &str = "It is best if you encode the string as utf8.";

pub(super) fn requirements() -> Vec<Requirement> {
    let services = |tag: &'static str, title: &'static str, check: Check| {
        requirement(Group::Services, tag, title, check)
    };
    vec![
        services("app-get-transfer-route", "Transfer form route renders", get_transfer),
        services("app-payment-feature", "Credit payments update balances and persist", payment_feature),
        services("app-post-transfer-route-convert-json", "Transfers persist the accounts as JSON", convert_json),
        services("app-post-transfer-route-from-balance", "Transfers debit the `from` account", from_balance),
        services("app-post-transfer-route-redirect", "Transfers render the completion message", transfer_message),
        services("app-post-transfer-route-to-balance", "Transfers credit the `to` account", to_balance),
        services("app-post-transfer-route-write-json", "Transfers write the accounts file", transfer_write),
        services("app-post-transfer-route", "Transfer post route exists", post_transfer),
        services("app-urlencoded-form-data", "Form bodies are decoded", urlencoded),
        services("transfer-ejs-update-view", "The transfer view has its form", transfer_view),
    ]
}

fn transfer_request(amount: Value) -> Request {
    mock_req_with(json!({
        "method": "POST",
        "body": { "from": "savings", "to": "checking", "amount": amount },
    }))
}

fn payment_request(amount: Value) -> Request {
    mock_req_with(json!({ "method": "POST", "body": { "amount": amount } }))
}

fn get_transfer(ctx: &mut GradingContext) -> CheckResult {
    let app = ctx.app()?;
    let driven = drive(
        &app,
        &TRANSFER_PATHS,
        "get",
        mock_req(),
        "The transfer get route may not exist yet.",
    )?;
    ensure!(
        driven.res.render.called(),
        "The transfer get route may have not been created."
    );
    Ok(())
}

fn payment_feature(ctx: &mut GradingContext) -> CheckResult {
    let app = ctx.app()?;
    let render_args = [Matcher::Eq(json!("payment")), Matcher::AnyObject];

    let form = drive(
        &app,
        &PAYMENT_PATHS,
        "get",
        mock_req(),
        "The payment get route may not exist.",
    )?;
    ensure!(
        form.res.render.called(),
        "The payment get route may have not been created."
    );
    ensure!(
        form.res.render.called_with_exactly(&render_args),
        "`res.render` is not being called with the correct arguments."
    );

    ensure!(
        app.locate_any(&PAYMENT_PATHS, "post").is_some(),
        "The payment post route may not exist."
    );
    let before = accounts_now(ctx)?;
    let mut write_json = spy_write_json(ctx)?;
    let posted = drive(
        &app,
        &PAYMENT_PATHS,
        "post",
        payment_request(json!(325)),
        "The payment post route may not exist.",
    )?;
    let write_json_called = write_json.as_ref().is_some_and(|spy| spy.called());
    if let Some(spy) = write_json.as_mut() {
        spy.restore();
    }
    let after = accounts_now(ctx)?;

    if ctx.module_exists("data") {
        ensure!(
            write_json_called,
            "The payment post function does not include a call to `writeJSON`."
        );
    } else {
        ensure!(
            written_accounts(ctx.writes()).is_some(),
            "The payment post function does not write the accounts as JSON text."
        );
    }
    ensure!(
        posted.res.render.called(),
        "The payment post route may have not been created."
    );
    ensure!(
        posted.res.render.called_with_exactly(&render_args),
        "`res.render` is not being called with the correct arguments."
    );
    ensure!(
        balance(&before, "credit", "balance").map(|b| b - 325)
            == balance(&after, "credit", "balance"),
        "Your calculation for the credit balance seems to be incorrect."
    );
    ensure!(
        balance(&before, "credit", "available").map(|a| a + 325)
            == balance(&after, "credit", "available"),
        "Your calculation for the available balance seems to be incorrect."
    );
    check_write(ctx.writes(), UTF8)?;

    // Form fields arrive as text.
    drive(
        &app,
        &PAYMENT_PATHS,
        "post",
        payment_request(json!("25")),
        "The payment post route may not exist.",
    )?;
    let parsed = accounts_now(ctx)?;
    ensure!(
        balance(&after, "credit", "balance").map(|b| b - 25)
            == balance(&parsed, "credit", "balance"),
        "Make sure the `amount` from the form is parsed as a number."
    );
    Ok(())
}

fn convert_json(ctx: &mut GradingContext) -> CheckResult {
    let app = ctx.app()?;
    ensure!(
        app.locate_any(&TRANSFER_PATHS, "post").is_some(),
        "The transfer post route may not exist yet."
    );
    let mut write_json = spy_write_json(ctx)?;
    drive(
        &app,
        &TRANSFER_PATHS,
        "post",
        transfer_request(json!(100)),
        TRANSFER_MISSING,
    )?;
    let write_json_called = write_json.as_ref().is_some_and(|spy| spy.called());
    if let Some(spy) = write_json.as_mut() {
        spy.restore();
    }
    if ctx.module_exists("data") {
        ensure!(
            write_json_called,
            "The transfer post function does not include a call to `writeJSON`."
        );
    }
    ensure!(
        has_keys(written_accounts(ctx.writes()).as_ref(), &ACCOUNT_KEYS),
        "The transfer post function does not write the accounts as JSON text."
    );
    Ok(())
}

/// Post the classroom transfer and return the accounts before and after.
fn transfer(ctx: &GradingContext, amount: Value) -> Result<(Value, Value), CheckError> {
    let app = ctx.app()?;
    ensure!(
        app.locate_any(&TRANSFER_PATHS, "post").is_some(),
        "{TRANSFER_MISSING}"
    );
    let before = accounts_now(ctx)?;
    drive(&app, &TRANSFER_PATHS, "post", transfer_request(amount), TRANSFER_MISSING)?;
    let after = accounts_now(ctx)?;
    Ok((before, after))
}

fn from_balance(ctx: &mut GradingContext) -> CheckResult {
    let (before, after) = transfer(ctx, json!(100))?;
    ensure!(
        balance(&before, "savings", "balance").map(|b| b - 100)
            == balance(&after, "savings", "balance"),
        "Your calculation for the new `from` account balance seems to be incorrect."
    );
    Ok(())
}

fn to_balance(ctx: &mut GradingContext) -> CheckResult {
    let (before, after) = transfer(ctx, json!(100))?;
    ensure!(
        balance(&before, "checking", "balance").map(|b| b + 100)
            == balance(&after, "checking", "balance"),
        "Your calculation for the new `to` account balance seems to be incorrect."
    );
    let (before, after) = transfer(ctx, json!("100"))?;
    ensure!(
        balance(&before, "checking", "balance").map(|b| b + 100)
            == balance(&after, "checking", "balance"),
        "Make sure the `amount` from the form is parsed as a number."
    );
    Ok(())
}

fn transfer_message(ctx: &mut GradingContext) -> CheckResult {
    let app = ctx.app()?;
    let driven = drive(
        &app,
        &TRANSFER_PATHS,
        "post",
        transfer_request(json!(100)),
        TRANSFER_MISSING,
    )?;
    ensure!(
        driven.res.render.called_with_exactly(&[
            Matcher::Eq(json!("transfer")),
            Matcher::Eq(json!({ "message": "Transfer Completed" })),
        ]),
        "`res.render` is not being called with the correct arguments."
    );
    Ok(())
}

fn transfer_write(ctx: &mut GradingContext) -> CheckResult {
    let app = ctx.app()?;
    drive(
        &app,
        &TRANSFER_PATHS,
        "post",
        transfer_request(json!(100)),
        TRANSFER_MISSING,
    )?;
    check_write(ctx.writes(), UTF8)
}

fn post_transfer(ctx: &mut GradingContext) -> CheckResult {
    let app = ctx.app()?;
    let driven = drive(
        &app,
        &TRANSFER_PATHS,
        "post",
        transfer_request(json!(100)),
        TRANSFER_MISSING,
    )?;
    ensure!(
        driven.result.is_ok() && (driven.res.render.called() || driven.res.redirect.called()),
        "The transfer post route may have not been created yet."
    );
    Ok(())
}

fn urlencoded(ctx: &mut GradingContext) -> CheckResult {
    let app = ctx.app()?;
    let middleware = app.middleware();
    ensure!(
        !(app.route_table().is_empty() && middleware.is_empty()),
        "No routes have been created."
    );
    ensure!(
        middleware.iter().any(|m| m.name() == "urlencoded"),
        "`urlencoded` is not being used."
    );
    Ok(())
}

fn transfer_view(ctx: &mut GradingContext) -> CheckResult {
    let view = ctx.view("transfer")?;
    view.compile()?;
    let markup = view.markup();
    ensure!(
        markup
            .attr("#transferForm", "method")?
            .is_some_and(|method| method.eq_ignore_ascii_case("post")),
        "The form is missing a `method` attribute."
    );
    let action = markup.attr("#transferForm", "action")?;
    ensure!(
        matches!(action.as_deref(), Some("/services/transfer" | "/transfer")),
        "The form is missing an `action` attribute."
    );
    ensure!(
        markup.attr("select", "id")?.as_deref() == Some("from"),
        "The first `select` is missing an `id` attribute or it has the wrong value."
    );
    ensure!(
        markup.attr("select", "name")?.as_deref() == Some("from"),
        "The first `select` is missing a `name` attribute or it has the wrong value."
    );
    ensure!(
        markup.last_attr("select", "id")?.as_deref() == Some("to"),
        "The second `select` is missing an `id` attribute or it has the wrong value."
    );
    ensure!(
        markup.last_attr("select", "name")?.as_deref() == Some("to"),
        "The second `select` is missing a `name` attribute or it has the wrong value."
    );
    Ok(())
}
