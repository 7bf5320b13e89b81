use serde_json::{json, Value};
use tellerkit_web::{Export, Exports};

use super::{
    check_write, drive, has_keys, read_as_text, require_module_file, requirement, spy_write_json,
    with_recording_fs, ACCOUNT_KEYS, PAYMENT_PATHS, TRANSFER_PATHS, USER_KEYS,
};
use crate::capture::Arg;
use crate::context::GradingContext;
use crate::doubles::mock_req_with;
use crate::error::CheckError;
use crate::intercept::wrap_export;
use crate::locator::RouteLocator;
use crate::suite::{Check, CheckResult, Group, Requirement};
use crate::{ensure, fail};

const NOT_A_FUNCTION: &str = "`writeJSON` is not a function.";

pub(super) fn requirements() -> Vec<Requirement> {
    let data = |tag: &'static str, title: &'static str, check: Check| {
        requirement(Group::Data, tag, title, check)
    };
    vec![
        data("app-js-call-write-json-payment", "Payments call `writeJSON`", call_write_json_payment),
        data("app-js-call-write-json-transfer", "Transfers call `writeJSON`", call_write_json_transfer),
        data("app-js-require-data-js", "App module takes its data from the data module", app_requires_data),
        data("data-js-create-file", "The data module file exists", data_file),
        data("data-js-exports-data", "Data module exports accounts, users and `writeJSON`", exports_data),
        data("data-js-require-built-ins", "Data module uses the injected filesystem and layout", data_built_ins),
        data("data-js-transition-const-accounts", "Data module reads the accounts", data_accounts),
        data("data-js-transition-const-users", "Data module reads the users", data_users),
        data("data-js-write-json-function-body", "`writeJSON` writes the accounts file", write_json_body),
        data("data-js-write-json-function", "Data module defines `writeJSON`", write_json_function),
    ]
}

/// Drive a post route with `writeJSON` observed and report whether it ran.
fn calls_write_json(
    ctx: &GradingContext,
    paths: &[&str],
    body: Value,
    missing: &str,
) -> Result<bool, CheckError> {
    let app = ctx.app()?;
    ensure!(app.locate_any(paths, "post").is_some(), "{missing}");
    let Some(mut spy) = spy_write_json(ctx)? else {
        return Ok(false);
    };
    let req = mock_req_with(json!({ "method": "POST", "body": body }));
    drive(&app, paths, "post", req, missing)?;
    spy.restore();
    Ok(spy.called())
}

fn call_write_json_payment(ctx: &mut GradingContext) -> CheckResult {
    let called = calls_write_json(
        ctx,
        &PAYMENT_PATHS,
        json!({ "amount": 325 }),
        "Payment post route may not exist yet.",
    )?;
    ensure!(
        called,
        "The payment post function does not include a call to `writeJSON`."
    );
    Ok(())
}

fn call_write_json_transfer(ctx: &mut GradingContext) -> CheckResult {
    let called = calls_write_json(
        ctx,
        &TRANSFER_PATHS,
        json!({ "from": "savings", "to": "checking", "amount": 100 }),
        "Transfer post route may not exist yet.",
    )?;
    ensure!(
        called,
        "The transfer post function does not include a call to `writeJSON`."
    );
    Ok(())
}

/// The checks shared by every view of the data module's exports.
fn check_data_exports(exports: &Exports, file: &str) -> CheckResult {
    ensure!(
        has_keys(
            exports.get("accounts").and_then(Export::snapshot).as_ref(),
            &ACCOUNT_KEYS
        ),
        "`{file}` is not exporting the `accounts` object."
    );
    ensure!(
        exports
            .get("users")
            .and_then(Export::snapshot)
            .is_some_and(|users| users.is_array() || users.is_object()),
        "`{file}` is not exporting the `users` object."
    );
    ensure!(
        exports.get("writeJSON").and_then(Export::as_procedure).is_some(),
        "`{file}` is not exporting the `writeJSON` function."
    );
    Ok(())
}

fn app_requires_data(ctx: &mut GradingContext) -> CheckResult {
    let exports = ctx.exports()?;
    let app_file = ctx.module_path("app");
    ensure!(
        !exports.contains("accountData"),
        "Have you removed the lines that read and parse the `accounts.json` file?"
    );
    ensure!(
        !exports.contains("userData"),
        "Have you removed the lines that read and parse the `users.json` file?"
    );
    for (name, article) in [("users", "a"), ("accounts", "an"), ("writeJSON", "a")] {
        ensure!(
            exports.contains(name),
            "`{app_file}` is not requiring `data` and exporting {article} `{name}` binding."
        );
    }
    check_data_exports(exports, &ctx.module_path("data"))
}

fn data_file(ctx: &mut GradingContext) -> CheckResult {
    require_module_file(ctx, "data")
}

fn exports_data(ctx: &mut GradingContext) -> CheckResult {
    ctx.app()?;
    require_module_file(ctx, "data")?;
    let file = ctx.module_path("data");
    let instance = match ctx.loader().load("data") {
        Ok(instance) => instance,
        Err(_) => fail!("The `{file}` file does not exist."),
    };
    check_data_exports(instance.exports(), &file)
}

fn data_built_ins(ctx: &mut GradingContext) -> CheckResult {
    let file = ctx.module_path("data");
    let (recorder, _instance) =
        with_recording_fs(ctx, "data", &format!("The `{file}` module could not be loaded"))?;
    ensure!(
        recorder.reads.called(),
        "Has the filesystem from the module scope been used in `{file}`?"
    );
    let read_accounts = recorder.reads.calls().iter().any(|call| {
        call.first()
            .and_then(Arg::as_str)
            .is_some_and(|path| path.ends_with("json/accounts.json"))
    });
    ensure!(
        read_accounts,
        "Has the project layout been used to locate the data files in `{file}`?"
    );
    Ok(())
}

/// Load the data module fresh and check one raw/parsed pair of bindings.
fn data_binding(
    ctx: &GradingContext,
    raw: &str,
    parsed: &str,
) -> Result<Value, CheckError> {
    ctx.app()?;
    let file = format!("data.{}", ctx.layout().source_extension);
    let instance = match ctx.loader().load("data") {
        Ok(instance) => instance,
        Err(_) => fail!("Has the `{raw}` variable been created in `{file}`?"),
    };
    let exports = instance.exports();
    let Some(raw_export) = exports.get(raw) else {
        fail!("Has the `{raw}` variable been created in `{file}`?");
    };
    let Some(value) = exports.get(parsed).and_then(Export::snapshot) else {
        fail!("Has the `{parsed}` variable been created in `{file}`?");
    };
    ensure!(
        read_as_text(raw_export),
        "It is best if you specify an encoding like \"utf8\" when reading from a file (`read` function)."
    );
    Ok(value)
}

fn data_accounts(ctx: &mut GradingContext) -> CheckResult {
    let accounts = data_binding(ctx, "accountData", "accounts")?;
    ensure!(
        has_keys(Some(&accounts), &ACCOUNT_KEYS),
        "The `accounts` variable does not contain the correct information. Check the `accounts.json` file."
    );
    Ok(())
}

fn data_users(ctx: &mut GradingContext) -> CheckResult {
    let users = data_binding(ctx, "userData", "users")?;
    ensure!(
        has_keys(users.get(0), &USER_KEYS),
        "The `users` variable does not contain the correct information."
    );
    Ok(())
}

fn write_json_body(ctx: &mut GradingContext) -> CheckResult {
    ctx.app()?;
    require_module_file(ctx, "data")?;
    let file = ctx.module_path("data");
    let (recorder, instance) =
        with_recording_fs(ctx, "data", &format!("The `{file}` module could not be loaded"))?;
    let mut spy = match wrap_export(instance.exports(), "writeJSON") {
        Ok(Some(spy)) => spy,
        Ok(None) => fail!("`{file}` does not contain a function called `writeJSON`."),
        Err(_) => fail!("{NOT_A_FUNCTION}"),
    };
    let result = spy.invoke();
    spy.restore();
    ensure!(
        spy.called() && recorder.writes.called(),
        "`write` has not been called in your `writeJSON` function."
    );
    if let Err(err) = result {
        fail!("`writeJSON` failed: {err}");
    }
    check_write(&recorder.writes, "It is best if you encode the string as utf8")
}

fn write_json_function(ctx: &mut GradingContext) -> CheckResult {
    require_module_file(ctx, "data")?;
    let file = ctx.module_path("data");
    let instance = match ctx.loader().load("data") {
        Ok(instance) => instance,
        Err(_) => fail!("`{file}` does not contain a function called `writeJSON`."),
    };
    let Some(export) = instance.exports().get("writeJSON") else {
        fail!("`{file}` does not contain a function called `writeJSON`.");
    };
    ensure!(export.as_procedure().is_some(), "{NOT_A_FUNCTION}");
    Ok(())
}
