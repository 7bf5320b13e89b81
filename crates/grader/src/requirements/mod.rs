//! The requirement catalogue, one script per classroom tag.
//!
//! Scripts follow the same shape: locate, wrap, drive with doubles, check the
//! capture, restore. Handles restore on drop as well, so an early `fail!`
//! never leaves a proxy installed.

mod accounts;
mod data;
mod routers;
mod services;
mod setup;

use std::sync::Arc;

use serde_json::Value;
use tellerkit_web::{App, Export, Exports, HandlerResult, Request};

use crate::capture::{Arg, Capture};
use crate::context::GradingContext;
use crate::doubles::{mock_res, FrameworkDouble, RecordingFs, ResponseDouble};
use crate::error::{CheckError, Failure};
use crate::intercept::{wrap_export, wrap_handler, ProcedureSpy};
use crate::loader::{ModuleInstance, Substitutions};
use crate::locator::RouteLocator;
use crate::suite::{Check, CheckResult, Group, Requirement};
use crate::{ensure, fail};

/// Every requirement, in classroom order.
pub fn catalogue() -> Vec<Requirement> {
    let mut all = setup::requirements();
    all.extend(accounts::requirements());
    all.extend(services::requirements());
    all.extend(data::requirements());
    all.extend(routers::requirements());
    all
}

fn requirement(group: Group, tag: &'static str, title: &'static str, check: Check) -> Requirement {
    Requirement {
        tag,
        group,
        title,
        check,
    }
}

pub(crate) const TRANSFER_PATHS: [&str; 2] = ["/transfer", "/services/transfer"];
pub(crate) const PAYMENT_PATHS: [&str; 2] = ["/payment", "/services/payment"];

/// What one call of a located handler left behind.
pub(crate) struct Driven {
    pub res: ResponseDouble,
    pub result: HandlerResult,
}

impl Driven {
    pub fn view(&self) -> Option<String> {
        self.res.rendered_view()
    }

    pub fn locals(&self) -> Option<Value> {
        self.res.rendered_locals()
    }
}

/// Locate the first of `paths` answering `method`, wrap its handler, call it
/// once with `req` and a fresh response double, then restore.
pub(crate) fn drive(
    app: &App,
    paths: &[&str],
    method: &str,
    mut req: Request,
    missing: &str,
) -> Result<Driven, CheckError> {
    let Some(chain) = app.locate_any(paths, method) else {
        fail!("{missing}");
    };
    let Some(slot) = chain.handle() else {
        fail!("{missing}");
    };
    let mut spy = wrap_handler(slot);
    let mut res = mock_res();
    let result = spy.invoke(&mut req, &mut res);
    spy.restore();
    Ok(Driven { res, result })
}

/// The regex for `<%- include('view') %>`.
pub(crate) fn include(view: &str) -> String {
    format!(r#"<%-\s+include\(('|"){view}(\.ejs)?('|")\)(;)?\s*%>"#)
}

/// The regex for `<%- include('view', { account: binding }) %>`.
pub(crate) fn include_account(view: &str, binding: &str) -> String {
    format!(
        r#"<%-\s+include\(('|"){view}(\.ejs)?('|")\s*,\s*\{{\s*account:\s*{binding}\s*\}}\s*\)(;)?\s*%>"#
    )
}

/// True when `value` is an object holding every key.
pub(crate) fn has_keys(value: Option<&Value>, keys: &[&str]) -> bool {
    value
        .and_then(Value::as_object)
        .is_some_and(|map| keys.iter().all(|key| map.contains_key(*key)))
}

pub(crate) const ACCOUNT_KEYS: [&str; 3] = ["savings", "checking", "credit"];
pub(crate) const USER_KEYS: [&str; 5] = ["name", "username", "phone", "email", "address"];

/// `accounts[name][field]` as a number.
pub(crate) fn balance(accounts: &Value, name: &str, field: &str) -> Option<i64> {
    accounts.get(name)?.get(field)?.as_i64()
}

/// The live `accounts` binding of the shared application.
pub(crate) fn accounts_now(ctx: &GradingContext) -> Result<Value, Failure> {
    ctx.accounts().ok_or_else(|| {
        Failure::new(format!(
            "Has the `accounts` binding been exported from `{}`?",
            ctx.module_path("app")
        ))
    })
}

/// Where the `writeJSON` procedure lives: the data module once it exists,
/// the app module before that.
pub(crate) fn write_json_owner(ctx: &GradingContext) -> Option<Exports> {
    if ctx.module_exists("data") {
        ctx.module("data")
    } else {
        ctx.exports().ok().cloned()
    }
}

/// Observe `writeJSON` on the shared load, when there is one to observe.
pub(crate) fn spy_write_json(ctx: &GradingContext) -> Result<Option<ProcedureSpy>, CheckError> {
    match write_json_owner(ctx) {
        Some(exports) => Ok(wrap_export(&exports, "writeJSON")?),
        None => Ok(None),
    }
}

/// Check the first captured write: the accounts file, string content, utf8.
pub(crate) fn check_write(writes: &Capture, encoding_message: &str) -> CheckResult {
    let Some(call) = writes.first_call() else {
        fail!("`write` was not called.");
    };
    let path = call.first().and_then(Arg::as_str).unwrap_or_default();
    ensure!(
        path.contains("src/json/accounts.json"),
        "The path being passed to `write` is incorrect."
    );
    ensure!(
        call.get(1).and_then(Arg::as_str).is_some(),
        "The content being passed to `write` is not a string."
    );
    let encoding = call.get(2).and_then(Arg::as_str).unwrap_or_default();
    ensure!(
        encoding.replacen('-', "", 1).to_lowercase() == "utf8",
        "{encoding_message}"
    );
    Ok(())
}

/// The accounts JSON carried by the first captured write, if it parses.
pub(crate) fn written_accounts(writes: &Capture) -> Option<Value> {
    let call = writes.first_call()?;
    let content = call.get(1)?.as_str()?;
    serde_json::from_str(content).ok()
}

/// A fresh load of `module` in its own session.
pub(crate) fn fresh(
    ctx: &GradingContext,
    module: &str,
    substitutions: Substitutions,
    message: &str,
) -> Result<ModuleInstance, Failure> {
    ctx.loader()
        .load_with_doubles(module, substitutions)
        .map_err(|err| Failure::new(format!("{message} ({err})")))
}

/// A fresh load of `module` with the framework replaced by a double.
pub(crate) fn with_framework_double(
    ctx: &GradingContext,
    module: &str,
    message: &str,
) -> Result<(Arc<FrameworkDouble>, ModuleInstance), Failure> {
    let framework = Arc::new(FrameworkDouble::new());
    let instance = fresh(
        ctx,
        module,
        Substitutions::new().framework(framework.clone()),
        message,
    )?;
    Ok((framework, instance))
}

/// A fresh load of `module` with every filesystem call recorded.
pub(crate) fn with_recording_fs(
    ctx: &GradingContext,
    module: &str,
    message: &str,
) -> Result<(Arc<RecordingFs>, ModuleInstance), Failure> {
    let recorder = Arc::new(RecordingFs::new(Arc::clone(ctx.fs())));
    let instance = fresh(
        ctx,
        module,
        Substitutions::new().filesystem(recorder.clone()),
        message,
    )?;
    Ok((recorder, instance))
}

/// Fail unless the source file of `module` exists.
pub(crate) fn require_module_file(ctx: &GradingContext, module: &str) -> CheckResult {
    ensure!(
        ctx.module_exists(module),
        "The `{}` file does not exist.",
        ctx.module_path(module)
    );
    Ok(())
}

/// The text behind a data export. Bytes mean the file was read without an
/// encoding.
pub(crate) fn read_as_text(export: &Export) -> bool {
    !matches!(export, Export::Bytes(_))
}
