use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tellerkit_bank::{data, modules, project_root, routes};
use tellerkit_grader::{GradingContext, Report, Status, Suite};
use tellerkit_web::{
    handler, DiskFs, Export, Exports, ModuleError, ModuleRegistry, ModuleScope, ProjectLayout,
    WebError,
};

fn copy_tree(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).unwrap();
    for entry in std::fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_tree(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), target).unwrap();
        }
    }
}

/// A scratch copy of the reference project's `src` tree.
fn scratch() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    copy_tree(&project_root().join("src"), &dir.path().join("src"));
    dir
}

fn grade(registry: ModuleRegistry, root: &Path) -> Report {
    let mut ctx = GradingContext::load(registry, ProjectLayout::at(root), Arc::new(DiskFs));
    Suite::default().run(&mut ctx)
}

fn status<'a>(report: &'a Report, tag: &str) -> &'a Status {
    &report.outcome(tag).unwrap().status
}

fn failed(message: &str) -> Status {
    Status::Failed {
        message: message.to_string(),
    }
}

#[test]
fn test_reference_passes_every_requirement() {
    let dir = scratch();
    let report = grade(modules(), dir.path());
    assert!(report.all_passed(), "{}", report.to_human());
    assert_eq!(report.passed(), 53);

    let accounts: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("src/json/accounts.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(accounts["savings"]["balance"], json!(1000));
}

#[test]
fn test_missing_files_fail_only_their_requirements() {
    let dir = scratch();
    std::fs::remove_file(dir.path().join("src/views/profile.ejs")).unwrap();
    std::fs::remove_file(dir.path().join("src/routes/accounts.rs")).unwrap();

    let report = grade(modules(), dir.path());
    assert_eq!(
        status(&report, "profile-ejs-create-view-file"),
        &failed("The `profile.ejs` view file does not exist.")
    );
    assert_eq!(
        status(&report, "routes-accounts-js-create-file"),
        &failed("The `src/routes/accounts.rs` file does not exist.")
    );
    assert_eq!(
        status(&report, "app-use-account-routes"),
        &failed("The `src/routes/accounts.rs` file does not exist.")
    );
    assert_eq!(status(&report, "app-get-index-route"), &Status::Passed);
    assert_eq!(status(&report, "routes-services-js-move-routes"), &Status::Passed);
    assert_eq!(report.outcomes.len(), 53);
}

/// An app module from before the routers lesson: account pages registered on
/// the application itself, no listen call, nothing mounted.
fn routes_left_on_app(scope: &ModuleScope<'_>) -> Result<Exports, ModuleError> {
    let data = scope.require("data")?;
    let accounts = data::shared_accounts(&data)?;
    let mut app = scope.framework().application();
    app.set("views", json!(scope.layout().views().display().to_string()));
    app.set("view engine", json!("ejs"));
    for name in ["savings", "checking", "credit"] {
        let accounts = accounts.clone();
        app.get(
            &format!("/{name}"),
            handler(move |_req, res| {
                let account = accounts.account_value(name)?;
                res.render("account", json!({ "account": account }))
            }),
        );
    }
    Ok(Exports::new(scope.name())
        .with("app", Export::App(Arc::from(app)))
        .with("accounts", Export::Live(Arc::new(accounts))))
}

#[test]
fn test_routes_left_on_app() {
    let dir = scratch();
    let registry = ModuleRegistry::new()
        .register("app", routes_left_on_app)
        .register("data", data::entry)
        .register("routes/accounts", routes::accounts::entry);

    let report = grade(registry, dir.path());
    assert_eq!(status(&report, "app-get-savings-account-route"), &Status::Passed);
    assert_eq!(status(&report, "app-get-other-account-routes"), &Status::Passed);
    assert_eq!(
        status(&report, "routes-accounts-js-move-routes"),
        &failed("The savings route has not been removed from `src/app.rs`.")
    );
    assert_eq!(
        status(&report, "app-use-account-routes"),
        &failed("Are you using your account routes?")
    );
    assert_eq!(
        status(&report, "app-listen-console-log"),
        &failed("`app.listen` has not been called.")
    );
    assert_eq!(
        status(&report, "app-get-index-route"),
        &failed("No routes have been created.")
    );
    assert_eq!(
        status(&report, "app-require-account-routes"),
        &failed("Has the `accountRoutes` binding been exported from `src/app.rs`?")
    );
    assert!(!report.all_passed());
}

/// An app module whose index handler was never finished.
fn unfinished_index(scope: &ModuleScope<'_>) -> Result<Exports, ModuleError> {
    let mut app = scope.framework().application();
    app.set("views", json!(scope.layout().views().display().to_string()));
    app.set("view engine", json!("ejs"));
    app.get("/", handler(|_req, _res| todo!()));
    Ok(Exports::new(scope.name()).with("app", Export::App(Arc::from(app))))
}

#[test]
fn test_handler_panic_fails_only_its_requirements() {
    let dir = scratch();
    let registry = ModuleRegistry::new()
        .register("app", unfinished_index)
        .register("data", data::entry);

    let report = grade(registry, dir.path());
    assert_eq!(report.outcomes.len(), 53);
    match status(&report, "app-get-index-route") {
        Status::Failed { message } => {
            assert!(message.starts_with("The application panicked"), "{message}");
            assert!(message.contains("not yet implemented"), "{message}");
        }
        other => panic!("expected a failure, got {other:?}"),
    }
    assert_eq!(status(&report, "index-ejs-create-view"), &Status::Passed);
    assert_eq!(status(&report, "data-js-exports-data"), &Status::Passed);
}

/// An app module whose transfer post route exists but errors out.
fn failing_transfer(scope: &ModuleScope<'_>) -> Result<Exports, ModuleError> {
    let mut app = scope.framework().application();
    app.post(
        "/transfer",
        handler(|_req, _res| Err(WebError::Internal("transfer is unfinished".into()))),
    );
    Ok(Exports::new(scope.name()).with("app", Export::App(Arc::from(app))))
}

#[test]
fn test_transfer_post_route_must_respond() {
    let dir = scratch();
    let registry = ModuleRegistry::new()
        .register("app", failing_transfer)
        .register("data", data::entry);

    let report = grade(registry, dir.path());
    assert_eq!(
        status(&report, "app-post-transfer-route"),
        &failed("The transfer post route may have not been created yet.")
    );
}
