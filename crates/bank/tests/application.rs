use std::path::Path;
use std::sync::Arc;

use tellerkit_bank::{modules, project_root, Accounts};
use tellerkit_web::{App, Dependencies, DiskFs, Method, ProjectLayout, Request, Session};

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

/// A scratch copy of the project so writes never touch the checked-in data.
fn scratch() -> (tempfile::TempDir, App) {
    let dir = tempfile::tempdir().unwrap();
    for sub in ["views", "json", "public"] {
        copy_tree(
            &project_root().join("src").join(sub),
            &dir.path().join("src").join(sub),
        );
    }
    let layout = ProjectLayout::at(dir.path());
    let session = Session::new(modules(), Dependencies::new(Arc::new(DiskFs), layout));
    let exports = session.require("app").unwrap();
    let app = exports.get("app").unwrap().as_app().unwrap();
    (dir, app)
}

fn form(path: &str, body: &str) -> Request {
    Request::from_target(Method::Post, path).with_raw_body(
        body.as_bytes().to_vec(),
        Some("application/x-www-form-urlencoded".into()),
    )
}

#[test]
fn test_index_lists_every_account() {
    let (_dir, app) = scratch();
    let response = app.dispatch(Request::new(Method::Get, "/"));
    assert_eq!(response.status, 200);
    let html = response.body_text();
    assert!(html.contains("<h1>Account Summary</h1>"));
    for link in ["/account/savings", "/account/checking", "/account/credit"] {
        assert!(html.contains(link), "missing {link}");
    }
}

#[test]
fn test_pages_render() {
    let (_dir, app) = scratch();
    for path in [
        "/profile",
        "/account/savings",
        "/account/credit",
        "/services/transfer",
        "/services/payment",
    ] {
        let response = app.dispatch(Request::new(Method::Get, path));
        assert_eq!(response.status, 200, "{path}: {}", response.body_text());
    }
    let profile = app.dispatch(Request::new(Method::Get, "/profile")).body_text();
    assert!(profile.contains("PS User"));
    let css = app.dispatch(Request::new(Method::Get, "/css/styles.css"));
    assert!(css.body_text().starts_with("body {"));
}

#[test]
fn test_transfer_form_persists() {
    let (dir, app) = scratch();
    let response = app.dispatch(form(
        "/services/transfer",
        "from=savings&to=checking&amount=100",
    ));
    assert_eq!(response.status, 200);
    assert!(response.body_text().contains("Transfer Completed"));

    let text = std::fs::read_to_string(dir.path().join("src/json/accounts.json")).unwrap();
    let saved: Accounts = serde_json::from_str(&text).unwrap();
    assert_eq!(saved.savings.balance, 900);
    assert_eq!(saved.checking.balance, 600);
}

#[test]
fn test_payment_form_persists() {
    let (dir, app) = scratch();
    let response = app.dispatch(form("/services/payment", "amount=325"));
    assert!(response.body_text().contains("Payment Successful"));
    let text = std::fs::read_to_string(dir.path().join("src/json/accounts.json")).unwrap();
    let saved: Accounts = serde_json::from_str(&text).unwrap();
    assert_eq!(saved.credit.balance, 1175);
    assert_eq!(saved.credit.available, Some(3825));
}

#[test]
fn test_bad_transfer_is_rejected() {
    let (_dir, app) = scratch();
    let response = app.dispatch(form("/services/transfer", "from=savings&to=vault&amount=5"));
    assert_eq!(response.status, 400);
    let response = app.dispatch(form("/services/transfer", "from=savings&to=checking"));
    assert_eq!(response.status, 400);
}

#[test]
fn test_listen_declares_port_3000() {
    let (_dir, app) = scratch();
    assert_eq!(app.listening_port(), Some(3000));
}
