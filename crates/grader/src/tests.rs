#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;
    use tellerkit_web::{
        handler, procedure, template, App, AppSurface, Export, Exports, Filesystem, Framework,
        MemoryFs, Method, Middleware, ModuleRegistry, ProjectLayout, Responder, Router, WebError,
    };

    use crate::capture::{Arg, Capture, Matcher};
    use crate::context::{GradingContext, APP_MISSING};
    use crate::doubles::{mock_req, mock_req_with, mock_res, FrameworkDouble, RecordingFs};
    use crate::error::HarnessError;
    use crate::inspect::{focused_diagnostic, Markup};
    use crate::intercept::{stub_handler, wrap_export, wrap_handler, wrap_procedure, wrap_renderer};
    use crate::locator::RouteLocator;
    use crate::report::Status;
    use crate::requirements::catalogue;
    use crate::suite::{Group, Suite};

    fn memory_app() -> App {
        App::new(Arc::new(MemoryFs::new()))
    }

    fn counting_router(hits: Arc<AtomicUsize>) -> Router {
        let router = Router::new();
        router.get(
            "/savings",
            handler(move |_req, res| {
                hits.fetch_add(1, Ordering::SeqCst);
                res.render("account", json!({ "account": {} }))
            }),
        );
        router
    }

    #[test]
    fn test_capture_matchers() {
        let capture = Capture::new();
        let router = Router::new();
        capture.record(vec![Arg::Value(json!(3000)), Arg::Function]);
        capture.record(vec![Arg::Value(json!("/account")), Arg::Router(router.clone())]);
        capture.record(vec![Arg::Value(json!({ "message": "hi" }))]);

        assert_eq!(capture.call_count(), 3);
        assert!(!capture.called_once());
        assert_eq!(capture.first_arg(0), Some(json!(3000)));
        assert!(capture.called_with_exactly(&[Matcher::Eq(json!(3000)), Matcher::AnyFunction]));
        assert!(!capture.called_with_exactly(&[Matcher::Eq(json!(3001)), Matcher::AnyFunction]));
        assert!(!capture.called_with_exactly(&[Matcher::Eq(json!(3000))]));
        assert!(capture.called_with_exactly(&[Matcher::AnyObject]));
        assert!(capture.called_with_exactly(&[
            Matcher::Eq(json!("/account")),
            Matcher::SameRouter(router.clone()),
        ]));
        assert!(!capture.called_with_exactly(&[
            Matcher::Eq(json!("/account")),
            Matcher::SameRouter(Router::new()),
        ]));
    }

    #[test]
    fn test_mock_req_shallow_merge() {
        let req = mock_req();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path, "/");
        assert!(req.body.is_empty());

        let req = mock_req_with(json!({
            "method": "post",
            "body": { "amount": 325 },
            "params": { "id": "7" },
        }));
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.path, "/");
        assert_eq!(req.body_value("amount"), Some(&json!(325)));
        assert_eq!(req.params.get("id"), Some(&json!("7")));
        assert!(req.query.is_empty());
    }

    #[test]
    fn test_response_double_records_render() {
        let mut res = mock_res();
        res.render("index", json!({ "title": "Home" })).unwrap();
        res.redirect("/").unwrap();
        assert!(res.render.called_once());
        assert_eq!(res.rendered_view().as_deref(), Some("index"));
        assert_eq!(res.rendered_locals(), Some(json!({ "title": "Home" })));
        assert!(res.redirect.called_with_exactly(&[Matcher::Eq(json!("/"))]));
    }

    #[test]
    fn test_wrap_forwards_and_restores_original() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = counting_router(hits.clone());
        let entry = router.find("/savings", Method::Get).unwrap();
        let slot = &entry.chain[0];
        let original = slot.get();

        let mut spy = wrap_handler(slot);
        assert!(!slot.holds(&original));
        assert!(Arc::ptr_eq(spy.original(), &original));

        let mut res = mock_res();
        spy.invoke(&mut mock_req(), &mut res).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(spy.call_count(), 1);
        assert_eq!(res.rendered_view().as_deref(), Some("account"));

        spy.restore();
        assert!(slot.holds(&original));
        spy.restore();
        assert!(spy.is_restored());
        assert!(slot.holds(&original));
    }

    #[test]
    fn test_wrapped_handler_seen_through_router() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = counting_router(hits.clone());
        let entry = router.find("/savings", Method::Get).unwrap();
        let spy = wrap_handler(&entry.chain[0]);

        // Another lookup shares the slot, so it reaches the proxy.
        let again = router.find("/savings", Method::Get).unwrap();
        again.chain[0]
            .get()
            .handle(&mut mock_req(), &mut mock_res())
            .unwrap();
        assert_eq!(spy.call_count(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_restores() {
        let router = counting_router(Arc::new(AtomicUsize::new(0)));
        let entry = router.find("/savings", Method::Get).unwrap();
        let original = entry.chain[0].get();
        {
            let _spy = wrap_handler(&entry.chain[0]);
            assert!(!entry.chain[0].holds(&original));
        }
        assert!(entry.chain[0].holds(&original));
    }

    #[test]
    fn test_stub_does_not_forward() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = counting_router(hits.clone());
        let entry = router.find("/savings", Method::Get).unwrap();
        let mut stub = stub_handler(&entry.chain[0]);
        let mut res = mock_res();
        stub.invoke(&mut mock_req_with(json!({ "body": { "amount": 1 } })), &mut res)
            .unwrap();
        assert!(stub.called());
        assert_eq!(stub.first_call().unwrap().body.get("amount"), Some(&json!(1)));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!res.render.called());
        stub.restore();
    }

    #[test]
    fn test_wrap_procedure_records_errors() {
        let slot = procedure(|| Err(WebError::Internal("disk full".into())));
        let mut spy = wrap_procedure(&slot);
        assert!(slot.get().call().is_err());
        assert_eq!(spy.call_count(), 1);
        assert_eq!(
            spy.first_call().unwrap().error.as_deref(),
            Some("disk full")
        );
        spy.restore();
        assert!(slot.holds(spy.original()));
    }

    #[test]
    fn test_wrap_export_rejects_values() {
        let exports = Exports::new("data")
            .with("accounts", Export::Json(json!({})))
            .with("writeJSON", Export::Procedure(procedure(|| Ok(()))));

        match wrap_export(&exports, "accounts") {
            Err(HarnessError::NotCallable { name, kind }) => {
                assert_eq!(name, "accounts");
                assert_eq!(kind, "a value");
            }
            other => panic!("expected NotCallable, got {:?}", other.map(|s| s.is_some())),
        }
        assert!(wrap_export(&exports, "missing").unwrap().is_none());
        let spy = wrap_export(&exports, "writeJSON").unwrap().unwrap();
        spy.invoke().unwrap();
        assert!(spy.called());
    }

    #[test]
    fn test_wrap_renderer_observes_app_render() {
        let fs = Arc::new(MemoryFs::new().with_file("/views/index.ejs", "<h1><%= title %></h1>"));
        let mut app = App::new(fs);
        app.set("views", json!("/views"));
        let mut spy = wrap_renderer(&app);
        let html = app.render("index", &json!({ "title": "Hi" })).unwrap();
        assert_eq!(html, "<h1>Hi</h1>");
        let call = spy.first_call().unwrap();
        assert_eq!(call.view, "index");
        assert_eq!(call.locals, json!({ "title": "Hi" }));
        spy.restore();
    }

    #[test]
    fn test_locator_sees_mounted_routes() {
        let mut app = memory_app();
        app.get("/", handler(|_req, res| res.render("index", json!({}))));
        app.mount("/account", counting_router(Arc::new(AtomicUsize::new(0))));

        assert!(app.locate("/", "GET").is_some());
        assert!(app.locate("/", "get").is_some());
        assert!(app.locate("/", "post").is_none());
        assert!(app.locate("/", "bogus").is_none());
        assert!(app.locate("/missing", "get").is_none());

        let chain = app.locate("/account/savings", "get").unwrap();
        assert_eq!(chain.path(), "/account/savings");
        assert_eq!(chain.len(), 1);
        assert!(app.locate_top_level("/account/savings", "get").is_none());
        assert!(app.locate_top_level("/savings", "get").is_none());
        assert!(app
            .locate_any(&["/savings", "/account/savings"], "get")
            .is_some());
    }

    #[test]
    fn test_recording_fs_swallows_writes() {
        let inner = Arc::new(MemoryFs::new().with_file("/p/src/json/accounts.json", "{}"));
        let recorder = RecordingFs::new(inner.clone());
        let path = Path::new("/p/src/json/accounts.json");

        assert!(recorder.exists(path));
        recorder.read(path, Some("utf8")).unwrap();
        recorder.write(path, "{\"changed\":true}", "utf8").unwrap();

        assert_eq!(inner.contents(path).as_deref(), Some("{}"));
        assert!(recorder.read_as_text("json/accounts.json"));
        assert!(recorder.writes.called_with_exactly(&[
            Matcher::Eq(json!("/p/src/json/accounts.json")),
            Matcher::Eq(json!("{\"changed\":true}")),
            Matcher::Eq(json!("utf8")),
        ]));
    }

    #[test]
    fn test_framework_double_records_wiring() {
        let framework = FrameworkDouble::new();
        let mut app = framework.application();
        let router = framework.router();
        app.use_middleware(Middleware::UrlEncoded);
        app.mount("/services", router.clone());
        app.listen(3000, Box::new(|| {}));

        assert!(framework.application.called_once());
        assert!(framework
            .router
            .called_with_exactly(&[Matcher::SameRouter(router.clone())]));
        let double = framework.app();
        assert!(double
            .middleware
            .called_with_exactly(&[Matcher::Eq(json!("urlencoded"))]));
        assert!(double
            .mount
            .called_with_exactly(&[Matcher::Eq(json!("/services")), Matcher::SameRouter(router)]));
        assert!(double
            .listen
            .called_with_exactly(&[Matcher::Eq(json!(3000)), Matcher::AnyFunction]));
        assert!(app.as_app().is_none());
    }

    #[test]
    fn test_focused_diagnostic_names_file() {
        let err = template::compile("<h1><%= title </h1>").unwrap_err();
        let message = focused_diagnostic(&err, "index.ejs");
        assert!(message.ends_with(" compiling index.ejs"), "{message}");
        assert!(!message.contains("compiling ejs"));
        assert!(message.contains("line 1"));
    }

    #[test]
    fn test_markup_queries_keep_template_text() {
        let markup = Markup::parse(
            r#"<%- include('header') %>
<a href="/profile">Profile</a>
<a href="/account/<%= account.unique_name %>">Go</a>
<form id="transferForm" action="/services/transfer" method="POST"></form>
<select id="from" name="from"></select><select id="to" name="to"></select>"#,
        );
        assert_eq!(markup.count("a").unwrap(), 2);
        assert_eq!(
            markup.nth_attr("a", 1, "href").unwrap().as_deref(),
            Some("/account/<%= account.unique_name %>")
        );
        assert_eq!(markup.attr("#transferForm", "method").unwrap().as_deref(), Some("POST"));
        assert_eq!(markup.attr("select", "id").unwrap().as_deref(), Some("from"));
        assert_eq!(markup.last_attr("select", "name").unwrap().as_deref(), Some("to"));
        assert!(markup.nth_attr("a", 5, "href").unwrap().is_none());
        assert!(matches!(markup.count("a[["), Err(HarnessError::Selector(_))));
    }

    #[test]
    fn test_catalogue_tags_unique() {
        let all = catalogue();
        assert_eq!(all.len(), 53);
        let mut tags: Vec<_> = all.iter().map(|r| r.tag).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), all.len());
        for group in Group::ALL {
            assert!(all.iter().any(|r| r.group == group), "{group} is empty");
        }
    }

    #[test]
    fn test_suite_filters() {
        let setup = Suite::default().in_group(Group::Setup);
        assert_eq!(setup.requirements().len(), 8);
        assert!(setup.requirements().iter().all(|r| r.group == Group::Setup));

        let picked = Suite::default()
            .with_tags(&["app-listen-console-log".to_string()])
            .unwrap();
        assert_eq!(picked.requirements().len(), 1);
        assert!(Suite::default().with_tags(&["nope".to_string()]).is_err());
        assert_eq!("Routers".parse::<Group>().unwrap(), Group::Routers);
        assert!("bonus".parse::<Group>().is_err());
    }

    #[test]
    fn test_empty_project_fails_every_requirement() {
        let fs: Arc<dyn Filesystem> = Arc::new(MemoryFs::new());
        let mut ctx = GradingContext::load(ModuleRegistry::new(), ProjectLayout::at("/project"), fs);
        assert_eq!(ctx.app().unwrap_err().message, APP_MISSING);

        let report = Suite::default().run(&mut ctx);
        assert_eq!(report.outcomes.len(), catalogue().len());
        assert_eq!(report.passed(), 0);
        assert!(!report.all_passed());
        let index = report.outcome("index-ejs-create-view-file").unwrap();
        assert_eq!(
            index.status,
            Status::Failed {
                message: "The `index.ejs` view file does not exist.".into()
            }
        );
        let data = report.outcome("data-js-create-file").unwrap();
        assert_eq!(
            data.status,
            Status::Failed {
                message: "The `src/data.rs` file does not exist.".into()
            }
        );
        let json = report.to_json();
        assert!(json.contains("\"status\": \"failed\""));
        assert!(report.to_human().contains("0 passed, 53 failed, 53 total"));
    }
}
