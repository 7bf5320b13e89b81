#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use serde_json::{json, Value};

    use crate::app::{App, AppSurface, Middleware};
    use crate::config::ProjectLayout;
    use crate::fs::{normalize_encoding, FileContents, Filesystem, MemoryFs};
    use crate::handler::{handler, procedure, Handler};
    use crate::module::{Dependencies, Export, Exports, ModuleError, ModuleRegistry, ModuleScope, Session};
    use crate::request::Request;
    use crate::router::{join_paths, Method, Router};
    use crate::template::{compile, CompiledTemplate, IncludeResolver, Node, TemplateError};

    struct NoIncludes;

    impl IncludeResolver for NoIncludes {
        fn resolve(&self, name: &str) -> Result<CompiledTemplate, TemplateError> {
            Err(TemplateError::Render(format!("no include `{name}`")))
        }
    }

    struct Partials(Vec<(&'static str, &'static str)>);

    impl IncludeResolver for Partials {
        fn resolve(&self, name: &str) -> Result<CompiledTemplate, TemplateError> {
            let (_, source) = self
                .0
                .iter()
                .find(|(n, _)| *n == name)
                .ok_or_else(|| TemplateError::Render(name.to_string()))?;
            compile(source)
        }
    }

    fn render(source: &str, locals: Value) -> String {
        compile(source).unwrap().render(&locals, &NoIncludes).unwrap()
    }

    // --- templates ---

    #[test]
    fn test_escaped_and_raw_output() {
        let out = render(
            "<h1><%= title %></h1><%- html %>",
            json!({"title": "A & B", "html": "<b>x</b>"}),
        );
        assert_eq!(out, "<h1>A &amp; B</h1><b>x</b>");
    }

    #[test]
    fn test_dotted_and_indexed_paths() {
        let locals = json!({"user": {"name": "PS User"}, "items": [1, 2]});
        assert_eq!(render("<%= user.name %>", locals.clone()), "PS User");
        assert_eq!(render("<%= items[1] %>|<%= items.length %>", locals), "2|2");
    }

    #[test]
    fn test_missing_value_renders_empty() {
        assert_eq!(render("[<%= nope.deeper %>]", json!({})), "[]");
    }

    #[test]
    fn test_for_loop_and_if_else() {
        let source = "<% for (const t of account.transactions) { %><% if (t.amount) { %>+<%= t.amount %><% } else { %>zero<% } %>;<% } %>";
        let locals = json!({"account": {"transactions": [{"amount": 5}, {"amount": 0}]}});
        assert_eq!(render(source, locals), "+5;zero;");
    }

    #[test]
    fn test_not_expression() {
        assert_eq!(render("<% if (!flag) { %>off<% } %>", json!({"flag": false})), "off");
    }

    #[test]
    fn test_comment_and_literal_tags() {
        assert_eq!(render("a<%# hidden %>b<%% c", json!({})), "ab<% c");
    }

    #[test]
    fn test_trim_close_swallows_newline() {
        assert_eq!(render("<% if (true) { -%>\nyes\n<% } -%>\n", json!({})), "yes\n");
    }

    #[test]
    fn test_include_merges_locals() {
        let partials = Partials(vec![("summary", "<%= title %>:<%= account.nickname %>")]);
        let template =
            compile("<%- include('summary', { account: accounts.savings }) %>").unwrap();
        let locals = json!({"title": "T", "accounts": {"savings": {"nickname": "Savings"}}});
        assert_eq!(template.render(&locals, &partials).unwrap(), "T:Savings");
        assert!(template.includes().contains("summary"));
    }

    #[test]
    fn test_include_parse_shape() {
        let template = compile("<%- include('transactions', { account: account }) %>").unwrap();
        match &template.nodes()[0] {
            Node::Include { view, bindings } => {
                assert_eq!(view, "transactions");
                assert_eq!(bindings.len(), 1);
                assert_eq!(bindings[0].0, "account");
            }
            other => panic!("expected include, got {other:?}"),
        }
    }

    #[test]
    fn test_unclosed_tag_reports_marker() {
        let err = compile("<h1>\n<%= title </h1>").unwrap_err();
        assert!(matches!(err, TemplateError::Unclosed { line: 2, .. }));
        assert!(err.to_string().contains("compiling ejs"));
    }

    #[test]
    fn test_unbalanced_blocks() {
        let err = compile("<% if (x) { %>open").unwrap_err();
        assert!(matches!(err, TemplateError::Unbalanced { line: 1, .. }));
        let err = compile("<% } %>").unwrap_err();
        assert!(matches!(err, TemplateError::Unbalanced { .. }));
        let err = compile("<% } else { %>").unwrap_err();
        assert!(matches!(err, TemplateError::Unbalanced { .. }));
    }

    #[test]
    fn test_bad_expression_and_character() {
        let err = compile("line1\n<%= title + 1 %>").unwrap_err();
        assert!(matches!(err, TemplateError::Lexer { line: 2, .. }), "{err:?}");
        let err = compile("<%= ) %>").unwrap_err();
        assert!(matches!(err, TemplateError::Parse { .. }));
        assert!(err.to_string().ends_with("while compiling ejs"));
    }

    #[test]
    fn test_unsupported_scriptlet() {
        let err = compile("<% while (x) { %>").unwrap_err();
        assert!(matches!(err, TemplateError::Parse { .. }));
    }

    // --- routing ---

    #[test]
    fn test_method_parse_is_case_insensitive() {
        assert_eq!(Method::parse("get"), Some(Method::Get));
        assert_eq!(Method::parse("POST"), Some(Method::Post));
        assert_eq!(Method::parse("pOsT"), Some(Method::Post));
        assert_eq!(Method::parse("fetch"), None);
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/account", "/savings"), "/account/savings");
        assert_eq!(join_paths("/account/", "savings"), "/account/savings");
        assert_eq!(join_paths("/account", "/"), "/account");
        assert_eq!(join_paths("", "/"), "/");
    }

    #[test]
    fn test_router_first_match_and_sharing() {
        let router = Router::new();
        let first = handler(|_req, res| res.send(200, "text/plain", b"first".to_vec()));
        let second = handler(|_req, res| res.send(200, "text/plain", b"second".to_vec()));
        router.get("/x", Arc::clone(&first));
        router.get("/x", second);
        let clone = router.clone();
        assert!(clone.ptr_eq(&router));
        assert!(!Router::new().ptr_eq(&router));
        let entry = clone.find("/x", Method::Get).unwrap();
        assert!(entry.chain[0].holds(&first));
        assert!(router.find("/x", Method::Post).is_none());
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn test_slot_replace_and_restore() {
        let original = handler(|_req, _res| Ok(()));
        let slot = crate::handler::handler_slot(Arc::clone(&original));
        let proxy: Arc<dyn Handler> = handler(|_req, _res| Ok(()));
        let previous = slot.replace(proxy);
        assert!(Arc::ptr_eq(&previous, &original));
        assert!(!slot.holds(&original));
        slot.replace(previous);
        assert!(slot.holds(&original));
    }

    // --- filesystem ---

    #[test]
    fn test_normalize_encoding() {
        assert_eq!(normalize_encoding("UTF-8"), "utf8");
        assert_eq!(normalize_encoding("utf8"), "utf8");
    }

    #[test]
    fn test_memory_fs_reads_text_or_bytes() {
        let fs = MemoryFs::new().with_file("/p/src/json/a.json", "{}");
        let path = Path::new("/p/src/json/a.json");
        assert!(fs.exists(path));
        assert!(fs.exists(Path::new("/p/src")));
        assert!(!fs.exists(Path::new("/p/other")));
        assert_eq!(fs.read(path, Some("utf-8")).unwrap(), FileContents::Text("{}".into()));
        assert_eq!(fs.read(path, None).unwrap(), FileContents::Bytes(b"{}".to_vec()));
        assert!(fs.read(path, Some("latin1")).is_err());
        fs.write(path, "[]", "UTF8").unwrap();
        assert_eq!(fs.contents(path).as_deref(), Some("[]"));
    }

    #[test]
    fn test_layout_load_defaults_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::load(dir.path()).unwrap();
        assert_eq!(layout.port, 3000);
        assert_eq!(layout.data_file("accounts"), dir.path().join("src/json/accounts.json"));
        assert_eq!(layout.module_file("routes/accounts"), dir.path().join("src/routes/accounts.rs"));

        std::fs::write(dir.path().join("tellerkit.json"), r#"{"port": 8080, "views_dir": "templates"}"#)
            .unwrap();
        let layout = ProjectLayout::load(dir.path()).unwrap();
        assert_eq!(layout.port, 8080);
        assert_eq!(layout.views(), dir.path().join("src/templates"));
        assert_eq!(layout.display_relative(&layout.views()), "src/templates");
    }

    #[test]
    fn test_layout_rejects_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tellerkit.json"), "{ not json").unwrap();
        assert!(ProjectLayout::load(dir.path()).is_err());
    }

    // --- modules ---

    fn leaf(scope: &ModuleScope<'_>) -> Result<Exports, ModuleError> {
        let router = scope.framework().router();
        Ok(Exports::new(scope.name())
            .with("router", Export::Router(router))
            .with("save", Export::Procedure(procedure(|| Ok(())))))
    }

    fn parent(scope: &ModuleScope<'_>) -> Result<Exports, ModuleError> {
        let leaf = scope.require("leaf")?;
        Ok(Exports::new(scope.name()).with("router", Export::Router(leaf.router("router")?)))
    }

    fn ouroboros(scope: &ModuleScope<'_>) -> Result<Exports, ModuleError> {
        scope.require("ouroboros")
    }

    fn session(registry: ModuleRegistry) -> Session {
        let fs: Arc<dyn Filesystem> = Arc::new(MemoryFs::new());
        Session::new(registry, Dependencies::new(fs, ProjectLayout::at("/p")))
    }

    #[test]
    fn test_session_caches_modules() {
        let session = session(ModuleRegistry::new().register("leaf", leaf).register("parent", parent));
        let parent = session.require("parent").unwrap();
        let leaf = session.require("leaf").unwrap();
        assert!(parent.router("router").unwrap().ptr_eq(&leaf.router("router").unwrap()));
    }

    #[test]
    fn test_session_errors() {
        let session = session(ModuleRegistry::new().register("ouroboros", ouroboros).register("leaf", leaf));
        assert!(matches!(session.require("missing"), Err(ModuleError::Unknown(_))));
        assert!(matches!(session.require("ouroboros"), Err(ModuleError::Cycle(_))));
        let leaf = session.require("leaf").unwrap();
        assert!(matches!(leaf.procedure("router"), Err(ModuleError::ExportKind { .. })));
        assert!(matches!(leaf.value("nothing"), Err(ModuleError::MissingExport { .. })));
        assert!(leaf.procedure("save").unwrap().get().call().is_ok());
    }

    // --- application ---

    fn site() -> App {
        let fs = MemoryFs::new()
            .with_file("/site/views/hello.ejs", "<%- include('header') %><p><%= name %></p>")
            .with_file("/site/views/header.ejs", "<h1>hi</h1>")
            .with_file("/site/public/css/styles.css", "body { margin: 0; }");
        let mut app = App::new(Arc::new(fs));
        app.set("views", json!("/site/views"));
        app.set("view engine", json!("ejs"));
        app.use_middleware(Middleware::Static("/site/public".into()));
        app.use_middleware(Middleware::UrlEncoded);
        app.get(
            "/",
            handler(|_req, res| res.render("hello", json!({"name": "<you>"}))),
        );
        let router = Router::new();
        router.post(
            "/echo",
            handler(|req, res| {
                let amount = req.body_text("amount").unwrap_or_default();
                res.send(200, "text/plain", amount.into_bytes())
            }),
        );
        app.mount("/services", router);
        app
    }

    #[test]
    fn test_dispatch_renders_view() {
        let response = site().dispatch(Request::new(Method::Get, "/"));
        assert_eq!(response.status, 200);
        assert_eq!(response.body_text(), "<h1>hi</h1><p>&lt;you&gt;</p>");
    }

    #[test]
    fn test_dispatch_mounted_route_with_form_body() {
        let req = Request::from_target(Method::Post, "/services/echo").with_raw_body(
            b"amount=325".to_vec(),
            Some("application/x-www-form-urlencoded".into()),
        );
        let response = site().dispatch(req);
        assert_eq!(response.body_text(), "325");
    }

    #[test]
    fn test_dispatch_static_and_not_found() {
        let app = site();
        let css = app.dispatch(Request::new(Method::Get, "/css/styles.css"));
        assert_eq!(css.status, 200);
        assert!(css.content_type.unwrap().starts_with("text/css"));
        let missing = app.dispatch(Request::new(Method::Get, "/nope"));
        assert_eq!(missing.status, 404);
        let escape = app.dispatch(Request::new(Method::Get, "/../views/hello.ejs"));
        assert_eq!(escape.status, 404);
    }

    #[test]
    fn test_route_table_includes_mounts() {
        let app = site();
        let paths: Vec<String> = app.route_table().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["/".to_string(), "/services/echo".to_string()]);
        assert_eq!(app.routes().len(), 1);
        assert_eq!(app.middleware()[1].name(), "urlencoded");
    }

    #[test]
    fn test_listen_records_port_and_callback() {
        let mut app = site();
        assert_eq!(app.listening_port(), None);
        let (tx, rx) = std::sync::mpsc::channel();
        app.listen(3000, Box::new(move || tx.send(()).unwrap()));
        assert_eq!(app.listening_port(), Some(3000));
        app.take_listen_callback().unwrap()();
        assert!(rx.try_recv().is_ok());
        assert!(app.take_listen_callback().is_none());
    }

    #[test]
    fn test_handler_error_maps_to_status() {
        let mut app = site();
        app.get(
            "/bad",
            handler(|_req, _res| Err(crate::WebError::BadRequest("nope".into()))),
        );
        assert_eq!(app.dispatch(Request::new(Method::Get, "/bad")).status, 400);
        app.get("/silent", handler(|_req, _res| Ok(())));
        assert_eq!(app.dispatch(Request::new(Method::Get, "/silent")).status, 500);
    }
}
