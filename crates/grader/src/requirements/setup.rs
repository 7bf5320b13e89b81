use serde_json::json;

use super::{drive, has_keys, include, requirement, with_framework_double, with_recording_fs};
use crate::capture::Matcher;
use crate::client::SimulatedClient;
use crate::context::{GradingContext, APP_MISSING};
use crate::doubles::mock_req;
use crate::inspect::matches;
use crate::suite::{Check, CheckResult, Group, Requirement};
use crate::{ensure, fail};

pub(super) fn requirements() -> Vec<Requirement> {
    let setup = |tag: &'static str, title: &'static str, check: Check| {
        requirement(Group::Setup, tag, title, check)
    };
    vec![
        setup("app-get-index-route", "Index route renders the index view", index_route),
        setup("app-listen-console-log", "Application listens on port 3000", listen),
        setup("app-require-built-ins", "App module uses the injected filesystem and layout", built_ins),
        setup("app-require-express-const-app", "App module creates the application", const_app),
        setup("app-set-views-directory-engine", "Views directory and view engine are set", views_engine),
        setup("app-use-express-static", "Public directory is served statically", static_dir),
        setup("index-ejs-create-view-file", "The index view file exists", index_file),
        setup("index-ejs-create-view", "The index view has its content", index_view),
    ]
}

fn index_route(ctx: &mut GradingContext) -> CheckResult {
    let app = ctx.app()?;
    let driven = drive(&app, &["/"], "get", mock_req(), "No routes have been created.")?;
    ensure!(driven.res.render.called(), "The index route may have not been created.");
    ensure!(
        driven.view().as_deref() == Some("index"),
        "The index route does not seem to be rendering the `index` view."
    );
    ensure!(
        has_keys(driven.locals().as_ref(), &["title"]),
        "The index route maybe missing an object with a `title: \"Index\"` key value pair."
    );
    Ok(())
}

fn listen(ctx: &mut GradingContext) -> CheckResult {
    let (framework, _instance) =
        with_framework_double(ctx, "app", "The app module could not be loaded")?;
    let listen = &framework.app().listen;
    ensure!(listen.called_once(), "`app.listen` has not been called.");
    ensure!(
        listen.called_with_exactly(&[Matcher::Eq(json!(3000)), Matcher::AnyFunction]),
        "`app.listen` was not called with the correct arguments."
    );
    Ok(())
}

fn built_ins(ctx: &mut GradingContext) -> CheckResult {
    let file = ctx.module_path("app");
    let (recorder, instance) = with_recording_fs(ctx, "app", "The app module could not be loaded")?;
    let Some(app) = instance.app() else {
        fail!("{APP_MISSING}");
    };
    let response = SimulatedClient::new(app)
        .get("/css/styles.css")
        .end()?;
    ensure!(
        recorder.exists.called() || recorder.reads.called(),
        "Has the filesystem from the module scope been used in `{file}`?"
    );
    ensure!(
        response.status == 200,
        "Has the project layout been used to locate the `public` directory in `{file}`?"
    );
    Ok(())
}

fn const_app(ctx: &mut GradingContext) -> CheckResult {
    ctx.app()?;
    let file = ctx.module_path("app");
    let (framework, _instance) =
        with_framework_double(ctx, "app", "The app module could not be loaded")?;
    ensure!(
        framework.application.called(),
        "Has the framework been used to create the application in `{file}`?"
    );
    Ok(())
}

fn views_engine(ctx: &mut GradingContext) -> CheckResult {
    let app = ctx.app()?;
    let views = app.setting("views");
    ensure!(
        views
            .as_ref()
            .and_then(|v| v.as_str())
            .is_some_and(|dir| dir.contains("views")),
        "The view directory has not been set to the `views` directory."
    );
    ensure!(
        app.setting("view engine") == Some(json!("ejs")),
        "The view engine has not been set to `ejs`."
    );
    Ok(())
}

fn static_dir(ctx: &mut GradingContext) -> CheckResult {
    ctx.client()?
        .get("/css/styles.css")
        .expect(|res| {
            ensure!(
                matches(&res.text, r"^body \{")?,
                "Looks as if the `public` directory has not been set as the static directory."
            );
            Ok(())
        })
        .end()?;
    Ok(())
}

fn index_file(ctx: &mut GradingContext) -> CheckResult {
    ensure!(ctx.view_exists("index"), "The `index.ejs` view file does not exist.");
    Ok(())
}

fn index_view(ctx: &mut GradingContext) -> CheckResult {
    let view = ctx.view("index")?;
    view.compile()?;
    view.require(&include("header"), "Have you included the `header` view?")?;
    view.require(
        r#"<div\s+class\s*=\s*("|'|\s*)container(\s*|"|')>"#,
        "The `div` with a class of `container` can not be found.",
    )?;
    view.require(r"<%=\s*title\s*%>", "The `title` variable seems to be missing.")?;
    view.require(
        r#"<a\s+href=('|")?/profile('|")?>\s*(P|p)rofile\s*</a>"#,
        "The `profile` link seems to be missing.",
    )?;
    view.require(
        r#"<a\s+href=('|")?(/services)?/transfer('|")?>\s*(T|t)ransfer\s*</a>"#,
        "The `transfer` link seems to be missing.",
    )?;
    view.require(&include("footer"), "Have you included the `footer` view?")?;
    Ok(())
}
