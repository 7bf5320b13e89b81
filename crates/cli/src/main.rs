use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tellerkit_bank::{modules, project_root};
use tellerkit_grader::{Group, GradingContext, Report, Suite};
use tellerkit_web::{serve, Dependencies, DiskFs, ProjectLayout, Session, WebError};


#[derive(Parser)]
#[command(
    name = "tellerkit",
    about = "Serve and grade the classroom banking application"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the application over HTTP.
    Serve {
        /// Project root holding `src/views`, `src/public` and `src/json`.
        #[arg(long)]
        project: Option<PathBuf>,
        /// Port to bind instead of the one the application listens on.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the requirement scripts against a project tree.
    ///
    /// Views, static files, JSON data and module file names come from the
    /// project tree. Module behaviour always comes from the bundled modules;
    /// other module code is graded through the library with its own registry.
    Grade {
        /// Project root holding the tree to grade. Defaults to the bundled
        /// reference project.
        #[arg(long)]
        project: Option<PathBuf>,
        /// Only run these requirement tags.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Only run one group: setup, accounts, services, data or routers.
        #[arg(long)]
        group: Option<Group>,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List requirement tags and titles.
    Requirements {
        /// Print the list as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct Listing {
    tag: &'static str,
    group: Group,
    title: &'static str,
}

fn main() {
    let cli = Cli::parse();
    let default_level = match cli.command {
        Command::Serve { .. } => "info",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

fn layout(project: Option<PathBuf>) -> Result<ProjectLayout, WebError> {
    let root = project.unwrap_or_else(project_root);
    ProjectLayout::load(&root)
}

/// Grade a project tree against the bundled modules.
fn grade(
    layout: ProjectLayout,
    tags: &[String],
    group: Option<Group>,
) -> Result<Report, Box<dyn std::error::Error>> {
    let mut suite = Suite::default().with_tags(tags)?;
    if let Some(group) = group {
        suite = suite.in_group(group);
    }
    let mut ctx = GradingContext::load(modules(), layout, Arc::new(DiskFs));
    Ok(suite.run(&mut ctx))
}

/// Returns `false` when grading found unmet requirements.
fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    match cli.command {
        Command::Serve { project, port } => {
            let layout = layout(project)?;
            info!(root = %layout.root.display(), "loading application");
            let session = Session::new(modules(), Dependencies::disk(layout));
            let exports = session.require("app")?;
            let app = exports
                .get("app")
                .and_then(|export| export.as_app())
                .ok_or_else(|| WebError::Internal("the app module does not export `app`".into()))?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(serve::serve(app, port))?;
            Ok(true)
        }
        Command::Grade {
            project,
            tags,
            group,
            json,
        } => {
            let report = grade(layout(project)?, &tags, group)?;
            if json {
                println!("{}", report.to_json());
            } else {
                print!("{}", report.to_human());
            }
            Ok(report.all_passed())
        }
        Command::Requirements { json } => {
            let suite = Suite::default();
            if json {
                let listing: Vec<Listing> = suite
                    .requirements()
                    .iter()
                    .map(|r| Listing {
                        tag: r.tag,
                        group: r.group,
                        title: r.title,
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                for r in suite.requirements() {
                    println!("{:<40} {:<9} {}", r.tag, r.group.as_str(), r.title);
                }
            }
            Ok(true)
        }
    }
}
