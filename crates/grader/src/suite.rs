use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use crate::context::GradingContext;
use crate::error::CheckError;
use crate::report::{Outcome, Report, Status};
use crate::requirements;

pub type CheckResult = Result<(), CheckError>;
pub type Check = fn(&mut GradingContext) -> CheckResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    Setup,
    Accounts,
    Services,
    Data,
    Routers,
}

impl Group {
    pub const ALL: [Group; 5] = [
        Group::Setup,
        Group::Accounts,
        Group::Services,
        Group::Data,
        Group::Routers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Setup => "setup",
            Group::Accounts => "accounts",
            Group::Services => "services",
            Group::Data => "data",
            Group::Routers => "routers",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Group {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Group::ALL
            .into_iter()
            .find(|group| group.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown group `{s}` (expected one of setup, accounts, services, data, routers)"))
    }
}

/// One incremental requirement and the script that checks it.
#[derive(Clone, Copy)]
pub struct Requirement {
    pub tag: &'static str,
    pub group: Group,
    pub title: &'static str,
    pub check: Check,
}

impl fmt::Debug for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requirement")
            .field("tag", &self.tag)
            .field("group", &self.group)
            .finish()
    }
}

/// An ordered selection of requirements.
#[derive(Debug, Clone)]
pub struct Suite {
    requirements: Vec<Requirement>,
}

impl Default for Suite {
    fn default() -> Self {
        Suite {
            requirements: requirements::catalogue(),
        }
    }
}

impl Suite {
    pub fn new(requirements: Vec<Requirement>) -> Self {
        Suite { requirements }
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn find(&self, tag: &str) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.tag == tag)
    }

    /// Keep only the given tags. Unknown tags are returned as an error.
    pub fn with_tags(self, tags: &[String]) -> Result<Self, String> {
        if tags.is_empty() {
            return Ok(self);
        }
        if let Some(unknown) = tags.iter().find(|tag| self.find(tag).is_none()) {
            return Err(format!("unknown requirement tag `{unknown}`"));
        }
        let requirements = self
            .requirements
            .into_iter()
            .filter(|r| tags.iter().any(|tag| tag == r.tag))
            .collect();
        Ok(Suite { requirements })
    }

    pub fn in_group(self, group: Group) -> Self {
        let requirements = self
            .requirements
            .into_iter()
            .filter(|r| r.group == group)
            .collect();
        Suite { requirements }
    }

    /// Run every requirement. A failing or panicking script never stops the run.
    pub fn run(&self, ctx: &mut GradingContext) -> Report {
        let mut outcomes = Vec::with_capacity(self.requirements.len());
        for requirement in &self.requirements {
            let span = info_span!("requirement", tag = requirement.tag);
            let _enter = span.enter();
            let checked = panic::catch_unwind(AssertUnwindSafe(|| (requirement.check)(ctx)));
            let panicked = checked.is_err();
            let status = match checked {
                Ok(Ok(())) => Status::Passed,
                Ok(Err(CheckError::Failed(failure))) => Status::Failed {
                    message: failure.message,
                },
                Ok(Err(CheckError::Harness(err))) => Status::Error {
                    message: err.to_string(),
                },
                Err(payload) => {
                    let message = panic_message(&*payload);
                    warn!(%message, "requirement panicked");
                    Status::Failed {
                        message: format!("The application panicked: {message}"),
                    }
                }
            };
            info!(status = status.label(), "checked");
            // a panic can leave state the dirty check does not see
            if panicked || ctx.is_dirty() {
                ctx.reload();
            }
            outcomes.push(Outcome {
                tag: requirement.tag.to_string(),
                group: requirement.group,
                title: requirement.title.to_string(),
                status,
            });
        }
        Report::new(ctx.layout().root.display().to_string(), outcomes)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
