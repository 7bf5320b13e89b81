use serde::{Deserialize, Serialize};

use crate::suite::Group;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    Passed,
    Failed { message: String },
    /// The script itself was misused; not the student's fault.
    Error { message: String },
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Passed => "passed",
            Status::Failed { .. } => "failed",
            Status::Error { .. } => "error",
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Status::Passed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub tag: String,
    pub group: Group,
    pub title: String,
    #[serde(flatten)]
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub project: String,
    pub outcomes: Vec<Outcome>,
}

impl Report {
    pub fn new(project: String, outcomes: Vec<Outcome>) -> Self {
        Report { project, outcomes }
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub fn outcome(&self, tag: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.tag == tag)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".into())
    }

    pub fn to_human(&self) -> String {
        let mut out = String::new();
        let mut group = None;
        for outcome in &self.outcomes {
            if group != Some(outcome.group) {
                group = Some(outcome.group);
                out.push_str(&format!("{}\n", outcome.group));
            }
            let mark = match &outcome.status {
                Status::Passed => "ok",
                Status::Failed { .. } => "FAIL",
                Status::Error { .. } => "ERROR",
            };
            out.push_str(&format!("  [{mark}] {} ({})\n", outcome.title, outcome.tag));
            match &outcome.status {
                Status::Failed { message } | Status::Error { message } => {
                    out.push_str(&format!("         {message}\n"));
                }
                Status::Passed => {}
            }
        }
        out.push_str(&format!(
            "\n{} passed, {} failed, {} total\n",
            self.passed(),
            self.failed(),
            self.outcomes.len()
        ));
        out
    }
}
