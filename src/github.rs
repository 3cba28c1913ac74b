use crate::request::FunctionRequest;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use octocrab::Octocrab;
use serde::Deserialize;
use serde_json::Value;

pub const EVENT_HEADER: &str = "x-github-event";
pub const ISSUES_EVENT: &str = "issues";
pub const OPENED_ACTION: &str = "opened";

/// The parts of an `issues` webhook payload this crate reads.
///
/// Every field is optional: deliveries for other event families decode into
/// this shape too and are rejected by [`is_issue_opened_event`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssuesEvent {
    pub action: Option<String>,
    pub issue: Option<Issue>,
    pub repository: Option<Repository>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Issue {
    pub number: Option<u64>,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repository {
    pub name: Option<String>,
    pub owner: Option<User>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    pub login: Option<String>,
}

impl IssuesEvent {
    pub fn from_value(value: &Value) -> serde_json::Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        IssuesEvent::deserialize(value)
    }

    pub fn author_login(&self) -> Option<&str> {
        self.issue
            .as_ref()?
            .user
            .as_ref()?
            .login
            .as_deref()
            .filter(|login| !login.is_empty())
    }
}

pub fn is_issue_opened_event(request: &FunctionRequest, event: &IssuesEvent) -> bool {
    request.header(EVENT_HEADER) == Some(ISSUES_EVENT)
        && event.action.as_deref() == Some(OPENED_ACTION)
        && event.issue.is_some()
}

pub fn thanks_comment(login: Option<&str>) -> String {
    match login {
        Some(login) => format!(
            "Thanks for the issue report @{login}! We will look into it as soon as possible."
        ),
        None => "Thanks for the issue report! We will look into it as soon as possible.".to_string(),
    }
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn create_comment(&self, owner: &str, repo: &str, issue_number: u64, body: &str)
    -> Result<()>;
}

pub struct OctocrabTracker {
    client: Octocrab,
}

impl OctocrabTracker {
    pub fn new(token: &str) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .context("Failed to build GitHub client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl IssueTracker for OctocrabTracker {
    async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        body: &str,
    ) -> Result<()> {
        let comment = self
            .client
            .issues(owner, repo)
            .create_comment(issue_number, body)
            .await
            .with_context(|| format!("Failed to comment on {owner}/{repo}#{issue_number}"))?;

        debug!("Created comment {} on {owner}/{repo}#{issue_number}", comment.id);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentOutcome {
    Posted,
    /// Names the payload fields that were absent; nothing was sent.
    Skipped(Vec<&'static str>),
}

pub async fn post_comment<T>(
    tracker: &T,
    repository: Option<&Repository>,
    issue: Option<&Issue>,
    comment: &str,
) -> Result<CommentOutcome>
where
    T: IssueTracker + ?Sized,
{
    let owner = repository
        .and_then(|r| r.owner.as_ref())
        .and_then(|o| o.login.as_deref())
        .filter(|s| !s.is_empty());
    let repo = repository
        .and_then(|r| r.name.as_deref())
        .filter(|s| !s.is_empty());
    let number = issue.and_then(|i| i.number).filter(|n| *n != 0);

    match (owner, repo, number) {
        (Some(owner), Some(repo), Some(number)) => {
            tracker.create_comment(owner, repo, number, comment).await?;
            info!("Commented on {owner}/{repo}#{number}");
            Ok(CommentOutcome::Posted)
        }
        _ => {
            let missing: Vec<&'static str> = [
                ("repository.owner.login", owner.is_none()),
                ("repository.name", repo.is_none()),
                ("issue.number", number.is_none()),
            ]
            .into_iter()
            .filter_map(|(field, absent)| absent.then_some(field))
            .collect();

            warn!("Missing repository or issue information: {}", missing.join(", "));
            Ok(CommentOutcome::Skipped(missing))
        }
    }
}
