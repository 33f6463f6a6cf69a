//! CLI command implementations.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Thin client over the Kiln HTTP API.
pub struct ApiClient {
    client: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(base: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("kiln-cli")
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base, path);
        debug!(url = %url, "GET");
        let response = self.client.get(&url).send().await?;
        decode(response).await
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, form: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base, path);
        debug!(url = %url, "POST");
        let response = self.client.post(&url).form(form).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["error"].as_str().map(str::to_string))
            .unwrap_or(body);
        bail!("{}: {}", status, message);
    }
    serde_json::from_str(&body).with_context(|| format!("unexpected response: {}", body))
}

/// The fields of a snapshot the CLI shows.
#[derive(Debug, Deserialize)]
pub struct SnapshotView {
    pub commit_id: String,
    pub short_id: String,
    pub subject: String,
    pub author: String,
    pub committed_on: String,
    pub ignored: bool,
    pub job_id: Option<String>,
    pub job_last_checked_at: Option<DateTime<Utc>>,
    pub task_state: Option<String>,
    pub artifact_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SyncView {
    seen: usize,
    created: usize,
}

pub async fn list(client: &ApiClient, all: bool) -> Result<()> {
    let path = if all {
        "/api/snapshots?all=true"
    } else {
        "/api/snapshots"
    };
    let snapshots: Vec<SnapshotView> = client.get(path).await?;
    if snapshots.is_empty() {
        println!("No snapshots");
        return Ok(());
    }
    for snapshot in &snapshots {
        println!("{}", row(snapshot));
    }
    Ok(())
}

pub async fn show(client: &ApiClient, commit: &str) -> Result<()> {
    let snapshot: SnapshotView = client.get(&format!("/api/snapshots/{}", commit)).await?;
    print_details(&snapshot);
    Ok(())
}

/// Run an operator action and print the resulting snapshot.
pub async fn act(client: &ApiClient, commit: &str, action: &str) -> Result<()> {
    let snapshot: SnapshotView = client
        .post_form(&format!("/snapshots/{}", commit), &[("action", action)])
        .await?;
    print_details(&snapshot);
    Ok(())
}

pub async fn sync(client: &ApiClient) -> Result<()> {
    let report: SyncView = client.post_form("/sync/snapshots", &[]).await?;
    println!(
        "Looked at {} commits, {} new snapshots",
        report.seen, report.created
    );
    Ok(())
}

pub fn validate(path: &str) -> Result<()> {
    match kiln_config::load_system_config(path) {
        Ok(config) => {
            println!("Configuration is valid");
            println!("  repository: {} ({})", config.source.repository, config.source.branch);
            println!("  cluster:    {}", config.cluster.endpoint);
            println!("  storage:    {}/{}", config.storage.account, config.storage.container);
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

fn row(s: &SnapshotView) -> String {
    let state = s.task_state.as_deref().unwrap_or("-");
    let artifact = if s.artifact_url.is_some() { "yes" } else { "no" };
    let ignored = if s.ignored { " (ignored)" } else { "" };
    format!(
        "{}  {}  {:<10} {:<9} {:<3}  {}{}",
        s.short_id, s.committed_on, state, s.author, artifact, s.subject, ignored
    )
}

fn print_details(s: &SnapshotView) {
    println!("commit:   {}", s.commit_id);
    println!("subject:  {}", s.subject);
    println!("author:   {}", s.author);
    println!("date:     {}", s.committed_on);
    if s.ignored {
        println!("ignored:  yes");
    }
    println!("job:      {}", s.job_id.as_deref().unwrap_or("-"));
    if let Some(at) = s.job_last_checked_at {
        println!("checked:  {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("build:    {}", s.task_state.as_deref().unwrap_or("-"));
    println!("artifact: {}", s.artifact_url.as_deref().unwrap_or("-"));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(ignored: bool) -> SnapshotView {
        serde_json::from_value(serde_json::json!({
            "commit_id": "abc1234def",
            "short_id": "abc1234",
            "subject": "Fix the thing",
            "author": "Jane Doe",
            "committed_on": "2018-02-01",
            "ignored": ignored,
            "job_id": "build-abc1234def-20180301080000",
            "job_last_checked_at": null,
            "task_state": "running",
            "artifact_url": null,
            "message": "Fix the thing\n\nbody"
        }))
        .unwrap()
    }

    #[test]
    fn test_row() {
        let line = row(&view(false));
        assert!(line.starts_with("abc1234  2018-02-01  running"));
        assert!(line.ends_with("Fix the thing"));
        assert!(row(&view(true)).ends_with("(ignored)"));
    }
}
