//! The two-task graph of a build job.
//!
//! `build` fetches exactly one commit, runs the configured build commands
//! and archives the output directory; the archive is uploaded by an output
//! file rule only if the task succeeds. `report` runs after `build` whatever
//! its outcome and posts the job's secret back to Kiln.

use kiln_config::BuildVariablesBuilder;
use kiln_core::cluster::{BUILD_TASK_ID, OutputFileRule, REPORT_TASK_ID, TaskSpec};
use kiln_core::{BUILD_COMPLETED_EVENT, CALLBACK_EVENT_HEADER, CallbackSecret, JobId};

use crate::Settings;

/// Inputs that vary per submission.
pub struct BuildRequest<'a> {
    pub commit_id: &'a str,
    pub clone_url: &'a str,
    pub artifact_name: &'a str,
    pub upload_url: &'a str,
    pub job_id: &'a JobId,
    pub secret: &'a CallbackSecret,
}

pub fn job_tasks(settings: &Settings, request: &BuildRequest<'_>) -> Vec<TaskSpec> {
    vec![build_task(settings, request), report_task(settings, request)]
}

fn build_task(settings: &Settings, request: &BuildRequest<'_>) -> TaskSpec {
    TaskSpec {
        id: BUILD_TASK_ID.to_string(),
        command_line: bash(&build_script(settings, request)),
        depends_on: vec![],
        output_files: vec![OutputFileRule {
            file_pattern: request.artifact_name.to_string(),
            container_url: request.upload_url.to_string(),
            path: request.artifact_name.to_string(),
        }],
        satisfy_dependents_on_failure: true,
    }
}

fn report_task(settings: &Settings, request: &BuildRequest<'_>) -> TaskSpec {
    TaskSpec {
        id: REPORT_TASK_ID.to_string(),
        command_line: bash(&report_script(settings, request)),
        depends_on: vec![BUILD_TASK_ID.to_string()],
        output_files: vec![],
        satisfy_dependents_on_failure: false,
    }
}

/// Shell script run by the build task.
pub fn build_script(settings: &Settings, request: &BuildRequest<'_>) -> String {
    let vars = BuildVariablesBuilder::new()
        .with_commit(request.commit_id)
        .with_source_url(request.clone_url)
        .with_artifact(request.artifact_name)
        .with_output_dir(&settings.output_dir)
        .with_env_map(&settings.build_env)
        .build();

    let mut steps = vec![
        "mkdir -p src".to_string(),
        "cd src".to_string(),
        "git init -q".to_string(),
        format!("git remote add origin {}", shell_quote(request.clone_url)),
        format!(
            "git fetch -q --depth 1 origin {}",
            shell_quote(request.commit_id)
        ),
        "git checkout -q FETCH_HEAD".to_string(),
    ];

    let mut env: Vec<_> = settings.build_env.iter().collect();
    env.sort();
    steps.extend(
        env.into_iter()
            .map(|(key, value)| format!("export {}={}", key, shell_quote(&vars.interpolate(value)))),
    );

    steps.extend(vars.interpolate_vec(&settings.build_commands));
    steps.push(format!(
        "tar -cf {} -C {} .",
        shell_quote(&format!("../{}", request.artifact_name)),
        shell_quote(&settings.output_dir)
    ));

    steps.join(" && ")
}

/// Shell script run by the report task.
pub fn report_script(settings: &Settings, request: &BuildRequest<'_>) -> String {
    let url = format!(
        "{}{}",
        settings.public_url.trim_end_matches('/'),
        kiln_core::callback_path(request.commit_id)
    );
    format!(
        "curl -fsS -X POST -H {} --data-urlencode {} --data-urlencode {} {}",
        shell_quote(&format!("{CALLBACK_EVENT_HEADER}: {BUILD_COMPLETED_EVENT}")),
        shell_quote(&format!("secret={}", request.secret.expose())),
        shell_quote(&format!("job_id={}", request.job_id)),
        shell_quote(&url),
    )
}

fn bash(script: &str) -> String {
    format!("/bin/bash -c {}", shell_quote(script))
}

/// Single-quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
