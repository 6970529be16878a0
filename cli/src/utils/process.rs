use anyhow::{anyhow, Context, Result};
use log::debug;
use std::{
    ffi::OsStr,
    path::Path,
    process::{Command, Stdio},
};

fn describe(command: &Command) -> String {
    let mut description = command.get_program().to_string_lossy().into_owned();
    for arg in command.get_args() {
        description.push(' ');
        description.push_str(&arg.to_string_lossy());
    }
    description
}

/// Run `command` to completion and return its trimmed stdout.
pub fn output(command: &mut Command) -> Result<String> {
    let description = describe(command);
    debug!("Running `{}`", description);
    let output = command
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute `{description}`"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "`{}` exited with {}: {}",
            description,
            output.status,
            stderr.trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
}

/// Run `command` with the terminal attached, so long builds show their own progress.
pub fn run_attached(command: &mut Command) -> Result<()> {
    let description = describe(command);
    debug!("Running `{}`", description);
    let status = command
        .status()
        .with_context(|| format!("Failed to execute `{description}`"))?;
    if !status.success() {
        return Err(anyhow!("`{}` exited with {}", description, status));
    }
    Ok(())
}

pub fn git_clone(url: &str, destination: &Path) -> Result<()> {
    output(
        Command::new("git")
            .args(["clone", "--depth", "1", url])
            .arg(destination),
    )
    .with_context(|| format!("Could not clone template repository `{url}`"))
    .map(|_| ())
}

pub fn docker_build(image: &str, context_dir: &Path) -> Result<()> {
    run_attached(
        Command::new("docker")
            .args(["build", "-t", image])
            .arg(context_dir),
    )
    .with_context(|| format!("Could not build image `{image}`"))
}

pub fn docker_push(image: &str) -> Result<()> {
    run_attached(Command::new("docker").args(["push", image]))
        .with_context(|| format!("Could not push image `{image}`"))
}

pub fn gcloud_access_token(gcloud: impl AsRef<OsStr>) -> Result<String> {
    output(Command::new(gcloud).args(["auth", "print-access-token"]))
}
