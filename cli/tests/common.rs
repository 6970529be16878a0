use once_cell::sync::Lazy;
use std::{
    ffi::OsStr,
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
};
use tempfile::TempDir;

pub const TEST_TOKEN: &str = "test-token";

const INHERITED_VARIABLES: [&str; 6] = [
    "FUGA_PROJECT_ID",
    "FUGA_BUCKET_NAME",
    "FUGA_ENVIRONMENT_PATH",
    "FUGA_TEMPLATES_DIR",
    "FUGA_ACCESS_TOKEN",
    "RUST_LOG",
];

pub struct TestCli {
    cli_path: PathBuf,
}

static TEST_CLI: Lazy<TestCli> = Lazy::new(|| {
    let cli_path = std::env::current_exe()
        .ok()
        .and_then(|p| Some(p.parent()?.parent()?.join("fuga")))
        .expect("Could not resolve CLI executable from test executable");
    TestCli { cli_path }
});

/// A fuga installation living in a temporary `FUGA_HOME`, talking to the mockito server.
pub struct TestHome {
    pub home: TempDir,
    pub work_dir: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        Self {
            home: TempDir::new().expect("Could not create FUGA_HOME"),
            work_dir: TempDir::new().expect("Could not create working directory"),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.home.path().join("config.yml")
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }
}

impl TestCli {
    pub fn get() -> &'static Self {
        &TEST_CLI
    }

    pub fn command(&self, home: &TestHome) -> Command {
        let mut command = Command::new(&self.cli_path);
        for variable in INHERITED_VARIABLES {
            command.env_remove(variable);
        }
        command
            .current_dir(home.work_dir())
            .env("FUGA_HOME", home.home.path())
            .env("FUGA_RESOURCE_MANAGER_ENDPOINT", mockito::server_url())
            .env("FUGA_STORAGE_ENDPOINT", mockito::server_url())
            .env("FUGA_COMPOSER_ENDPOINT", mockito::server_url())
            .arg("--token")
            .arg(TEST_TOKEN);
        command
    }

    pub fn run(&self, home: &TestHome, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> String {
        self.output(self.command(home).args(args))
    }

    pub fn run_and_error(
        &self,
        home: &TestHome,
        args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    ) -> Output {
        let output = self.command(home).args(args).output().unwrap();
        if output.status.success() {
            panic!(
                "succeeded running command (expected failure):\n{}",
                String::from_utf8_lossy(&output.stdout)
            );
        }
        output
    }

    /// Feed `stdin` to the command and capture everything, whatever the exit status.
    pub fn output_with_stdin(
        &self,
        home: &TestHome,
        args: impl IntoIterator<Item = impl AsRef<OsStr>>,
        stdin: &[u8],
    ) -> Output {
        let mut process = self
            .command(home)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        process.stdin.take().unwrap().write_all(stdin).unwrap();
        process.wait_with_output().unwrap()
    }

    pub fn output(&self, command: &mut Command) -> String {
        let output = command.output().unwrap();

        if !output.status.success() {
            panic!(
                "failed to run command:\n{}",
                String::from_utf8_lossy(&output.stderr)
            );
        }

        String::from_utf8(output.stdout).unwrap()
    }
}
