//! Launches a detached service process.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use tracing::info;

use crate::PROCESS_TARGET;
use crate::error::ControlError;
use crate::registry::ServiceDescriptor;

/// Spawns `service` in its own session with output appended to its logs.
pub(crate) fn spawn_service(service: &ServiceDescriptor) -> Result<Child, ControlError> {
    let stdout = open_log(service.stdout_log())?;
    let stderr = match service.stderr_log() {
        Some(path) => open_log(path)?,
        None => stdout
            .try_clone()
            .map_err(|source| ControlError::OpenLog {
                path: service.stdout_log().to_path_buf(),
                source,
            })?,
    };

    let mut command = match service.launcher() {
        Some(launcher) => {
            let mut command = Command::new(launcher);
            command.arg(service.executable());
            command
        }
        None => Command::new(service.executable_path()),
    };
    command
        .args(service.args())
        .current_dir(service.working_dir())
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));
    detach(&mut command);

    let child = command.spawn().map_err(|source| ControlError::Launch {
        service: service.name().to_owned(),
        program: service.command_line(),
        source,
    })?;
    info!(
        target: PROCESS_TARGET,
        service = service.name(),
        pid = child.id(),
        command = %service.command_line(),
        "spawned service process"
    );
    Ok(child)
}

fn open_log(path: &Path) -> Result<File, ControlError> {
    let open = || -> io::Result<File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    };
    open().map_err(|source| ControlError::OpenLog {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    // SAFETY: the hook runs between fork and exec and only calls setsid(2),
    // which is async-signal-safe and touches no state shared with the parent.
    unsafe {
        command.pre_exec(|| {
            nix::unistd::setsid()
                .map(drop)
                .map_err(io::Error::from)
        });
    }
}

#[cfg(not(unix))]
fn detach(_command: &mut Command) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str, body: &str) -> ServiceDescriptor {
        fs::write(dir.join(name), format!("{body}\n")).expect("write script");
        ServiceDescriptor::new("alpha", name, dir).with_launcher("sh")
    }

    fn read_when_ready(path: &Path, needle: &str) -> String {
        for _ in 0..100 {
            let content = fs::read_to_string(path).unwrap_or_default();
            if content.contains(needle) {
                return content;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        fs::read_to_string(path).unwrap_or_default()
    }

    #[test]
    fn output_is_appended_to_the_service_log() {
        let dir = TempDir::new().expect("temp dir");
        let service = script(dir.path(), "alpha.sh", "echo out; echo err >&2");
        fs::create_dir_all(dir.path().join("logs")).expect("logs");
        fs::write(service.stdout_log(), "earlier\n").expect("seed log");

        let mut child = spawn_service(&service).expect("spawn");
        child.wait().expect("wait");

        let log = read_when_ready(service.stdout_log(), "err");
        assert!(log.starts_with("earlier\n"), "existing log content kept: {log}");
        assert!(log.contains("out"));
        assert!(log.contains("err"));
    }

    #[test]
    fn stderr_goes_to_its_own_log_when_configured() {
        let dir = TempDir::new().expect("temp dir");
        let service = script(dir.path(), "alpha.sh", "echo out; echo err >&2")
            .with_stderr_log("logs/alpha_error.log");

        let mut child = spawn_service(&service).expect("spawn");
        child.wait().expect("wait");

        let errors = read_when_ready(dir.path().join("logs/alpha_error.log").as_path(), "err");
        assert_eq!(errors.trim(), "err");
        let log = read_when_ready(service.stdout_log(), "out");
        assert_eq!(log.trim(), "out");
    }

    #[test]
    fn child_leads_its_own_session() {
        let dir = TempDir::new().expect("temp dir");
        let service = script(dir.path(), "alpha.sh", "exec sleep 30");

        let mut child = spawn_service(&service).expect("spawn");
        let pid = nix::unistd::Pid::from_raw(i32::try_from(child.id()).expect("pid fits"));
        let session = nix::unistd::getsid(Some(pid)).expect("getsid");
        child.kill().expect("kill");
        child.wait().expect("wait");

        assert_eq!(session, pid);
    }

    #[test]
    fn missing_launcher_reports_launch_error() {
        let dir = TempDir::new().expect("temp dir");
        let service = ServiceDescriptor::new("alpha", "alpha.py", dir.path())
            .with_launcher("definitely-not-an-interpreter");

        let result = spawn_service(&service);
        let Err(ControlError::Launch { service, .. }) = result else {
            panic!("expected Launch error, got {result:?}");
        };
        assert_eq!(service, "alpha");
    }
}
