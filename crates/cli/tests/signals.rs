#![forbid(unsafe_code)]

#[cfg(unix)]
mod unix {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;
    use std::fs;
    use std::io;
    use std::path::Path;
    use std::process::{Child, Command, Output, Stdio};
    use std::thread::sleep;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    #[test]
    fn sigint_shuts_down_cleanly() -> io::Result<()> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.toml");
        write_config(&config_path, &dir.path().join("logs"))?;

        let child = spawn(&config_path)?;
        sleep(Duration::from_millis(500));
        kill(Pid::from_raw(child.id() as i32), Signal::SIGINT).ok();

        let output = wait_for_output(child)?;
        let combined = combined(&output);
        assert!(output.status.success(), "{combined}");
        assert!(combined.contains("received shutdown signal"), "{combined}");
        assert!(combined.contains("shutdown complete"), "{combined}");
        assert!(dir.path().join("logs/usb.log").exists());

        Ok(())
    }

    #[test]
    fn sigterm_shuts_down_cleanly() -> io::Result<()> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.toml");
        write_config(&config_path, &dir.path().join("logs"))?;

        let child = spawn(&config_path)?;
        sleep(Duration::from_millis(500));
        kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).ok();

        let output = wait_for_output(child)?;
        let combined = combined(&output);
        assert!(output.status.success(), "{combined}");
        assert!(combined.contains("shutdown complete"), "{combined}");

        Ok(())
    }

    #[test]
    fn unusable_log_directory_is_fatal() -> io::Result<()> {
        let dir = tempdir()?;
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"")?;
        let config_path = dir.path().join("config.toml");
        write_config(&config_path, &blocker)?;

        let output = wait_for_output(spawn(&config_path)?)?;
        assert!(!output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("ERROR"), "{stdout}");
        assert!(stdout.contains("fatal: cannot open usb audit log"), "{stdout}");

        Ok(())
    }

    fn spawn(config_path: &Path) -> io::Result<Child> {
        Command::new(env!("CARGO_BIN_EXE_airgapd"))
            .arg("--config")
            .arg(config_path)
            .arg("-v")
            .env("NO_COLOR", "1")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
    }

    // The enumeration program does not exist, so every poll fails and no
    // monitor is ever started. That keeps the test independent of real
    // hardware and of fanotify privileges.
    fn write_config(path: &Path, log_dir: &Path) -> io::Result<()> {
        let contents = format!(
            "[monitor]\n\
poll_interval = 50\n\
lsblk = \"/nonexistent/lsblk\"\n\n\
[logging]\n\
directory = \"{}\"\n\
usb_file = \"usb.log\"\n\
cpu_file = \"cpu.log\"\n\n\
[cpu]\n\
interval = 100\n",
            log_dir.display()
        );
        fs::write(path, contents)
    }

    fn combined(output: &Output) -> String {
        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        combined
    }

    fn wait_for_output(mut child: Child) -> io::Result<Output> {
        let start = Instant::now();
        loop {
            if child.try_wait()?.is_some() {
                break;
            }
            if start.elapsed() > Duration::from_secs(10) {
                let _ = child.kill();
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "airgapd did not exit",
                ));
            }
            sleep(Duration::from_millis(50));
        }
        child.wait_with_output()
    }
}

#[cfg(not(unix))]
#[test]
fn sigint_shuts_down_cleanly() {
    // Signals are only supported in the Unix build.
}
