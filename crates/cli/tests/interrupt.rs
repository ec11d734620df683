// Ctrl-C handling of the batchrun binary
#![cfg(unix)]

use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("batchrun-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Two long commands that record their pid before becoming `sleep`
fn write_command_file(dir: &Path) -> PathBuf {
    let path = dir.join("cmds.txt");
    let lines: String = (0..2)
        .map(|i| format!("echo $$ > {}/pid{}; exec sleep 30\n", dir.display(), i))
        .collect();
    std::fs::write(&path, lines).unwrap();
    path
}

/// Start batchrun as the leader of its own group, like a terminal job
fn spawn_batchrun(command_file: &Path, extra_args: &[&str]) -> Child {
    Command::new(env!("CARGO_BIN_EXE_batchrun"))
        .arg(command_file)
        .args(["-j", "2", "--cpu-threshold", "100", "--mem-threshold", "100"])
        .args(["--sample-window-ms", "200", "--backoff-ms", "100"])
        .args(extra_args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .unwrap()
}

fn wait_for_pids(dir: &Path) -> Vec<i32> {
    let deadline = Instant::now() + Duration::from_secs(20);
    loop {
        let pids: Vec<i32> = (0..2)
            .filter_map(|i| std::fs::read_to_string(dir.join(format!("pid{}", i))).ok())
            .filter_map(|text| text.trim().parse().ok())
            .collect();
        if pids.len() == 2 {
            return pids;
        }
        assert!(Instant::now() < deadline, "commands never started");
        sleep(Duration::from_millis(50));
    }
}

/// A zombie left for an init that never reaps counts as gone
fn is_running(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .map_or(false, |rest| !rest.trim_start().starts_with('Z')),
        Err(_) => kill(Pid::from_raw(pid), None).is_ok(),
    }
}

fn interrupt_and_check(extra_args: &[&str], name: &str) {
    let dir = scratch_dir(name);
    let command_file = write_command_file(&dir);
    let mut batchrun = spawn_batchrun(&command_file, extra_args);
    let pids = wait_for_pids(&dir);

    // Ctrl-C in a terminal signals the whole foreground group
    killpg(Pid::from_raw(batchrun.id() as i32), Signal::SIGINT).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if batchrun.try_wait().unwrap().is_some() {
            break;
        }
        if Instant::now() > deadline {
            let _ = batchrun.kill();
            panic!("batchrun did not exit after SIGINT");
        }
        sleep(Duration::from_millis(50));
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while pids.iter().any(|pid| is_running(*pid)) && Instant::now() < deadline {
        sleep(Duration::from_millis(50));
    }
    let survivors: Vec<i32> = pids.into_iter().filter(|pid| is_running(*pid)).collect();
    let _ = std::fs::remove_dir_all(&dir);

    assert!(survivors.is_empty(), "commands survived Ctrl-C: {:?}", survivors);
}

#[test]
fn test_ctrl_c_stops_running_commands() {
    interrupt_and_check(&[], "interrupt");
}

#[test]
fn test_ctrl_c_stops_commands_in_their_own_group() {
    interrupt_and_check(&["--timeout-secs", "60"], "interrupt-timeout");
}
