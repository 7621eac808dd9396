/*!
 * Lifecycle integration tests: fork, exit, wait, kill, and reparenting.
 */

mod common;

use common::boot_with;
use kernos::{Config, KernelError, ProcState};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn fork_child_runs_and_wait_reaps_status() {
    let (kernel, result) = boot_with(Config::default(), |proc| {
        let pid = proc.fork_entry(|_| 42)?;
        let status = proc.waitpid(pid)?;
        Ok::<_, KernelError>((pid, status))
    });
    let (pid, status) = result.unwrap();
    assert_eq!(status, 42);
    // Reaped: the pid is gone from the table.
    assert!(kernel.ps().iter().all(|info| info.pid != pid));
    kernel.shutdown();
}

#[test]
fn plain_fork_reruns_the_parent_image() {
    let (kernel, result) = boot_with(Config::default(), |proc| {
        let runs = Arc::new(AtomicUsize::new(0));
        let parent = {
            let runs = Arc::clone(&runs);
            proc.fork_entry(move |p| {
                // The child re-enters this entry from the top; only the
                // first run forks.
                if runs.fetch_add(1, Ordering::SeqCst) == 0 {
                    match p.fork().and_then(|child| p.waitpid(child)) {
                        Ok(status) => status + 10,
                        Err(_) => -1,
                    }
                } else {
                    5
                }
            })?
        };
        let status = proc.waitpid(parent)?;
        Ok::<_, KernelError>((status, runs.load(Ordering::SeqCst)))
    });
    let (status, runs) = result.unwrap();
    assert_eq!(status, 15);
    assert_eq!(runs, 2);
    kernel.shutdown();
}

#[test]
fn exit_status_propagates_through_waitpid() {
    let (kernel, result) = boot_with(Config::default(), |proc| {
        let pid = proc.fork_entry(|p| p.exit(5))?;
        proc.waitpid(pid)
    });
    assert_eq!(result.unwrap(), 5);
    kernel.shutdown();
}

#[test]
fn wait_without_children_is_an_error() {
    let (kernel, result) = boot_with(Config::default(), |proc| proc.wait());
    assert_eq!(result.unwrap_err(), KernelError::NoChild);
    kernel.shutdown();
}

#[test]
fn waitpid_for_unknown_pid_is_an_error() {
    let (kernel, result) = boot_with(Config::default(), |proc| {
        let pid = proc.fork_entry(|_| 0)?;
        proc.waitpid(pid)?;
        proc.waitpid(9999)
    });
    assert_eq!(result.unwrap_err(), KernelError::NoChild);
    kernel.shutdown();
}

#[test]
fn orphans_are_reparented_to_init() {
    let (kernel, result) = boot_with(Config::default(), |proc| {
        // The middle process exits immediately, leaving its child behind.
        let middle = proc.fork_entry(|p| {
            p.fork_entry(|q| {
                let _ = q.sleep_ticks(3);
                7
            })
            .map(|_| 1)
            .unwrap_or(-1)
        })?;
        let middle_status = proc.waitpid(middle)?;
        // The grandchild now belongs to init.
        let (_, orphan_status) = proc.wait()?;
        Ok::<_, KernelError>((middle_status, orphan_status))
    });
    let (middle_status, orphan_status) = result.unwrap();
    assert_eq!(middle_status, 1);
    assert_eq!(orphan_status, 7);
    kernel.shutdown();
}

#[test]
fn kill_wakes_a_sleeping_process() {
    let (kernel, result) = boot_with(Config::default(), |proc| {
        let pid = proc.fork_entry(|p| match p.sleep_ticks(1_000_000) {
            Err(KernelError::Killed) => 9,
            _ => 0,
        })?;
        // Let the child reach its sleep before killing it.
        proc.sleep_ticks(5)?;
        proc.kernel().kill(pid)?;
        proc.waitpid(pid)
    });
    assert_eq!(result.unwrap(), 9);
    kernel.shutdown();
}

#[test]
fn kill_of_unknown_pid_is_an_error() {
    let (kernel, result) = boot_with(Config::default(), |proc| proc.kernel().kill(4242));
    assert_eq!(result.unwrap_err(), KernelError::NotFound(4242));
    kernel.shutdown();
}

#[test]
fn fork_fails_cleanly_when_table_is_full() {
    let cfg = Config {
        nproc: 2,
        ..Config::default()
    };
    let (kernel, result) = boot_with(cfg, |proc| {
        let sleeper = proc.fork_entry(|p| match p.sleep_ticks(1_000_000) {
            Err(KernelError::Killed) => 0,
            _ => -1,
        })?;
        let err = proc.fork_entry(|_| 0).unwrap_err();
        proc.kernel().kill(sleeper)?;
        proc.waitpid(sleeper)?;
        Ok::<_, KernelError>(err)
    });
    assert_eq!(result.unwrap(), KernelError::TableFull);
    kernel.shutdown();
}

#[test]
fn fork_fails_cleanly_when_memory_is_exhausted() {
    // Init takes 2 pages (context + image); 1 page left cannot hold a child.
    let cfg = Config {
        memory_pages: 3,
        ..Config::default()
    };
    let (kernel, result) = boot_with(cfg, |proc| proc.fork_entry(|_| 0).unwrap_err());
    assert_eq!(result, KernelError::OutOfMemory);
    // The failed fork left no partial record behind.
    assert_eq!(kernel.ps().len(), 1);
    kernel.shutdown();
}

#[test]
fn sleep_ticks_blocks_for_at_least_the_requested_ticks() {
    let (kernel, result) = boot_with(Config::default(), |proc| {
        let before = proc.kernel().now();
        proc.sleep_ticks(5)?;
        Ok::<_, KernelError>(proc.kernel().now() - before)
    });
    assert!(result.unwrap() >= 5);
    kernel.shutdown();
}

#[test]
fn ppid_and_info_reflect_the_tree() {
    let (kernel, result) = boot_with(Config::default(), |proc| {
        let me = proc.pid();
        let child = proc.fork_entry(move |p| {
            if p.ppid() == Some(me) {
                0
            } else {
                -1
            }
        })?;
        let status = proc.waitpid(child)?;
        let info = proc.info()?;
        Ok::<_, KernelError>((status, info))
    });
    let (status, info) = result.unwrap();
    assert_eq!(status, 0);
    assert_eq!(info.name, "init");
    assert_eq!(info.ppid, None);
    assert_eq!(info.state, ProcState::Running);
    assert!(info.memory_bytes > 0);
    kernel.shutdown();
}

#[test]
fn ps_lists_live_processes_and_dump_renders() {
    let (kernel, result) = boot_with(Config::default(), |proc| {
        let pid = proc.fork_entry(|p| match p.sleep_ticks(1_000_000) {
            Err(KernelError::Killed) => 0,
            _ => -1,
        })?;
        proc.sleep_ticks(5)?;
        let ps = proc.kernel().ps();
        let dump = proc.kernel().dump();
        proc.kernel().kill(pid)?;
        proc.waitpid(pid)?;
        Ok::<_, KernelError>((pid, ps, dump))
    });
    let (pid, ps, dump) = result.unwrap();
    assert_eq!(ps.len(), 2);
    let child = ps.iter().find(|info| info.pid == pid).unwrap();
    assert_eq!(child.state, ProcState::Sleeping);
    assert!(dump.contains("sleep"));
    assert!(dump.contains("init"));
    kernel.shutdown();
}
