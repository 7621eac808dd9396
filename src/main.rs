/*!
 * kernos demo
 * Boots the kernel, runs a batch workload under each policy family, and
 * prints the accounting
 */

use kernos::{Config, Kernel, Policy, ProcHandle};
use log::info;
use std::sync::mpsc;
use std::time::Duration;

fn spin_for(proc: &ProcHandle, ticks: u64) {
    let start = proc.kernel().now();
    while proc.kernel().now() - start < ticks {
        proc.yield_now();
    }
}

fn batch_job(proc: &ProcHandle, bursts: u64, burst_ticks: u64) -> i32 {
    for _ in 0..bursts {
        spin_for(proc, burst_ticks);
        if proc.sleep_ticks(1).is_err() {
            return -1;
        }
    }
    0
}

fn run_demo(proc: &ProcHandle) -> Result<(), kernos::KernelError> {
    let kernel = proc.kernel().clone();

    info!("demo: interactive children under {}", kernel.policy());
    let mut children = Vec::new();
    for n in 0..3 {
        children.push(proc.fork_entry(move |p| {
            for _ in 0..5 {
                p.yield_now();
            }
            n
        })?);
    }
    for pid in &children {
        let status = proc.waitpid(*pid)?;
        info!("demo: interactive pid {} exited with {}", pid, status);
    }

    kernel.set_policy(Policy::Sjf);
    info!("demo: batch jobs under {}", kernel.policy());
    let mut jobs = Vec::new();
    for (priority, burst) in [(0, 2u64), (0, 6), (0, 4)] {
        jobs.push(proc.fork_batch(priority, move |p| batch_job(p, 4, burst))?);
    }
    for pid in &jobs {
        proc.waitpid(*pid)?;
    }
    println!("{}", proc.batch_report()?);

    kernel.set_policy(Policy::Unix);
    info!("demo: batch jobs under {}", kernel.policy());
    let mut jobs = Vec::new();
    for priority in [0i64, 50, 100] {
        jobs.push(proc.fork_batch(priority, |p| batch_job(p, 3, 3))?);
    }
    for pid in &jobs {
        proc.waitpid(*pid)?;
    }
    println!("{}", proc.batch_report()?);

    for snapshot in kernel.ps() {
        info!(
            "ps: pid {} ({}) state {} etime {}",
            snapshot.pid, snapshot.name, snapshot.state, snapshot.etime
        );
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let (done_tx, done_rx) = mpsc::channel();
    let kernel = Kernel::boot(Config::default(), move |proc| {
        let result = run_demo(proc);
        let _ = done_tx.send(result);
        // Init never exits; park until shutdown.
        loop {
            if proc.sleep_ticks(u64::MAX).is_err() {
                return 0;
            }
        }
    })
    .expect("boot failed");

    kernel.spawn_timer(Duration::from_millis(1));

    match done_rx.recv() {
        Ok(Ok(())) => info!("demo finished"),
        Ok(Err(e)) => eprintln!("demo failed: {e}"),
        Err(_) => eprintln!("demo aborted"),
    }
    kernel.shutdown();
}
