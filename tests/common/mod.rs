/*!
 * Shared test harness: boots a kernel whose init process runs the test
 * scenario and reports its observations back to the test thread.
 */

use kernos::{Config, Kernel, ProcHandle};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

/// Tick interval for the background timer.
pub const STEP: Duration = Duration::from_millis(1);

/// Park a process until shutdown (or a kill).
pub fn park_forever(proc: &ProcHandle) -> i32 {
    loop {
        if proc.sleep_ticks(u64::MAX).is_err() {
            return 0;
        }
    }
}

/// Boot a kernel, run `body` as the init process, and hand its return value
/// back to the test thread. Init parks afterwards; call `shutdown` on the
/// returned kernel when done. Panics if the scenario takes over 10s.
pub fn boot_with<F, T>(cfg: Config, body: F) -> (Arc<Kernel>, T)
where
    F: Fn(&ProcHandle) -> T + Send + Sync + 'static,
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let kernel = Kernel::boot(cfg, move |proc| {
        let _ = tx.send(body(proc));
        park_forever(proc)
    })
    .expect("kernel failed to boot");
    kernel.spawn_timer(STEP);
    let out = rx
        .recv_timeout(Duration::from_secs(10))
        .expect("test scenario did not finish");
    (kernel, out)
}
