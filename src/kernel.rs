/*!
 * Kernel Assembly
 * Configuration, boot, and the process-wide shared state
 */

use crate::clock::Clock;
use crate::core::errors::{KernelError, KernelResult};
use crate::core::types::{Channel, Pid, SlotId, Tick};
use crate::mem::{AddressSpace, MemoryPool};
use crate::proc::lifecycle::{self, ExitRequest};
use crate::proc::resources::Resources;
use crate::proc::scheduler;
use crate::proc::table::{ProcBody, ProcTable};
use crate::proc::types::{Policy, ProcState};
use crate::sync::BarrierPool;
use log::info;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

/// Kernel configuration.
#[derive(Clone)]
pub struct Config {
    /// Process table capacity.
    pub nproc: usize,
    /// Number of scheduler threads (CPUs).
    pub ncpus: usize,
    /// Page pool capacity shared by all address spaces.
    pub memory_pages: usize,
    /// Pages mapped for the init process image.
    pub init_pages: usize,
    /// SJF smoothing factor alpha as (numerator, denominator).
    pub burst_alpha: (u64, u64),
    /// Usage charged to the decayed CPU counter per voluntary yield;
    /// a blocking sleep charges half of it.
    pub cpu_charge: u64,
    /// Initial scheduling policy.
    pub policy: Policy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nproc: 64,
            ncpus: 1,
            memory_pages: 4096,
            init_pages: 1,
            burst_alpha: (1, 2),
            cpu_charge: 100,
            policy: Policy::RoundRobin,
        }
    }
}

pub struct Kernel {
    pub(crate) cfg: Config,
    pub(crate) table: ProcTable,
    pub(crate) pool: Arc<MemoryPool>,
    pub(crate) clock: Clock,
    pub(crate) policy: RwLock<Policy>,
    pub(crate) batch: Mutex<crate::proc::batch::BatchStats>,
    pub barriers: BarrierPool,
    init_slot: OnceLock<SlotId>,
    shutdown: AtomicBool,
    cpus: Mutex<Vec<JoinHandle<()>>>,
    timers: Mutex<Vec<JoinHandle<()>>>,
}

static EXIT_PANIC_HOOK: Once = Once::new();

impl Kernel {
    /// Boot the kernel: build the shared state, create the init process
    /// from `init_body`, and start one scheduler thread per CPU.
    pub fn boot<F>(cfg: Config, init_body: F) -> KernelResult<Arc<Kernel>>
    where
        F: Fn(&crate::proc::handle::ProcHandle) -> i32 + Send + Sync + 'static,
    {
        // exit() unwinds the process thread with an ExitRequest payload;
        // keep the default hook from logging those as crashes.
        EXIT_PANIC_HOOK.call_once(|| {
            let previous = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |panic_info| {
                if panic_info.payload().downcast_ref::<ExitRequest>().is_none() {
                    previous(panic_info);
                }
            }));
        });

        let pool = MemoryPool::new(cfg.memory_pages);
        let kernel = Arc::new(Kernel {
            table: ProcTable::new(cfg.nproc),
            pool: Arc::clone(&pool),
            clock: Clock::new(),
            policy: RwLock::new(cfg.policy),
            batch: Mutex::new(Default::default()),
            barriers: BarrierPool::new(),
            init_slot: OnceLock::new(),
            shutdown: AtomicBool::new(false),
            cpus: Mutex::new(Vec::new()),
            timers: Mutex::new(Vec::new()),
            cfg,
        });

        let body: ProcBody = Arc::new(init_body);
        let (slot, pid) = kernel.spawn_init(&body)?;
        kernel
            .init_slot
            .set(slot)
            .expect("boot: init already created");
        lifecycle::spawn_process_thread(Arc::clone(&kernel), slot, pid, body)
            .map_err(|_| KernelError::OutOfMemory)?;

        let mut cpus = kernel.cpus.lock();
        for cpu in 0..kernel.cfg.ncpus {
            let k = Arc::clone(&kernel);
            let handle = std::thread::Builder::new()
                .name(format!("cpu-{cpu}"))
                .spawn(move || scheduler::scheduler_loop(k, cpu))
                .expect("boot: failed to start scheduler thread");
            cpus.push(handle);
        }
        drop(cpus);

        info!(
            "kernel booted: {} cpus, {} slots, policy {}",
            kernel.cfg.ncpus,
            kernel.cfg.nproc,
            kernel.policy()
        );
        Ok(kernel)
    }

    fn spawn_init(&self, body: &ProcBody) -> KernelResult<(SlotId, Pid)> {
        let (slot, mut rec) = self.table.alloc(&self.pool, 0)?;
        let mut space = AddressSpace::empty(&self.pool);
        if let Err(e) = space.map_initial(self.cfg.init_pages) {
            self.table.free(&mut rec);
            return Err(e);
        }
        rec.name = "init".into();
        rec.space = Some(space);
        rec.files = Some(Resources::stdio());
        rec.entry = Some(Arc::clone(body));
        rec.state = ProcState::Runnable;
        rec.enqueued_at = 0;
        Ok((slot, rec.pid))
    }

    /// Stop the scheduler threads and wait for them. Processes that are
    /// still blocked stay parked; their threads are detached.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let handles: Vec<_> = self.cpus.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
        let timers: Vec<_> = self.timers.lock().drain(..).collect();
        for handle in timers {
            let _ = handle.join();
        }
        info!("kernel shut down");
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Advance the tick counter by one and wake timed sleepers. Called by
    /// the external timer (or `spawn_timer`).
    pub fn tick(&self) -> Tick {
        let now = self.clock.advance();
        self.wakeup(Channel::TICKS);
        now
    }

    /// Run a background timer calling `tick` at `interval` until shutdown.
    pub fn spawn_timer(self: &Arc<Self>, interval: Duration) {
        let k = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("timer".into())
            .spawn(move || {
                while !k.is_shutdown() {
                    std::thread::sleep(interval);
                    k.tick();
                }
            })
            .expect("failed to start timer thread");
        self.timers.lock().push(handle);
    }

    /// Current tick count.
    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Current scheduling policy.
    pub fn policy(&self) -> Policy {
        *self.policy.read()
    }

    /// Swap the scheduling policy at runtime; returns the previous one.
    pub fn set_policy(&self, new_policy: Policy) -> Policy {
        let mut policy = self.policy.write();
        let previous = *policy;
        *policy = new_policy;
        drop(policy);
        if previous != new_policy {
            info!("scheduling policy changed: {} -> {}", previous, new_policy);
        }
        previous
    }

    pub(crate) fn init_slot(&self) -> SlotId {
        *self.init_slot.get().expect("kernel not booted")
    }

    /// Pid of the init process.
    pub fn init_pid(&self) -> Pid {
        self.table.slot(self.init_slot()).inner.lock().pid
    }

    /// Set the sticky killed flag on `pid`; a sleeping victim becomes
    /// Runnable immediately and observes the flag at its next cooperative
    /// check. Advisory, never forced mid-instruction.
    pub fn kill(&self, pid: Pid) -> KernelResult<()> {
        for slot in self.table.slots() {
            let mut rec = slot.inner.lock();
            if rec.state != ProcState::Unused && rec.pid == pid {
                rec.killed = true;
                if rec.state == ProcState::Sleeping {
                    // Only the state flips; accounting stamps are left alone.
                    rec.state = ProcState::Runnable;
                }
                info!("kill: pid {} marked", pid);
                return Ok(());
            }
        }
        Err(KernelError::NotFound(pid))
    }
}
