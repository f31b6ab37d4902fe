//! [MODULE E] Controlled synchronization primitives.
//!
//! Each primitive here is a thin wrapper over a `Resource` in the
//! scheduler's resource table: the actual state (owner, waiter queue,
//! signal bit, count) lives behind `ResourceTable`, and these types only
//! add the primitive-specific protocol (acquire/release, set/reset,
//! wait-all/wait-any) on top of `Scheduler::block_on`/`schedule_point`.

pub mod event;
pub mod interlocked;
pub mod mutex;
pub mod semaphore;
pub mod spin_wait;
pub mod task;
pub mod volatile;
pub mod wait_handle;

pub use event::ControlledEvent;
pub use interlocked::ControlledAtomic64;
pub use mutex::ControlledMutex;
pub use semaphore::ControlledSemaphore;
pub use spin_wait::SpinWait;
pub use task::ControlledTask;
pub use volatile::ControlledCell;
