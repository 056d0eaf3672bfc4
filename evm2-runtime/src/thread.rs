//! VM thread: one register machine plus its cancellation task

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use evm2_spec::{Bitstream, Opcode};
use tracing::{debug, error};

use crate::error::{Result, RuntimeError};
use crate::machine::Machine;
use crate::memory::Memory;
use crate::task::{StopHandle, Task};

/// Index of the thread that starts at the entry point
pub const MAIN_THREAD: usize = 0;

#[derive(Debug)]
pub struct Thread {
    index: usize,
    machine: Machine,
    task: Task,
}

impl Thread {
    /// The main thread, starting at bit 0 with zeroed registers
    pub fn main(code: Arc<Bitstream>, memory: Arc<Memory>) -> Self {
        Self {
            index: MAIN_THREAD,
            machine: Machine::new(code, memory),
            task: Task::new(),
        }
    }

    /// New thread `index` starting at `entry_point` with a copy of this
    /// thread's registers
    pub fn spawn(&self, index: usize, entry_point: u32) -> Result<Self> {
        Ok(Self {
            index,
            machine: self.machine.fork(entry_point)?,
            task: Task::new(),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.task.handle()
    }

    /// Run until an opcode needs a process service.
    ///
    /// `sleep` is served here. Any error ends the thread: it is logged and
    /// reported as [`Opcode::Stopped`].
    pub fn run(&mut self, sleep_slice: Duration) -> Opcode {
        match self.step(sleep_slice) {
            Ok(opcode) => opcode,
            Err(err) => {
                error!(thread = self.index, error = %err, "thread has been stopped");
                Opcode::Stopped
            }
        }
    }

    fn step(&mut self, sleep_slice: Duration) -> Result<Opcode> {
        while self.task.can_run() {
            match self.machine.run(&self.task)? {
                Opcode::Sleep => {
                    let milliseconds = self.machine.read_arg(0)?;
                    self.sleep(milliseconds, sleep_slice);
                }
                opcode if opcode.is_unknown() => {
                    return Err(RuntimeError::UnknownInstruction(opcode));
                }
                opcode => return Ok(opcode),
            }
        }

        Ok(Opcode::Stopped)
    }

    /// Sleep in whole slices while the task may run, then the remainder
    fn sleep(&self, milliseconds: i64, slice: Duration) {
        let total = Duration::from_millis(milliseconds.max(0) as u64);
        debug!(thread = self.index, ?total, "sleep");

        let slice_nanos = slice.as_nanos().max(1);
        let slices = total.as_nanos() / slice_nanos;
        let remainder = Duration::from_nanos((total.as_nanos() % slice_nanos) as u64);

        for _ in 0..slices {
            if !self.task.can_run() {
                break;
            }
            thread::sleep(slice);
        }
        if !remainder.is_zero() {
            thread::sleep(remainder);
        }
    }
}
