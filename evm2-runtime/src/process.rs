//! Process: thread table, lock table and I/O services
//!
//! Every VM thread runs on its own OS thread. The machine executes
//! computational opcodes inline and surfaces the rest here, where
//! [`Process::serve`] turns them into system services. Threads refer to each
//! other by table index only.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self as os, JoinHandle};

use evm2_spec::{Bitstream, ImageHeader, Opcode, Program};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::config::VmConfig;
use crate::error::{Result, RuntimeError};
use crate::io::{BinaryFile, Console};
use crate::loader;
use crate::locks::LockTable;
use crate::memory::Memory;
use crate::task::{StopHandle, Task};
use crate::thread::{Thread, MAIN_THREAD};

#[derive(Debug)]
struct ThreadEntry {
    stop: StopHandle,
    /// OS thread running the entry; `None` for the main thread and once joined
    unit: Option<JoinHandle<()>>,
}

#[derive(Debug, Default)]
struct ThreadTable {
    entries: Vec<ThreadEntry>,
    /// Set by termination; no thread is created afterwards
    shutting_down: bool,
}

#[derive(Debug)]
struct Shared {
    header: ImageHeader,
    code: Arc<Bitstream>,
    memory: Arc<Memory>,
    config: VmConfig,
    task: Task,
    started: AtomicBool,
    threads: Mutex<ThreadTable>,
    locks: LockTable,
    console: Mutex<Console>,
    file: Mutex<BinaryFile>,
}

/// A loaded program and its runtime state
///
/// Cloning yields another handle to the same process.
#[derive(Debug, Clone)]
pub struct Process {
    shared: Arc<Shared>,
}

impl Process {
    /// Load the image at `path` with the default configuration
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_config(path, VmConfig::default())
    }

    pub fn load_with_config(path: impl AsRef<Path>, config: VmConfig) -> Result<Self> {
        let program = loader::load(path.as_ref())?;
        Ok(Self::from_program(&program, config))
    }

    pub fn from_program(program: &Program, config: VmConfig) -> Self {
        let console = Console::new(config.input.clone(), config.capture_output);
        Self {
            shared: Arc::new(Shared {
                header: program.header.clone(),
                code: Arc::new(program.bitstream()),
                memory: Arc::new(Memory::from_image(program.memory_image())),
                config,
                task: Task::new(),
                started: AtomicBool::new(false),
                threads: Mutex::new(ThreadTable::default()),
                locks: LockTable::new(),
                console: Mutex::new(console),
                file: Mutex::new(BinaryFile::closed()),
            }),
        }
    }

    pub fn header(&self) -> &ImageHeader {
        &self.shared.header
    }

    pub fn memory(&self) -> &Memory {
        &self.shared.memory
    }

    pub fn config(&self) -> &VmConfig {
        &self.shared.config
    }

    /// Captured console output, if capture is enabled
    pub fn output(&self) -> Option<Vec<i64>> {
        self.shared.console.lock().output().map(<[i64]>::to_vec)
    }

    /// Number of threads created so far, main thread included
    pub fn thread_count(&self) -> usize {
        self.shared.threads.lock().entries.len()
    }

    /// Run the program on the calling thread.
    ///
    /// Returns once the main thread has ended and every other thread has been
    /// stopped and joined. An error that ends the main thread is returned
    /// after termination.
    pub fn start(&self) -> Result<()> {
        if self.shared.started.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::AlreadyStarted);
        }

        if let Some(path) = &self.shared.config.binary_file {
            *self.shared.file.lock() = BinaryFile::open(path)?;
        }

        let main = Thread::main(Arc::clone(&self.shared.code), Arc::clone(&self.shared.memory));
        self.shared.threads.lock().entries.push(ThreadEntry {
            stop: main.stop_handle(),
            unit: None,
        });

        info!(
            code_bits = self.shared.code.len(),
            memory = self.shared.memory.len(),
            "process started"
        );
        self.run_thread(main)
    }

    /// Request cancellation of the process and every thread it has started.
    ///
    /// Safe to call at any time and from any thread.
    pub fn stop(&self) {
        debug!("stop requested");
        self.shared.task.stop();
        for entry in &self.shared.threads.lock().entries {
            entry.stop.stop();
        }
    }

    fn run_thread(&self, mut thread: Thread) -> Result<()> {
        let index = thread.index();
        let result = self.serve(&mut thread);
        if let Err(err) = &result {
            error!(thread = index, error = %err, "thread has been stopped");
        }

        if index == MAIN_THREAD {
            self.terminate();
        }
        result
    }

    /// Service loop for one thread
    fn serve(&self, thread: &mut Thread) -> Result<()> {
        let config = &self.shared.config;

        while self.shared.task.can_run() {
            let opcode = thread.run(config.sleep_slice);
            trace!(thread = thread.index(), %opcode, "service");

            match opcode {
                Opcode::ThreadCreate => {
                    let address = thread.machine().instruction().address;
                    match self.create_thread(thread, address)? {
                        Some(index) => thread.machine_mut().write_arg(0, index as i64)?,
                        None => return Ok(()),
                    }
                }
                Opcode::ThreadJoin => {
                    let target = thread.machine().read_arg(0)?;
                    self.join_thread(target, thread.index())?;
                }
                Opcode::Read => {
                    let machine = thread.machine_mut();
                    let offset = machine.read_arg(0)?;
                    let count = machine.read_arg(1)?;
                    let address = machine.read_arg(2)?;
                    let transferred =
                        self.shared
                            .file
                            .lock()
                            .read(offset, count, &self.shared.memory, address)?;
                    machine.write_arg(3, transferred)?;
                }
                Opcode::Write => {
                    let machine = thread.machine();
                    let offset = machine.read_arg(0)?;
                    let count = machine.read_arg(1)?;
                    let address = machine.read_arg(2)?;
                    self.shared
                        .file
                        .lock()
                        .write(offset, count, &self.shared.memory, address)?;
                }
                Opcode::ConRead => {
                    let value = self.shared.console.lock().read();
                    thread.machine_mut().write_arg(0, value)?;
                }
                Opcode::ConWrite => {
                    let value = thread.machine().read_arg(0)?;
                    self.shared.console.lock().write(value)?;
                }
                Opcode::Lock => {
                    let lock = thread.machine().read_arg(0)?;
                    // A stopped waiter falls through; the next run reports it
                    self.shared.locks.lock(
                        lock,
                        thread.index(),
                        thread.task(),
                        config.lock_poll_interval,
                    )?;
                }
                Opcode::Unlock => {
                    let lock = thread.machine().read_arg(0)?;
                    self.shared.locks.unlock(lock);
                    if !self.shared.locks.holds_any(thread.index()) {
                        os::sleep(config.unlock_pause);
                    }
                }
                Opcode::Halt | Opcode::Padding | Opcode::Stopped => return Ok(()),
                opcode => return Err(RuntimeError::Unserviced(opcode)),
            }
        }

        Ok(())
    }

    /// Spawn a child of `parent` at `address`.
    ///
    /// Returns `None` once a stop or termination has begun.
    fn create_thread(&self, parent: &Thread, address: u32) -> Result<Option<usize>> {
        let mut table = self.shared.threads.lock();
        if table.shutting_down || !self.shared.task.can_run() {
            return Ok(None);
        }

        let index = table.entries.len();
        let child = parent.spawn(index, address)?;
        let stop = child.stop_handle();

        let process = self.clone();
        let unit = os::Builder::new()
            .name(format!("evm2-thread-{index}"))
            .spawn(move || {
                // Errors are reported by run_thread
                let _ = process.run_thread(child);
            })?;

        table.entries.push(ThreadEntry {
            stop,
            unit: Some(unit),
        });
        debug!(thread = index, parent = parent.index(), address, "thread created");
        Ok(Some(index))
    }

    fn join_thread(&self, target: i64, caller: usize) -> Result<()> {
        let unit = {
            let mut table = self.shared.threads.lock();
            let index = usize::try_from(target)
                .ok()
                .filter(|&index| index < table.entries.len())
                .ok_or(RuntimeError::InvalidThread { index: target })?;

            if index == caller {
                return Err(RuntimeError::SelfJoin { index });
            }
            table.entries[index]
                .unit
                .take()
                .ok_or(RuntimeError::AlreadyJoined { index })?
        };

        debug!(thread = caller, target, "join");
        if unit.join().is_err() {
            error!(thread = target, "joined thread panicked");
        }
        Ok(())
    }

    /// Stop every thread, join the spawned ones and close the binary file
    fn terminate(&self) {
        self.shared.task.stop();

        let units: Vec<_> = {
            let mut table = self.shared.threads.lock();
            table.shutting_down = true;
            for entry in &table.entries {
                entry.stop.stop();
            }
            table
                .entries
                .iter_mut()
                .filter_map(|entry| entry.unit.take())
                .collect()
        };

        for unit in units {
            let name = unit.thread().name().map(str::to_owned);
            if unit.join().is_err() {
                warn!(thread = ?name, "thread panicked during termination");
            }
        }

        if let Err(err) = self.shared.file.lock().close() {
            warn!(error = %err, "closing binary file failed");
        }
        info!("process terminated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evm2_assembler::assemble;
    use std::time::{Duration, Instant};

    fn process(source: &str, input: Vec<i64>) -> Process {
        let program = assemble(source).unwrap();
        let config = VmConfig {
            unlock_pause: Duration::from_millis(1),
            ..VmConfig::captured(input)
        };
        Process::from_program(&program, config)
    }

    #[test]
    fn test_console_echo() {
        let process = process(
            "consoleRead r0\nconsoleRead r1\nadd r0, r1, r2\nconsoleWrite r2\nhlt\n",
            vec![40, 2],
        );
        process.start().unwrap();
        assert_eq!(process.output(), Some(vec![42]));
        assert_eq!(process.thread_count(), 1);
    }

    #[test]
    fn test_exhausted_input_reads_minus_one() {
        let process = process("consoleRead r0\nconsoleWrite r0\nhlt\n", vec![]);
        process.start().unwrap();
        assert_eq!(process.output(), Some(vec![-1]));
    }

    #[test]
    fn test_start_twice() {
        let process = process("hlt\n", vec![]);
        process.start().unwrap();
        assert!(matches!(process.start(), Err(RuntimeError::AlreadyStarted)));
    }

    #[test]
    fn test_stop_before_start() {
        let process = process("loadConst 7, r0\nconsoleWrite r0\nhlt\n", vec![]);
        process.stop();
        process.start().unwrap();
        assert_eq!(process.output(), Some(vec![]));
    }

    #[test]
    fn test_create_and_join() {
        let process = process(
            r#"
            loadConst 5, r3
            createThread child, r1
            joinThread r1
            consoleWrite r3
            consoleWrite r1
            hlt
        child:
            loadConst 9, r3
            consoleWrite r3
            hlt
            "#,
            vec![],
        );
        process.start().unwrap();
        assert_eq!(process.output(), Some(vec![9, 5, 1]));
        assert_eq!(process.thread_count(), 2);
    }

    #[test]
    fn test_double_join_ends_main_thread() {
        let process = process(
            r#"
            createThread child, r1
            joinThread r1
            joinThread r1
            consoleWrite r1
            hlt
        child:
            hlt
            "#,
            vec![],
        );
        let result = process.start();
        assert!(matches!(result, Err(RuntimeError::AlreadyJoined { index: 1 })));
        assert_eq!(process.output(), Some(vec![]));
    }

    #[test]
    fn test_join_errors() {
        let invalid = process("loadConst 3, r0\njoinThread r0\nhlt\n", vec![]);
        assert!(matches!(
            invalid.start(),
            Err(RuntimeError::InvalidThread { index: 3 })
        ));

        let itself = process("joinThread r0\nhlt\n", vec![]);
        assert!(matches!(
            itself.start(),
            Err(RuntimeError::SelfJoin { index: 0 })
        ));
    }

    #[test]
    fn test_self_relock_ends_thread() {
        let process = process("lock r0\nlock r0\nhlt\n", vec![]);
        let err = process.start().unwrap_err();
        assert!(matches!(err, RuntimeError::ReentrantLock { lock: 0, thread: 0 }));
    }

    #[test]
    fn test_termination_stops_sleeping_child() {
        let process = process(
            r#"
            createThread child, r1
            hlt
        child:
            loadConst 600000, r0
            sleep r0
            hlt
            "#,
            vec![],
        );
        let start = Instant::now();
        process.start().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_stop_from_another_thread() {
        let process = process("spin:\njump spin\n", vec![]);
        let stopper = {
            let process = process.clone();
            os::spawn(move || {
                os::sleep(Duration::from_millis(50));
                process.stop();
            })
        };

        let start = Instant::now();
        process.start().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        stopper.join().unwrap();
    }

    #[test]
    fn test_stop_reaches_busy_child_during_join() {
        let process = process(
            r#"
            createThread child, r1
            joinThread r1
            hlt
        child:
            jump child
            "#,
            vec![],
        );
        let stopper = {
            let process = process.clone();
            os::spawn(move || {
                os::sleep(Duration::from_millis(100));
                process.stop();
            })
        };

        let start = Instant::now();
        process.start().unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
        stopper.join().unwrap();
    }

    #[test]
    fn test_inconsistent_program_fields_do_not_panic() {
        let mut program = assemble("hlt\n.data\n01 02 03\n").unwrap();
        program.header.data_size = 1;

        let process = Process::from_program(&program, VmConfig::captured(vec![]));
        assert_eq!(process.memory().len(), 1);
        assert_eq!(process.memory().snapshot(), vec![1]);
        process.start().unwrap();
    }

    #[test]
    fn test_machine_error_ends_thread_quietly() {
        // jump target past the end of the stream
        let process = process("jumpEqual 100000, r0, r0\nhlt\n", vec![]);
        assert!(process.start().is_ok());
    }
}
