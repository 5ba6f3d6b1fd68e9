//! Shared long-lived helper process.
//!
//! Some services (formatters, linters) are expensive to start, so one child
//! process is kept for the whole editor and reused across documents. Access
//! is serialized by a mutex: a request writes one line to the child's stdin
//! and waits, bounded by a timeout, for one line back on stdout.
//!
//! The child is started lazily on first use. Before every request the
//! handle checks whether the child has exited and restarts it if so. A child
//! that times out or breaks its pipes is killed and replaced on the next
//! request.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::{Mutex, MutexGuard};
use quire_worker::{TaskClass, spawn_named_thread};

use crate::error::HelperError;

static GLOBAL: OnceLock<BackgroundHelper> = OnceLock::new();

/// Program and arguments used to (re)start the helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperCommand {
	pub program: String,
	pub args: Vec<String>,
}

impl HelperCommand {
	pub fn new(program: impl Into<String>) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
		}
	}

	pub fn arg(mut self, arg: impl Into<String>) -> Self {
		self.args.push(arg.into());
		self
	}
}

struct HelperProcess {
	child: Child,
	stdin: ChildStdin,
	lines: Receiver<std::io::Result<String>>,
	reader: Option<JoinHandle<()>>,
}

impl HelperProcess {
	fn start(command: &HelperCommand) -> Result<Self, HelperError> {
		let mut child = Command::new(&command.program)
			.args(&command.args)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::null())
			.spawn()
			.map_err(|error| HelperError::Spawn {
				program: command.program.clone(),
				error,
			})?;

		let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
			let _ = child.kill();
			let _ = child.wait();
			return Err(HelperError::Exited);
		};

		let (tx, lines) = crossbeam_channel::unbounded();
		let reader = spawn_named_thread(TaskClass::IoBlocking, "quire-helper-reader", move || {
			for line in BufReader::new(stdout).lines() {
				if tx.send(line).is_err() {
					break;
				}
			}
		});
		let reader = match reader {
			Ok(reader) => reader,
			Err(error) => {
				let _ = child.kill();
				let _ = child.wait();
				return Err(HelperError::Io(error));
			}
		};

		tracing::debug!(program = %command.program, pid = child.id(), "helper.started");
		Ok(Self {
			child,
			stdin,
			lines,
			reader: Some(reader),
		})
	}

	fn is_alive(&mut self) -> bool {
		matches!(self.child.try_wait(), Ok(None))
	}
}

impl Drop for HelperProcess {
	fn drop(&mut self) {
		let _ = self.child.kill();
		let _ = self.child.wait();
		if let Some(reader) = self.reader.take() {
			let _ = reader.join();
		}
	}
}

/// Handle to the shared helper process.
pub struct BackgroundHelper {
	command: HelperCommand,
	timeout: Duration,
	process: Mutex<Option<HelperProcess>>,
	starts: AtomicUsize,
}

impl BackgroundHelper {
	pub fn new(command: HelperCommand, timeout: Duration) -> Self {
		Self {
			command,
			timeout,
			process: Mutex::new(None),
			starts: AtomicUsize::new(0),
		}
	}

	/// Installs the process-wide helper. The first installation wins; later
	/// calls return the existing instance unchanged.
	pub fn install(command: HelperCommand, timeout: Duration) -> &'static Self {
		GLOBAL.get_or_init(|| Self::new(command, timeout))
	}

	/// The process-wide helper, if one was installed.
	pub fn global() -> Option<&'static Self> {
		GLOBAL.get()
	}

	/// Sends one request line and returns the response line.
	///
	/// Starts or restarts the child as needed.
	pub fn request(&self, line: &str) -> Result<String, HelperError> {
		if line.contains('\n') {
			return Err(HelperError::Io(std::io::Error::new(
				std::io::ErrorKind::InvalidInput,
				"helper requests must be a single line",
			)));
		}

		let mut slot = self.process.lock();
		self.ensure_running(&mut slot)?;
		let Some(process) = slot.as_mut() else {
			return Err(HelperError::Exited);
		};

		let written = writeln!(process.stdin, "{line}").and_then(|()| process.stdin.flush());
		if let Err(error) = written {
			tracing::warn!(error = %error, "helper.write_failed");
			*slot = None;
			return Err(HelperError::Io(error));
		}

		match process.lines.recv_timeout(self.timeout) {
			Ok(Ok(response)) => Ok(response),
			Ok(Err(error)) => {
				*slot = None;
				Err(HelperError::Io(error))
			}
			Err(RecvTimeoutError::Timeout) => {
				tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "helper.timeout");
				*slot = None;
				Err(HelperError::Timeout(self.timeout))
			}
			Err(RecvTimeoutError::Disconnected) => {
				*slot = None;
				Err(HelperError::Exited)
			}
		}
	}

	/// Process id of the running child, if any.
	pub fn process_id(&self) -> Option<u32> {
		self.process.lock().as_ref().map(|process| process.child.id())
	}

	/// Number of times a child has been started.
	pub fn starts(&self) -> usize {
		self.starts.load(Ordering::Relaxed)
	}

	/// Stops the child. The next request starts a fresh one.
	pub fn shutdown(&self) {
		if self.process.lock().take().is_some() {
			tracing::debug!(program = %self.command.program, "helper.shutdown");
		}
	}

	fn ensure_running(&self, slot: &mut MutexGuard<'_, Option<HelperProcess>>) -> Result<(), HelperError> {
		if let Some(process) = slot.as_mut() {
			if process.is_alive() {
				return Ok(());
			}
			tracing::warn!(program = %self.command.program, "helper.exited");
			**slot = None;
		}
		let process = HelperProcess::start(&self.command)?;
		self.starts.fetch_add(1, Ordering::Relaxed);
		**slot = Some(process);
		Ok(())
	}
}

impl std::fmt::Debug for BackgroundHelper {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BackgroundHelper")
			.field("command", &self.command)
			.field("timeout", &self.timeout)
			.field("starts", &self.starts())
			.finish()
	}
}

#[cfg(all(test, unix))]
mod tests {
	use std::time::Instant;

	use super::*;

	fn echo_helper() -> BackgroundHelper {
		BackgroundHelper::new(HelperCommand::new("cat"), Duration::from_secs(5))
	}

	#[test]
	fn starts_lazily_and_reuses_child() {
		let helper = echo_helper();
		assert_eq!(helper.starts(), 0);
		assert!(helper.process_id().is_none());

		assert_eq!(helper.request("hello").unwrap(), "hello");
		assert_eq!(helper.request("again").unwrap(), "again");
		assert_eq!(helper.starts(), 1);
		helper.shutdown();
	}

	#[test]
	fn restarts_after_child_dies() {
		let helper = echo_helper();
		helper.request("one").unwrap();
		let pid = helper.process_id().unwrap();

		let status = Command::new("kill").arg("-9").arg(pid.to_string()).status().unwrap();
		assert!(status.success());

		let deadline = Instant::now() + Duration::from_secs(5);
		loop {
			match helper.request("two") {
				Ok(response) => {
					assert_eq!(response, "two");
					break;
				}
				Err(_) => assert!(Instant::now() < deadline, "helper never recovered"),
			}
		}
		assert_eq!(helper.starts(), 2);
		assert_ne!(helper.process_id(), Some(pid));
		helper.shutdown();
	}

	#[test]
	fn silent_child_times_out_and_is_replaced() {
		let helper = BackgroundHelper::new(HelperCommand::new("sleep").arg("30"), Duration::from_millis(50));
		let err = helper.request("ping").unwrap_err();
		assert!(matches!(err, HelperError::Timeout(_)), "{err}");
		assert!(helper.process_id().is_none());
	}

	#[test]
	fn missing_program_reports_spawn_error() {
		let helper = BackgroundHelper::new(HelperCommand::new("/nonexistent/quire-helper"), Duration::from_millis(50));
		let err = helper.request("ping").unwrap_err();
		assert!(matches!(err, HelperError::Spawn { .. }), "{err}");
		assert_eq!(helper.starts(), 0);
	}

	#[test]
	fn multiline_request_is_rejected() {
		let helper = echo_helper();
		assert!(helper.request("a\nb").is_err());
		assert_eq!(helper.starts(), 0);
	}

	#[test]
	fn global_helper_is_installed_once() {
		let first = BackgroundHelper::install(HelperCommand::new("cat"), Duration::from_secs(5));
		let second = BackgroundHelper::install(HelperCommand::new("sleep"), Duration::from_millis(1));
		assert!(std::ptr::eq(first, second));
		assert!(std::ptr::eq(BackgroundHelper::global().unwrap(), first));
		assert_eq!(first.request("shared").unwrap(), "shared");
		first.shutdown();
	}
}
