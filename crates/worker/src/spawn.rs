use std::thread::JoinHandle;

use crate::TaskClass;
use crate::gauge::ThreadGauge;

/// Spawns a dedicated named OS thread with shared worker classification metadata.
pub fn spawn_named_thread<F, R>(class: TaskClass, name: impl Into<String>, f: F) -> std::io::Result<JoinHandle<R>>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	let name = name.into();
	tracing::trace!(worker_class = class.as_str(), thread = %name, "worker.spawn_named_thread");
	std::thread::Builder::new().name(name).spawn(f)
}

/// Spawns a named thread whose lifetime is counted by `gauge`.
///
/// The gauge is entered before the thread starts and left when the closure
/// returns, so a successful `join` always observes the decrement.
pub fn spawn_tracked_thread<F, R>(class: TaskClass, name: impl Into<String>, gauge: &ThreadGauge, f: F) -> std::io::Result<JoinHandle<R>>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	let guard = gauge.enter();
	spawn_named_thread(class, name, move || {
		let _guard = guard;
		f()
	})
}
