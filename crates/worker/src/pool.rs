use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{TaskClass, WorkerJoinSet};

/// Bounded fan-out of independent per-cell jobs.
///
/// At most `jobs` items run at once. Once the cancellation token fires no new
/// item is started; items already running observe the token themselves.
#[derive(Debug, Clone)]
pub struct CellPool {
	class: TaskClass,
	jobs: usize,
	cancel: CancellationToken,
}

impl CellPool {
	pub fn new(class: TaskClass, jobs: usize, cancel: CancellationToken) -> Self {
		Self {
			class,
			jobs: jobs.max(1),
			cancel,
		}
	}

	pub fn jobs(&self) -> usize {
		self.jobs
	}

	/// Runs `job` over `items`, returning completed results in input order.
	///
	/// Items skipped after cancellation and jobs that panicked are absent from
	/// the result.
	pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, job: F) -> Vec<T>
	where
		I: Send + 'static,
		T: Send + 'static,
		F: Fn(I, CancellationToken) -> Fut,
		Fut: Future<Output = T> + Send + 'static,
	{
		let total = items.len();
		let permits = Arc::new(Semaphore::new(self.jobs));
		let mut set = WorkerJoinSet::new(self.class);

		for (index, item) in items.into_iter().enumerate() {
			let permit = tokio::select! {
				biased;
				() = self.cancel.cancelled() => break,
				permit = permits.clone().acquire_owned() => match permit {
					Ok(permit) => permit,
					Err(_) => break,
				},
			};
			let fut = job(item, self.cancel.child_token());
			set.spawn(async move {
				let result = fut.await;
				drop(permit);
				(index, result)
			});
		}

		let mut done = Vec::with_capacity(total);
		while let Some(joined) = set.join_next().await {
			match joined {
				Ok(entry) => done.push(entry),
				Err(err) => error!(worker_class = set.class().as_str(), error = %err, "Pool task failed"),
			}
		}
		done.sort_by_key(|(index, _)| *index);

		debug!(
			worker_class = self.class.as_str(),
			total,
			completed = done.len(),
			cancelled = self.cancel.is_cancelled(),
			"Pool drained"
		);
		done.into_iter().map(|(_, result)| result).collect()
	}
}
