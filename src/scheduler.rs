//! The job queue that batches component re-renders.
//!
//! Jobs are identified by their instance's uid and deduplicated by it.
//! They always flush in ascending id order, which puts parent components before their children.

use crate::component::InstanceId;
use hashbrown::HashMap;
use std::collections::VecDeque;
use tracing::trace;

/// "Re-render this component."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
	pub id: u64,
	pub instance: InstanceId,
}

/// Handed to lifecycle hooks and flush callbacks.
///
/// Hooks may not patch. They request updates, which go through the job queue once the hook returns.
#[derive(Debug)]
pub struct HookContext {
	instance: Option<InstanceId>,
	requested: Vec<InstanceId>,
}

impl HookContext {
	pub(crate) fn new(instance: Option<InstanceId>) -> Self {
		Self { instance, requested: Vec::new() }
	}

	/// The instance whose hook is running, if any.
	#[must_use]
	pub fn instance(&self) -> Option<InstanceId> {
		self.instance
	}

	pub fn queue_update(&mut self, instance: InstanceId) {
		self.requested.push(instance);
	}

	/// Queues an update of the instance whose hook is running.
	pub fn queue_self_update(&mut self) {
		if let Some(instance) = self.instance {
			self.requested.push(instance);
		}
	}

	pub(crate) fn into_requested(self) -> Vec<InstanceId> {
		self.requested
	}
}

pub(crate) struct Callback {
	pub(crate) instance: Option<InstanceId>,
	pub(crate) run: Box<dyn FnOnce(&mut HookContext)>,
}

#[derive(Default)]
pub(crate) struct JobQueue {
	jobs: VecDeque<Job>,
	pre: Vec<Callback>,
	post: Vec<Callback>,
	run_counts: HashMap<u64, u32>,
}

impl JobQueue {
	/// Returns `false` if a job with the same id is already pending.
	pub(crate) fn queue_job(&mut self, job: Job) -> bool {
		let index = self.jobs.partition_point(|pending| pending.id < job.id);
		if self.jobs.get(index).map_or(false, |pending| pending.id == job.id) {
			trace!(id = job.id, "Job already queued.");
			return false;
		}
		self.jobs.insert(index, job);
		true
	}

	/// Removes a pending job. This is the only cancellation primitive.
	pub(crate) fn invalidate(&mut self, id: u64) -> bool {
		match self.jobs.binary_search_by_key(&id, |job| job.id) {
			Ok(index) => {
				self.jobs.remove(index);
				trace!(id, "Invalidated pending job.");
				true
			}
			Err(_) => false,
		}
	}

	pub(crate) fn is_queued(&self, id: u64) -> bool {
		self.jobs.binary_search_by_key(&id, |job| job.id).is_ok()
	}

	pub(crate) fn queue_pre_flush(&mut self, callback: Callback) {
		self.pre.push(callback);
	}

	pub(crate) fn queue_post_flush(&mut self, callback: Callback) {
		self.post.push(callback);
	}

	pub(crate) fn take_pre_flush(&mut self) -> Vec<Callback> {
		std::mem::take(&mut self.pre)
	}

	pub(crate) fn take_post_flush(&mut self) -> Vec<Callback> {
		std::mem::take(&mut self.post)
	}

	/// Pops the pending job with the lowest id and counts the run.
	///
	/// The second value is how often that job has run in the current flush, including this run.
	pub(crate) fn start_next(&mut self) -> Option<(Job, u32)> {
		let job = self.jobs.pop_front()?;
		let count = self.run_counts.entry(job.id).or_insert(0);
		*count += 1;
		Some((job, *count))
	}

	pub(crate) fn is_idle(&self) -> bool {
		self.jobs.is_empty() && self.pre.is_empty() && self.post.is_empty()
	}

	/// Ends a flush window.
	pub(crate) fn reset_run_counts(&mut self) {
		self.run_counts.clear();
	}

	#[cfg(test)]
	pub(crate) fn len(&self) -> usize {
		self.jobs.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use slotmap::SlotMap;

	fn instances(count: usize) -> Vec<InstanceId> {
		let mut map = SlotMap::<InstanceId, ()>::with_key();
		(0..count).map(|_| map.insert(())).collect()
	}

	#[test]
	fn jobs_flush_in_ascending_id_order() {
		let ids = instances(3);
		let mut queue = JobQueue::default();
		assert!(queue.queue_job(Job { id: 7, instance: ids[2] }));
		assert!(queue.queue_job(Job { id: 2, instance: ids[0] }));
		assert!(queue.queue_job(Job { id: 5, instance: ids[1] }));

		let order: Vec<u64> = std::iter::from_fn(|| queue.start_next().map(|(job, _)| job.id)).collect();
		assert_eq!(order, [2, 5, 7]);
	}

	#[test]
	fn queueing_is_idempotent() {
		let ids = instances(1);
		let mut queue = JobQueue::default();
		assert!(queue.queue_job(Job { id: 1, instance: ids[0] }));
		assert!(!queue.queue_job(Job { id: 1, instance: ids[0] }));
		assert_eq!(queue.len(), 1);
	}

	#[test]
	fn invalidated_jobs_do_not_run() {
		let ids = instances(2);
		let mut queue = JobQueue::default();
		queue.queue_job(Job { id: 1, instance: ids[0] });
		queue.queue_job(Job { id: 2, instance: ids[1] });
		assert!(queue.invalidate(1));
		assert!(!queue.invalidate(1));
		assert_eq!(queue.start_next().map(|(job, _)| job.id), Some(2));
		assert!(queue.start_next().is_none());
	}

	#[test]
	fn run_counts_accumulate_until_reset() {
		let ids = instances(1);
		let mut queue = JobQueue::default();
		for expected in 1..=3 {
			queue.queue_job(Job { id: 4, instance: ids[0] });
			assert_eq!(queue.start_next().map(|(_, count)| count), Some(expected));
		}
		queue.reset_run_counts();
		queue.queue_job(Job { id: 4, instance: ids[0] });
		assert_eq!(queue.start_next().map(|(_, count)| count), Some(1));
	}
}
