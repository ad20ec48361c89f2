/// Returns the positions of a longest strictly increasing subsequence of `values`, in ascending order.
///
/// Zeros are skipped: in the keyed diff they mark new nodes without an old counterpart, which can't stay in place.
/// Runs in O(n log n).
pub(crate) fn longest_increasing_subsequence(values: &[usize]) -> Vec<usize> {
	let mut predecessors: Vec<Option<usize>> = vec![None; values.len()];
	// `tails[k]` is the position of the smallest value ending an increasing run of length `k + 1`.
	let mut tails: Vec<usize> = Vec::new();

	for (position, &value) in values.iter().enumerate() {
		if value == 0 {
			continue;
		}
		let length = tails.partition_point(|&tail| values[tail] < value);
		if length > 0 {
			predecessors[position] = Some(tails[length - 1]);
		}
		if length == tails.len() {
			tails.push(position);
		} else {
			tails[length] = position;
		}
	}

	let mut sequence = vec![0; tails.len()];
	let mut cursor = tails.last().copied();
	for slot in sequence.iter_mut().rev() {
		match cursor {
			Some(position) => {
				*slot = position;
				cursor = predecessors[position];
			}
			None => break,
		}
	}
	sequence
}
