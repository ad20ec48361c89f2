use crate::vnode::Key;
use hashbrown::HashMap;

/// Reusable key to new-index maps for the unknown middle of keyed diffs.
///
/// Keyed diffs nest (a list item may contain a list), so maps are lent out and returned rather than shared.
/// Returned maps are cleared but keep their allocation.
#[derive(Debug, Default)]
pub(crate) struct KeyIndexMaps {
	spare: Vec<HashMap<Key, usize>>,
}

impl KeyIndexMaps {
	pub(crate) fn take(&mut self) -> HashMap<Key, usize> {
		self.spare.pop().unwrap_or_default()
	}

	pub(crate) fn give_back(&mut self, mut map: HashMap<Key, usize>) {
		map.clear();
		self.spare.push(map);
	}

	/// Total retained capacity, without lending anything out.
	pub(crate) fn capacity(&self) -> usize {
		self.spare.iter().map(HashMap::capacity).sum()
	}
}
