//! Reference-counted templates for static content.
//!
//! The first mount of a piece of static content parses it through the host.
//! If the host can clone nodes, copies of the result are kept here and later mounts of the same content clone them instead.
//! Each live static record holds one reference. Templates are swept once nothing references them.

use core::{
	borrow::Borrow,
	hash::{BuildHasher, Hash},
};
use hashbrown::{hash_map::DefaultHashBuilder, HashMap};
use num_traits::{CheckedAdd, CheckedSub, One, Zero};

pub(crate) struct TemplateCache<K, V, C = u16, S = DefaultHashBuilder>(HashMap<K, (C, V), S>)
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero,
	S: BuildHasher;

impl<K, V, C, S> Default for TemplateCache<K, V, C, S>
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero,
	S: Default + BuildHasher,
{
	fn default() -> Self {
		Self(HashMap::with_hasher(S::default()))
	}
}

impl<K, V, C, S> TemplateCache<K, V, C, S>
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero,
	S: BuildHasher,
{
	/// Takes one more reference to an existing template.
	pub(crate) fn acquire<Q: ?Sized>(&mut self, key: &Q) -> Result<Option<&V>, CountSaturatedError>
	where
		K: Borrow<Q>,
		Q: Eq + Hash,
	{
		match self.0.get_mut(key) {
			Some((count, template)) => {
				*count = count.checked_add(&C::one()).ok_or(CountSaturatedError)?;
				Ok(Some(&*template))
			}
			None => Ok(None),
		}
	}

	/// Stores a template with one reference, unless one is already present, in which case that one is acquired instead.
	pub(crate) fn insert(&mut self, key: K, template: V) -> Result<(), CountSaturatedError> {
		let (count, _) = self.0.entry(key).or_insert_with(|| (C::zero(), template));
		*count = count.checked_add(&C::one()).ok_or(CountSaturatedError)?;
		Ok(())
	}

	/// Drops one reference. The template stays until the next [`TemplateCache::sweep`].
	pub(crate) fn release<Q: ?Sized>(&mut self, key: &Q) -> Result<bool, CountSaturatedError>
	where
		K: Borrow<Q>,
		Q: Eq + Hash,
	{
		match self.0.get_mut(key) {
			Some((count, _)) => {
				*count = count.checked_sub(&C::one()).ok_or(CountSaturatedError)?;
				Ok(true)
			}
			None => Ok(false),
		}
	}

	/// Removes all unreferenced templates and returns how many were removed.
	pub(crate) fn sweep(&mut self) -> usize {
		self.0.extract_if(|_, (count, _)| count.is_zero()).count()
	}

	pub(crate) fn len(&self) -> usize {
		self.0.len()
	}

	pub(crate) fn capacity(&self) -> usize {
		self.0.capacity()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CountSaturatedError;
