//! The numeric static-hint protocol shared with the template compiler.
//!
//! The bit values are fixed. A compiler that sets bit N on a node must uphold the structural
//! guarantee documented on the corresponding constant, or the fast paths in [`crate::Renderer`]
//! will write an incorrect host tree.

use bitflags::bitflags;

bitflags! {
	/// What may differ between two renders of a node that occupies the same structural position.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct PatchFlags: i32 {
		/// The element's text children are dynamic.
		const TEXT = 1;
		/// The `class` prop is dynamic.
		const CLASS = 1 << 1;
		/// The `style` prop is dynamic.
		const STYLE = 1 << 2;
		/// Props other than `class` and `style` are dynamic. Comes with a `dynamic_props` name list.
		const PROPS = 1 << 3;
		/// The prop key set itself is dynamic. Props are diffed in full.
		const FULL_PROPS = 1 << 4;
		/// Only relevant to hydration, which this crate does not perform.
		const NEED_HYDRATION = 1 << 5;
		/// A fragment whose children order never changes.
		const STABLE_FRAGMENT = 1 << 6;
		/// A fragment whose children are (at least partially) keyed.
		const KEYED_FRAGMENT = 1 << 7;
		/// A fragment whose children are not keyed.
		const UNKEYED_FRAGMENT = 1 << 8;
		/// No visible prop diff, but hooks or refs must observe the patch.
		const NEED_PATCH = 1 << 9;
		/// A component whose slots are dynamic.
		const DYNAMIC_SLOTS = 1 << 10;
		/// Diagnostic only.
		const DEV_ROOT_FRAGMENT = 1 << 11;
	}
}

/// A node's complete compiler hint: either a set of [`PatchFlags`] or one of the two sentinels.
///
/// `Dynamic(PatchFlags::empty())` is a fully static node that isn't hoisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticHint {
	Dynamic(PatchFlags),
	/// The node is a compile-time constant and is never diffed.
	Hoisted,
	/// Don't trust any flags on this node or its descendants. Diff in full.
	Bail,
}

impl StaticHint {
	pub const HOISTED_BITS: i32 = -1;
	pub const BAIL_BITS: i32 = -2;

	/// Decodes the numeric protocol value.
	///
	/// Unknown positive bits are retained, so every accepted value round-trips through [`StaticHint::bits`].
	/// Negative values other than the two sentinels are rejected.
	#[must_use]
	pub fn from_bits(bits: i32) -> Option<Self> {
		match bits {
			Self::HOISTED_BITS => Some(Self::Hoisted),
			Self::BAIL_BITS => Some(Self::Bail),
			bits if bits < 0 => None,
			bits => Some(Self::Dynamic(PatchFlags::from_bits_retain(bits))),
		}
	}

	#[must_use]
	pub fn bits(self) -> i32 {
		match self {
			Self::Dynamic(flags) => flags.bits(),
			Self::Hoisted => Self::HOISTED_BITS,
			Self::Bail => Self::BAIL_BITS,
		}
	}

	/// The flags the fast paths may rely on. Empty for both sentinels.
	#[must_use]
	pub fn flags(self) -> PatchFlags {
		match self {
			Self::Dynamic(flags) => flags,
			Self::Hoisted | Self::Bail => PatchFlags::empty(),
		}
	}

	/// Whether this is a positive flag set, i.e. `patchFlag > 0` in the numeric protocol.
	#[must_use]
	pub fn is_dynamic(self) -> bool {
		!self.flags().is_empty()
	}

	#[must_use]
	pub fn contains(self, flags: PatchFlags) -> bool {
		self.flags().contains(flags)
	}
}

impl Default for StaticHint {
	fn default() -> Self {
		Self::Dynamic(PatchFlags::empty())
	}
}

impl From<PatchFlags> for StaticHint {
	fn from(flags: PatchFlags) -> Self {
		Self::Dynamic(flags)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sentinels_decode() {
		assert_eq!(StaticHint::from_bits(-1), Some(StaticHint::Hoisted));
		assert_eq!(StaticHint::from_bits(-2), Some(StaticHint::Bail));
		assert_eq!(StaticHint::from_bits(-5), None);
		assert_eq!(StaticHint::from_bits(i32::MIN), None);
		assert_eq!(StaticHint::Hoisted.bits(), -1);
		assert_eq!(StaticHint::Bail.bits(), -2);
		assert!(StaticHint::Hoisted.flags().is_empty());
	}

	#[test]
	fn protocol_bits_are_fixed() {
		assert_eq!(PatchFlags::TEXT.bits(), 1);
		assert_eq!(PatchFlags::FULL_PROPS.bits(), 16);
		assert_eq!(PatchFlags::STABLE_FRAGMENT.bits(), 64);
		assert_eq!(PatchFlags::KEYED_FRAGMENT.bits(), 128);
		assert_eq!(PatchFlags::NEED_PATCH.bits(), 512);
		assert_eq!(PatchFlags::DEV_ROOT_FRAGMENT.bits(), 2048);

		let hint = StaticHint::from_bits(1 | 2 | 8).unwrap();
		assert!(hint.contains(PatchFlags::TEXT | PatchFlags::CLASS | PatchFlags::PROPS));
		assert!(!hint.contains(PatchFlags::STYLE));
		assert_eq!(hint.bits(), 11);
	}

	#[test]
	fn unknown_bits_round_trip() {
		for bits in [0, 1 << 20, -1, -2] {
			assert_eq!(StaticHint::from_bits(bits).map(StaticHint::bits), Some(bits));
		}
	}
}
