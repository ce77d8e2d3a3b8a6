//! Identity ID

use kernel::id::Id;

/// Marker type for identity IDs
pub struct IdentityMarker;

/// Typed identity ID (UUID v4)
pub type IdentityId = Id<IdentityMarker>;
