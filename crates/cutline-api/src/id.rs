/// Defines integer ids drawn from the process-wide counter in
/// [`cutline_core::id`]. Every kind shares the one sequence, so an id is
/// unique across tracks, items, groups, markers and bin clips.
macro_rules! define_ids {
    ($($(#[$meta:meta])* pub struct $Name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(
                Debug,
                Clone,
                Copy,
                PartialEq,
                Eq,
                PartialOrd,
                Ord,
                Hash,
                serde::Serialize,
                serde::Deserialize,
            )]
            #[serde(transparent)]
            pub struct $Name(u64);

            impl $Name {
                /// Bounds for range queries over ids; never minted.
                pub const MIN: $Name = $Name(0);
                pub const MAX: $Name = $Name(u64::MAX);

                /// Mints a fresh id.
                #[allow(clippy::new_without_default)]
                pub fn new() -> $Name {
                    $Name(cutline_core::next_id())
                }

                /// Rebuilds an id read back from a persisted document and
                /// makes sure the counter never hands it out again.
                pub fn restore(raw: u64) -> $Name {
                    cutline_core::id::global().ensure_above(raw);
                    $Name(raw)
                }

                pub fn as_raw(self) -> u64 {
                    self.0
                }
            }

            impl std::fmt::Display for $Name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

pub(crate) use define_ids;
