/// Runtime-tunable encoding thresholds.
///
/// The embedder owns a `Config` and may rewrite any field at any time;
/// a change only affects values created or converted afterwards — an
/// already-indexed value never reverts to its packed form.
#[derive(Debug, Clone)]
pub struct Config {
    /// Hash stays packed while it holds at most this many fields.
    pub hash_max_packed_entries: usize,
    /// Hash stays packed while every key and value is at most this long.
    pub hash_max_packed_value_bytes: usize,
    /// Sorted set stays packed while it holds at most this many members.
    pub zset_max_packed_entries: usize,
    /// Sorted set stays packed while every member is at most this long.
    pub zset_max_packed_value_bytes: usize,
    /// Per-segment capacity for lists: positive = max entry count,
    /// -1..=-5 = byte-size tiers (4 KiB, 8 KiB, 16 KiB, 32 KiB, 64 KiB).
    pub list_fill: i16,
    /// Number of segments at each end of a list left uncompressed.
    /// 0 disables compression entirely.
    pub list_compress_depth: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            hash_max_packed_entries: 128,
            hash_max_packed_value_bytes: 64,
            zset_max_packed_entries: 128,
            zset_max_packed_value_bytes: 64,
            list_fill: -2,
            list_compress_depth: 0,
        }
    }
}
