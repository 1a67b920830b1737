// Key layout for the sled keyspace
//
// All rows live in the default tree, grouped by prefix. Holder names never
// contain '/', so '/' separates the textual key parts. Numeric ids are
// appended big-endian so that byte order equals numeric order.

use crate::identity::HolderId;

pub(crate) const COIN: &[u8] = b"coin/";
pub(crate) const SKILL: &[u8] = b"skill/";
pub(crate) const SNAPSHOT: &[u8] = b"snap/";
pub(crate) const SNAPSHOT_INDEX: &[u8] = b"snap-idx/";
pub(crate) const SNAPSHOT_SET: &[u8] = b"set/";
pub(crate) const SNAPSHOT_SET_ID: &[u8] = b"set-id/";
pub(crate) const AGGREGATE: &[u8] = b"sum/";
pub(crate) const VERSIONED: &[u8] = b"sub/";
pub(crate) const RECORD: &[u8] = b"pay/";
pub(crate) const RECORD_CORRELATION: &[u8] = b"pay-corr/";
pub(crate) const ACTIVITY: &[u8] = b"news/";
pub(crate) const UNREAD: &[u8] = b"info/";

pub(crate) fn coin(holder: &HolderId) -> Vec<u8> {
    [COIN, holder.as_bytes()].concat()
}

pub(crate) fn skill_prefix(owner: &HolderId) -> Vec<u8> {
    [SKILL, owner.as_bytes(), b"/"].concat()
}

pub(crate) fn skill(owner: &HolderId, skill_id: u64) -> Vec<u8> {
    with_id(skill_prefix(owner), skill_id)
}

pub(crate) fn snapshot(snapshot_id: u64) -> Vec<u8> {
    with_id(SNAPSHOT.to_vec(), snapshot_id)
}

pub(crate) fn snapshot_index(skill_id: u64, fingerprint: &[u8; 32]) -> Vec<u8> {
    let mut key = with_id(SNAPSHOT_INDEX.to_vec(), skill_id);
    key.push(b'/');
    key.extend_from_slice(fingerprint);
    key
}

pub(crate) fn snapshot_set(digest: &[u8; 32]) -> Vec<u8> {
    [SNAPSHOT_SET, &digest[..]].concat()
}

pub(crate) fn snapshot_set_id(version_id: u64) -> Vec<u8> {
    with_id(SNAPSHOT_SET_ID.to_vec(), version_id)
}

pub(crate) fn aggregate_prefix(holder: &HolderId) -> Vec<u8> {
    [AGGREGATE, holder.as_bytes(), b"/"].concat()
}

pub(crate) fn aggregate(holder: &HolderId, coin: &HolderId, marker: bool) -> Vec<u8> {
    let flag: &[u8] = if marker { b"1" } else { b"0" };
    [&aggregate_prefix(holder)[..], coin.as_bytes(), b"/", flag].concat()
}

pub(crate) fn versioned_prefix(holder: &HolderId, coin: &HolderId) -> Vec<u8> {
    [VERSIONED, holder.as_bytes(), b"/", coin.as_bytes(), b"/"].concat()
}

pub(crate) fn versioned(holder: &HolderId, coin: &HolderId, version_id: u64) -> Vec<u8> {
    with_id(versioned_prefix(holder, coin), version_id)
}

pub(crate) fn record(record_id: u64) -> Vec<u8> {
    with_id(RECORD.to_vec(), record_id)
}

pub(crate) fn record_correlation_prefix(correlation: &[u8; 16]) -> Vec<u8> {
    [RECORD_CORRELATION, &correlation[..], b"/"].concat()
}

pub(crate) fn record_correlation(correlation: &[u8; 16], record_id: u64) -> Vec<u8> {
    with_id(record_correlation_prefix(correlation), record_id)
}

pub(crate) fn activity_prefix(owner: &HolderId) -> Vec<u8> {
    [ACTIVITY, owner.as_bytes(), b"/"].concat()
}

pub(crate) fn activity(owner: &HolderId, entry_id: u64) -> Vec<u8> {
    with_id(activity_prefix(owner), entry_id)
}

pub(crate) fn unread(owner: &HolderId) -> Vec<u8> {
    [UNREAD, owner.as_bytes()].concat()
}

/// Read the big-endian id appended to the end of a key
pub(crate) fn trailing_id(key: &[u8]) -> Option<u64> {
    let start = key.len().checked_sub(8)?;
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&key[start..]);
    Some(u64::from_be_bytes(bytes))
}

/// Smallest key strictly greater than every key starting with `prefix`
pub(crate) fn prefix_upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return end;
        }
    }
    // Prefix was all 0xFF: no finite upper bound, caller scans to the end
    Vec::new()
}

fn with_id(mut key: Vec<u8>, id: u64) -> Vec<u8> {
    key.extend_from_slice(&id.to_be_bytes());
    key
}
