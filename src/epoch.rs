//! State epochs: the coarse clock used to expire untouched leaves.

use crate::constant::EPOCH_SIZE;
use derive_more::{Deref, Display, From, Into};
use serde::{Deserialize, Serialize};

/// A 16-bit epoch counter. Leaves remember the epoch they were last
/// touched in.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deref,
    Display,
    From,
    Into,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct StateEpoch(pub u16);

/// Whether something last touched at `pre` is expired at `cur`: more than one
/// epoch behind. Nothing expires before epoch 2.
pub fn epoch_expired(pre: StateEpoch, cur: StateEpoch) -> bool {
    *cur >= 2 && *pre < *cur - 1
}

/// Big-endian wire encoding.
pub fn epoch_to_bytes(epoch: StateEpoch) -> [u8; EPOCH_SIZE] {
    epoch.0.to_be_bytes()
}

/// Decodes [`epoch_to_bytes`]. A short slice is zero padded at the tail,
/// bytes past [`EPOCH_SIZE`] are ignored.
pub fn bytes_to_epoch(bytes: &[u8]) -> StateEpoch {
    let mut buf = [0u8; EPOCH_SIZE];
    let len = bytes.len().min(EPOCH_SIZE);
    buf[..len].copy_from_slice(&bytes[..len]);
    StateEpoch(u16::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_boundary() {
        let expired = |pre: u16, cur: u16| epoch_expired(pre.into(), cur.into());

        assert!(!expired(0, 0));
        assert!(!expired(0, 1));
        assert!(expired(0, 2));
        assert!(!expired(1, 2));
        assert!(!expired(2, 2));
        assert!(expired(7, 9));
        assert!(!expired(8, 9));
        // touched in the future, never expired
        assert!(!expired(10, 9));
        assert!(expired(0, u16::MAX));
    }

    #[test]
    fn roundtrip_all_epochs() {
        for e in 0..=u16::MAX {
            let epoch = StateEpoch(e);
            assert_eq!(bytes_to_epoch(&epoch_to_bytes(epoch)), epoch);
        }
    }

    #[test]
    fn big_endian_layout() {
        assert_eq!(epoch_to_bytes(StateEpoch(0x0102)), [0x01, 0x02]);
        assert_eq!(bytes_to_epoch(&[0x01]), StateEpoch(0x0100));
        assert_eq!(bytes_to_epoch(&[]), StateEpoch(0));
        assert_eq!(bytes_to_epoch(&[0xab, 0xcd, 0xef]), StateEpoch(0xabcd));
    }

    #[test]
    fn serde_is_transparent() {
        let epoch = StateEpoch(513);
        assert_eq!(serde_json::to_string(&epoch).unwrap(), "513");
        assert_eq!(serde_json::from_str::<StateEpoch>("513").unwrap(), epoch);
        assert_eq!(epoch.to_string(), "513");
    }
}
