//! Pairwise key set for one security association

use std::fmt;

use zeroize::Zeroize;

use super::{Eui64, PMK_LEN, PTK_LEN};

/// Fixed-length secret with its lifetime in seconds
///
/// Key bytes are wiped when the value is dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct LifetimeKey<const N: usize> {
    key: [u8; N],
    lifetime: u32,
}

impl<const N: usize> LifetimeKey<N> {
    pub fn new(key: [u8; N], lifetime: u32) -> Self {
        Self { key, lifetime }
    }

    pub fn key(&self) -> &[u8; N] {
        &self.key
    }

    pub fn lifetime(&self) -> u32 {
        self.lifetime
    }
}

impl<const N: usize> Drop for LifetimeKey<N> {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl<const N: usize> fmt::Debug for LifetimeKey<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeKey")
            .field("key", &format_args!("<{} bytes redacted>", N))
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Security keys of one supplicant: identity, PMK, PMK replay counter and PTK
///
/// Every setter marks the set as updated so the owner knows it needs to be
/// written to NVM. A successful NVM decode clears the mark again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityKeys {
    eui64: Option<Eui64>,
    pmk: Option<LifetimeKey<PMK_LEN>>,
    pmk_replay_counter: u64,
    ptk: Option<LifetimeKey<PTK_LEN>>,
    updated: bool,
}

impl SecurityKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// EUI-64 of the peer the PTK was negotiated with
    pub fn eui64(&self) -> Option<&Eui64> {
        self.eui64.as_ref()
    }

    pub fn set_eui64(&mut self, eui64: Eui64) {
        self.eui64 = Some(eui64);
        self.updated = true;
    }

    pub fn pmk(&self) -> Option<&LifetimeKey<PMK_LEN>> {
        self.pmk.as_ref()
    }

    pub fn write_pmk(&mut self, pmk: [u8; PMK_LEN], lifetime: u32) {
        self.set_pmk(LifetimeKey::new(pmk, lifetime));
    }

    /// Install an already built PMK without copying the key bytes
    pub fn set_pmk(&mut self, pmk: LifetimeKey<PMK_LEN>) {
        self.pmk = Some(pmk);
        self.updated = true;
    }

    pub fn delete_pmk(&mut self) {
        if self.pmk.take().is_some() {
            self.updated = true;
        }
    }

    pub fn pmk_replay_counter(&self) -> u64 {
        self.pmk_replay_counter
    }

    pub fn set_pmk_replay_counter(&mut self, counter: u64) {
        self.pmk_replay_counter = counter;
        self.updated = true;
    }

    pub fn ptk(&self) -> Option<&LifetimeKey<PTK_LEN>> {
        self.ptk.as_ref()
    }

    pub fn write_ptk(&mut self, ptk: [u8; PTK_LEN], lifetime: u32) {
        self.set_ptk(LifetimeKey::new(ptk, lifetime));
    }

    pub fn set_ptk(&mut self, ptk: LifetimeKey<PTK_LEN>) {
        self.ptk = Some(ptk);
        self.updated = true;
    }

    pub fn delete_ptk(&mut self) {
        if self.ptk.take().is_some() {
            self.updated = true;
        }
    }

    /// True when the set changed since it was last loaded or marked clean
    pub fn is_updated(&self) -> bool {
        self.updated
    }

    pub fn reset_updated(&mut self) {
        self.updated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_mark_updated() {
        let mut keys = SecurityKeys::new();
        assert!(!keys.is_updated());

        keys.set_pmk_replay_counter(5);
        assert!(keys.is_updated());

        keys.reset_updated();
        keys.write_ptk([0x11; PTK_LEN], 3600);
        assert!(keys.is_updated());
        assert_eq!(keys.ptk().map(|k| k.lifetime()), Some(3600));
    }

    #[test]
    fn test_set_owned_keys() {
        let mut keys = SecurityKeys::new();
        keys.set_pmk(LifetimeKey::new([0x01; PMK_LEN], 120));
        assert!(keys.is_updated());
        assert_eq!(keys.pmk().map(|k| *k.key()), Some([0x01; PMK_LEN]));

        keys.reset_updated();
        keys.set_ptk(LifetimeKey::new([0x02; PTK_LEN], 240));
        assert!(keys.is_updated());
        assert_eq!(keys.ptk().map(|k| k.lifetime()), Some(240));
    }

    #[test]
    fn test_delete_absent_key_keeps_clean() {
        let mut keys = SecurityKeys::new();
        keys.delete_pmk();
        keys.delete_ptk();
        assert!(!keys.is_updated());
    }

    #[test]
    fn test_debug_redacts_key_material() {
        let key = LifetimeKey::new([0xAB; 4], 10);
        let text = format!("{:?}", key);
        assert!(!text.contains("171"));
        assert!(text.contains("redacted"));
    }
}
