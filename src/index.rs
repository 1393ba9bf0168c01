// 🗂️ License Index - Lookup tables over the filtered licensing set
//
// Three keys, built once and read-only during matching:
//   by_license       normalized license  → record (last write wins)
//   by_address       normalized address  → record (last write wins)
//   by_street_prefix first 3 addr tokens → records in insertion order

use crate::normalize::{extract_street_prefix, normalize_address, normalize_license};
use crate::records::LicenseRecord;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct LicenseIndex {
    records: Vec<LicenseRecord>,
    by_license: HashMap<String, usize>,
    by_address: HashMap<String, usize>,
    by_street_prefix: HashMap<String, Vec<usize>>,
}

/// Key collision counts seen while building (informational only)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub records: usize,
    pub license_keys: usize,
    pub address_keys: usize,
    pub street_keys: usize,
    pub license_collisions: usize,
    pub address_collisions: usize,
}

impl LicenseIndex {
    /// Build all three indexes from already-filtered licensing records.
    ///
    /// Records without a usable key are left out of that one index only.
    pub fn build(records: Vec<LicenseRecord>) -> Self {
        let mut index = LicenseIndex {
            records,
            ..Default::default()
        };

        for (i, record) in index.records.iter().enumerate() {
            if let Some(license) = normalize_license(Some(&record.license_number)) {
                if let Some(prev) = index.by_license.insert(license.clone(), i) {
                    debug!(
                        license = %license,
                        replaced = %index.records[prev].business_name,
                        by = %record.business_name,
                        "license key collision, keeping later record"
                    );
                }
            }

            let address = normalize_address(Some(&record.physical_address));
            if !address.is_empty() {
                if let Some(prev) = index.by_address.insert(address.clone(), i) {
                    debug!(
                        address = %address,
                        replaced = %index.records[prev].business_name,
                        by = %record.business_name,
                        "address key collision, keeping later record"
                    );
                }
            }

            let street = extract_street_prefix(Some(&record.physical_address));
            if !street.is_empty() {
                index.by_street_prefix.entry(street).or_default().push(i);
            }
        }

        index
    }

    pub fn by_license(&self, license: &str) -> Option<&LicenseRecord> {
        self.by_license.get(license).map(|&i| &self.records[i])
    }

    pub fn by_address(&self, address: &str) -> Option<&LicenseRecord> {
        self.by_address.get(address).map(|&i| &self.records[i])
    }

    /// All records sharing a street prefix, in licensing-file order
    pub fn by_street_prefix(&self, prefix: &str) -> Vec<&LicenseRecord> {
        self.by_street_prefix
            .get(prefix)
            .map(|ids| ids.iter().map(|&i| &self.records[i]).collect())
            .unwrap_or_default()
    }

    pub fn records(&self) -> &[LicenseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        let license_total = self
            .records
            .iter()
            .filter(|r| normalize_license(Some(&r.license_number)).is_some())
            .count();
        let address_total = self
            .records
            .iter()
            .filter(|r| !normalize_address(Some(&r.physical_address)).is_empty())
            .count();

        IndexStats {
            records: self.records.len(),
            license_keys: self.by_license.len(),
            address_keys: self.by_address.len(),
            street_keys: self.by_street_prefix.len(),
            license_collisions: license_total - self.by_license.len(),
            address_collisions: address_total - self.by_address.len(),
        }
    }
}
