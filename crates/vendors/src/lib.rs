//! Vendor Matcher - drone-vendor MAC prefix database
//!
//! Loads a semicolon-delimited table of `(vendor name; 6 hex digit prefix)`
//! rows and answers "which flagged vendor does this MAC belong to?". Row
//! forms accepted:
//! - `DJI;60601F`
//! - `Parrot SA;a0143d` (prefix is case-insensitive)
//!
//! Malformed rows are logged and skipped, never fatal. Rows naming an
//! already-known vendor merge into that vendor's prefix list.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use dronewarden_common::MacAddr;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Length of a MAC prefix in bytes
pub const PREFIX_LEN: usize = 3;

#[derive(Error, Debug)]
pub enum VendorError {
    #[error("cannot read vendor database: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: expected 'vendor;prefix'")]
    MissingField { line: u64 },

    #[error("line {line}: prefix '{prefix}' must be exactly 6 hex digits")]
    BadPrefixLength { line: u64, prefix: String },

    #[error("line {line}: prefix '{prefix}' is not hexadecimal")]
    BadPrefixHex { line: u64, prefix: String },

    #[error("prefix {prefix} already defined for vendor '{vendor}'")]
    DuplicatePrefix { vendor: String, prefix: String },

    #[error("line {line}: unreadable record: {reason}")]
    Record { line: u64, reason: String },
}

/// One vendor and every OUI registered to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vendor {
    name: String,
    prefixes: Vec<[u8; PREFIX_LEN]>,
}

impl Vendor {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            prefixes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefixes(&self) -> &[[u8; PREFIX_LEN]] {
        &self.prefixes
    }

    #[inline]
    pub fn has_prefix(&self, prefix: &[u8; PREFIX_LEN]) -> bool {
        self.prefixes.iter().any(|p| p == prefix)
    }

    /// Register a prefix. A prefix already held by this vendor is rejected.
    pub fn add_prefix(&mut self, prefix: [u8; PREFIX_LEN]) -> Result<(), VendorError> {
        if self.has_prefix(&prefix) {
            return Err(VendorError::DuplicatePrefix {
                vendor: self.name.clone(),
                prefix: format_prefix(&prefix),
            });
        }
        self.prefixes.push(prefix);
        Ok(())
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefixes: Vec<String> = self.prefixes.iter().map(format_prefix).collect();
        write!(f, "<Vendor name='{}', prefix=[{}]>", self.name, prefixes.join(", "))
    }
}

/// Ordered set of vendors with unique names. Immutable once loaded.
#[derive(Debug, Clone, Default)]
pub struct VendorSet {
    vendors: Vec<Vendor>,
}

impl VendorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the database from a file. Only failing to open the file is an
    /// error; bad rows inside it are skipped.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, VendorError> {
        let file = File::open(path.as_ref())?;
        Ok(Self::from_reader(file))
    }

    /// Parse a database from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Self {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut set = VendorSet::new();
        let mut nb_prefix = 0usize;

        for (idx, record) in rdr.records().enumerate() {
            let line = idx as u64 + 1;
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or(line);
                    error!(
                        "{}, skipping...",
                        VendorError::Record {
                            line,
                            reason: e.to_string()
                        }
                    );
                    continue;
                }
            };

            let (name, raw_prefix) = match (record.get(0), record.get(1)) {
                (Some(name), Some(prefix)) if !name.is_empty() => (name, prefix),
                _ => {
                    error!("{}, skipping...", VendorError::MissingField { line });
                    continue;
                }
            };

            let prefix = match parse_prefix(raw_prefix, line) {
                Ok(p) => p,
                Err(e) => {
                    error!("{}, skipping...", e);
                    continue;
                }
            };

            match set.add(name, prefix) {
                Ok(()) => {
                    debug!("Added prefix '{}' for vendor '{}'", raw_prefix, name);
                    nb_prefix += 1;
                }
                Err(e) => warn!("Cannot add prefix: {}", e),
            }
        }

        info!(
            "{} vendors loaded ({} MAC address prefixes)",
            set.len(),
            nb_prefix
        );
        set
    }

    /// Add `prefix` under `name`, creating the vendor on first use.
    pub fn add(&mut self, name: &str, prefix: [u8; PREFIX_LEN]) -> Result<(), VendorError> {
        self.get_or_create(name).add_prefix(prefix)
    }

    fn get_or_create(&mut self, name: &str) -> &mut Vendor {
        let pos = match self.vendors.iter().position(|v| v.name == name) {
            Some(pos) => pos,
            None => {
                self.vendors.push(Vendor::new(name));
                self.vendors.len() - 1
            }
        };
        &mut self.vendors[pos]
    }

    /// Vendor owning the first three octets of `mac`. First match in load
    /// order wins.
    #[inline]
    pub fn lookup(&self, mac: &MacAddr) -> Option<&str> {
        let oui = mac.oui();
        self.vendors
            .iter()
            .find(|v| v.has_prefix(&oui))
            .map(|v| v.name.as_str())
    }

    #[inline]
    pub fn is_flagged(&self, mac: &MacAddr) -> bool {
        self.lookup(mac).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Vendor> {
        self.vendors.iter().find(|v| v.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vendor> {
        self.vendors.iter()
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }

    pub fn prefix_count(&self) -> usize {
        self.vendors.iter().map(|v| v.prefixes.len()).sum()
    }
}

/// Decode a 6 hex digit prefix (no separators) into 3 bytes.
pub fn parse_prefix(raw: &str, line: u64) -> Result<[u8; PREFIX_LEN], VendorError> {
    if raw.len() != PREFIX_LEN * 2 {
        return Err(VendorError::BadPrefixLength {
            line,
            prefix: raw.to_string(),
        });
    }
    if !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(VendorError::BadPrefixHex {
            line,
            prefix: raw.to_string(),
        });
    }

    let mut out = [0u8; PREFIX_LEN];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = u8::from_str_radix(&raw[i * 2..i * 2 + 2], 16).map_err(|_| {
            VendorError::BadPrefixHex {
                line,
                prefix: raw.to_string(),
            }
        })?;
    }
    Ok(out)
}

fn format_prefix(prefix: &[u8; PREFIX_LEN]) -> String {
    format!("{:02x}{:02x}{:02x}", prefix[0], prefix[1], prefix[2])
}
