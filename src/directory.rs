//! The directory the descriptors come from and go back to.
//!
//! The engine never talks to a directory server itself. It is handed bytes read
//! through [`Directory::read_attribute`] and hands bytes back through
//! [`Directory::replace_attribute`].

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::descriptor::SecurityDescriptor;
use crate::error::{Error, Result};
use crate::sid::{well_known_trustee_name, Sid};

pub const ATTRIBUTE_SECURITY_DESCRIPTOR: &str = "nTSecurityDescriptor";

pub trait Directory {
    /// Raw value of `attribute` on `object`. The error is the directory's own message.
    fn read_attribute(&self, object: &str, attribute: &str) -> std::result::Result<Vec<u8>, String>;

    fn replace_attribute(
        &mut self,
        object: &str,
        attribute: &str,
        value: &[u8],
    ) -> std::result::Result<(), String>;
}

/// What a trustee search returns for the object carrying a SID.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrusteeEntry {
    pub dn: String,
    pub display_name: Option<String>,
    pub sam_account_name: Option<String>,
}

pub trait TrusteeSearch {
    fn find_by_sid(&self, sid: &Sid) -> Option<TrusteeEntry>;
}

/// Fetches and decodes the security descriptor of `object`.
pub fn load_descriptor<D: Directory + ?Sized>(directory: &D, object: &str) -> Result<SecurityDescriptor> {
    let bytes = directory
        .read_attribute(object, ATTRIBUTE_SECURITY_DESCRIPTOR)
        .map_err(|message| Error::FetchFailure {
            object: object.to_owned(),
            message,
        })?;

    SecurityDescriptor::from_bytes(&bytes)
}

/// Encodes `sd` and writes it over the security descriptor of `object`.
pub fn replace_descriptor<D: Directory + ?Sized>(
    directory: &mut D,
    object: &str,
    sd: &SecurityDescriptor,
) -> Result<()> {
    let bytes = sd.to_bytes()?;

    directory
        .replace_attribute(object, ATTRIBUTE_SECURITY_DESCRIPTOR, &bytes)
        .map_err(|message| {
            warn!(object, %message, "failed to write security descriptor");
            Error::PersistFailure {
                object: object.to_owned(),
                message,
            }
        })?;

    debug!(object, len = bytes.len(), "wrote security descriptor");
    Ok(())
}

/// First RDN value of a DN: "CN=John Smith,OU=Staff,DC=example" -> "John Smith".
fn dn_get_name(dn: &str) -> &str {
    let rdn = dn.split(',').next().unwrap_or(dn);
    match rdn.find('=') {
        Some(i) => &rdn[i + 1..],
        None => rdn,
    }
}

/// Name to show for a trustee.
///
/// Well-known SIDs use the static table. Other SIDs are looked up in the directory
/// and named by display name, then sAMAccountName, then the DN's first RDN. A SID
/// nobody claims is shown as is.
pub fn trustee_name<S: TrusteeSearch + ?Sized>(search: &S, trustee: &Sid) -> String {
    if let Some(name) = well_known_trustee_name(trustee) {
        return name.to_owned();
    }

    match search.find_by_sid(trustee) {
        Some(entry) => entry
            .display_name
            .or(entry.sam_account_name)
            .unwrap_or_else(|| dn_get_name(&entry.dn).to_owned()),
        None => trustee.to_string(),
    }
}

/// Directory kept in memory. Writes can be made to fail to exercise error paths.
#[derive(Clone, Debug, Default)]
pub struct MemoryDirectory {
    objects: HashMap<String, HashMap<String, Vec<u8>>>,
    trustees: Vec<(Sid, TrusteeEntry)>,
    write_error: Option<String>,
}

impl MemoryDirectory {
    pub fn new() -> MemoryDirectory {
        MemoryDirectory::default()
    }

    pub fn insert_object(&mut self, object: &str, sd: &SecurityDescriptor) -> Result<()> {
        let bytes = sd.to_bytes()?;
        self.objects
            .entry(object.to_owned())
            .or_default()
            .insert(ATTRIBUTE_SECURITY_DESCRIPTOR.to_owned(), bytes);
        Ok(())
    }

    pub fn insert_raw(&mut self, object: &str, attribute: &str, value: Vec<u8>) {
        self.objects
            .entry(object.to_owned())
            .or_default()
            .insert(attribute.to_owned(), value);
    }

    pub fn insert_trustee(&mut self, sid: Sid, entry: TrusteeEntry) {
        self.trustees.push((sid, entry));
    }

    /// Makes every following write fail with `message`; `None` restores writes.
    pub fn fail_writes(&mut self, message: Option<&str>) {
        self.write_error = message.map(str::to_owned);
    }

    pub fn raw(&self, object: &str, attribute: &str) -> Option<&[u8]> {
        self.objects
            .get(object)
            .and_then(|attributes| attributes.get(attribute))
            .map(Vec::as_slice)
    }
}

impl Directory for MemoryDirectory {
    fn read_attribute(&self, object: &str, attribute: &str) -> std::result::Result<Vec<u8>, String> {
        let attributes = self
            .objects
            .get(object)
            .ok_or_else(|| format!("no such object: {}", object))?;

        attributes
            .get(attribute)
            .cloned()
            .ok_or_else(|| format!("{} has no attribute {}", object, attribute))
    }

    fn replace_attribute(
        &mut self,
        object: &str,
        attribute: &str,
        value: &[u8],
    ) -> std::result::Result<(), String> {
        if let Some(ref message) = self.write_error {
            return Err(message.clone());
        }

        let attributes = self
            .objects
            .get_mut(object)
            .ok_or_else(|| format!("no such object: {}", object))?;
        attributes.insert(attribute.to_owned(), value.to_vec());

        Ok(())
    }
}

impl TrusteeSearch for MemoryDirectory {
    fn find_by_sid(&self, sid: &Sid) -> Option<TrusteeEntry> {
        self.trustees
            .iter()
            .find(|(candidate, _)| candidate == sid)
            .map(|(_, entry)| entry.clone())
    }
}
