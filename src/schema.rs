//! Extended rights known to the directory: name <-> GUID.
//!
//! The built-in table covers the rights and property sets the policies and the
//! right-name display need. More can be loaded from TOML:
//!
//! ```toml
//! [[extended_right]]
//! cn = "User-Change-Password"
//! guid = "ab721a53-1e2f-11d0-9819-00aa0040529b"
//! display_name = "Change Password"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::guid::Guid;

pub const USER_CHANGE_PASSWORD: &str = "User-Change-Password";

const BUILTIN_RIGHTS: &[(&str, &str, &str)] = &[
    (USER_CHANGE_PASSWORD, "ab721a53-1e2f-11d0-9819-00aa0040529b", "Change Password"),
    ("User-Force-Change-Password", "00299570-246d-11d0-a768-00aa006e0529", "Reset Password"),
    ("Send-As", "ab721a54-1e2f-11d0-9819-00aa0040529b", "Send As"),
    ("Receive-As", "ab721a56-1e2f-11d0-9819-00aa0040529b", "Receive As"),
    ("Personal-Information", "77b5b886-944a-11d1-aebd-0000f80367c1", "Personal Information"),
    ("Public-Information", "e48d0154-bcf8-11d1-8702-00c04fb96050", "Public Information"),
    ("General-Information", "59ba2f42-79a2-11d0-9020-00c04fc2d3cf", "General Information"),
    ("Web-Information", "e45795b3-9455-11d1-aebd-0000f80367c1", "Web Information"),
    ("User-Logon", "5f202010-79a5-11d0-9020-00c04fc2d4cf", "Logon Information"),
    ("Membership", "bc0ac240-79a9-11d0-9020-00c04fc2d4cf", "Group Membership"),
    ("Allowed-To-Authenticate", "68b1d179-0d15-4d4f-ab71-46152e79a7bc", "Allowed to Authenticate"),
];

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    extended_right: Vec<RightEntry>,
}

#[derive(Debug, Deserialize)]
struct RightEntry {
    cn: String,
    guid: String,
    display_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtendedRight {
    pub cn: String,
    pub guid: Guid,
    pub display_name: Option<String>,
}

impl ExtendedRight {
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.cn)
    }
}

#[derive(Clone, Debug)]
pub struct RightsSchema {
    rights: Vec<ExtendedRight>,
    by_cn: HashMap<String, usize>,
    by_guid: HashMap<Guid, usize>,
}

impl Default for RightsSchema {
    fn default() -> RightsSchema {
        let mut schema = RightsSchema::empty();
        for &(cn, guid, display_name) in BUILTIN_RIGHTS {
            let inserted = guid.parse().and_then(|guid| {
                schema.insert(ExtendedRight {
                    cn: cn.to_owned(),
                    guid,
                    display_name: Some(display_name.to_owned()),
                })
            });
            debug_assert!(inserted.is_ok(), "built-in right {} rejected", cn);
        }

        schema
    }
}

impl RightsSchema {
    pub fn empty() -> RightsSchema {
        RightsSchema {
            rights: Vec::new(),
            by_cn: HashMap::new(),
            by_guid: HashMap::new(),
        }
    }

    /// Built-in table extended by the rights in `text`. Entries with a known cn replace
    /// the built-in one.
    pub fn from_toml_str(text: &str) -> Result<RightsSchema> {
        let file: SchemaFile = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;

        let mut schema = RightsSchema::default();
        for entry in file.extended_right {
            let guid = entry.guid.parse()?;
            schema.insert(ExtendedRight {
                cn: entry.cn,
                guid,
                display_name: entry.display_name,
            })?;
        }

        debug!(rights = schema.rights.len(), "loaded rights schema");
        Ok(schema)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<RightsSchema> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        RightsSchema::from_toml_str(&text)
    }

    /// A GUID belongs to a single cn. Re-inserting a cn replaces its entry.
    fn insert(&mut self, right: ExtendedRight) -> Result<()> {
        let slot = self.by_cn.get(&right.cn).copied();
        if let Some(&owner) = self.by_guid.get(&right.guid) {
            if slot != Some(owner) {
                return Err(Error::Config(format!(
                    "{}: GUID {} already belongs to {}",
                    right.cn, right.guid, self.rights[owner].cn
                )));
            }
        }

        match slot {
            Some(i) => {
                let old_guid = self.rights[i].guid;
                if self.by_guid.get(&old_guid) == Some(&i) {
                    self.by_guid.remove(&old_guid);
                }
                self.by_guid.insert(right.guid, i);
                self.rights[i] = right;
            }
            None => {
                let i = self.rights.len();
                self.by_cn.insert(right.cn.clone(), i);
                self.by_guid.insert(right.guid, i);
                self.rights.push(right);
            }
        }

        Ok(())
    }

    pub fn right_guid(&self, cn: &str) -> Option<Guid> {
        self.by_cn.get(cn).map(|&i| self.rights[i].guid)
    }

    /// Display name of the right, falling back to its cn.
    pub fn right_name(&self, guid: &Guid) -> Option<&str> {
        self.by_guid.get(guid).map(|&i| self.rights[i].name())
    }

    pub fn rights(&self) -> &[ExtendedRight] {
        &self.rights
    }
}
