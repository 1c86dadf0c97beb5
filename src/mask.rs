//! Directory-service access mask bits.

use crate::guid::Guid;
use crate::schema::RightsSchema;

pub type AccessMask = u32;

pub const SEC_ADS_CREATE_CHILD: AccessMask = 0x0000_0001;
pub const SEC_ADS_DELETE_CHILD: AccessMask = 0x0000_0002;
pub const SEC_ADS_LIST: AccessMask = 0x0000_0004;
pub const SEC_ADS_SELF_WRITE: AccessMask = 0x0000_0008;
pub const SEC_ADS_READ_PROP: AccessMask = 0x0000_0010;
pub const SEC_ADS_WRITE_PROP: AccessMask = 0x0000_0020;
pub const SEC_ADS_DELETE_TREE: AccessMask = 0x0000_0040;
pub const SEC_ADS_LIST_OBJECT: AccessMask = 0x0000_0080;
pub const SEC_ADS_CONTROL_ACCESS: AccessMask = 0x0000_0100;

pub const SEC_STD_DELETE: AccessMask = 0x0001_0000;
pub const SEC_STD_READ_CONTROL: AccessMask = 0x0002_0000;
pub const SEC_STD_WRITE_DAC: AccessMask = 0x0004_0000;
pub const SEC_STD_WRITE_OWNER: AccessMask = 0x0008_0000;
pub const SEC_STD_SYNCHRONIZE: AccessMask = 0x0010_0000;

pub const SEC_ADS_GENERIC_ALL_DS: AccessMask = SEC_STD_DELETE
    | SEC_STD_WRITE_DAC
    | SEC_STD_WRITE_OWNER
    | SEC_ADS_CREATE_CHILD
    | SEC_ADS_DELETE_CHILD
    | SEC_ADS_DELETE_TREE
    | SEC_ADS_CONTROL_ACCESS;
pub const SEC_ADS_GENERIC_EXECUTE: AccessMask = SEC_STD_READ_CONTROL | SEC_ADS_LIST;
pub const SEC_ADS_GENERIC_WRITE: AccessMask = SEC_STD_READ_CONTROL | SEC_ADS_SELF_WRITE | SEC_ADS_WRITE_PROP;
pub const SEC_ADS_GENERIC_READ: AccessMask =
    SEC_STD_READ_CONTROL | SEC_ADS_LIST | SEC_ADS_READ_PROP | SEC_ADS_LIST_OBJECT;
pub const SEC_ADS_GENERIC_ALL: AccessMask =
    SEC_ADS_GENERIC_EXECUTE | SEC_ADS_GENERIC_WRITE | SEC_ADS_GENERIC_READ | SEC_ADS_GENERIC_ALL_DS;

/// Generic read the way the directory server stores it: without list-object.
pub const SEC_ADS_GENERIC_READ_MAPPED: AccessMask = SEC_ADS_GENERIC_READ & !SEC_ADS_LIST_OBJECT;

/// Maps a requested mask onto the value the server keeps in its ACEs.
///
/// Directory tooling writes generic read with the list-object bit set while the
/// server's own generic read leaves it out, so that bit is dropped both when
/// writing and when reading that right. Every other mask is returned unchanged.
pub fn map_access_mask(access_mask: AccessMask) -> AccessMask {
    if access_mask == SEC_ADS_GENERIC_READ {
        access_mask & !SEC_ADS_LIST_OBJECT
    } else {
        access_mask
    }
}

/// Generic read and generic write both contain read-control. Returns the sibling of
/// `access_mask` if it is one of the pair.
pub(crate) fn shared_bit_sibling(access_mask: AccessMask) -> Option<AccessMask> {
    match access_mask {
        SEC_ADS_GENERIC_READ_MAPPED => Some(SEC_ADS_GENERIC_WRITE),
        SEC_ADS_GENERIC_WRITE => Some(SEC_ADS_GENERIC_READ_MAPPED),
        _ => None,
    }
}

const DEFINED_RIGHTS: &[(AccessMask, &str)] = &[
    (SEC_ADS_CREATE_CHILD, "CreateChild"),
    (SEC_ADS_DELETE_CHILD, "DeleteChild"),
    (SEC_ADS_LIST, "ListChildren"),
    (SEC_ADS_SELF_WRITE, "SelfWrite"),
    (SEC_ADS_READ_PROP, "ReadProperty"),
    (SEC_ADS_WRITE_PROP, "WriteProperty"),
    (SEC_ADS_DELETE_TREE, "DeleteTree"),
    (SEC_ADS_LIST_OBJECT, "ListObject"),
    (SEC_ADS_CONTROL_ACCESS, "ControlAccess"),
    (SEC_STD_DELETE, "Delete"),
    (SEC_STD_READ_CONTROL, "ReadControl"),
    (SEC_STD_WRITE_DAC, "WriteDac"),
    (SEC_STD_WRITE_OWNER, "WriteOwner"),
    (SEC_STD_SYNCHRONIZE, "Synchronize"),
];

/// Names of the individual bits set in `access_mask`, `GenericAll` if all of them are.
pub fn mask_names(access_mask: AccessMask) -> Vec<&'static str> {
    if access_mask & SEC_ADS_GENERIC_ALL == SEC_ADS_GENERIC_ALL {
        return vec!["GenericAll"];
    }

    DEFINED_RIGHTS
        .iter()
        .filter(|&&(bit, _)| access_mask & bit != 0)
        .map(|&(_, name)| name)
        .collect()
}

const COMMON_RIGHT_NAMES: &[(AccessMask, &str)] = &[
    (SEC_ADS_GENERIC_ALL, "Full control"),
    (SEC_ADS_GENERIC_READ, "Read"),
    (SEC_ADS_GENERIC_READ_MAPPED, "Read"),
    (SEC_ADS_GENERIC_WRITE, "Write"),
    (SEC_STD_DELETE, "Delete"),
    (SEC_ADS_CREATE_CHILD, "Create all child objects"),
    (SEC_ADS_DELETE_CHILD, "Delete all child objects"),
];

pub const UNKNOWN_RIGHT_NAME: &str = "<unknown right>";

/// Human-readable name of the right an ACE with this mask and object type grants.
pub fn right_name(schema: &RightsSchema, access_mask: AccessMask, object_type: Option<&Guid>) -> String {
    let object_type_name = || match object_type {
        Some(guid) => schema
            .right_name(guid)
            .map(str::to_owned)
            .unwrap_or_else(|| guid.to_string()),
        None => String::new(),
    };

    match access_mask {
        SEC_ADS_CONTROL_ACCESS => object_type_name(),
        SEC_ADS_READ_PROP => format!("Read {}", object_type_name()),
        SEC_ADS_WRITE_PROP => format!("Write {}", object_type_name()),
        _ => COMMON_RIGHT_NAMES
            .iter()
            .find(|&&(mask, _)| mask == access_mask)
            .map(|&(_, name)| name.to_owned())
            .unwrap_or_else(|| UNKNOWN_RIGHT_NAME.to_owned()),
    }
}
