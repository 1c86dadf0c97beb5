use std::cmp::Ordering;
use std::fmt;

use binrw::io::{Seek, SeekFrom};
use binrw::prelude::*;

use crate::guid::Guid;
use crate::mask::{mask_names, AccessMask};
use crate::sid::Sid;

pub const ACL_REVISION: u8 = 2;
pub const ACL_REVISION_DS: u8 = 4;

pub const OBJECT_INHERIT_ACE: u8 = 0x01;
pub const CONTAINER_INHERIT_ACE: u8 = 0x02;
pub const NO_PROPAGATE_INHERIT_ACE: u8 = 0x04;
pub const INHERIT_ONLY_ACE: u8 = 0x08;
pub const INHERITED_ACE: u8 = 0x10;
pub const SUCCESSFUL_ACCESS_ACE_FLAG: u8 = 0x40;
pub const FAILED_ACCESS_ACE_FLAG: u8 = 0x80;

const ACE_OBJECT_TYPE_PRESENT: u32 = 0x1;
const ACE_INHERITED_OBJECT_TYPE_PRESENT: u32 = 0x2;

const ACE_HEADER_SIZE: usize = 4;
pub(crate) const ACL_HEADER_SIZE: usize = 8;

#[binrw::binrw]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[brw(repr(u8))]
#[repr(u8)]
pub enum AceType {
    AccessAllow = 0x00,
    AccessDeny = 0x01,
    SystemAudit = 0x02,
    SystemAlarm = 0x03,
    AccessAllowObject = 0x05,
    AccessDenyObject = 0x06,
    SystemAuditObject = 0x07,
    SystemAlarmObject = 0x08,
    AccessAllowCallback = 0x09,
    AccessDenyCallback = 0x0A,
    AccessAllowCallbackObject = 0x0B,
    AccessDenyCallbackObject = 0x0C,
    SystemAuditCallback = 0x0D,
    SystemAlarmCallback = 0x0E,
    SystemAuditCallbackObject = 0x0F,
    SystemAlarmCallbackObject = 0x10,
    SystemMandatoryLabel = 0x11,
    SystemResourceAttribute = 0x12,
    SystemScopedPolicyId = 0x13,
}

impl AceType {
    pub fn is_allow(self) -> bool {
        self == AceType::AccessAllow || self == AceType::AccessAllowObject
    }

    pub fn is_deny(self) -> bool {
        self == AceType::AccessDeny || self == AceType::AccessDenyObject
    }

    /// Types whose object type takes part in matching.
    pub fn has_object(self) -> bool {
        match self {
            AceType::AccessAllowObject
            | AceType::AccessDenyObject
            | AceType::SystemAuditObject
            | AceType::SystemAlarmObject => true,
            _ => false,
        }
    }

    /// Types encoded with the object-flags field and optional GUIDs.
    fn has_object_layout(self) -> bool {
        match self {
            AceType::AccessAllowCallbackObject
            | AceType::AccessDenyCallbackObject
            | AceType::SystemAuditCallbackObject
            | AceType::SystemAlarmCallbackObject => true,
            other => other.has_object(),
        }
    }
}

impl fmt::Display for AceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let entry_type = match *self {
            AceType::AccessAllow => "AccessAllow",
            AceType::AccessDeny => "AccessDeny",
            AceType::SystemAudit => "SystemAudit",
            AceType::SystemAlarm => "SystemAlarm",
            AceType::AccessAllowObject => "AccessAllowObject",
            AceType::AccessDenyObject => "AccessDenyObject",
            AceType::SystemAuditObject => "SystemAuditObject",
            AceType::SystemAlarmObject => "SystemAlarmObject",
            AceType::AccessAllowCallback => "AccessAllowCallback",
            AceType::AccessDenyCallback => "AccessDenyCallback",
            AceType::AccessAllowCallbackObject => "AccessAllowCallbackObject",
            AceType::AccessDenyCallbackObject => "AccessDenyCallbackObject",
            AceType::SystemAuditCallback => "SystemAuditCallback",
            AceType::SystemAlarmCallback => "SystemAlarmCallback",
            AceType::SystemAuditCallbackObject => "SystemAuditCallbackObject",
            AceType::SystemAlarmCallbackObject => "SystemAlarmCallbackObject",
            AceType::SystemMandatoryLabel => "SystemMandatoryLabel",
            AceType::SystemResourceAttribute => "SystemResourceAttribute",
            AceType::SystemScopedPolicyId => "SystemScopedPolicyId",
        };
        write!(f, "{}", entry_type)
    }
}

#[binrw::binrw]
#[derive(Clone, Debug, PartialEq, Eq)]
#[brw(little)]
pub struct Ace {
    pub ace_type: AceType,
    pub flags: u8,
    #[bw(calc = (ace_body_len(*ace_type, object_type, inherited_object_type, trustee) + application_data.len()) as u16)]
    #[br(temp)]
    #[br(assert(size as usize >= ACE_HEADER_SIZE, "ACE size smaller than its header"))]
    size: u16,
    pub access_mask: AccessMask,
    #[bw(calc = encoded_object_flags(*ace_type, object_type, inherited_object_type))]
    #[br(temp, if(ace_type.has_object_layout()))]
    object_flags: Option<u32>,
    /// Only meaningful for object types; `None` means the ACE is not object-scoped.
    #[br(if(object_flags.unwrap_or(0) & ACE_OBJECT_TYPE_PRESENT != 0))]
    #[bw(if(ace_type.has_object_layout()))]
    pub object_type: Option<Guid>,
    #[br(if(object_flags.unwrap_or(0) & ACE_INHERITED_OBJECT_TYPE_PRESENT != 0))]
    #[bw(if(ace_type.has_object_layout()))]
    pub inherited_object_type: Option<Guid>,
    #[br(assert(
        ace_body_len(ace_type, &object_type, &inherited_object_type, &trustee) <= size as usize,
        "ACE size smaller than its body"
    ))]
    pub trustee: Sid,
    /// Bytes after the trustee SID, kept verbatim.
    #[br(count = size as usize - ace_body_len(ace_type, &object_type, &inherited_object_type, &trustee))]
    pub application_data: Vec<u8>,
}

/// Object-flags field of object layouts, `None` for every other type.
fn encoded_object_flags(
    ace_type: AceType,
    object_type: &Option<Guid>,
    inherited_object_type: &Option<Guid>,
) -> Option<u32> {
    if !ace_type.has_object_layout() {
        return None;
    }

    let mut flags = 0u32;
    if object_type.is_some() {
        flags |= ACE_OBJECT_TYPE_PRESENT;
    }
    if inherited_object_type.is_some() {
        flags |= ACE_INHERITED_OBJECT_TYPE_PRESENT;
    }

    Some(flags)
}

/// Encoded size of an ACE without its application data.
fn ace_body_len(
    ace_type: AceType,
    object_type: &Option<Guid>,
    inherited_object_type: &Option<Guid>,
    trustee: &Sid,
) -> usize {
    let object_len = if ace_type.has_object_layout() {
        4 + 16 * (object_type.is_some() as usize + inherited_object_type.is_some() as usize)
    } else {
        0
    };

    ACE_HEADER_SIZE + 4 + object_len + trustee.encoded_len()
}

impl Ace {
    /// A fresh, non-inherited allow or deny ACE. Object-scoped when `object_type` is given.
    pub fn new(allow: bool, trustee: Sid, access_mask: AccessMask, object_type: Option<Guid>) -> Ace {
        let ace_type = match (allow, object_type.is_some()) {
            (true, false) => AceType::AccessAllow,
            (true, true) => AceType::AccessAllowObject,
            (false, false) => AceType::AccessDeny,
            (false, true) => AceType::AccessDenyObject,
        };

        Ace {
            ace_type,
            flags: 0,
            access_mask,
            trustee,
            object_type,
            inherited_object_type: None,
            application_data: Vec::new(),
        }
    }

    pub fn is_inherited(&self) -> bool {
        self.flags & INHERITED_ACE != 0
    }

    fn propagates(&self) -> bool {
        self.flags & (OBJECT_INHERIT_ACE | CONTAINER_INHERIT_ACE) != 0
    }

    /// Precise match used to pick the ACE an edit applies to.
    ///
    /// The requested mask only has to be contained in the ACE's mask, so that a
    /// narrower right can be found inside a broader ACE. An ACE without an object
    /// type never matches an object-scoped request and vice versa.
    pub fn matches(
        &self,
        trustee: &Sid,
        access_mask: AccessMask,
        object_type: Option<&Guid>,
        allow: bool,
        inherited: bool,
    ) -> bool {
        let type_match = if allow {
            self.ace_type.is_allow()
        } else {
            self.ace_type.is_deny()
        };
        let inherited_match = self.is_inherited() == inherited;
        let access_mask_match = self.access_mask & access_mask == access_mask;
        let trustee_match = self.trustee == *trustee;
        let object_match = if self.ace_type.has_object() {
            self.object_type.as_ref() == object_type
        } else {
            object_type.is_none()
        };

        type_match && inherited_match && access_mask_match && trustee_match && object_match
    }

    /// Loose match used when reading rights: any overlap of masks counts, and an ACE
    /// without an object type covers every object type.
    pub fn applies_to(&self, trustee: &Sid, access_mask: AccessMask, object_type: Option<&Guid>) -> bool {
        let object_match = !self.ace_type.has_object() || self.object_type.as_ref() == object_type;

        self.trustee == *trustee && self.access_mask & access_mask != 0 && object_match
    }

    pub fn encoded_len(&self) -> usize {
        ace_body_len(self.ace_type, &self.object_type, &self.inherited_object_type, &self.trustee)
            + self.application_data.len()
    }

    /// Canonical ACE order. Explicit ACEs come before inherited ones, denies before
    /// allows, non-propagating before propagating; the remaining fields only make the
    /// order total.
    pub fn canonical_cmp(&self, other: &Ace) -> Ordering {
        self.is_inherited()
            .cmp(&other.is_inherited())
            .then_with(|| self.ace_type.is_allow().cmp(&other.ace_type.is_allow()))
            .then_with(|| self.propagates().cmp(&other.propagates()))
            .then_with(|| (other.ace_type as u8).cmp(&(self.ace_type as u8)))
            .then_with(|| self.trustee.canonical_cmp(&other.trustee))
            .then_with(|| self.flags.cmp(&other.flags))
            .then_with(|| self.access_mask.cmp(&other.access_mask))
            .then_with(|| self.encoded_len().cmp(&other.encoded_len()))
            .then_with(|| self.object_type.cmp(&other.object_type))
            .then_with(|| self.inherited_object_type.cmp(&other.inherited_object_type))
            .then_with(|| self.application_data.cmp(&other.application_data))
    }
}

impl fmt::Display for Ace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut flags: String = String::new();
        let defined_flags = [
            (CONTAINER_INHERIT_ACE, "ContainerInheritAce"),
            (FAILED_ACCESS_ACE_FLAG, "FailedAccessAce"),
            (INHERIT_ONLY_ACE, "InheritOnlyAce"),
            (INHERITED_ACE, "InheritedAce"),
            (NO_PROPAGATE_INHERIT_ACE, "NoPropagateInheritAce"),
            (OBJECT_INHERIT_ACE, "ObjectInheritAce"),
            (SUCCESSFUL_ACCESS_ACE_FLAG, "SuccessfulAccessAce"),
        ];

        for &(flag, desc) in &defined_flags {
            if self.flags & flag > 0 {
                if !flags.is_empty() {
                    flags += "|";
                }
                flags += desc;
            }
        }
        if flags.is_empty() {
            flags += "None";
        }

        let mut masks = mask_names(self.access_mask).join("|");
        if masks.is_empty() {
            masks += "None";
        }

        write!(
            f,
            "Type={}\n  Flags={}\n  RawMask={:X}\n  Mask={}\n  Sid={}\n",
            self.ace_type, flags, self.access_mask, masks, self.trustee
        )?;
        if let Some(ref object_type) = self.object_type {
            writeln!(f, "  ObjectType={}", object_type)?;
        }

        Ok(())
    }
}

#[binrw::binrw]
#[derive(Clone, Debug, PartialEq, Eq)]
#[brw(little)]
pub struct Acl {
    pub revision: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    sbz1: u8,
    #[bw(calc = acl_size(aces) as u16)]
    #[br(temp)]
    #[br(assert(size as usize >= ACL_HEADER_SIZE, "ACL size smaller than its header"))]
    size: u16,
    #[bw(calc = aces.len() as u16)]
    #[br(temp)]
    ace_count: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    sbz2: u16,
    #[br(parse_with = read_aces, args(ace_count, size))]
    pub aces: Vec<Ace>,
}

fn acl_size(aces: &[Ace]) -> usize {
    ACL_HEADER_SIZE + aces.iter().map(Ace::encoded_len).sum::<usize>()
}

/// Reads `count` ACEs, none of which may run past the `size` bytes of the ACL.
#[binrw::parser(reader, endian)]
fn read_aces(count: u16, size: u16) -> BinResult<Vec<Ace>> {
    let end = reader.stream_position()? + (size as usize - ACL_HEADER_SIZE) as u64;

    let mut aces = Vec::new();
    for _ in 0..count {
        let pos = reader.stream_position()?;
        let ace = Ace::read_options(reader, endian, ())?;
        if reader.stream_position()? > end {
            return Err(binrw::Error::AssertFail {
                pos,
                message: "ACE runs past the end of its ACL".to_owned(),
            });
        }
        aces.push(ace);
    }

    reader.seek(SeekFrom::Start(end))?;
    Ok(aces)
}

impl Default for Acl {
    fn default() -> Acl {
        Acl {
            revision: ACL_REVISION,
            aces: Vec::new(),
        }
    }
}

impl Acl {
    pub fn new() -> Acl {
        Acl::default()
    }

    pub fn len(&self) -> usize {
        self.aces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aces.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Ace> {
        self.aces.iter()
    }

    /// Appends `ace` without sorting. Object ACEs require the directory-service revision.
    pub(crate) fn push(&mut self, ace: Ace) {
        if ace.ace_type.has_object_layout() {
            self.revision = self.revision.max(ACL_REVISION_DS);
        }
        self.aces.push(ace);
    }

    pub fn sort(&mut self) {
        self.aces.sort_by(Ace::canonical_cmp);
    }

    pub fn is_sorted(&self) -> bool {
        self.aces
            .windows(2)
            .all(|pair| pair[0].canonical_cmp(&pair[1]) != Ordering::Greater)
    }

    /// Replaces every entry with `aces`, then restores canonical order.
    pub fn replace(&mut self, aces: Vec<Ace>) {
        self.aces.clear();
        for ace in aces {
            self.push(ace);
        }
        self.sort();
    }

    /// Drops the explicit ACEs of the given trustees. Inherited ACEs stay, they belong
    /// to the parent object. Returns the number of ACEs dropped.
    pub fn remove_trustees(&mut self, trustees: &[Sid]) -> usize {
        let before = self.aces.len();
        let kept: Vec<Ace> = self
            .aces
            .drain(..)
            .filter(|ace| ace.is_inherited() || !trustees.contains(&ace.trustee))
            .collect();
        self.replace(kept);

        before - self.aces.len()
    }

    pub fn encoded_len(&self) -> usize {
        acl_size(&self.aces)
    }
}

impl<'a> IntoIterator for &'a Acl {
    type Item = &'a Ace;
    type IntoIter = std::slice::Iter<'a, Ace>;

    fn into_iter(self) -> Self::IntoIter {
        self.aces.iter()
    }
}
