//! Self-relative security descriptors and their binary codec.
//!
//! Only the DACL is interpreted. Owner, group and SACL are carried through so that
//! a decoded descriptor can be written back unchanged apart from the DACL edits.

use std::io::Cursor;

use binrw::io::{Read, Seek, SeekFrom};
use binrw::prelude::*;
use tracing::warn;

use crate::acl::{Ace, Acl, ACL_HEADER_SIZE};
use crate::error::{Error, Result};
use crate::sid::Sid;

pub const SECURITY_DESCRIPTOR_REVISION: u8 = 1;

pub const SE_OWNER_DEFAULTED: u16 = 0x0001;
pub const SE_GROUP_DEFAULTED: u16 = 0x0002;
pub const SE_DACL_PRESENT: u16 = 0x0004;
pub const SE_DACL_DEFAULTED: u16 = 0x0008;
pub const SE_SACL_PRESENT: u16 = 0x0010;
pub const SE_SACL_DEFAULTED: u16 = 0x0020;
pub const SE_DACL_AUTO_INHERITED: u16 = 0x0400;
pub const SE_SACL_AUTO_INHERITED: u16 = 0x0800;
pub const SE_DACL_PROTECTED: u16 = 0x1000;
pub const SE_SACL_PROTECTED: u16 = 0x2000;
pub const SE_SELF_RELATIVE: u16 = 0x8000;

const HEADER_SIZE: usize = 20;

/// Sections are read wherever the header offsets point and written in the order
/// owner, group, SACL, DACL right after the header.
#[binrw::binrw]
#[derive(Clone, Debug, PartialEq, Eq)]
#[brw(little)]
pub struct SecurityDescriptor {
    #[bw(calc = SECURITY_DESCRIPTOR_REVISION)]
    #[br(temp)]
    #[br(assert(revision == SECURITY_DESCRIPTOR_REVISION, "unknown descriptor revision"))]
    revision: u8,
    sbz1: u8,
    control: u16,

    #[bw(calc = section_offsets(owner, group, sacl, dacl)[0])]
    #[br(temp)]
    #[br(assert(outside_header(offset_owner), "offset points into the descriptor header"))]
    offset_owner: u32,
    #[bw(calc = section_offsets(owner, group, sacl, dacl)[1])]
    #[br(temp)]
    #[br(assert(outside_header(offset_group), "offset points into the descriptor header"))]
    offset_group: u32,
    #[bw(calc = section_offsets(owner, group, sacl, dacl)[2])]
    #[br(temp)]
    #[br(assert(outside_header(offset_sacl), "offset points into the descriptor header"))]
    offset_sacl: u32,
    #[bw(calc = section_offsets(owner, group, sacl, dacl)[3])]
    #[br(temp)]
    #[br(assert(outside_header(offset_dacl), "offset points into the descriptor header"))]
    offset_dacl: u32,

    #[br(if(offset_owner != 0), seek_before = SeekFrom::Start(u64::from(offset_owner)))]
    owner: Option<Sid>,
    #[br(if(offset_group != 0), seek_before = SeekFrom::Start(u64::from(offset_group)))]
    group: Option<Sid>,
    #[br(parse_with = read_opaque_acl, args(offset_sacl))]
    sacl: Option<Vec<u8>>,
    #[br(if(offset_dacl != 0), seek_before = SeekFrom::Start(u64::from(offset_dacl)))]
    dacl: Option<Acl>,
}

fn outside_header(offset: u32) -> bool {
    offset == 0 || offset as usize >= HEADER_SIZE
}

fn section_offsets(
    owner: &Option<Sid>,
    group: &Option<Sid>,
    sacl: &Option<Vec<u8>>,
    dacl: &Option<Acl>,
) -> [u32; 4] {
    let lens = [
        owner.as_ref().map(Sid::encoded_len),
        group.as_ref().map(Sid::encoded_len),
        sacl.as_ref().map(Vec::len),
        dacl.as_ref().map(Acl::encoded_len),
    ];

    let mut offsets = [0u32; 4];
    let mut next = HEADER_SIZE;
    for (offset, len) in offsets.iter_mut().zip(lens) {
        if let Some(len) = len {
            *offset = next as u32;
            next += len;
        }
    }

    offsets
}

/// The SACL is never interpreted, only cut out by its size field.
#[binrw::parser(reader, endian)]
fn read_opaque_acl(offset: u32) -> BinResult<Option<Vec<u8>>> {
    if offset == 0 {
        return Ok(None);
    }

    let start = u64::from(offset);
    reader.seek(SeekFrom::Start(start + 2))?;
    let size = u16::read_options(reader, endian, ())?;
    if (size as usize) < ACL_HEADER_SIZE {
        return Err(binrw::Error::AssertFail {
            pos: start + 2,
            message: "ACL size smaller than its header".to_owned(),
        });
    }

    reader.seek(SeekFrom::Start(start))?;
    let mut raw = vec![0u8; size as usize];
    reader.read_exact(&mut raw)?;

    Ok(Some(raw))
}

impl Default for SecurityDescriptor {
    fn default() -> SecurityDescriptor {
        SecurityDescriptor {
            sbz1: 0,
            control: SE_SELF_RELATIVE,
            owner: None,
            group: None,
            sacl: None,
            dacl: None,
        }
    }
}

impl SecurityDescriptor {
    /// An empty descriptor: no owner, no group, no ACLs.
    pub fn new() -> SecurityDescriptor {
        SecurityDescriptor::default()
    }

    pub fn with_owner(mut self, owner: Sid) -> SecurityDescriptor {
        self.owner = Some(owner);
        self
    }

    pub fn with_group(mut self, group: Sid) -> SecurityDescriptor {
        self.group = Some(group);
        self
    }

    /// Builds a descriptor whose DACL holds `aces` in canonical order.
    pub fn with_dacl(mut self, aces: Vec<Ace>) -> SecurityDescriptor {
        self.replace_dacl(aces);
        self
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<SecurityDescriptor> {
        decode(bytes)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(self)
    }

    pub fn control(&self) -> u16 {
        self.control
    }

    pub fn owner(&self) -> Option<&Sid> {
        self.owner.as_ref()
    }

    pub fn group(&self) -> Option<&Sid> {
        self.group.as_ref()
    }

    /// Raw SACL bytes, never interpreted.
    pub fn sacl(&self) -> Option<&[u8]> {
        self.sacl.as_deref()
    }

    pub fn has_dacl(&self) -> bool {
        self.dacl.is_some()
    }

    /// The DACL entries; empty when the descriptor carries no DACL.
    pub fn dacl(&self) -> &[Ace] {
        match self.dacl {
            Some(ref acl) => &acl.aces,
            None => &[],
        }
    }

    /// The DACL, created empty if the descriptor has none yet.
    pub(crate) fn dacl_mut(&mut self) -> &mut Acl {
        self.control |= SE_DACL_PRESENT;
        self.dacl.get_or_insert_with(Acl::new)
    }

    pub(crate) fn existing_dacl_mut(&mut self) -> Option<&mut Acl> {
        self.dacl.as_mut()
    }

    /// Replaces the whole DACL with `aces` and sorts it into canonical order.
    pub fn replace_dacl(&mut self, aces: Vec<Ace>) {
        self.dacl_mut().replace(aces);
    }

    pub fn sort_dacl(&mut self) {
        if let Some(ref mut acl) = self.dacl {
            acl.sort();
        }
    }

    /// Distinct trustees of the DACL, in order of first appearance.
    pub fn trustees(&self) -> Vec<Sid> {
        let mut out: Vec<Sid> = Vec::new();
        for ace in self.dacl() {
            if !out.contains(&ace.trustee) {
                out.push(ace.trustee.clone());
            }
        }

        out
    }
}

/// Decodes a self-relative security descriptor.
pub fn decode(bytes: &[u8]) -> Result<SecurityDescriptor> {
    let mut sd = SecurityDescriptor::read(&mut Cursor::new(bytes)).map_err(|e| {
        let err = Error::from_binrw(&e, bytes.len());
        warn!(len = bytes.len(), error = %err, "rejected security descriptor");
        err
    })?;

    sd.control = normalized_control(sd.control, sd.sacl.is_some(), sd.dacl.is_some());
    Ok(sd)
}

fn set_flag(control: u16, flag: u16, on: bool) -> u16 {
    if on {
        control | flag
    } else {
        control & !flag
    }
}

fn normalized_control(control: u16, sacl_present: bool, dacl_present: bool) -> u16 {
    let control = set_flag(control | SE_SELF_RELATIVE, SE_DACL_PRESENT, dacl_present);
    set_flag(control, SE_SACL_PRESENT, sacl_present)
}

/// Encodes `sd` as a self-relative descriptor laid out as header, owner, group,
/// SACL, DACL. Equal descriptors always produce identical bytes.
pub fn encode(sd: &SecurityDescriptor) -> Result<Vec<u8>> {
    if let Some(ref dacl) = sd.dacl {
        let size = dacl.encoded_len();
        if size > usize::from(u16::MAX) {
            return Err(Error::DescriptorTooLarge { size });
        }
    }

    let mut out = Cursor::new(Vec::new());
    sd.write(&mut out).map_err(|e| Error::from_binrw(&e, 0))?;

    Ok(out.into_inner())
}
