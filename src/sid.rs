//! Security identifiers.
//!
//! A [`Sid`] is the binary identity of a trustee. Two SIDs are equal exactly when
//! their encoded bytes are equal.

use std::cmp::Ordering;
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use binrw::prelude::*;

use crate::error::{Error, Result};

pub const SID_REVISION: u8 = 1;
pub const MAX_SUB_AUTHORITIES: usize = 15;

pub const SID_WORLD_DOMAIN: &str = "S-1-1";
pub const SID_WORLD: &str = "S-1-1-0";
pub const SID_CREATOR_OWNER_DOMAIN: &str = "S-1-3";
pub const SID_CREATOR_OWNER: &str = "S-1-3-0";
pub const SID_CREATOR_GROUP: &str = "S-1-3-1";
pub const SID_OWNER_RIGHTS: &str = "S-1-3-4";
pub const SID_NT_AUTHORITY: &str = "S-1-5";
pub const SID_NT_DIALUP: &str = "S-1-5-1";
pub const SID_NT_NETWORK: &str = "S-1-5-2";
pub const SID_NT_BATCH: &str = "S-1-5-3";
pub const SID_NT_INTERACTIVE: &str = "S-1-5-4";
pub const SID_NT_SERVICE: &str = "S-1-5-6";
pub const SID_NT_ANONYMOUS: &str = "S-1-5-7";
pub const SID_NT_PROXY: &str = "S-1-5-8";
pub const SID_NT_ENTERPRISE_DCS: &str = "S-1-5-9";
pub const SID_NT_SELF: &str = "S-1-5-10";
pub const SID_NT_AUTHENTICATED_USERS: &str = "S-1-5-11";
pub const SID_NT_RESTRICTED: &str = "S-1-5-12";
pub const SID_NT_TERMINAL_SERVER_USERS: &str = "S-1-5-13";
pub const SID_NT_REMOTE_INTERACTIVE: &str = "S-1-5-14";
pub const SID_NT_THIS_ORGANISATION: &str = "S-1-5-15";
pub const SID_NT_IUSR: &str = "S-1-5-17";
pub const SID_NT_SYSTEM: &str = "S-1-5-18";
pub const SID_NT_LOCAL_SERVICE: &str = "S-1-5-19";
pub const SID_NT_NETWORK_SERVICE: &str = "S-1-5-20";
pub const SID_NT_DIGEST_AUTHENTICATION: &str = "S-1-5-64-21";
pub const SID_NT_NTLM_AUTHENTICATION: &str = "S-1-5-64-10";
pub const SID_NT_SCHANNEL_AUTHENTICATION: &str = "S-1-5-64-14";
pub const SID_NT_OTHER_ORGANISATION: &str = "S-1-5-1000";

/// Display names of the well-known trustees, keyed by SID string.
pub const WELL_KNOWN_TRUSTEES: &[(&str, &str)] = &[
    (SID_WORLD_DOMAIN, "Everyone in Domain"),
    (SID_WORLD, "Everyone"),
    (SID_CREATOR_OWNER_DOMAIN, "CREATOR OWNER DOMAIN"),
    (SID_CREATOR_OWNER, "CREATOR OWNER"),
    (SID_CREATOR_GROUP, "CREATOR GROUP"),
    (SID_OWNER_RIGHTS, "OWNER RIGHTS"),
    (SID_NT_AUTHORITY, "AUTHORITY"),
    (SID_NT_DIALUP, "DIALUP"),
    (SID_NT_NETWORK, "NETWORK"),
    (SID_NT_BATCH, "BATCH"),
    (SID_NT_INTERACTIVE, "INTERACTIVE"),
    (SID_NT_SERVICE, "SERVICE"),
    (SID_NT_ANONYMOUS, "ANONYMOUS LOGON"),
    (SID_NT_PROXY, "PROXY"),
    (SID_NT_ENTERPRISE_DCS, "ENTERPRISE DOMAIN CONTROLLERS"),
    (SID_NT_SELF, "SELF"),
    (SID_NT_AUTHENTICATED_USERS, "Authenticated Users"),
    (SID_NT_RESTRICTED, "RESTRICTED"),
    (SID_NT_TERMINAL_SERVER_USERS, "TERMINAL SERVER USERS"),
    (SID_NT_REMOTE_INTERACTIVE, "REMOTE INTERACTIVE LOGON"),
    (SID_NT_THIS_ORGANISATION, "This Organization"),
    (SID_NT_IUSR, "IUSR"),
    (SID_NT_SYSTEM, "SYSTEM"),
    (SID_NT_LOCAL_SERVICE, "LOCAL SERVICE"),
    (SID_NT_NETWORK_SERVICE, "NETWORK SERVICE"),
    (SID_NT_DIGEST_AUTHENTICATION, "Digest Authentication"),
    (SID_NT_NTLM_AUTHENTICATION, "NTLM Authentication"),
    (SID_NT_SCHANNEL_AUTHENTICATION, "SChannel Authentication"),
    (SID_NT_OTHER_ORGANISATION, "Other Organization"),
];

const WORLD_AUTHORITY: u64 = 1;
const NT_AUTHORITY: u64 = 5;
const MAX_AUTHORITY: u64 = (1 << 48) - 1;

#[binrw::binrw]
#[derive(Clone, PartialEq, Eq, Hash)]
#[brw(little)]
pub struct Sid {
    revision: u8,
    #[bw(calc = sub_authorities.len() as u8)]
    #[br(temp)]
    #[br(assert(sub_authority_count as usize <= MAX_SUB_AUTHORITIES, "too many SID sub-authorities"))]
    sub_authority_count: u8,
    authority: [u8; 6],
    #[br(count = sub_authority_count)]
    sub_authorities: Vec<u32>,
}

impl Sid {
    pub fn new(authority: u64, sub_authorities: &[u32]) -> Result<Sid> {
        if authority > MAX_AUTHORITY || sub_authorities.len() > MAX_SUB_AUTHORITIES {
            return Err(Error::InvalidSid(format!(
                "authority {} with {} sub-authorities",
                authority,
                sub_authorities.len()
            )));
        }

        Ok(Sid::from_parts(SID_REVISION, authority, sub_authorities.to_vec()))
    }

    fn from_parts(revision: u8, authority: u64, sub_authorities: Vec<u32>) -> Sid {
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(&authority.to_be_bytes()[2..]);

        Sid {
            revision,
            authority: bytes,
            sub_authorities,
        }
    }

    /// "Everyone", S-1-1-0.
    pub fn world() -> Sid {
        Sid::from_parts(SID_REVISION, WORLD_AUTHORITY, vec![0])
    }

    /// The principal the descriptor's object represents, S-1-5-10.
    pub fn self_principal() -> Sid {
        Sid::from_parts(SID_REVISION, NT_AUTHORITY, vec![10])
    }

    pub fn revision(&self) -> u8 {
        self.revision
    }

    pub fn authority(&self) -> u64 {
        let mut bytes = [0u8; 8];
        bytes[2..].copy_from_slice(&self.authority);
        u64::from_be_bytes(bytes)
    }

    pub fn sub_authorities(&self) -> &[u32] {
        &self.sub_authorities
    }

    /// Relative identifier, the last sub-authority.
    pub fn rid(&self) -> Option<u32> {
        self.sub_authorities.last().copied()
    }

    pub fn encoded_len(&self) -> usize {
        8 + 4 * self.sub_authorities.len()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Sid> {
        Sid::read(&mut Cursor::new(bytes)).map_err(|e| Error::from_binrw(&e, bytes.len()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::with_capacity(self.encoded_len()));
        self.write(&mut out).map_err(|e| Error::from_binrw(&e, 0))?;
        Ok(out.into_inner())
    }

    /// Total order used when sorting ACEs: sub-authority count, then sub-authorities
    /// starting from the RID, then revision and identifier authority.
    pub(crate) fn canonical_cmp(&self, other: &Sid) -> Ordering {
        self.sub_authorities
            .len()
            .cmp(&other.sub_authorities.len())
            .then_with(|| {
                self.sub_authorities
                    .iter()
                    .rev()
                    .cmp(other.sub_authorities.iter().rev())
            })
            .then_with(|| self.revision.cmp(&other.revision))
            .then_with(|| self.authority.cmp(&other.authority))
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let authority = self.authority();
        write!(f, "S-{}-", self.revision)?;
        if authority >> 32 == 0 {
            write!(f, "{}", authority)?;
        } else {
            write!(f, "0x{:012X}", authority)?;
        }

        for sub_authority in &self.sub_authorities {
            write!(f, "-{}", sub_authority)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Sid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Sid({})", self)
    }
}

impl FromStr for Sid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Sid> {
        let invalid = || Error::InvalidSid(s.to_owned());

        let rest = s
            .strip_prefix("S-")
            .or_else(|| s.strip_prefix("s-"))
            .ok_or_else(invalid)?;
        let mut parts = rest.split('-');

        let revision: u8 = parts
            .next()
            .and_then(|part| part.parse().ok())
            .ok_or_else(invalid)?;

        let authority_part = parts.next().ok_or_else(invalid)?;
        let authority = match authority_part
            .strip_prefix("0x")
            .or_else(|| authority_part.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => authority_part.parse(),
        }
        .map_err(|_| invalid())?;
        if authority > MAX_AUTHORITY {
            return Err(invalid());
        }

        let sub_authorities = parts
            .map(|part| part.parse::<u32>())
            .collect::<std::result::Result<Vec<u32>, _>>()
            .map_err(|_| invalid())?;
        if sub_authorities.len() > MAX_SUB_AUTHORITIES {
            return Err(invalid());
        }

        Ok(Sid::from_parts(revision, authority, sub_authorities))
    }
}

/// Name of a well-known trustee, or `None` for every other SID.
pub fn well_known_trustee_name(sid: &Sid) -> Option<&'static str> {
    let string_sid = sid.to_string();

    WELL_KNOWN_TRUSTEES
        .iter()
        .find(|&&(known, _)| known == string_sid)
        .map(|&(_, name)| name)
}

pub fn is_well_known(sid: &Sid) -> bool {
    well_known_trustee_name(sid).is_some()
}
