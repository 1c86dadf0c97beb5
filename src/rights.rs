//! Reading and editing the rights a trustee holds in a DACL.

use tracing::{debug, trace};

use crate::acl::Ace;
use crate::descriptor::SecurityDescriptor;
use crate::guid::Guid;
use crate::mask::{map_access_mask, shared_bit_sibling, AccessMask, SEC_STD_READ_CONTROL};
use crate::sid::Sid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inherited {
    Yes,
    No,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RightType {
    Allow,
    Deny,
}

/// Which kinds of ACE grant or deny a right: allow/deny, inherited or explicit.
///
/// No precedence is applied. Deciding what wins is up to the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RightsState {
    data: [[bool; 2]; 2],
}

impl RightsState {
    fn index(inherited: Inherited, kind: RightType) -> (usize, usize) {
        let inherited_i = match inherited {
            Inherited::Yes => 0,
            Inherited::No => 1,
        };
        let kind_i = match kind {
            RightType::Allow => 0,
            RightType::Deny => 1,
        };

        (inherited_i, kind_i)
    }

    pub fn get(&self, inherited: Inherited, kind: RightType) -> bool {
        let (i, j) = RightsState::index(inherited, kind);
        self.data[i][j]
    }

    fn set(&mut self, inherited: Inherited, kind: RightType) {
        let (i, j) = RightsState::index(inherited, kind);
        self.data[i][j] = true;
    }

    /// True if no ACE mentions the right at all.
    pub fn is_empty(&self) -> bool {
        self.data.iter().flatten().all(|&cell| !cell)
    }
}

/// Collects the ACEs of `trustee` that cover any part of `access_mask` for
/// `object_type`. ACEs without an object type count for every object type.
pub fn query_right(
    sd: &SecurityDescriptor,
    trustee: &Sid,
    access_mask: AccessMask,
    object_type: Option<&Guid>,
) -> RightsState {
    let access_mask = map_access_mask(access_mask);
    let mut out = RightsState::default();

    for ace in sd.dacl() {
        if !ace.applies_to(trustee, access_mask, object_type) {
            continue;
        }

        let inherited = if ace.is_inherited() {
            Inherited::Yes
        } else {
            Inherited::No
        };

        if ace.ace_type.is_allow() {
            out.set(inherited, RightType::Allow);
        }
        if ace.ace_type.is_deny() {
            out.set(inherited, RightType::Deny);
        }
    }

    out
}

/// Grants (`allow`) or denies a right with an explicit ACE, reusing an explicit ACE
/// that already covers it.
pub fn add_right(
    sd: &mut SecurityDescriptor,
    trustee: &Sid,
    access_mask: AccessMask,
    object_type: Option<&Guid>,
    allow: bool,
) {
    let access_mask = map_access_mask(access_mask);
    if access_mask == 0 {
        trace!(%trustee, allow, "empty access mask, nothing to add");
        return;
    }

    let dacl = sd.dacl_mut();

    // A match already contains every requested bit.
    if dacl
        .iter()
        .any(|ace| ace.matches(trustee, access_mask, object_type, allow, false))
    {
        trace!(%trustee, access_mask, allow, "right already present");
        return;
    }

    let ace = Ace::new(allow, trustee.clone(), access_mask, object_type.copied());
    debug!(%trustee, access_mask, ?object_type, allow, "adding ACE");
    dacl.push(ace);
    dacl.sort();
}

/// Bits to clear from `ace` when removing `access_mask`.
///
/// Generic read and generic write share read-control. Removing one of them from an
/// ACE that still holds the other leaves that bit alone.
fn mask_to_unset(ace: &Ace, access_mask: AccessMask) -> AccessMask {
    match shared_bit_sibling(access_mask) {
        Some(sibling) if ace.access_mask & sibling == sibling => access_mask & !SEC_STD_READ_CONTROL,
        _ => access_mask,
    }
}

/// Clears a right from every explicit ACE of `trustee` that holds it. ACEs left
/// with an empty mask are dropped.
pub fn remove_right(
    sd: &mut SecurityDescriptor,
    trustee: &Sid,
    access_mask: AccessMask,
    object_type: Option<&Guid>,
    allow: bool,
) {
    let access_mask = map_access_mask(access_mask);
    let Some(dacl) = sd.existing_dacl_mut() else {
        return;
    };

    let old_aces = std::mem::take(&mut dacl.aces);
    let mut new_aces = Vec::with_capacity(old_aces.len());

    for ace in old_aces {
        if !ace.matches(trustee, access_mask, object_type, allow, false) {
            new_aces.push(ace);
            continue;
        }

        let mut edited = ace;
        edited.access_mask &= !mask_to_unset(&edited, access_mask);

        if edited.access_mask == 0 {
            debug!(%trustee, access_mask, allow, "dropping emptied ACE");
        } else {
            debug!(%trustee, access_mask, remaining = edited.access_mask, allow, "narrowing ACE");
            new_aces.push(edited);
        }
    }

    dacl.replace(new_aces);
}

/// Removes every explicit ACE of the given trustees, whatever right it holds.
pub fn remove_trustee(sd: &mut SecurityDescriptor, trustees: &[Sid]) {
    let Some(dacl) = sd.existing_dacl_mut() else {
        return;
    };

    let removed = dacl.remove_trustees(trustees);
    debug!(trustees = trustees.len(), removed, "removed trustee ACEs");
}
