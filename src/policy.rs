//! Policies the console exposes as single checkboxes.
//!
//! An object is protected against deletion when Everyone is explicitly denied both
//! Delete and Delete-Subtree. A user cannot change their password when SELF or
//! Everyone is explicitly denied the Change-Password control access right.

use tracing::{debug, trace};

use crate::descriptor::SecurityDescriptor;
use crate::directory::{load_descriptor, replace_descriptor, Directory};
use crate::error::Result;
use crate::guid::Guid;
use crate::mask::{AccessMask, SEC_ADS_CONTROL_ACCESS, SEC_ADS_DELETE_TREE, SEC_STD_DELETE};
use crate::rights::{add_right, query_right, remove_right, Inherited, RightType};
use crate::sid::Sid;

pub const PROTECT_DELETION_MASKS: [AccessMask; 2] = [SEC_STD_DELETE, SEC_ADS_DELETE_TREE];

/// Trustees that can be denied changing the password.
pub fn cant_change_pass_trustees() -> [Sid; 2] {
    [Sid::self_principal(), Sid::world()]
}

fn denied_explicitly(sd: &SecurityDescriptor, trustee: &Sid, access_mask: AccessMask, object_type: Option<&Guid>) -> bool {
    query_right(sd, trustee, access_mask, object_type).get(Inherited::No, RightType::Deny)
}

/// Every deletion mask must be denied, one of them is not enough.
pub fn protected_against_deletion(sd: &SecurityDescriptor) -> bool {
    let everyone = Sid::world();

    PROTECT_DELETION_MASKS
        .iter()
        .all(|&mask| denied_explicitly(sd, &everyone, mask, None))
}

/// Adds or removes the Everyone deny ACEs. Returns false if the descriptor was
/// already in the requested state and was left untouched.
///
/// Allow ACEs for the same rights are never touched.
pub fn set_protected_against_deletion(sd: &mut SecurityDescriptor, enabled: bool) -> bool {
    if protected_against_deletion(sd) == enabled {
        trace!(enabled, "deletion protection already in requested state");
        return false;
    }

    let everyone = Sid::world();
    for &mask in &PROTECT_DELETION_MASKS {
        if enabled {
            add_right(sd, &everyone, mask, None, false);
        } else {
            remove_right(sd, &everyone, mask, None, false);
        }
    }

    debug!(enabled, "changed deletion protection");
    true
}

/// Either trustee being denied is enough.
pub fn user_cant_change_pass(sd: &SecurityDescriptor) -> bool {
    let right = Guid::USER_CHANGE_PASSWORD;

    cant_change_pass_trustees()
        .iter()
        .any(|trustee| denied_explicitly(sd, trustee, SEC_ADS_CONTROL_ACCESS, Some(&right)))
}

/// Writes the Change-Password right for both trustees: enabling replaces an allow
/// ACE with a deny ACE, disabling replaces the deny with an allow.
pub fn set_user_cant_change_pass(sd: &mut SecurityDescriptor, enabled: bool) {
    let right = Guid::USER_CHANGE_PASSWORD;
    let allow = !enabled;

    for trustee in &cant_change_pass_trustees() {
        remove_right(sd, trustee, SEC_ADS_CONTROL_ACCESS, Some(&right), !allow);
        add_right(sd, trustee, SEC_ADS_CONTROL_ACCESS, Some(&right), allow);
    }

    debug!(enabled, "changed cannot-change-password");
}

/// Fetches the descriptor of `object`, applies deletion protection and writes it
/// back. Nothing is written when the object is already in the requested state.
pub fn apply_protected_against_deletion<D: Directory + ?Sized>(
    directory: &mut D,
    object: &str,
    enabled: bool,
) -> Result<()> {
    let mut sd = load_descriptor(directory, object)?;

    if !set_protected_against_deletion(&mut sd, enabled) {
        return Ok(());
    }

    replace_descriptor(directory, object, &sd)
}

pub fn apply_user_cant_change_pass<D: Directory + ?Sized>(
    directory: &mut D,
    object: &str,
    enabled: bool,
) -> Result<()> {
    let mut sd = load_descriptor(directory, object)?;
    set_user_cant_change_pass(&mut sd, enabled);

    replace_descriptor(directory, object, &sd)
}
