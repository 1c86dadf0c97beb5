#![allow(non_snake_case)]

//! Named Windows objects (files, registry keys, kernel objects) as a [`Directory`].
//!
//! The object name is the path, the only attribute is
//! [`ATTRIBUTE_SECURITY_DESCRIPTOR`]. Writing applies the DACL of the given
//! descriptor; owner, group and SACL on the object are left alone.

use std::ptr;
use std::slice;

use widestring::U16CString;
use winapi::shared::minwindef::{BOOL, DWORD, HLOCAL};
use winapi::shared::ntdef::NULL;
use winapi::shared::winerror::ERROR_SUCCESS;
use winapi::um::accctrl::{SE_FILE_OBJECT, SE_KERNEL_OBJECT, SE_OBJECT_TYPE, SE_REGISTRY_KEY};
use winapi::um::aclapi::{GetNamedSecurityInfoW, SetNamedSecurityInfoW};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::securitybaseapi::{GetSecurityDescriptorDacl, GetSecurityDescriptorLength, IsValidSecurityDescriptor};
use winapi::um::winbase::LocalFree;
use winapi::um::winnt::{
    DACL_SECURITY_INFORMATION, GROUP_SECURITY_INFORMATION, OWNER_SECURITY_INFORMATION, PACL,
    PSECURITY_DESCRIPTOR, PSID,
};

use crate::directory::{Directory, ATTRIBUTE_SECURITY_DESCRIPTOR};

/// Descriptor allocated by the system, released with `LocalFree`.
struct LocalDescriptor {
    pSecurityDescriptor: PSECURITY_DESCRIPTOR,
}

impl LocalDescriptor {
    fn as_bytes(&self) -> &[u8] {
        let len = unsafe { GetSecurityDescriptorLength(self.pSecurityDescriptor) } as usize;
        unsafe { slice::from_raw_parts(self.pSecurityDescriptor as *const u8, len) }
    }
}

impl Drop for LocalDescriptor {
    fn drop(&mut self) {
        if self.pSecurityDescriptor != NULL {
            unsafe {
                LocalFree(self.pSecurityDescriptor as HLOCAL);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectType {
    File,
    RegistryKey,
    Kernel,
}

impl ObjectType {
    fn se_object_type(self) -> SE_OBJECT_TYPE {
        match self {
            ObjectType::File => SE_FILE_OBJECT,
            ObjectType::RegistryKey => SE_REGISTRY_KEY,
            ObjectType::Kernel => SE_KERNEL_OBJECT,
        }
    }
}

pub struct NamedObjectDirectory {
    object_type: ObjectType,
}

impl NamedObjectDirectory {
    pub fn new(object_type: ObjectType) -> NamedObjectDirectory {
        NamedObjectDirectory { object_type }
    }

    pub fn files() -> NamedObjectDirectory {
        NamedObjectDirectory::new(ObjectType::File)
    }
}

fn wide_path(path: &str) -> Result<Vec<u16>, String> {
    U16CString::from_str(path)
        .map(U16CString::into_vec_with_nul)
        .map_err(|_| format!("path contains a NUL character: {}", path))
}

fn check_attribute(attribute: &str) -> Result<(), String> {
    if attribute == ATTRIBUTE_SECURITY_DESCRIPTOR {
        Ok(())
    } else {
        Err(format!("unsupported attribute {}", attribute))
    }
}

impl Directory for NamedObjectDirectory {
    fn read_attribute(&self, object: &str, attribute: &str) -> Result<Vec<u8>, String> {
        check_attribute(attribute)?;
        let wPath = wide_path(object)?;

        let mut descriptor = LocalDescriptor {
            pSecurityDescriptor: NULL,
        };
        let ret: DWORD = unsafe {
            GetNamedSecurityInfoW(
                wPath.as_ptr(),
                self.object_type.se_object_type(),
                DACL_SECURITY_INFORMATION | GROUP_SECURITY_INFORMATION | OWNER_SECURITY_INFORMATION,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                &mut descriptor.pSecurityDescriptor,
            )
        };
        if ret != ERROR_SUCCESS {
            return Err(format!("GetNamedSecurityInfoW failed: GLE={}", ret));
        }

        Ok(descriptor.as_bytes().to_vec())
    }

    fn replace_attribute(&mut self, object: &str, attribute: &str, value: &[u8]) -> Result<(), String> {
        check_attribute(attribute)?;
        let mut wPath = wide_path(object)?;

        // The API wants an aligned, writable self-relative descriptor.
        let mut buffer: Vec<u32> = vec![0; (value.len() + 3) / 4];
        let pSecurityDescriptor = buffer.as_mut_ptr() as PSECURITY_DESCRIPTOR;
        unsafe {
            ptr::copy_nonoverlapping(value.as_ptr(), pSecurityDescriptor as *mut u8, value.len());
        }

        if unsafe { IsValidSecurityDescriptor(pSecurityDescriptor) } == 0 {
            return Err("descriptor rejected by IsValidSecurityDescriptor".to_owned());
        }

        let mut bDaclPresent: BOOL = 0;
        let mut bDaclDefaulted: BOOL = 0;
        let mut pDacl: PACL = ptr::null_mut();
        if unsafe {
            GetSecurityDescriptorDacl(pSecurityDescriptor, &mut bDaclPresent, &mut pDacl, &mut bDaclDefaulted)
        } == 0
        {
            return Err(format!("GetSecurityDescriptorDacl failed: GLE={}", unsafe { GetLastError() }));
        }
        if bDaclPresent == 0 {
            return Err("descriptor has no DACL".to_owned());
        }

        let ret: DWORD = unsafe {
            SetNamedSecurityInfoW(
                wPath.as_mut_ptr(),
                self.object_type.se_object_type(),
                DACL_SECURITY_INFORMATION,
                NULL as PSID,
                NULL as PSID,
                pDacl,
                ptr::null_mut(),
            )
        };
        if ret != ERROR_SUCCESS {
            return Err(format!("SetNamedSecurityInfoW failed: GLE={}", ret));
        }

        Ok(())
    }
}
