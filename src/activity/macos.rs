//! macOS idle counter via the IOKit `HIDIdleTime` property.

use core_foundation::base::{CFAllocatorRef, CFTypeRef, TCFType};
use core_foundation::number::CFNumber;
use core_foundation::string::{CFString, CFStringRef};
use std::ffi::CString;
use std::os::raw::c_char;
use std::time::Duration;

use super::ActivityError;

pub(crate) const BACKEND: &str = "iokit-hid";

#[link(name = "IOKit", kind = "framework")]
extern "C" {
    fn IOServiceGetMatchingService(main_port: u32, matching: CFTypeRef) -> u32;
    fn IOServiceMatching(name: *const c_char) -> CFTypeRef;
    fn IORegistryEntryCreateCFProperty(
        entry: u32,
        key: CFStringRef,
        allocator: CFAllocatorRef,
        options: u32,
    ) -> CFTypeRef;
    fn IOObjectRelease(object: u32) -> i32;
}

pub(crate) fn probe() -> Result<(), ActivityError> {
    idle_time()
        .map(|_| ())
        .ok_or_else(|| ActivityError::HostUnavailable("IOHIDSystem has no HIDIdleTime".to_string()))
}

pub(crate) fn idle_time() -> Option<Duration> {
    let service_name = CString::new("IOHIDSystem").ok()?;

    unsafe {
        // IOServiceGetMatchingService consumes the matching dictionary.
        let matching = IOServiceMatching(service_name.as_ptr());
        if matching.is_null() {
            return None;
        }

        let service = IOServiceGetMatchingService(0, matching);
        if service == 0 {
            return None;
        }

        let key = CFString::new("HIDIdleTime");
        let property =
            IORegistryEntryCreateCFProperty(service, key.as_concrete_TypeRef(), std::ptr::null(), 0);
        IOObjectRelease(service);

        if property.is_null() {
            return None;
        }

        let number = CFNumber::wrap_under_create_rule(property as *mut _);
        let nanos = number.to_i64()?;
        Some(Duration::from_nanos(nanos.max(0) as u64))
    }
}
