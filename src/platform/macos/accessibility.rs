// ABOUTME: Reads another application's menu bar through the macOS Accessibility C API
// ABOUTME: Elements are retained CoreFoundation references; every call here may block on the target app

use crate::menu::ProcessIdentity;
use crate::platform::{ElementAttributes, MenuSource};
use objc2_core_foundation::{CFRetained, CFString, CFType};
use std::ffi::c_void;
use std::ptr::{self, NonNull};
use tracing::debug;

type AXError = i32;
type CFIndex = isize;
type CFTypeID = usize;

const AX_SUCCESS: AXError = 0;
const CF_NUMBER_SINT64_TYPE: CFIndex = 4;

/// Seconds to wait on an unresponsive application before giving up on a call.
const MESSAGING_TIMEOUT: f32 = 1.0;

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXIsProcessTrusted() -> bool;
    fn AXUIElementCreateApplication(pid: i32) -> *mut CFType;
    fn AXUIElementCopyAttributeValue(
        element: *const CFType,
        attribute: *const CFString,
        value: *mut *mut CFType,
    ) -> AXError;
    fn AXUIElementPerformAction(element: *const CFType, action: *const CFString) -> AXError;
    fn AXUIElementSetMessagingTimeout(element: *const CFType, timeout: f32) -> AXError;
}

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    fn CFGetTypeID(cf: *const CFType) -> CFTypeID;
    fn CFArrayGetTypeID() -> CFTypeID;
    fn CFArrayGetCount(array: *const CFType) -> CFIndex;
    fn CFArrayGetValueAtIndex(array: *const CFType, index: CFIndex) -> *const CFType;
    fn CFStringGetTypeID() -> CFTypeID;
    fn CFNumberGetTypeID() -> CFTypeID;
    fn CFNumberGetValue(number: *const CFType, kind: CFIndex, value: *mut c_void) -> bool;
    fn CFBooleanGetTypeID() -> CFTypeID;
    fn CFBooleanGetValue(boolean: *const CFType) -> bool;
}

pub fn is_trusted() -> bool {
    unsafe { AXIsProcessTrusted() }
}

/// A retained `AXUIElementRef`.
#[derive(Clone)]
pub struct AxElement(CFRetained<CFType>);

// AXUIElement is a CoreFoundation type; retain/release and the AX calls made
// on it are thread-safe.
unsafe impl Send for AxElement {}
unsafe impl Sync for AxElement {}

impl AxElement {
    fn application(pid: i32) -> Option<Self> {
        let raw = NonNull::new(unsafe { AXUIElementCreateApplication(pid) })?;
        let element = Self(unsafe { CFRetained::from_raw(raw) });
        unsafe { AXUIElementSetMessagingTimeout(element.as_ptr(), MESSAGING_TIMEOUT) };
        Some(element)
    }

    fn as_ptr(&self) -> *const CFType {
        &*self.0
    }

    fn attribute(&self, name: &str) -> Option<CFRetained<CFType>> {
        let name = CFString::from_str(name);
        let mut value: *mut CFType = ptr::null_mut();
        let status = unsafe { AXUIElementCopyAttributeValue(self.as_ptr(), &*name, &mut value) };
        if status != AX_SUCCESS {
            return None;
        }
        NonNull::new(value).map(|value| unsafe { CFRetained::from_raw(value) })
    }

    fn string(&self, name: &str) -> Option<String> {
        let value = self.attribute(name)?;
        if unsafe { CFGetTypeID(&*value) != CFStringGetTypeID() } {
            return None;
        }
        let string = unsafe { &*(&*value as *const CFType as *const CFString) };
        Some(string.to_string())
    }

    fn integer(&self, name: &str) -> Option<i64> {
        let value = self.attribute(name)?;
        if unsafe { CFGetTypeID(&*value) != CFNumberGetTypeID() } {
            return None;
        }
        let mut out: i64 = 0;
        let ok = unsafe {
            CFNumberGetValue(
                &*value,
                CF_NUMBER_SINT64_TYPE,
                &mut out as *mut i64 as *mut c_void,
            )
        };
        ok.then_some(out)
    }

    fn boolean(&self, name: &str) -> Option<bool> {
        let value = self.attribute(name)?;
        if unsafe { CFGetTypeID(&*value) != CFBooleanGetTypeID() } {
            return None;
        }
        Some(unsafe { CFBooleanGetValue(&*value) })
    }

    fn elements(&self, name: &str) -> Vec<AxElement> {
        let Some(array) = self.attribute(name) else {
            return Vec::new();
        };
        if unsafe { CFGetTypeID(&*array) != CFArrayGetTypeID() } {
            return Vec::new();
        }

        let count = unsafe { CFArrayGetCount(&*array) };
        (0..count)
            .filter_map(|index| {
                let item = unsafe { CFArrayGetValueAtIndex(&*array, index) };
                let item = NonNull::new(item as *mut CFType)?;
                Some(AxElement(unsafe { CFRetained::retain(item) }))
            })
            .collect()
    }

    fn perform(&self, action: &str) -> bool {
        let action = CFString::from_str(action);
        unsafe { AXUIElementPerformAction(self.as_ptr(), &*action) == AX_SUCCESS }
    }
}

impl std::fmt::Debug for AxElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AxElement({:p})", self.as_ptr())
    }
}

#[derive(Debug, Default)]
pub struct AccessibilityMenuSource;

impl AccessibilityMenuSource {
    pub fn new() -> Self {
        Self
    }
}

impl MenuSource for AccessibilityMenuSource {
    type Element = AxElement;

    fn menu_bar_items(&self, process: &ProcessIdentity) -> Vec<AxElement> {
        let Some(app) = AxElement::application(process.pid) else {
            return Vec::new();
        };
        let Some(menu_bar) = app.attribute("AXMenuBar") else {
            debug!(pid = process.pid, "no AXMenuBar yet");
            return Vec::new();
        };
        AxElement(menu_bar).elements("AXChildren")
    }

    fn children(&self, element: &AxElement) -> Vec<AxElement> {
        element.elements("AXChildren")
    }

    fn attributes(&self, element: &AxElement) -> Option<ElementAttributes> {
        Some(ElementAttributes {
            title: element.string("AXTitle")?,
            enabled: element.boolean("AXEnabled"),
            command_char: element.string("AXMenuItemCmdChar"),
            command_modifiers: element.integer("AXMenuItemCmdModifiers"),
        })
    }

    fn press(&self, element: &AxElement) -> bool {
        element.perform("AXPress")
    }
}
