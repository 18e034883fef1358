//! WMI (Windows Management Instrumentation) wrapper for adapter configuration
//!
//! Uses `Win32_NetworkAdapterConfiguration` from the root\cimv2 namespace.

mod adapter_config;

pub use adapter_config::WmiConfigurator;

use crate::error::{NetCfgError, Result};
use std::ffi::c_void;
use std::sync::Once;
use windows::core::{BSTR, HRESULT, HSTRING, PCWSTR};
use windows::Win32::Foundation::S_FALSE;
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoInitializeSecurity, CoSetProxyBlanket,
    CLSCTX_INPROC_SERVER, COINIT_MULTITHREADED, EOAC_NONE, RPC_C_AUTHN_LEVEL_DEFAULT,
    RPC_C_IMP_LEVEL_IMPERSONATE, SAFEARRAY, SAFEARRAYBOUND,
};
use windows::Win32::System::Ole::{
    SafeArrayCreate, SafeArrayDestroy, SafeArrayGetElement, SafeArrayGetLBound,
    SafeArrayGetUBound, SafeArrayPutElement,
};
use windows::Win32::System::Variant::{
    VariantClear, VARENUM, VARIANT, VT_ARRAY, VT_BOOL, VT_BSTR, VT_I2, VT_I4, VT_UI1, VT_UI2, VT_UI4,
};
use windows::Win32::System::Wmi::{
    IEnumWbemClassObject, IWbemClassObject, IWbemLocator, IWbemServices, WbemLocator,
    WBEM_FLAG_FORWARD_ONLY, WBEM_FLAG_RETURN_IMMEDIATELY, WBEM_INFINITE,
};

// RPC_E_TOO_LATE error code (0x80010119)
const RPC_E_TOO_LATE: HRESULT = HRESULT(0x80010119_u32 as i32);
// RPC authentication constants
const RPC_C_AUTHN_WINNT: u32 = 10;
const RPC_C_AUTHZ_NONE: u32 = 0;

/// Human-readable text for a raw HRESULT, e.g. "Access denied (0x80041003)"
fn hresult_text(hr: HRESULT) -> String {
    let code = format!("{:#010x}", hr.0 as u32);
    let message = hr.message();
    let message = message.trim_end();
    if message.is_empty() {
        code
    } else {
        format!("{} ({})", message, code)
    }
}

/// CIM V2 namespace
pub const CIMV2_NAMESPACE: &str = r"root\cimv2";

// Process-wide COM security initialization (can only happen once)
static COM_SECURITY_INIT: Once = Once::new();

thread_local! {
    static COM_INITIALIZED: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// Initialize COM for the current thread
///
/// Blocking-pool threads are reused, so this runs once per thread rather than
/// once per call.
fn ensure_com_initialized() -> Result<()> {
    COM_INITIALIZED.with(|initialized| {
        if !initialized.get() {
            unsafe {
                // S_FALSE means already initialized
                let hr = CoInitializeEx(None, COINIT_MULTITHREADED);
                if hr.is_err() && hr != S_FALSE {
                    return Err(NetCfgError::ConnectionFailed(format!(
                        "Failed to initialize COM: {}",
                        hresult_text(hr)
                    )));
                }

                COM_SECURITY_INIT.call_once(|| {
                    let result = CoInitializeSecurity(
                        None,
                        -1,
                        None,
                        None,
                        RPC_C_AUTHN_LEVEL_DEFAULT,
                        RPC_C_IMP_LEVEL_IMPERSONATE,
                        None,
                        EOAC_NONE,
                        None,
                    );
                    // Proxy blanket is set on every connection anyway
                    if let Err(e) = result {
                        if e.code() != RPC_E_TOO_LATE {
                            tracing::warn!(error = ?e, "CoInitializeSecurity failed");
                        }
                    }
                });
            }
            initialized.set(true);
        }
        Ok(())
    })
}

fn set_proxy_security(services: &IWbemServices) -> Result<()> {
    unsafe {
        CoSetProxyBlanket(
            services,
            RPC_C_AUTHN_WINNT,
            RPC_C_AUTHZ_NONE,
            None,
            RPC_C_AUTHN_LEVEL_DEFAULT,
            RPC_C_IMP_LEVEL_IMPERSONATE,
            None,
            EOAC_NONE,
        )
        .map_err(|e| {
            NetCfgError::ConnectionFailed(format!("Failed to set proxy security: {}", e))
        })?;
    }
    Ok(())
}

/// WMI connection to a namespace
///
/// Wraps thread-affine COM interfaces; create and drop it on the same thread.
pub struct WmiConnection {
    services: IWbemServices,
}

impl WmiConnection {
    /// Connect to a WMI namespace
    pub fn connect(namespace: &str) -> Result<Self> {
        ensure_com_initialized()?;

        unsafe {
            let locator: IWbemLocator = CoCreateInstance(&WbemLocator, None, CLSCTX_INPROC_SERVER)
                .map_err(|e| {
                    NetCfgError::ConnectionFailed(format!("Failed to create WMI locator: {}", e))
                })?;

            let services = locator
                .ConnectServer(
                    &BSTR::from(namespace),
                    &BSTR::new(),
                    &BSTR::new(),
                    &BSTR::new(),
                    0,
                    &BSTR::new(),
                    None,
                )
                .map_err(|e| {
                    NetCfgError::ConnectionFailed(format!(
                        "Failed to connect to namespace {}: {}",
                        namespace, e
                    ))
                })?;

            set_proxy_security(&services)?;

            Ok(WmiConnection { services })
        }
    }

    /// Connect to root\cimv2
    pub fn connect_cimv2() -> Result<Self> {
        Self::connect(CIMV2_NAMESPACE)
    }

    /// Execute a WQL query and return results
    pub fn query(&self, wql: &str) -> Result<WmiQueryResult> {
        unsafe {
            let enumerator = self
                .services
                .ExecQuery(
                    &BSTR::from("WQL"),
                    &BSTR::from(wql),
                    WBEM_FLAG_FORWARD_ONLY | WBEM_FLAG_RETURN_IMMEDIATELY,
                    None,
                )
                .map_err(|e| NetCfgError::WmiError(format!("Query failed: {}", e)))?;

            Ok(WmiQueryResult { enumerator })
        }
    }

    /// Execute a method on a WMI object
    pub fn exec_method(
        &self,
        object_path: &str,
        method_name: &str,
        in_params: Option<&WmiObject>,
    ) -> Result<Option<WmiObject>> {
        unsafe {
            let mut out_params: Option<IWbemClassObject> = None;

            self.services
                .ExecMethod(
                    &BSTR::from(object_path),
                    &BSTR::from(method_name),
                    Default::default(),
                    None,
                    in_params.map(|p| &p.inner),
                    Some(&mut out_params),
                    None,
                )
                .map_err(|e| {
                    NetCfgError::WmiError(format!(
                        "Failed to execute method {} on {}: {}",
                        method_name, object_path, e
                    ))
                })?;

            Ok(out_params.map(|obj| WmiObject { inner: obj }))
        }
    }

    /// Get a class definition
    pub fn get_class(&self, class_name: &str) -> Result<WmiObject> {
        unsafe {
            let mut class: Option<IWbemClassObject> = None;
            self.services
                .GetObject(
                    &BSTR::from(class_name),
                    Default::default(),
                    None,
                    Some(&mut class),
                    None,
                )
                .map_err(|e| {
                    NetCfgError::WmiError(format!("Failed to get class {}: {}", class_name, e))
                })?;

            class
                .map(|obj| WmiObject { inner: obj })
                .ok_or_else(|| NetCfgError::WmiError(format!("Class not found: {}", class_name)))
        }
    }

    /// Get a writable instance of a method's input parameters.
    ///
    /// Returns `None` for methods that take no parameters.
    pub fn get_method_params(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> Result<Option<WmiObject>> {
        let class = self.get_class(class_name)?;

        unsafe {
            let method = HSTRING::from(method_name);
            let mut input: Option<IWbemClassObject> = None;
            class
                .inner
                .GetMethod(PCWSTR(method.as_ptr()), 0, &mut input, std::ptr::null_mut())
                .map_err(|e| {
                    NetCfgError::WmiError(format!(
                        "Failed to get method {} parameters: {}",
                        method_name, e
                    ))
                })?;

            match input {
                Some(obj) => obj
                    .SpawnInstance(0)
                    .map(|inst| Some(WmiObject { inner: inst }))
                    .map_err(|e| {
                        NetCfgError::WmiError(format!(
                            "Failed to spawn parameter instance: {}",
                            e
                        ))
                    }),
                None => Ok(None),
            }
        }
    }
}

/// Result set from a WMI query
pub struct WmiQueryResult {
    enumerator: IEnumWbemClassObject,
}

impl Iterator for WmiQueryResult {
    type Item = Result<WmiObject>;

    fn next(&mut self) -> Option<Self::Item> {
        unsafe {
            let mut row = [None; 1];
            let mut returned = 0;

            let hr = self.enumerator.Next(WBEM_INFINITE, &mut row, &mut returned);

            // S_FALSE indicates no more items
            if hr == S_FALSE || returned == 0 {
                return None;
            }

            if hr.is_err() {
                return Some(Err(NetCfgError::WmiError(format!(
                    "Error enumerating results: {}",
                    hresult_text(hr)
                ))));
            }

            row[0].take().map(|obj| Ok(WmiObject { inner: obj }))
        }
    }
}

/// VARIANT that is cleared when dropped
struct OwnedVariant(VARIANT);

impl OwnedVariant {
    fn vt(&self) -> VARENUM {
        unsafe { self.0.Anonymous.Anonymous.vt }
    }
}

impl Drop for OwnedVariant {
    fn drop(&mut self) {
        unsafe {
            let _ = VariantClear(&mut self.0);
        }
    }
}

/// A WMI object instance
pub struct WmiObject {
    inner: IWbemClassObject,
}

impl WmiObject {
    fn get_variant(&self, property: &str) -> Result<OwnedVariant> {
        unsafe {
            let name = HSTRING::from(property);
            let mut value = OwnedVariant(VARIANT::default());
            self.inner
                .Get(PCWSTR(name.as_ptr()), 0, &mut value.0, None, None)
                .map_err(|e| {
                    NetCfgError::WmiError(format!("Failed to get property {}: {}", property, e))
                })?;
            Ok(value)
        }
    }

    fn put_variant(&self, property: &str, value: &OwnedVariant) -> Result<()> {
        unsafe {
            let name = HSTRING::from(property);
            self.inner
                .Put(PCWSTR(name.as_ptr()), 0, &value.0, 0)
                .map_err(|e| {
                    NetCfgError::WmiError(format!("Failed to set property {}: {}", property, e))
                })
        }
    }

    /// Get a string property value
    pub fn get_string(&self, property: &str) -> Result<Option<String>> {
        let value = self.get_variant(property)?;
        if value.vt() != VT_BSTR {
            return Ok(None);
        }
        let text = unsafe { value.0.Anonymous.Anonymous.Anonymous.bstrVal.to_string() };
        Ok(Some(text))
    }

    /// Get a required string property (errors if null)
    pub fn get_string_required(&self, property: &str) -> Result<String> {
        self.get_string(property)?
            .ok_or_else(|| NetCfgError::MissingProperty(property.to_string()))
    }

    /// Get an integer property value
    pub fn get_u32(&self, property: &str) -> Result<Option<u32>> {
        let value = self.get_variant(property)?;
        let vt = value.vt();
        unsafe {
            let data = &value.0.Anonymous.Anonymous.Anonymous;
            // uint32 and uint16 arrive as VT_I4
            let number = match vt {
                VT_I4 => Some(data.lVal as u32),
                VT_UI4 => Some(data.ulVal),
                VT_I2 => Some(data.iVal as u32),
                VT_UI2 => Some(u32::from(data.uiVal)),
                VT_UI1 => Some(u32::from(data.bVal)),
                _ => None,
            };
            Ok(number)
        }
    }

    /// Get a boolean property value
    pub fn get_bool(&self, property: &str) -> Result<Option<bool>> {
        let value = self.get_variant(property)?;
        if value.vt() != VT_BOOL {
            return Ok(None);
        }
        let flag = unsafe { value.0.Anonymous.Anonymous.Anonymous.boolVal.0 != 0 };
        Ok(Some(flag))
    }

    /// Get an array of strings; null or non-array values read as empty
    pub fn get_string_array(&self, property: &str) -> Result<Vec<String>> {
        let value = self.get_variant(property)?;
        if value.vt() != (VT_ARRAY | VT_BSTR) {
            return Ok(Vec::new());
        }

        unsafe {
            let sa = value.0.Anonymous.Anonymous.Anonymous.parray;
            if sa.is_null() {
                return Ok(Vec::new());
            }

            let lower = SafeArrayGetLBound(sa, 1).map_err(|e| {
                NetCfgError::WmiError(format!("Failed to read bounds of {}: {}", property, e))
            })?;
            let upper = SafeArrayGetUBound(sa, 1).map_err(|e| {
                NetCfgError::WmiError(format!("Failed to read bounds of {}: {}", property, e))
            })?;

            let mut result = Vec::new();
            for i in lower..=upper {
                // SafeArrayGetElement hands back an owned copy of the BSTR
                let mut element = BSTR::new();
                SafeArrayGetElement(sa, &i, &mut element as *mut BSTR as *mut c_void).map_err(
                    |e| {
                        NetCfgError::WmiError(format!(
                            "Failed to read element {} of {}: {}",
                            i, property, e
                        ))
                    },
                )?;
                result.push(element.to_string());
            }
            Ok(result)
        }
    }

    /// Set a string array property value
    pub fn put_string_array(&self, property: &str, values: &[String]) -> Result<()> {
        unsafe {
            let sa = create_array(VT_BSTR, values.len())?;

            for (i, value) in values.iter().enumerate() {
                let bstr = BSTR::from(value.as_str());
                let index = i as i32;
                // The array stores its own copy; an empty string is a null BSTR
                let raw = if bstr.is_empty() {
                    std::ptr::null()
                } else {
                    bstr.as_ptr() as *const c_void
                };
                if let Err(e) = SafeArrayPutElement(sa, &index, raw) {
                    let _ = SafeArrayDestroy(sa);
                    return Err(NetCfgError::WmiError(format!(
                        "Failed to put element {} of {}: {}",
                        i, property, e
                    )));
                }
            }

            self.put_variant(property, &array_variant(VT_BSTR, sa))
        }
    }

    /// Set a signed 32-bit integer array property value
    ///
    /// CIM `uint16[]` parameters are marshalled as `VT_ARRAY | VT_I4`.
    pub fn put_i32_array(&self, property: &str, values: &[i32]) -> Result<()> {
        unsafe {
            let sa = create_array(VT_I4, values.len())?;

            for (i, value) in values.iter().enumerate() {
                let index = i as i32;
                if let Err(e) = SafeArrayPutElement(sa, &index, value as *const i32 as *const c_void) {
                    let _ = SafeArrayDestroy(sa);
                    return Err(NetCfgError::WmiError(format!(
                        "Failed to put element {} of {}: {}",
                        i, property, e
                    )));
                }
            }

            self.put_variant(property, &array_variant(VT_I4, sa))
        }
    }
}

unsafe fn create_array(element_type: VARENUM, len: usize) -> Result<*mut SAFEARRAY> {
    let bounds = SAFEARRAYBOUND {
        cElements: len as u32,
        lLbound: 0,
    };
    let sa = SafeArrayCreate(element_type, 1, &bounds);
    if sa.is_null() {
        return Err(NetCfgError::WmiError("Failed to create SAFEARRAY".to_string()));
    }
    Ok(sa)
}

/// Wrap a SAFEARRAY in a VARIANT that takes ownership of it
unsafe fn array_variant(element_type: VARENUM, sa: *mut SAFEARRAY) -> OwnedVariant {
    let mut variant = VARIANT::default();
    (*variant.Anonymous.Anonymous).vt = VT_ARRAY | element_type;
    (*variant.Anonymous.Anonymous).Anonymous.parray = sa;
    OwnedVariant(variant)
}
