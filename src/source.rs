//! Trusted notification source matching.

// ---

/// Root namespace of the glucose monitoring vendor.
pub const VENDOR_PREFIX: &str = "com.camdiab";

/// Known package ids of the vendor app (regional and unit-suffixed variants).
pub const KNOWN_PACKAGE_IDS: &[&str] = &[
    "com.camdiab.fx_alert.mmoll",
    "com.camdiab.fx_alert.mgdl",
    "com.camdiab.fx_alert.mmoll.ca",
    "com.camdiab.fx_alert",
    "com.camdiab",
];

/// Package that posts notifications from `adb shell cmd notification post`.
pub const DEV_SHELL_PACKAGE: &str = "com.android.shell";

/// True when `app_id` belongs to the glucose monitoring app.
///
/// Matches the vendor prefix, or an allow-listed id exactly, or a dotted
/// sub-identifier of one (`id == entry || id.starts_with(entry + ".")`).
pub fn is_trusted_source(app_id: &str) -> bool {
    // ---
    let id = app_id.trim();
    if id.is_empty() {
        return false;
    }
    if id.starts_with(VENDOR_PREFIX) {
        return true;
    }

    KNOWN_PACKAGE_IDS.iter().any(|entry| {
        id == *entry
            || id
                .strip_prefix(entry)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

/// Source filter used by the ingest pipeline.
///
/// With `allow_shell` set, notifications posted from the developer shell are
/// accepted as well, so formats can be exercised without the vendor app.
pub fn accepts_source(app_id: &str, allow_shell: bool) -> bool {
    is_trusted_source(app_id) || (allow_shell && app_id.trim() == DEV_SHELL_PACKAGE)
}
