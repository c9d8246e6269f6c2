//! DOM contract for the WhatsApp web client
//!
//! These selectors track the provider's markup and break whenever it
//! changes. Keep every page literal here.

/// Web client entry point
pub const WEB_CLIENT_URL: &str = "https://web.whatsapp.com";

/// Present only once the chat list of an authenticated session has rendered
pub const AUTHENTICATED_MARKER: &str = "#pane-side";

/// Canvas holding the login QR code
pub const QR_CANVAS: &str = "div[data-ref] canvas";

/// Contact search box in the side panel
pub const CONTACT_SEARCH_INPUT: &str = "div[contenteditable='true'][data-tab='3']";

/// Message compose box of the open chat
pub const MESSAGE_COMPOSE_INPUT: &str = "footer div[contenteditable='true'][data-tab='10']";

/// Deep link that opens a chat by phone number
pub fn send_url(base: &str, phone: &str) -> String {
    format!("{}/send?phone={}", base.trim_end_matches('/'), phone)
}

/// Escape a value for use inside a double-quoted CSS attribute selector
pub fn css_attr_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Selector for a contact row whose title matches `name` exactly
pub fn contact_title_exact(name: &str) -> String {
    format!("#pane-side span[title=\"{}\"]", css_attr_escape(name))
}
