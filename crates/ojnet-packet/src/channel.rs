//! Channel ids.
//!
//! Channel 0 is reserved for protocol-level control. Closing it terminates
//! the whole logical connection. Channels 1-255 carry application traffic.

/// Protocol control channel.
pub const CONTROL: u8 = 0;

/// Returns a human-readable name for a channel id.
pub fn channel_name(id: u8) -> &'static str {
    match id {
        CONTROL => "CONTROL",
        _ => "APPLICATION",
    }
}

/// Returns true for the protocol control channel.
pub fn is_control(id: u8) -> bool {
    id == CONTROL
}
