/// Scheme of remote media references.
pub const MXC_SCHEME: &str = "mxc://";

/// A parsed `mxc://authority/id` reference, borrowing from the source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaRef<'a> {
    pub authority: &'a str,
    pub media_id: &'a str,
}

impl<'a> MediaRef<'a> {
    /// Parse a media reference. Wrong scheme, missing authority or missing id yields `None`.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let rest = raw.strip_prefix(MXC_SCHEME)?;
        let (authority, media_id) = rest.split_once('/')?;
        if authority.is_empty() || media_id.is_empty() {
            return None;
        }
        Some(Self {
            authority,
            media_id,
        })
    }
}
