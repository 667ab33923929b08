use relay_common::types::ChatType;

/// JID suffixes that identify individual WhatsApp users.
const USER_SUFFIXES: &[&str] = &["@c.us", "@s.whatsapp.net"];

const GROUP_SUFFIX: &str = "@g.us";
const BROADCAST_SUFFIX: &str = "@broadcast";

/// Classify a chat JID. Anything that is not a group or broadcast is a DM.
#[must_use]
pub fn chat_type_for(jid: &str) -> ChatType {
    if jid.ends_with(GROUP_SUFFIX) {
        ChatType::Group
    } else if jid.ends_with(BROADCAST_SUFFIX) {
        ChatType::Broadcast
    } else {
        ChatType::Dm
    }
}

/// Strip the user JID suffix (and any `:device` part) to get the phone number.
#[must_use]
pub fn phone_number(peer_id: &str) -> &str {
    let bare = USER_SUFFIXES
        .iter()
        .find_map(|suffix| peer_id.strip_suffix(suffix))
        .unwrap_or(peer_id);
    bare.split(':').next().unwrap_or(bare)
}

/// Check if a sender may talk to the bridge.
///
/// An empty allowlist rejects everyone; the bridge runs a local agent with
/// file system access, so there is no open policy. Entries are compared
/// against the sender's phone number (leading `+` ignored) and support
/// glob-style `*` wildcards.
pub fn is_allowed(peer_id: &str, allowlist: &[String]) -> bool {
    let phone = phone_number(peer_id);
    allowlist.iter().any(|entry| {
        let pat = entry.trim().trim_start_matches('+');
        if pat.is_empty() {
            return false;
        }
        if pat.contains('*') {
            glob_match(pat, phone)
        } else {
            pat == phone
        }
    })
}

/// Parse a comma-separated allowlist, dropping blanks.
pub fn parse_allowlist(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Simple glob matching supporting `*` as a wildcard for any sequence of chars.
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let [first, middle @ .., last] = parts.as_slice() else {
        return pattern == text;
    };
    if !text.starts_with(first) {
        return false;
    }

    let mut pos = first.len();
    for part in middle.iter().filter(|p| !p.is_empty()) {
        match text[pos..].find(part) {
            Some(idx) => pos += idx + part.len(),
            None => return false,
        }
    }
    // The tail must not overlap anything already consumed.
    text[pos..].ends_with(last)
}
