//! Domain canonicalization.
//!
//! Registrations store the normalized form of the domain the customer reported.
//! Rows written before normalization existed may still carry a scheme or a `www.`
//! prefix, so lookups compare with [`same_domain`] rather than plain equality.

const SCHEMES: [&str; 2] = ["https://", "http://"];

/// Canonicalize a user-supplied domain into a comparable key.
///
/// Lower-cases, trims whitespace, strips a leading `http://`/`https://`, a leading
/// `www.` and any trailing `/`. Never fails; garbage in is normalized best-effort.
pub fn normalize(raw: &str) -> String {
    let mut key = raw.to_ascii_lowercase();

    // Repeat until stable so that normalize(normalize(x)) == normalize(x).
    loop {
        let stripped = strip_once(&key);
        if stripped == key {
            return key;
        }
        key = stripped;
    }
}

fn strip_once(key: &str) -> String {
    let mut rest = key.trim();

    for scheme in SCHEMES {
        if let Some(stripped) = rest.strip_prefix(scheme) {
            rest = stripped;
            break;
        }
    }

    rest = rest.strip_prefix("www.").unwrap_or(rest);
    rest.trim_end_matches('/').to_string()
}

/// The spellings older clients stored for a normalized key: raw, `https://` and `http://`.
pub fn legacy_forms(key: &str) -> [String; 3] {
    [
        key.to_string(),
        format!("https://{}", key),
        format!("http://{}", key),
    ]
}

/// Whether a stored domain value names the same domain as `requested`.
///
/// Matches the legacy forms exactly, then falls back to normalizing the stored
/// value, which also covers legacy rows with a `www.` prefix or trailing slash.
pub fn same_domain(stored: &str, requested: &str) -> bool {
    let requested = normalize(requested);
    if requested.is_empty() {
        return false;
    }
    legacy_forms(&requested).iter().any(|form| form == stored) || normalize(stored) == requested
}

/// Host portion of a normalized domain key (no path, no port).
pub fn host(domain_key: &str) -> &str {
    let without_path = domain_key.split('/').next().unwrap_or(domain_key);

    // Bracketed IPv6 literal, e.g. `[::1]:8080`
    if let Some(rest) = without_path.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }

    // A bare IPv6 literal has more than one colon and no port.
    if without_path.matches(':').count() > 1 {
        return without_path;
    }

    without_path.split(':').next().unwrap_or(without_path)
}
