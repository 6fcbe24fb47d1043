//! Image URL derivation for hotel cards.
//!
//! Some partner image URLs are not directly embeddable; they are rewritten
//! to a cacheable asset, with a bundled placeholder as the final fallback.

pub const DEFAULT_HOTEL_IMAGE: &str = "/default-hotel.jpg";
const AGODA_FALLBACK_IMAGE: &str = "https://cdn.agoda.net/images/agoda-homes/default-hotel.jpg";

pub fn valid_image_url(original: &str) -> String {
    if original.contains("marriott.com") {
        if let Some(code) = marriott_hotel_code(original) {
            return format!(
                "https://cache.marriott.com/marriottassets/marriott/{code}/{code}_exterior.jpg"
            );
        }
    }

    if original.contains("agoda.com") {
        return AGODA_FALLBACK_IMAGE.to_string();
    }

    DEFAULT_HOTEL_IMAGE.to_string()
}

/// Hotel code from a `travel/<code>-` path segment.
fn marriott_hotel_code(url: &str) -> Option<&str> {
    let start = url.find("travel/")? + "travel/".len();
    let rest = &url[start..];
    let end = rest
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphanumeric())
        .map(|(i, _)| i)
        .unwrap_or(rest.len());

    if end == 0 || !rest[end..].starts_with('-') {
        return None;
    }
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marriott_urls_map_to_asset_cache() {
        let url = "https://www.marriott.com/en-us/hotels/travel/khhmc-marriott-kaohsiung/";
        assert_eq!(
            valid_image_url(url),
            "https://cache.marriott.com/marriottassets/marriott/khhmc/khhmc_exterior.jpg"
        );
    }

    #[test]
    fn marriott_url_without_code_falls_back() {
        assert_eq!(
            valid_image_url("https://www.marriott.com/reservations"),
            DEFAULT_HOTEL_IMAGE
        );
        // A travel segment not followed by a dash is not a hotel code.
        assert_eq!(
            valid_image_url("https://www.marriott.com/travel/khhmc/"),
            DEFAULT_HOTEL_IMAGE
        );
    }

    #[test]
    fn agoda_urls_use_agoda_placeholder() {
        assert_eq!(
            valid_image_url("https://www.agoda.com/hotel/123.html"),
            AGODA_FALLBACK_IMAGE
        );
    }

    #[test]
    fn unknown_hosts_use_bundled_placeholder() {
        assert_eq!(
            valid_image_url("https://example.com/photo.jpg"),
            DEFAULT_HOTEL_IMAGE
        );
    }
}
