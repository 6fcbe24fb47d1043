//! The hotel card widget: payload decoding with fallback defaults, HTML
//! rendering, and the interaction events it emits.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::render::image_url::{valid_image_url, DEFAULT_HOTEL_IMAGE};

pub const FALLBACK_NAME: &str = "No Name";

/// Raw `data` mapping of a `hotel_card` payload. Every field is optional;
/// `null` and absent both mean "use the fallback".
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelCardData {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub star_rating: Option<f64>,
    pub guest_rating: Option<f64>,
    pub review_count: Option<u64>,
    pub price: Option<String>,
    pub max_occupancy: Option<u64>,
    pub image_url: Option<String>,
    pub booking_url: Option<String>,
}

/// Fully-defaulted view of a hotel card, ready to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotelCardView {
    pub name: String,
    pub description: String,
    pub location: String,
    pub star_rating: f64,
    pub guest_rating: f64,
    pub review_count: u64,
    pub price: String,
    pub max_occupancy: u64,
    pub image_url: String,
    pub booking_url: Option<String>,
}

impl HotelCardView {
    pub fn from_data(data: HotelCardData) -> Self {
        Self {
            name: data.name.unwrap_or_else(|| FALLBACK_NAME.to_string()),
            description: data.description.unwrap_or_default(),
            location: data.location.unwrap_or_default(),
            star_rating: data.star_rating.unwrap_or(0.0),
            guest_rating: data.guest_rating.unwrap_or(0.0),
            review_count: data.review_count.unwrap_or(0),
            price: data.price.unwrap_or_default(),
            max_occupancy: data.max_occupancy.unwrap_or(0),
            image_url: data
                .image_url
                .unwrap_or_else(|| DEFAULT_HOTEL_IMAGE.to_string()),
            booking_url: data.booking_url,
        }
    }

    pub fn to_html(&self) -> String {
        let name = html_escape::encode_text(&self.name);
        let name_attr = html_escape::encode_double_quoted_attribute(&self.name);

        let title = match &self.booking_url {
            Some(url) => format!(
                r#"🏨 <a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
                html_escape::encode_double_quoted_attribute(url),
                name
            ),
            None => format!("🏨 {name}"),
        };

        let image = valid_image_url(&self.image_url);

        let book_button = match &self.booking_url {
            Some(url) => format!(
                r#"<a class="book-button" href="{}" target="_blank" data-track="hotel_card_clicked" data-hotel-name="{}" data-location="{}" data-price="{}">Book Now</a>"#,
                html_escape::encode_double_quoted_attribute(url),
                name_attr,
                html_escape::encode_double_quoted_attribute(&self.location),
                html_escape::encode_double_quoted_attribute(&self.price),
            ),
            None => String::new(),
        };

        format!(
            r#"<div class="hotel-card" data-hotel-name="{name_attr}">
    <h2 class="hotel-card-title">{title}</h2>
    <p>{description}</p>
    <ul class="hotel-card-facts">
        <li><strong>Location:</strong> {location}</li>
        <li><strong>Star Rating:</strong> {star_rating}</li>
        <li><strong>Guest Rating:</strong> {guest_rating} / 10.0 ({review_count} reviews)</li>
        <li><strong>Total Price:</strong> {price}</li>
        <li><strong>Max Occupancy:</strong> {max_occupancy}</li>
    </ul>
    <img class="hotel-card-image" src="{image}" alt="{name_attr}">
    <div class="hotel-card-actions">
        {book_button}
        <button class="favorite-button" data-track="card_favorited" data-hotel-name="{name_attr}">&#9825;</button>
    </div>
</div>"#,
            description = html_escape::encode_text(&self.description),
            location = html_escape::encode_text(&self.location),
            star_rating = self.star_rating,
            guest_rating = self.guest_rating,
            review_count = self.review_count,
            price = html_escape::encode_text(&self.price),
            max_occupancy = self.max_occupancy,
            image = html_escape::encode_double_quoted_attribute(&image),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteAction {
    Favorite,
    Unfavorite,
}

impl FavoriteAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Favorite => "favorite",
            Self::Unfavorite => "unfavorite",
        }
    }
}

/// Favorite toggle for one card. View-local only: nothing is persisted, the
/// state resets on reload.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FavoriteState {
    favorited: bool,
}

impl FavoriteState {
    pub fn is_favorited(&self) -> bool {
        self.favorited
    }

    /// Flips the state and reports the action the flip represents.
    pub fn toggle(&mut self) -> FavoriteAction {
        self.favorited = !self.favorited;
        if self.favorited {
            FavoriteAction::Favorite
        } else {
            FavoriteAction::Unfavorite
        }
    }
}

/// Properties for a `card_favorited` event. Anonymous users are reported
/// under the `"guest"` sentinel.
pub fn favorite_event_properties(
    hotel_name: &str,
    user_id: Option<&str>,
    action: FavoriteAction,
) -> Value {
    json!({
        "hotelName": hotel_name,
        "userId": user_id.unwrap_or("guest"),
        "action": action.as_str(),
    })
}

/// Properties for a `hotel_card_clicked` event.
pub fn click_event_properties(card: &HotelCardView) -> Value {
    json!({
        "hotelName": card.name,
        "location": card.location,
        "price": card.price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_omitted_field_gets_its_fallback() {
        let data: HotelCardData = serde_json::from_value(json!({"name": "X"})).unwrap();
        let view = HotelCardView::from_data(data);

        assert_eq!(view.name, "X");
        assert_eq!(view.description, "");
        assert_eq!(view.location, "");
        assert_eq!(view.star_rating, 0.0);
        assert_eq!(view.guest_rating, 0.0);
        assert_eq!(view.review_count, 0);
        assert_eq!(view.price, "");
        assert_eq!(view.max_occupancy, 0);
        assert_eq!(view.image_url, DEFAULT_HOTEL_IMAGE);
        assert_eq!(view.booking_url, None);
    }

    #[test]
    fn null_fields_behave_like_omitted_fields() {
        let data: HotelCardData =
            serde_json::from_value(json!({"name": null, "starRating": null})).unwrap();
        let view = HotelCardView::from_data(data);
        assert_eq!(view.name, FALLBACK_NAME);
        assert_eq!(view.star_rating, 0.0);
    }

    #[test]
    fn full_payload_binds_all_fields() {
        let data: HotelCardData = serde_json::from_value(json!({
            "name": "Grand Hi Lai Hotel",
            "description": "A luxury hotel...",
            "location": "Kaohsiung",
            "starRating": 5,
            "guestRating": 9.2,
            "reviewCount": 1240,
            "price": "$3800",
            "maxOccupancy": 4,
            "imageUrl": "https://cf.bstatic.com/xdata/images/hotel/max1024x768/1.jpg",
            "bookingUrl": "https://www.booking.com/hotel/tw/grand-hi-lai.html"
        }))
        .unwrap();
        let view = HotelCardView::from_data(data);

        assert_eq!(view.name, "Grand Hi Lai Hotel");
        assert_eq!(view.guest_rating, 9.2);
        assert_eq!(view.review_count, 1240);
        assert_eq!(
            view.booking_url.as_deref(),
            Some("https://www.booking.com/hotel/tw/grand-hi-lai.html")
        );
    }

    #[test]
    fn html_escapes_untrusted_fields() {
        let data: HotelCardData =
            serde_json::from_value(json!({"name": "<script>alert(1)</script>"})).unwrap();
        let html = HotelCardView::from_data(data).to_html();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn book_button_only_renders_with_booking_url() {
        let with_url: HotelCardData =
            serde_json::from_value(json!({"bookingUrl": "https://example.com"})).unwrap();
        assert!(HotelCardView::from_data(with_url)
            .to_html()
            .contains("Book Now"));

        let without: HotelCardData = serde_json::from_value(json!({})).unwrap();
        assert!(!HotelCardView::from_data(without)
            .to_html()
            .contains("Book Now"));
    }

    #[test]
    fn favorite_toggle_alternates_actions() {
        let mut state = FavoriteState::default();
        assert_eq!(state.toggle(), FavoriteAction::Favorite);
        assert!(state.is_favorited());
        assert_eq!(state.toggle(), FavoriteAction::Unfavorite);
        assert!(!state.is_favorited());
        assert_eq!(state.toggle(), FavoriteAction::Favorite);
    }

    #[test]
    fn click_event_carries_name_location_and_price() {
        let data: HotelCardData = serde_json::from_value(json!({
            "name": "Grand",
            "location": "Kaohsiung",
            "price": "$3800"
        }))
        .unwrap();
        let props = click_event_properties(&HotelCardView::from_data(data));
        assert_eq!(props["hotelName"], "Grand");
        assert_eq!(props["location"], "Kaohsiung");
        assert_eq!(props["price"], "$3800");
    }

    #[test]
    fn anonymous_favorite_uses_guest_sentinel() {
        let props = favorite_event_properties("Grand", None, FavoriteAction::Favorite);
        assert_eq!(props["userId"], "guest");
        assert_eq!(props["action"], "favorite");

        let props = favorite_event_properties("Grand", Some("alice"), FavoriteAction::Unfavorite);
        assert_eq!(props["userId"], "alice");
        assert_eq!(props["action"], "unfavorite");
    }
}
