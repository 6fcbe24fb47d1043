pub mod hotel_card;
pub mod image_url;
pub mod messages;

pub use hotel_card::{FavoriteAction, FavoriteState, HotelCardData, HotelCardView};
pub use image_url::valid_image_url;
pub use messages::{MessageRenderer, MessageView, PlainView, RenderInputs, RenderPass};
